//! # Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging with the
//! `tracing` crate for the whole agent.
//!
//! ## Configuration
//!
//! Log levels come from `RUST_LOG`; `info` is used when it is not set. The
//! compact format hides the module prefix (`with_target(false)`); every
//! event carries an `endpoint` field instead.
//!
//! ## What Gets Traced
//!
//! | Level | Events |
//! |-------|--------|
//! | `info` | Service lifecycle, scan start and finish with counts, readiness retries |
//! | `warn` | Per-node discovery errors, suppressed events, unreadable attributes |
//! | `error` | Failed endpoint starts, panicking listeners, failed workers |
//! | `debug` | Fetched node counts, per-resource effects, the resource tree after each scan |
//!
//! ## Usage Examples
//!
//! ```bash
//! # Scan summaries only
//! RUST_LOG=info cargo run -p monitor-agent
//!
//! # Every discovered resource and the full tree graph
//! RUST_LOG=debug cargo run -p monitor-agent
//!
//! # Engine detail without the agent noise
//! RUST_LOG=info,discovery_framework::discovery=debug cargo run -p monitor-agent
//! ```
//!
//! A scan at `info` level looks like this:
//!
//! ```text
//! INFO Full discovery scan started endpoint="local"
//! INFO Full discovery scan finished endpoint="local" added=3 modified=0 unchanged=0 removed=0 errors=0 duration_ms=2
//! ```

use tracing_subscriber::EnvFilter;

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
