//! # Path Locations
//!
//! A reference location scheme: a sequence of `key=value` segments written as
//! `/subsystem=datasources/data-source=ExampleDS`. The value `*` is a
//! wildcard. The empty path (`/`) is the root.

use crate::error::ProtocolError;
use crate::location::LocationResolver;
use std::fmt;
use std::str::FromStr;

pub const WILDCARD: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathSegment {
    pub key: String,
    pub value: String,
}

impl PathSegment {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }

    fn accepts(&self, other: &PathSegment) -> bool {
        self.key == other.key && (self.is_wildcard() || self.value == other.value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathLocation {
    segments: Vec<PathSegment>,
}

impl PathLocation {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Result<Self, ProtocolError> {
        let mut segments = Vec::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| ProtocolError::InvalidLocation(path.to_string()))?;
            if key.is_empty() || value.is_empty() {
                return Err(ProtocolError::InvalidLocation(path.to_string()));
            }
            segments.push(PathSegment::new(key, value));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn append(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::new(key, value));
        Self { segments }
    }

    pub fn join(&self, other: &PathLocation) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    pub fn last_value(&self) -> Option<&str> {
        self.segments.last().map(|s| s.value.as_str())
    }

    fn prefix_matches(&self, other: &PathLocation, len: usize) -> bool {
        self.segments[..len]
            .iter()
            .zip(&other.segments[..len])
            .all(|(pattern, segment)| pattern.accepts(segment))
    }
}

impl fmt::Display for PathLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}={}", segment.key, segment.value)?;
        }
        Ok(())
    }
}

impl FromStr for PathLocation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// [`LocationResolver`] for [`PathLocation`].
///
/// Templates understand `%N` (1-based index into the flattened
/// `key, value, key, value...` list), `%-` (the last value), `%key%` (the
/// value of that key) and `%ManagedServerName`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PathResolver;

impl LocationResolver<PathLocation> for PathResolver {
    fn build_location(&self, path: &str) -> Result<PathLocation, ProtocolError> {
        PathLocation::parse(path)
    }

    fn root_location(&self) -> PathLocation {
        PathLocation::root()
    }

    fn matches(&self, query: &PathLocation, location: &PathLocation) -> bool {
        query.len() == location.len() && query.prefix_matches(location, query.len())
    }

    fn absolutize(&self, parent: Option<&PathLocation>, child: &PathLocation) -> PathLocation {
        match parent {
            Some(parent) if !parent.is_root() => parent.join(child),
            _ => child.clone(),
        }
    }

    fn is_parent(&self, parent: &PathLocation, child: &PathLocation) -> bool {
        parent.len() < child.len() && parent.prefix_matches(child, parent.len())
    }

    fn is_multi_target(&self, location: &PathLocation) -> bool {
        location.segments.iter().any(PathSegment::is_wildcard)
    }

    fn find_wildcard_match(
        &self,
        multi_target: &PathLocation,
        single: &PathLocation,
    ) -> Result<String, ProtocolError> {
        let (index, pattern) = multi_target
            .segments
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_wildcard())
            .ok_or_else(|| {
                ProtocolError::NoWildcard(format!("[{single}] doesn't match the wildcard from [{multi_target}]"))
            })?;

        match single.segments.get(index) {
            Some(segment) if segment.key == pattern.key => Ok(segment.value.clone()),
            Some(_) => Err(ProtocolError::NoWildcard(format!(
                "[{single}] doesn't match the multi-target key in [{multi_target}]"
            ))),
            None => Err(ProtocolError::NoWildcard(format!(
                "[{single}] doesn't have the same path size as [{multi_target}]"
            ))),
        }
    }

    fn apply_template(&self, template: &str, location: &PathLocation, endpoint_name: &str) -> String {
        let mut expanded = template.to_string();
        let mut args = Vec::with_capacity(location.len() * 2);
        for segment in &location.segments {
            expanded = expanded.replace(&format!("%{}%", segment.key), &segment.value);
            args.push(segment.key.as_str());
            args.push(segment.value.as_str());
        }
        expanded = expanded.replace("%ManagedServerName", endpoint_name);
        expand_positional(&expanded, &args)
    }
}

/// Replaces `%N` and `%-` tokens. Tokens that point outside `args` are kept.
fn expand_positional(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '-')) => {
                chars.next();
                match args.last() {
                    Some(last) => out.push_str(last),
                    None => out.push_str("%-"),
                }
            }
            Some((_, d)) if d.is_ascii_digit() => {
                let mut end = start + 1;
                while let Some((i, d)) = chars.peek().copied() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let token = &template[start..end];
                let arg = template[start + 1..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| args.get(i));
                match arg {
                    Some(value) => out.push_str(value),
                    None => out.push_str(token),
                }
            }
            _ => out.push('%'),
        }
    }
    out
}
