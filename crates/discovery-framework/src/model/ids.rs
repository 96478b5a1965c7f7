//! Identifiers for inventory entities.
//!
//! Resource IDs are derived from where a resource was found, so the same
//! node discovered twice gets the same ID. That is what makes diffing one
//! scan against the previous one possible.

use crate::error::InventoryError;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `feed~endpoint~idPart`
    pub fn generate(feed_id: &str, endpoint_name: &str, id_part: &str) -> Self {
        Self(format!("{feed_id}~{endpoint_name}~{id_part}"))
    }

    pub fn parse(&self) -> Result<ResourceIdParts, InventoryError> {
        let mut parts = self.0.splitn(3, '~');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(feed_id), Some(endpoint), Some(id_part)) => Ok(ResourceIdParts {
                feed_id: feed_id.to_string(),
                endpoint: endpoint.to_string(),
                id_part: id_part.to_string(),
            }),
            _ => Err(InventoryError::InvalidResourceId(self.0.clone())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The pieces of a generated [`ResourceId`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceIdParts {
    pub feed_id: String,
    pub endpoint: String,
    pub id_part: String,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceTypeId(String);

impl ResourceTypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `MI~R~[feed/resourceId]~MT~measurementTypeId`
pub fn measurement_instance_id(feed_id: &str, resource_id: &ResourceId, measurement_type: &str) -> String {
    format!("MI~R~[{feed_id}/{resource_id}]~MT~{measurement_type}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_parse_back() {
        let id = ResourceId::generate("feed", "local", "Server~/server=one");
        assert_eq!(id.as_str(), "feed~local~Server~/server=one");
        let parts = id.parse().unwrap();
        assert_eq!(parts.feed_id, "feed");
        assert_eq!(parts.endpoint, "local");
        assert_eq!(parts.id_part, "Server~/server=one");
    }

    #[test]
    fn malformed_id_is_rejected() {
        let err = ResourceId::new("no-separators").parse().unwrap_err();
        assert_eq!(err, InventoryError::InvalidResourceId("no-separators".into()));
    }
}
