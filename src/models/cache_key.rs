use std::fmt;

/// Key of an entry in the external reactive query cache.
///
/// A composite of entity family, platform discriminator, and sub-resource,
/// e.g. `connectors/mendix/status`. The sync layer only produces these keys;
/// it never reads or writes cache entries itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Entity family (e.g. `connectors`).
    pub family: String,
    /// Platform discriminator extracted from the event payload.
    pub discriminator: String,
    /// Sub-resource within the family (e.g. `status`, `list`).
    pub resource: String,
}

impl CacheKey {
    /// Build an arbitrary composite key.
    pub fn new(
        family: impl Into<String>,
        discriminator: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            discriminator: discriminator.into(),
            resource: resource.into(),
        }
    }

    /// Key of a platform connector's status entry.
    pub fn connector_status(platform: &str) -> Self {
        Self::new("connectors", platform, "status")
    }

    /// Key of a platform's synced-application list entry.
    pub fn connector_list(platform: &str) -> Self {
        Self::new("connectors", platform, "list")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.family, self.discriminator, self.resource)
    }
}
