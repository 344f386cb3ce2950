use std::fmt;

/// An opaque, stable key for a resource inside one module instance, as
/// emitted by the external runtime (e.g. `module.s3_bucket.aws_s3_bucket.this[0]`).
///
/// Unique within a module instance; doubles as the "name" part of the
/// synthetic child URN registered for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResourceAddress(String);

impl ResourceAddress {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_raw_string() {
        let addr = ResourceAddress::new("module.s3_bucket.aws_s3_bucket.this[0]");
        assert_eq!(addr.to_string(), "module.s3_bucket.aws_s3_bucket.this[0]");
        assert_eq!(addr.as_str(), "module.s3_bucket.aws_s3_bucket.this[0]");
    }

    #[test]
    fn distinct_addresses_are_not_equal() {
        let a = ResourceAddress::new("module.x.foo.a");
        let b = ResourceAddress::new("module.x.foo.b");
        assert_ne!(a, b);
    }
}
