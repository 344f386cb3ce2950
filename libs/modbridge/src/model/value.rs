use std::collections::BTreeMap;

use super::Urn;

/// The tagged value tree the Property Bridge recurses over.
///
/// This is the concrete Rust shape of the host's "rich property model":
/// plain JSON-like scalars/containers, plus first-class `Unknown`,
/// `Secret`, and `Output` markers that plain JSON cannot represent.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<PropertyValue>),
    Object(BTreeMap<String, PropertyValue>),
    Unknown,
    Secret(Box<PropertyValue>),
    Output {
        known: bool,
        secret: bool,
        dependencies: Vec<Urn>,
        element: Box<PropertyValue>,
    },
}

impl PropertyValue {
    pub fn secret(inner: PropertyValue) -> Self {
        PropertyValue::Secret(Box::new(inner))
    }

    /// True if this value or anything nested inside it is `Unknown` (directly,
    /// or via an unknown `Output`).
    pub fn contains_unknown(&self) -> bool {
        match self {
            PropertyValue::Unknown => true,
            PropertyValue::Secret(inner) => inner.contains_unknown(),
            PropertyValue::Output { known, element, .. } => !known || element.contains_unknown(),
            PropertyValue::Array(items) => items.iter().any(PropertyValue::contains_unknown),
            PropertyValue::Object(fields) => {
                fields.values().any(PropertyValue::contains_unknown)
            }
            _ => false,
        }
    }

    /// True if this value is secret at the top level, or is an output
    /// carrying `secret = true`.
    pub fn is_secret(&self) -> bool {
        matches!(self, PropertyValue::Secret(_))
            || matches!(self, PropertyValue::Output { secret: true, .. })
    }

    /// Dependencies carried by this value if it is a first-class output;
    /// empty otherwise.
    pub fn dependencies(&self) -> &[Urn] {
        match self {
            PropertyValue::Output { dependencies, .. } => dependencies,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_unknown_inside_array_is_detected() {
        let v = PropertyValue::Array(vec![PropertyValue::String("a".into()), PropertyValue::Unknown]);
        assert!(v.contains_unknown());
    }

    #[test]
    fn plain_containers_have_no_unknowns() {
        let mut obj = BTreeMap::new();
        obj.insert("key".to_string(), PropertyValue::String("value".into()));
        let v = PropertyValue::Object(obj);
        assert!(!v.contains_unknown());
    }

    #[test]
    fn unknown_output_counts_as_unknown_even_if_element_is_known() {
        let v = PropertyValue::Output {
            known: false,
            secret: false,
            dependencies: vec![],
            element: Box::new(PropertyValue::String("placeholder".into())),
        };
        assert!(v.contains_unknown());
    }

    #[test]
    fn secret_output_is_secret_and_bare_secret_is_secret() {
        let out = PropertyValue::Output {
            known: true,
            secret: true,
            dependencies: vec!["urn:a".into()],
            element: Box::new(PropertyValue::String("hello".into())),
        };
        assert!(out.is_secret());
        assert_eq!(out.dependencies(), &["urn:a".to_string()]);

        let bare = PropertyValue::secret(PropertyValue::String("hello".into()));
        assert!(bare.is_secret());
        assert!(bare.dependencies().is_empty());
    }
}
