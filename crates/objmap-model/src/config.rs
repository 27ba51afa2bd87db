//! Global mapping configuration.

use serde::{Deserialize, Serialize};

use crate::types::TypeRef;

/// How collection elements are merged into an existing destination collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    /// Append every mapped element.
    #[default]
    Cumulative,
    /// Update equal elements in place, append the rest.
    NonCumulative,
}

/// Whether a mapping also applies from destination back to source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingDirection {
    #[default]
    Bidirectional,
    OneWay,
}

/// Type mask whose values are shared instead of copied.
///
/// A mask is either an exact type expression (`Address`) or a prefix ending
/// in `*` (`com.acme.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CopyByReference {
    mask: String,
}

impl CopyByReference {
    pub fn new(mask: impl Into<String>) -> Self {
        Self { mask: mask.into() }
    }

    pub fn mask(&self) -> &str {
        &self.mask
    }

    pub fn matches(&self, ty: &TypeRef) -> bool {
        let name = ty.to_string();
        match self.mask.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == self.mask,
        }
    }
}

/// Engine-wide defaults. Class mappings override these per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Write null source values to the destination.
    pub map_null: bool,
    /// Write empty strings to the destination.
    pub map_empty_string: bool,
    /// Trim strings before conversion and before writing.
    pub trim_strings: bool,
    /// Propagate field failures instead of logging and continuing.
    pub stop_on_errors: bool,
    /// Add implicit same-name field mappings.
    pub wildcard: bool,
    pub relationship_type: RelationshipType,
    /// chrono format string used for date/string conversion.
    pub date_format: Option<String>,
    /// Name of the bean factory used when a mapping names none.
    pub bean_factory: Option<String>,
    pub copy_by_references: Vec<CopyByReference>,
    /// Callback error kinds that always propagate.
    pub allowed_errors: Vec<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            map_null: true,
            map_empty_string: true,
            trim_strings: false,
            stop_on_errors: true,
            wildcard: true,
            relationship_type: RelationshipType::Cumulative,
            date_format: None,
            bean_factory: None,
            copy_by_references: Vec::new(),
            allowed_errors: Vec::new(),
        }
    }
}

impl Configuration {
    pub fn with_map_null(mut self, enabled: bool) -> Self {
        self.map_null = enabled;
        self
    }

    pub fn with_map_empty_string(mut self, enabled: bool) -> Self {
        self.map_empty_string = enabled;
        self
    }

    pub fn with_trim_strings(mut self, enabled: bool) -> Self {
        self.trim_strings = enabled;
        self
    }

    pub fn with_stop_on_errors(mut self, enabled: bool) -> Self {
        self.stop_on_errors = enabled;
        self
    }

    pub fn with_wildcard(mut self, enabled: bool) -> Self {
        self.wildcard = enabled;
        self
    }

    pub fn with_relationship_type(mut self, relationship: RelationshipType) -> Self {
        self.relationship_type = relationship;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn with_bean_factory(mut self, name: impl Into<String>) -> Self {
        self.bean_factory = Some(name.into());
        self
    }

    pub fn with_copy_by_reference(mut self, mask: impl Into<String>) -> Self {
        self.copy_by_references.push(CopyByReference::new(mask));
        self
    }

    pub fn with_allowed_error(mut self, kind: impl Into<String>) -> Self {
        self.allowed_errors.push(kind.into());
        self
    }

    /// Whether values of `ty` are copied by reference under a global rule.
    pub fn is_copy_by_reference(&self, ty: &TypeRef) -> bool {
        self.copy_by_references.iter().any(|rule| rule.matches(ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_partial_json() {
        let config: Configuration =
            serde_json::from_str(r#"{"trim_strings": true, "copy_by_references": ["acme.*"]}"#).unwrap();
        assert!(config.trim_strings);
        assert!(config.map_null);
        assert!(config.stop_on_errors);
        assert_eq!(config.relationship_type, RelationshipType::Cumulative);
        assert!(config.is_copy_by_reference(&TypeRef::class("acme.Money")));
        assert!(!config.is_copy_by_reference(&TypeRef::class("Money")));
    }

    #[test]
    fn round_trips_through_json() {
        let config = Configuration::default()
            .with_relationship_type(RelationshipType::NonCumulative)
            .with_allowed_error("IllegalState")
            .with_date_format("%d/%m/%Y");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"non-cumulative\""));
        let back: Configuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn exact_mask_matches_whole_type() {
        let rule = CopyByReference::new("list<Money>");
        assert!(rule.matches(&TypeRef::list(TypeRef::class("Money"))));
        assert!(!rule.matches(&TypeRef::class("Money")));
    }
}
