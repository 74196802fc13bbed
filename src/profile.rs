//! Serialization Profile: how each type or path is turned into a canonical node.
//!
//! The profile is an explicit registry consulted by the canonicalizer. A path
//! entry wins over a type entry; anything unregistered is encoded structurally.
//!
//! ## Usage Workflow
//! ```rust
//! use snapgate::canonical::Node;
//! use snapgate::profile::{build_profile, SerializationProfile, Strategy};
//! use snapgate::value::TypeName;
//! use std::collections::BTreeSet;
//!
//! // 1. Caller overrides: a custom encoder for a type
//! let overrides = SerializationProfile::new()
//!     .encode_type("Secret", |_| Node::string("<redacted>"));
//! // 2. Merge with the cyclic types detected for this invocation
//! let cyclic: BTreeSet<TypeName> = [TypeName::new("Tree")].into_iter().collect();
//! let profile = build_profile(&cyclic, Some(&overrides));
//! assert!(matches!(profile.strategy_for("", Some(&TypeName::new("Tree"))), Strategy::Stub));
//! assert!(matches!(profile.strategy_for("", Some(&TypeName::new("Secret"))), Strategy::Custom(_)));
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::canonical::Node;
use crate::value::{TypeName, Value};

/// A caller-supplied encoder replacing the default structural encoding.
pub type SharedEncoder = Arc<dyn Fn(&Value) -> Node + Send + Sync>;

/// Tagged encoding strategy.
#[derive(Clone)]
pub enum Strategy {
    /// Recurse into fields and elements.
    Structural,
    /// Expand the first occurrence of an identity; later occurrences become placeholders.
    Stub,
    /// Delegate to a caller encoder; the encoder owns the whole subtree.
    Custom(SharedEncoder),
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Structural => f.write_str("Structural"),
            Strategy::Stub => f.write_str("Stub"),
            Strategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Registry of per-type and per-path strategies.
#[derive(Debug, Clone, Default)]
pub struct SerializationProfile {
    by_type: HashMap<TypeName, Strategy>,
    by_path: HashMap<String, Strategy>,
}

impl SerializationProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom encoder for every value of `type_name`.
    pub fn encode_type<F>(mut self, type_name: impl Into<TypeName>, encoder: F) -> Self
    where
        F: Fn(&Value) -> Node + Send + Sync + 'static,
    {
        self.by_type
            .insert(type_name.into(), Strategy::Custom(Arc::new(encoder)));
        self
    }

    /// Registers a custom encoder for the value at an exact dot-delimited path.
    pub fn encode_path<F>(mut self, path: impl Into<String>, encoder: F) -> Self
    where
        F: Fn(&Value) -> Node + Send + Sync + 'static,
    {
        self.by_path
            .insert(path.into(), Strategy::Custom(Arc::new(encoder)));
        self
    }

    /// Resolves the strategy for a value at `path` with runtime type `type_name`.
    pub fn strategy_for(&self, path: &str, type_name: Option<&TypeName>) -> &Strategy {
        if let Some(strategy) = self.by_path.get(path) {
            return strategy;
        }
        type_name
            .and_then(|t| self.by_type.get(t))
            .unwrap_or(&Strategy::Structural)
    }

    #[cfg(test)]
    fn has_path_rules(&self) -> bool {
        !self.by_path.is_empty()
    }

    /// Types encoded with a cycle-safe stub.
    #[cfg(test)]
    fn stubbed_types(&self) -> BTreeSet<&TypeName> {
        self.by_type
            .iter()
            .filter(|(_, s)| matches!(s, Strategy::Stub))
            .map(|(t, _)| t)
            .collect()
    }
}

/// Builds the profile for one match attempt.
///
/// Every detected cyclic type gets a stub; caller encoders then override both
/// stubs and structural defaults. Never touches the value graph.
pub fn build_profile(
    cyclic_types: &BTreeSet<TypeName>,
    overrides: Option<&SerializationProfile>,
) -> SerializationProfile {
    let mut profile = SerializationProfile::default();
    for type_name in cyclic_types {
        profile.by_type.insert(type_name.clone(), Strategy::Stub);
    }
    if let Some(overrides) = overrides {
        for (type_name, strategy) in &overrides.by_type {
            profile.by_type.insert(type_name.clone(), strategy.clone());
        }
        for (path, strategy) in &overrides.by_path {
            profile.by_path.insert(path.clone(), strategy.clone());
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_rules_win_over_type_rules() {
        let profile = SerializationProfile::new()
            .encode_type("Money", |_| Node::string("type"))
            .encode_path("price", |_| Node::string("path"));
        let money = TypeName::new("Money");
        let Strategy::Custom(encoder) = profile.strategy_for("price", Some(&money)) else {
            panic!("expected custom strategy");
        };
        assert_eq!(encoder(&Value::Null), Node::string("path"));
        let Strategy::Custom(encoder) = profile.strategy_for("total", Some(&money)) else {
            panic!("expected custom strategy");
        };
        assert_eq!(encoder(&Value::Null), Node::string("type"));
    }

    #[test]
    fn unregistered_values_are_structural() {
        let profile = SerializationProfile::new();
        assert!(matches!(profile.strategy_for("a.b", None), Strategy::Structural));
        assert!(!profile.has_path_rules());
    }

    #[test]
    fn caller_encoder_overrides_detected_stub() {
        let cyclic: BTreeSet<TypeName> =
            [TypeName::new("One"), TypeName::new("Two")].into_iter().collect();
        let overrides =
            SerializationProfile::new().encode_type("One", |_| Node::string("custom"));
        let profile = build_profile(&cyclic, Some(&overrides));
        let stubbed: Vec<&str> = profile.stubbed_types().into_iter().map(TypeName::as_str).collect();
        assert_eq!(stubbed, vec!["Two"]);
        assert!(matches!(
            profile.strategy_for("", Some(&TypeName::new("One"))),
            Strategy::Custom(_)
        ));
    }
}
