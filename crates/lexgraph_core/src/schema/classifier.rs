//! Compiled schema and property classification.
//!
//! # Responsibility
//! - Compile a validated manifest into an immutable classification table.
//! - Answer `(class, property) -> PropertyKind` without further inference.
//!
//! # Invariants
//! - Name-suffix inference runs once per property, at compile time.
//! - A compiled `Schema` is never mutated; share it through `Arc`.

use crate::schema::kind::{PropertyKind, ReferenceCardinality};
use crate::schema::manifest::{
    ClassDeclaration, ManifestError, PropertyDeclaration, SchemaManifest,
};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const LEXICON_MANIFEST: &str = include_str!("lexicon.json");

static KIND_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]\w*?(OA|OS|OC|RA|RS|RC)$").expect("valid suffix regex"));

static LEXICON_SCHEMA: Lazy<Arc<Schema>> = Lazy::new(|| {
    Arc::new(Schema::from_manifest_json(LEXICON_MANIFEST).expect("embedded lexicon manifest"))
});

/// Result type used by classification lookups.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Classification lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Class is not declared in the schema.
    UnknownClass(String),
    /// Property is not declared on the class.
    UnknownProperty { class: String, property: String },
    /// Property is declared but its kind could not be resolved at load.
    UnsupportedPropertyKind { class: String, property: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownClass(class) => write!(f, "unknown class: {class}"),
            Self::UnknownProperty { class, property } => {
                write!(f, "unknown property: {class}.{property}")
            }
            Self::UnsupportedPropertyKind { class, property } => {
                write!(f, "property kind is not classifiable: {class}.{property}")
            }
        }
    }
}

impl Error for SchemaError {}

/// Load-time classification of one declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Resolved(PropertyKind),
    /// Declared without kind and without a recognised name suffix.
    Unresolved,
}

/// Compiled metadata for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSchema {
    name: String,
    properties: BTreeMap<String, Classification>,
}

impl ClassSchema {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Declared properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, Classification)> {
        self.properties
            .iter()
            .map(|(name, classification)| (name.as_str(), *classification))
    }

    /// Declared owning properties in name order.
    pub fn owning_properties(&self) -> impl Iterator<Item = (&str, PropertyKind)> {
        self.properties().filter_map(|(name, classification)| match classification {
            Classification::Resolved(kind) if kind.is_owning() => Some((name, kind)),
            _ => None,
        })
    }
}

/// Immutable classification table compiled from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    classes: BTreeMap<String, ClassSchema>,
}

impl Schema {
    /// Compiles a manifest after validating it.
    pub fn from_manifest(manifest: &SchemaManifest) -> Result<Self, ManifestError> {
        manifest.validate()?;
        let mut classes = BTreeMap::new();
        for class in &manifest.classes {
            let mut properties = BTreeMap::new();
            for property in &class.properties {
                properties.insert(property.name.clone(), classify_declaration(property));
            }
            classes.insert(
                class.name.clone(),
                ClassSchema {
                    name: class.name.clone(),
                    properties,
                },
            );
        }

        let unresolved = classes
            .values()
            .flat_map(|class| class.properties.values())
            .filter(|classification| **classification == Classification::Unresolved)
            .count();
        debug!(
            "event=schema_compile module=schema status=ok name={} classes={} unresolved={}",
            manifest.name,
            classes.len(),
            unresolved
        );

        Ok(Self {
            name: manifest.name.clone(),
            classes,
        })
    }

    /// Parses and compiles a JSON manifest.
    pub fn from_manifest_json(text: &str) -> Result<Self, ManifestError> {
        let manifest = SchemaManifest::from_json(text)?;
        Self::from_manifest(&manifest)
    }

    /// Built-in lexicon schema shared by all callers.
    pub fn lexicon() -> Arc<Schema> {
        Arc::clone(&LEXICON_SCHEMA)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn class(&self, class: &str) -> SchemaResult<&ClassSchema> {
        self.classes
            .get(class)
            .ok_or_else(|| SchemaError::UnknownClass(class.to_string()))
    }

    /// Classifies one property of one class.
    ///
    /// # Errors
    /// - `UnknownClass` / `UnknownProperty` when undeclared.
    /// - `UnsupportedPropertyKind` when declared but unresolved at load.
    pub fn classify(&self, class: &str, property: &str) -> SchemaResult<PropertyKind> {
        let class_schema = self.class(class)?;
        match class_schema.properties.get(property) {
            None => Err(SchemaError::UnknownProperty {
                class: class.to_string(),
                property: property.to_string(),
            }),
            Some(Classification::Resolved(kind)) => Ok(*kind),
            Some(Classification::Unresolved) => Err(SchemaError::UnsupportedPropertyKind {
                class: class.to_string(),
                property: property.to_string(),
            }),
        }
    }
}

/// Infers a property kind from the conventional name suffix.
///
/// `OA`/`OS`/`OC` are owning atom/sequence/collection, `RA`/`RS`/`RC` are
/// references with the matching cardinality.
pub fn infer_kind_from_suffix(property: &str) -> Option<PropertyKind> {
    let captures = KIND_SUFFIX_RE.captures(property)?;
    match captures.get(1)?.as_str() {
        "OA" => Some(PropertyKind::OwnedAtom),
        "OS" => Some(PropertyKind::OwnedSequence),
        "OC" => Some(PropertyKind::OwnedCollection),
        "RA" => Some(PropertyKind::Reference(ReferenceCardinality::Atomic)),
        "RS" => Some(PropertyKind::Reference(ReferenceCardinality::Sequence)),
        "RC" => Some(PropertyKind::Reference(ReferenceCardinality::Collection)),
        _ => None,
    }
}

fn classify_declaration(property: &PropertyDeclaration) -> Classification {
    let kind = match property.kind.as_deref() {
        Some(explicit) => PropertyKind::parse(explicit),
        None => infer_kind_from_suffix(property.name.as_str()),
    };
    kind.map_or(Classification::Unresolved, Classification::Resolved)
}

/// Fluent builder for small schemas, mainly for tests and embedding callers.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    classes: Vec<ClassDeclaration>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Declares a class with no properties (no-op when already declared).
    pub fn class(mut self, class: &str) -> Self {
        self.class_entry(class);
        self
    }

    /// Declares one property with an explicit kind.
    pub fn property(mut self, class: &str, property: &str, kind: PropertyKind) -> Self {
        self.class_entry(class).properties.push(PropertyDeclaration {
            name: property.to_string(),
            kind: Some(kind.as_str().to_string()),
        });
        self
    }

    /// Declares one property whose kind is inferred from its name suffix.
    pub fn inferred(mut self, class: &str, property: &str) -> Self {
        self.class_entry(class).properties.push(PropertyDeclaration {
            name: property.to_string(),
            kind: None,
        });
        self
    }

    pub fn build(self) -> Result<Schema, ManifestError> {
        Schema::from_manifest(&SchemaManifest {
            name: self.name,
            classes: self.classes,
        })
    }

    fn class_entry(&mut self, class: &str) -> &mut ClassDeclaration {
        let index = match self.classes.iter().position(|entry| entry.name == class) {
            Some(index) => index,
            None => {
                self.classes.push(ClassDeclaration {
                    name: class.to_string(),
                    properties: Vec::new(),
                });
                self.classes.len() - 1
            }
        };
        &mut self.classes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_kind_from_suffix, Schema, SchemaBuilder, SchemaError};
    use crate::schema::kind::{PropertyKind, ReferenceCardinality};

    #[test]
    fn infers_kinds_from_suffixes_only_after_a_name_stem() {
        assert_eq!(
            infer_kind_from_suffix("SensesOS"),
            Some(PropertyKind::OwnedSequence)
        );
        assert_eq!(
            infer_kind_from_suffix("PartOfSpeechRA"),
            Some(PropertyKind::Reference(ReferenceCardinality::Atomic))
        );
        assert_eq!(infer_kind_from_suffix("OS"), None);
        assert_eq!(infer_kind_from_suffix("Gloss"), None);
    }

    #[test]
    fn explicit_kind_wins_over_suffix() {
        let schema = SchemaBuilder::new("test")
            .property("Thing", "NotesRS", PropertyKind::MultiText)
            .build()
            .unwrap();
        assert_eq!(
            schema.classify("Thing", "NotesRS").unwrap(),
            PropertyKind::MultiText
        );
    }

    #[test]
    fn unresolved_declaration_is_unsupported_not_unknown() {
        let schema = SchemaBuilder::new("test")
            .inferred("Thing", "Mystery")
            .build()
            .unwrap();

        assert_eq!(
            schema.classify("Thing", "Mystery").unwrap_err(),
            SchemaError::UnsupportedPropertyKind {
                class: "Thing".to_string(),
                property: "Mystery".to_string(),
            }
        );
        assert!(matches!(
            schema.classify("Thing", "Missing").unwrap_err(),
            SchemaError::UnknownProperty { .. }
        ));
        assert!(matches!(
            schema.classify("Other", "Mystery").unwrap_err(),
            SchemaError::UnknownClass(_)
        ));
    }

    #[test]
    fn embedded_lexicon_schema_compiles_without_unresolved_properties() {
        let schema = Schema::lexicon();
        assert_eq!(schema.name(), "lexicon");
        for class in ["LexEntry", "LexSense", "LexExampleSentence", "PartOfSpeech"] {
            let class_schema = schema.class(class).unwrap();
            for (property, _) in class_schema.properties() {
                schema
                    .classify(class, property)
                    .expect("lexicon property should classify");
            }
        }
        assert_eq!(
            schema.classify("LexSense", "ExamplesOS").unwrap(),
            PropertyKind::OwnedSequence
        );
    }
}
