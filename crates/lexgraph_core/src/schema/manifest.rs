//! Schema manifest declaration and validation.
//!
//! A manifest is the declarative source of class/property metadata. It is
//! parsed and validated once, then compiled into an immutable
//! [`Schema`](crate::schema::classifier::Schema).

use crate::schema::kind::PropertyKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Declarative schema manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaManifest {
    /// Manifest name, e.g. `lexicon`.
    pub name: String,
    pub classes: Vec<ClassDeclaration>,
}

/// One class and its declared properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDeclaration {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
}

/// One property declaration.
///
/// `kind` may be omitted; the kind is then inferred from the property name
/// suffix when the schema is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl SchemaManifest {
    /// Parses a JSON manifest and validates declaration-level invariants.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let manifest: SchemaManifest =
            serde_json::from_str(text).map_err(|err| ManifestError::Parse(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyManifestName);
        }

        let mut class_names = BTreeSet::<&str>::new();
        for class in &self.classes {
            let class_name = class.name.as_str();
            if !is_valid_identifier(class_name) {
                return Err(ManifestError::InvalidClassName(class.name.clone()));
            }
            if !class_names.insert(class_name) {
                return Err(ManifestError::DuplicateClass(class.name.clone()));
            }

            let mut property_names = BTreeSet::<&str>::new();
            for property in &class.properties {
                if !is_valid_identifier(property.name.as_str()) {
                    return Err(ManifestError::InvalidPropertyName {
                        class: class.name.clone(),
                        property: property.name.clone(),
                    });
                }
                if !property_names.insert(property.name.as_str()) {
                    return Err(ManifestError::DuplicateProperty {
                        class: class.name.clone(),
                        property: property.name.clone(),
                    });
                }
                if let Some(kind) = property.kind.as_deref() {
                    if PropertyKind::parse(kind).is_none() {
                        return Err(ManifestError::UnknownKind {
                            class: class.name.clone(),
                            property: property.name.clone(),
                            kind: kind.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(ch) => ch,
        None => return false,
    };
    first.is_ascii_alphabetic() && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Manifest parse/validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    Parse(String),
    EmptyManifestName,
    InvalidClassName(String),
    DuplicateClass(String),
    InvalidPropertyName {
        class: String,
        property: String,
    },
    DuplicateProperty {
        class: String,
        property: String,
    },
    UnknownKind {
        class: String,
        property: String,
        kind: String,
    },
}

impl Display for ManifestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "schema manifest is not valid JSON: {message}"),
            Self::EmptyManifestName => write!(f, "schema manifest name must not be empty"),
            Self::InvalidClassName(value) => write!(f, "invalid class name: `{value}`"),
            Self::DuplicateClass(value) => write!(f, "class declared twice: {value}"),
            Self::InvalidPropertyName { class, property } => {
                write!(f, "invalid property name `{property}` on class {class}")
            }
            Self::DuplicateProperty { class, property } => {
                write!(f, "property {class}.{property} declared twice")
            }
            Self::UnknownKind {
                class,
                property,
                kind,
            } => write!(f, "unknown kind `{kind}` for property {class}.{property}"),
        }
    }
}

impl Error for ManifestError {}
