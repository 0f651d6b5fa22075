use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Dotted location of a field inside an external document, e.g.
/// `catalog.groups[0].controls[2].parts[1].props[0].uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn field(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    /// Shorthand for `field(name).index(i)`.
    pub fn item(&self, name: &str, i: usize) -> Self {
        Self(format!("{}.{}[{}]", self.0, name, i))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{path}: malformed identifier {value:?}")]
    InvalidIdentifier { path: FieldPath, value: String },

    #[error("{path}: required field is missing")]
    MissingField { path: FieldPath },

    #[error("{path}: unparseable date {value:?}")]
    InvalidDate { path: FieldPath, value: String },

    #[error("{path}: duplicate identifier {id}")]
    DuplicateIdentifier { path: FieldPath, id: Uuid },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("row body for {kind} {id} does not decode: {source}")]
    RowCodec {
        kind: &'static str,
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown owner kind {0:?}")]
    UnknownOwnerKind(String),

    #[error("document syntax: {0}")]
    Syntax(oscal_model::ModelError),
}

impl From<oscal_model::ModelError> for MappingError {
    fn from(err: oscal_model::ModelError) -> Self {
        match err {
            oscal_model::ModelError::MissingField { path } => MappingError::MissingField { path: FieldPath(path) },
            other => MappingError::Syntax(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;

impl MappingError {
    /// Field path of a decode failure, when the error has one.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            MappingError::InvalidIdentifier { path, .. }
            | MappingError::MissingField { path }
            | MappingError::InvalidDate { path, .. }
            | MappingError::DuplicateIdentifier { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Unwraps a required member or reports it missing at `path`.
pub fn require<'a, T>(value: &'a Option<T>, path: &FieldPath) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| MappingError::MissingField { path: path.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_path_renders_nested_locations() {
        let p = FieldPath::root("catalog")
            .item("groups", 0)
            .item("controls", 2)
            .field("id");
        assert_eq!(p.to_string(), "catalog.groups[0].controls[2].id");
    }

    #[test]
    fn require_reports_missing_path() {
        let missing: Option<u8> = None;
        let err = require(&missing, &FieldPath::root("catalog").field("metadata")).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("catalog.metadata"));
    }
}
