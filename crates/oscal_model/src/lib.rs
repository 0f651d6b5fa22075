//! JSON wire types for compliance-content documents.

use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod assessment;
pub mod assessment_plan;
pub mod assessment_results;
pub mod back_matter;
pub mod catalog;
pub mod common;
pub mod component_definition;
pub mod metadata;
pub mod poam;
pub mod profile;
pub mod ssp;

pub use assessment_plan::AssessmentPlan;
pub use assessment_results::AssessmentResults;
pub use back_matter::BackMatter;
pub use catalog::Catalog;
pub use component_definition::ComponentDefinition;
pub use metadata::Metadata;
pub use poam::PlanOfActionAndMilestones;
pub use profile::Profile;
pub use ssp::SystemSecurityPlan;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: required field is missing")]
    MissingField { path: String },
}

impl ModelError {
    /// Turns serde's `missing field` failures into a dotted path ending at the
    /// absent member, e.g. `profile.imports`; other failures stay `Json`.
    fn from_tracked(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let parent = err.path().to_string();
        let source = err.into_inner();
        match missing_member(&source) {
            Some(field) if parent.is_empty() || parent == "." => ModelError::MissingField { path: field },
            Some(field) => ModelError::MissingField { path: format!("{parent}.{field}") },
            None => ModelError::Json(source),
        }
    }
}

fn missing_member(err: &serde_json::Error) -> Option<String> {
    if !err.is_data() {
        return None;
    }
    let msg = err.to_string();
    let rest = msg.strip_prefix("missing field `")?;
    rest.split('`').next().map(str::to_string)
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Top-level envelope: a JSON object with a single key naming the document
/// kind, e.g. `{"catalog": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OscalDocument {
    Catalog(Catalog),
    Profile(Profile),
    ComponentDefinition(ComponentDefinition),
    SystemSecurityPlan(SystemSecurityPlan),
    AssessmentPlan(AssessmentPlan),
    AssessmentResults(AssessmentResults),
    PlanOfActionAndMilestones(PlanOfActionAndMilestones),
}

impl OscalDocument {
    /// Envelope key of this document.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OscalDocument::Catalog(_) => "catalog",
            OscalDocument::Profile(_) => "profile",
            OscalDocument::ComponentDefinition(_) => "component-definition",
            OscalDocument::SystemSecurityPlan(_) => "system-security-plan",
            OscalDocument::AssessmentPlan(_) => "assessment-plan",
            OscalDocument::AssessmentResults(_) => "assessment-results",
            OscalDocument::PlanOfActionAndMilestones(_) => "plan-of-action-and-milestones",
        }
    }

    /// Raw (unparsed) root identifier.
    pub fn uuid(&self) -> &str {
        match self {
            OscalDocument::Catalog(d) => &d.uuid,
            OscalDocument::Profile(d) => &d.uuid,
            OscalDocument::ComponentDefinition(d) => &d.uuid,
            OscalDocument::SystemSecurityPlan(d) => &d.uuid,
            OscalDocument::AssessmentPlan(d) => &d.uuid,
            OscalDocument::AssessmentResults(d) => &d.uuid,
            OscalDocument::PlanOfActionAndMilestones(d) => &d.uuid,
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_str(s);
        let doc = serde_path_to_error::deserialize(&mut de).map_err(ModelError::from_tracked)?;
        de.end()?;
        Ok(doc)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn load_document_from_file<P: AsRef<Path>>(path: P) -> Result<OscalDocument> {
    let path = path.as_ref();
    let content = read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    OscalDocument::from_json_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_CATALOG: &str = r#"{
        "catalog": {
            "uuid": "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724",
            "metadata": {
                "title": "Minimal",
                "last-modified": "2024-01-01T00:00:00Z",
                "version": "1.0",
                "oscal-version": "1.1.2"
            }
        }
    }"#;

    #[test]
    fn envelope_key_selects_variant() {
        let doc = OscalDocument::from_json_str(MINIMAL_CATALOG).unwrap();
        assert_eq!(doc.kind_name(), "catalog");
        assert_eq!(doc.uuid(), "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724");
    }

    #[test]
    fn omitted_and_empty_arrays_stay_distinct() {
        let with_empty = r#"{"catalog": {"uuid": "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724", "groups": []}}"#;
        let doc = OscalDocument::from_json_str(with_empty).unwrap();
        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["catalog"]["groups"], serde_json::json!([]));
        assert!(out["catalog"].get("controls").is_none());
    }

    #[test]
    fn load_document_from_file_works() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("catalog.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(MINIMAL_CATALOG.as_bytes()).unwrap();
        f.sync_all().unwrap();

        let loaded = load_document_from_file(&path).unwrap();
        assert!(matches!(loaded, OscalDocument::Catalog(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_document_from_file("/nonexistent/doc.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/doc.json"));
    }
}
