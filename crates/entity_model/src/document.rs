use oscal_model::OscalDocument;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::assessment_plan::AssessmentPlan;
use crate::assessment_results::AssessmentResults;
use crate::catalog::Catalog;
use crate::component_definition::ComponentDefinition;
use crate::error::{MappingError, Result};
use crate::metadata::Metadata;
use crate::owner::DocumentKind;
use crate::poam::PlanOfActionAndMilestones;
use crate::profile::Profile;
use crate::rows::{EntityRow, RowIndex, RowSet};
use crate::ssp::SystemSecurityPlan;

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Catalog(Catalog),
    Profile(Profile),
    ComponentDefinition(ComponentDefinition),
    SystemSecurityPlan(SystemSecurityPlan),
    AssessmentPlan(AssessmentPlan),
    AssessmentResults(AssessmentResults),
    PlanOfActionAndMilestones(PlanOfActionAndMilestones),
}

macro_rules! each_kind {
    ($doc:expr, $d:ident => $body:expr) => {
        match $doc {
            Document::Catalog($d) => $body,
            Document::Profile($d) => $body,
            Document::ComponentDefinition($d) => $body,
            Document::SystemSecurityPlan($d) => $body,
            Document::AssessmentPlan($d) => $body,
            Document::AssessmentResults($d) => $body,
            Document::PlanOfActionAndMilestones($d) => $body,
        }
    };
}

impl Document {
    pub fn decode(ext: &OscalDocument) -> Result<Self> {
        Ok(match ext {
            OscalDocument::Catalog(d) => Document::Catalog(Catalog::decode(d)?),
            OscalDocument::Profile(d) => Document::Profile(Profile::decode(d)?),
            OscalDocument::ComponentDefinition(d) => {
                Document::ComponentDefinition(ComponentDefinition::decode(d)?)
            }
            OscalDocument::SystemSecurityPlan(d) => Document::SystemSecurityPlan(SystemSecurityPlan::decode(d)?),
            OscalDocument::AssessmentPlan(d) => Document::AssessmentPlan(AssessmentPlan::decode(d)?),
            OscalDocument::AssessmentResults(d) => Document::AssessmentResults(AssessmentResults::decode(d)?),
            OscalDocument::PlanOfActionAndMilestones(d) => {
                Document::PlanOfActionAndMilestones(PlanOfActionAndMilestones::decode(d)?)
            }
        })
    }

    pub fn encode(&self) -> OscalDocument {
        match self {
            Document::Catalog(d) => OscalDocument::Catalog(d.encode()),
            Document::Profile(d) => OscalDocument::Profile(d.encode()),
            Document::ComponentDefinition(d) => OscalDocument::ComponentDefinition(d.encode()),
            Document::SystemSecurityPlan(d) => OscalDocument::SystemSecurityPlan(d.encode()),
            Document::AssessmentPlan(d) => OscalDocument::AssessmentPlan(d.encode()),
            Document::AssessmentResults(d) => OscalDocument::AssessmentResults(d.encode()),
            Document::PlanOfActionAndMilestones(d) => OscalDocument::PlanOfActionAndMilestones(d.encode()),
        }
    }

    /// Parses the envelope and decodes it in one step.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ext = OscalDocument::from_json_str(s)?;
        Self::decode(&ext)
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Catalog(_) => Catalog::KIND,
            Document::Profile(_) => Profile::KIND,
            Document::ComponentDefinition(_) => ComponentDefinition::KIND,
            Document::SystemSecurityPlan(_) => SystemSecurityPlan::KIND,
            Document::AssessmentPlan(_) => AssessmentPlan::KIND,
            Document::AssessmentResults(_) => AssessmentResults::KIND,
            Document::PlanOfActionAndMilestones(_) => PlanOfActionAndMilestones::KIND,
        }
    }

    pub fn id(&self) -> Uuid {
        each_kind!(self, d => d.id())
    }

    pub fn metadata(&self) -> &Metadata {
        each_kind!(self, d => d.metadata())
    }

    pub fn title(&self) -> &str {
        &self.metadata().title
    }

    pub fn to_rows(&self) -> Result<RowSet> {
        each_kind!(self, d => d.to_rows())
    }

    /// Reassembles the document rooted at `root_id` from its rows.
    pub fn from_rows(root_id: Uuid, rows: &[EntityRow]) -> Result<Self> {
        let root = rows
            .iter()
            .find(|r| r.id == root_id && r.kind.document_kind().is_some())
            .ok_or(MappingError::NotFound { kind: "document", id: root_id })?;
        let index = RowIndex::new(rows);
        let kind = root.kind.document_kind().ok_or(MappingError::NotFound { kind: "document", id: root_id })?;
        Ok(match kind {
            DocumentKind::Catalog => Document::Catalog(Catalog::from_rows(root, index)?),
            DocumentKind::Profile => Document::Profile(Profile::from_rows(root, index)?),
            DocumentKind::ComponentDefinition => {
                Document::ComponentDefinition(ComponentDefinition::from_rows(root, index)?)
            }
            DocumentKind::SystemSecurityPlan => {
                Document::SystemSecurityPlan(SystemSecurityPlan::from_rows(root, index)?)
            }
            DocumentKind::AssessmentPlan => Document::AssessmentPlan(AssessmentPlan::from_rows(root, index)?),
            DocumentKind::AssessmentResults => {
                Document::AssessmentResults(AssessmentResults::from_rows(root, index)?)
            }
            DocumentKind::PlanOfActionAndMilestones => {
                Document::PlanOfActionAndMilestones(PlanOfActionAndMilestones::from_rows(root, index)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldPath;

    const PROFILE: &str = r#"{
        "profile": {
            "uuid": "d0000000-0000-4000-8000-000000000001",
            "metadata": {
                "title": "Baseline",
                "last-modified": "2024-01-01T00:00:00Z",
                "version": "1",
                "oscal-version": "1.1.2"
            },
            "imports": [{"href": "catalog.json", "include-all": {}}]
        }
    }"#;

    #[test]
    fn envelope_dispatches_on_kind() {
        let doc = Document::from_json_str(PROFILE).unwrap();
        assert_eq!(doc.kind(), DocumentKind::Profile);
        assert_eq!(doc.title(), "Baseline");
        assert_eq!(doc.id().to_string(), "d0000000-0000-4000-8000-000000000001");
    }

    #[test]
    fn from_rows_finds_the_root() {
        let doc = Document::from_json_str(PROFILE).unwrap();
        let rows = doc.to_rows().unwrap();
        let back = Document::from_rows(doc.id(), &rows.rows).unwrap();
        assert_eq!(back.encode(), doc.encode());
    }

    #[test]
    fn from_rows_without_root_is_not_found() {
        let err = Document::from_rows(Uuid::nil(), &[]).unwrap_err();
        assert!(matches!(err, MappingError::NotFound { kind: "document", .. }));
    }

    #[test]
    fn malformed_json_is_a_syntax_error() {
        let err = Document::from_json_str("{\"catalog\": ").unwrap_err();
        assert!(matches!(err, MappingError::Syntax(_)));
    }

    #[test]
    fn missing_nested_member_names_its_path() {
        let mut value: serde_json::Value = serde_json::from_str(PROFILE).unwrap();
        value["profile"]["metadata"].as_object_mut().unwrap().remove("title");
        let err = Document::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, MappingError::MissingField { .. }));
        assert_eq!(err.path().map(FieldPath::as_str), Some("profile.metadata.title"));
    }
}
