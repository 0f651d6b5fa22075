//! Each result is its own row and owns its observations, risks and findings.

use oscal_model::assessment_results as ext;
use oscal_model::common as ext_common;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::arena::Table;
use crate::assessment::{Activity, AssessmentPart, Finding, Records, ReviewedControls};
use crate::back_matter::BackMatter;
use crate::column::{decode_list, decode_opt, decode_vec, encode_list, encode_opt, encode_vec, try_map_opt, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid, structural_uuid};
use crate::implementation::{Inventory, SystemUser};
use crate::metadata::Metadata;
use crate::owner::{ComponentOwner, DocumentKind, InventoryItemOwner, Owner, RecordOwner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{DateTimeLiteral, Links, Props, ResponsibleParties};

/// Document-level local definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsLocalDefinitions {
    pub activities: Option<Vec<Activity>>,
    pub remarks: Option<String>,
}

impl Codec for ResultsLocalDefinitions {
    type External = ext::ResultsLocalDefinitions;

    fn decode(ext: &ext::ResultsLocalDefinitions, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            activities: decode_list(&ext.activities, &path.field("activities"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ResultsLocalDefinitions {
        ext::ResultsLocalDefinitions { activities: encode_list(&self.activities), remarks: self.remarks.clone() }
    }
}

/// Local definitions of one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultLocalDefinitions {
    pub id: Uuid,
    pub components: Option<Vec<Uuid>>,
    pub inventory_items: Option<Vec<Uuid>>,
    pub users: Option<Vec<SystemUser>>,
    pub remarks: Option<String>,
}

impl ResultLocalDefinitions {
    fn decode(
        ext: &ext::ResultLocalDefinitions,
        root_id: Uuid,
        inventory: &mut Inventory,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = structural_uuid(root_id, path);
        Ok(Self {
            id,
            components: inventory.decode_components(
                &ext.components,
                Owner::new(id, ComponentOwner::ResultLocalDefinitions),
                &path.field("components"),
            )?,
            inventory_items: inventory.decode_items(
                &ext.inventory_items,
                Owner::new(id, InventoryItemOwner::ResultLocalDefinitions),
                &path.field("inventory-items"),
            )?,
            users: decode_list(&ext.users, &path.field("users"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self, inventory: &Inventory) -> ext::ResultLocalDefinitions {
        ext::ResultLocalDefinitions {
            components: inventory.encode_components(&self.components),
            inventory_items: inventory.encode_items(&self.inventory_items),
            users: encode_list(&self.users),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub responsible_parties: ResponsibleParties,
    pub parts: Vec<AssessmentPart>,
}

impl Codec for Attestation {
    type External = ext::Attestation;

    fn decode(ext: &ext::Attestation, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            parts: decode_vec(&ext.parts, &path.field("parts"))?,
        })
    }

    fn encode(&self) -> ext::Attestation {
        ext::Attestation { responsible_parties: encode_list(&self.responsible_parties), parts: encode_vec(&self.parts) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedBy {
    pub party_id: Uuid,
    pub role_id: Option<String>,
}

impl Codec for LoggedBy {
    type External = ext::LoggedBy;

    fn decode(ext: &ext::LoggedBy, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            party_id: parse_uuid(&ext.party_uuid, &path.field("party-uuid"))?,
            role_id: ext.role_id.clone(),
        })
    }

    fn encode(&self) -> ext::LoggedBy {
        ext::LoggedBy { party_uuid: render_uuid(&self.party_id), role_id: self.role_id.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentLogEntry {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: DateTimeLiteral,
    pub end: Option<DateTimeLiteral>,
    pub props: Props,
    pub links: Links,
    pub logged_by: Option<Vec<LoggedBy>>,
    pub remarks: Option<String>,
}

impl Codec for AssessmentLogEntry {
    type External = ext::AssessmentLogEntry;

    fn decode(ext: &ext::AssessmentLogEntry, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            description: ext.description.clone(),
            start: DateTimeLiteral::decode(&ext.start, &path.field("start"))?,
            end: decode_opt(&ext.end, &path.field("end"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            logged_by: decode_list(&ext.logged_by, &path.field("logged-by"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::AssessmentLogEntry {
        ext::AssessmentLogEntry {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            start: self.start.encode(),
            end: encode_opt(&self.end),
            props: self.props.encode(),
            links: self.links.encode(),
            logged_by: encode_list(&self.logged_by),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentLog {
    pub entries: Vec<AssessmentLogEntry>,
}

impl Codec for AssessmentLog {
    type External = ext::AssessmentLog;

    fn decode(ext: &ext::AssessmentLog, path: &FieldPath) -> Result<Self> {
        Ok(Self { entries: decode_vec(&ext.entries, &path.field("entries"))? })
    }

    fn encode(&self) -> ext::AssessmentLog {
        ext::AssessmentLog { entries: encode_vec(&self.entries) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub id: Uuid,
    pub root_id: Uuid,
    pub title: String,
    pub description: String,
    pub start: DateTimeLiteral,
    pub end: Option<DateTimeLiteral>,
    pub props: Props,
    pub links: Links,
    pub local_definitions: Option<ResultLocalDefinitions>,
    pub reviewed_controls: ReviewedControls,
    pub attestations: Option<Vec<Attestation>>,
    pub assessment_log: Option<AssessmentLog>,
    pub observations: Option<Vec<Uuid>>,
    pub risks: Option<Vec<Uuid>>,
    pub findings: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl Entity for AssessmentResult {
    const KIND: EntityKind = EntityKind::AssessmentResult;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.root_id)
    }
}

impl AssessmentResult {
    fn decode(
        ext: &ext::AssessmentResult,
        root_id: Uuid,
        inventory: &mut Inventory,
        records: &mut Records,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, RecordOwner::AssessmentResult);
        let local_definitions = match &ext.local_definitions {
            Some(local) => Some(ResultLocalDefinitions::decode(
                local,
                root_id,
                inventory,
                &path.field("local-definitions"),
            )?),
            None => None,
        };
        Ok(Self {
            id,
            root_id,
            title: ext.title.clone(),
            description: ext.description.clone(),
            start: DateTimeLiteral::decode(&ext.start, &path.field("start"))?,
            end: decode_opt(&ext.end, &path.field("end"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            local_definitions,
            reviewed_controls: ReviewedControls::decode(&ext.reviewed_controls, &path.field("reviewed-controls"))?,
            attestations: decode_list(&ext.attestations, &path.field("attestations"))?,
            assessment_log: decode_opt(&ext.assessment_log, &path.field("assessment-log"))?,
            observations: records.decode_observations(&ext.observations, owner, &path.field("observations"))?,
            risks: records.decode_risks(&ext.risks, owner, &path.field("risks"))?,
            findings: records.decode_findings(&ext.findings, owner, &path.field("findings"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self, inventory: &Inventory, records: &Records) -> ext::AssessmentResult {
        ext::AssessmentResult {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            start: self.start.encode(),
            end: encode_opt(&self.end),
            props: self.props.encode(),
            links: self.links.encode(),
            local_definitions: self.local_definitions.as_ref().map(|l| l.encode(inventory)),
            reviewed_controls: self.reviewed_controls.encode(),
            attestations: encode_list(&self.attestations),
            assessment_log: encode_opt(&self.assessment_log),
            observations: records.encode_observations(&self.observations),
            risks: records.encode_risks(&self.risks),
            findings: records.encode_findings(&self.findings),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResultsRoot {
    pub id: Uuid,
    pub import_ap: ext_common::ImportRef,
    pub local_definitions: Option<ResultsLocalDefinitions>,
    pub results: Option<Vec<Uuid>>,
}

impl Entity for AssessmentResultsRoot {
    const KIND: EntityKind = EntityKind::AssessmentResults;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentResults {
    pub root: AssessmentResultsRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
    pub results: Table<AssessmentResult>,
    pub inventory: Inventory,
    pub records: Records,
}

impl AssessmentResults {
    /// Findings of one result, in document order.
    pub fn findings_of(&self, result_id: Uuid) -> Vec<&Finding> {
        self.results
            .get(result_id)
            .and_then(|r| self.records.findings.resolve(&r.findings))
            .unwrap_or_default()
    }

    /// Findings whose target objective is not satisfied.
    pub fn unsatisfied_findings(&self) -> impl Iterator<Item = &Finding> {
        self.records.findings.iter().filter(|f| f.target.status.state == "not-satisfied")
    }
}

impl Aggregate for AssessmentResults {
    const KIND: DocumentKind = DocumentKind::AssessmentResults;
    type External = ext::AssessmentResults;

    fn decode(ext: &ext::AssessmentResults) -> Result<Self> {
        let path = FieldPath::root("assessment-results");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::AssessmentResults);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;
        let import_ap = require(&ext.import_ap, &path.field("import-ap"))?.clone();

        let mut results = Table::new();
        let mut inventory = Inventory::default();
        let mut records = Records::default();
        let result_ids = try_map_opt(&ext.results, |i, r| {
            let result_path = path.item("results", i);
            let result = AssessmentResult::decode(r, id, &mut inventory, &mut records, &result_path)?;
            results.insert(result, &result_path)
        })?;

        tracing::debug!(
            assessment_results = %id,
            results = results.len(),
            observations = records.observations.len(),
            findings = records.findings.len(),
            "decoded assessment results"
        );

        Ok(Self {
            root: AssessmentResultsRoot {
                id,
                import_ap,
                local_definitions: decode_opt(&ext.local_definitions, &path.field("local-definitions"))?,
                results: result_ids,
            },
            metadata,
            back_matter,
            results,
            inventory,
            records,
        })
    }

    fn encode(&self) -> ext::AssessmentResults {
        ext::AssessmentResults {
            uuid: render_uuid(&self.root.id),
            metadata: Some(self.metadata.encode()),
            import_ap: Some(self.root.import_ap.clone()),
            local_definitions: encode_opt(&self.root.local_definitions),
            results: self
                .results
                .encode_children(&self.root.results, |r| r.encode(&self.inventory, &self.records)),
            back_matter: self.back_matter.as_ref().map(BackMatter::encode),
        }
    }

    fn id(&self) -> Uuid {
        self.root.id
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn to_rows(&self) -> Result<RowSet> {
        let mut rows = start_rows(&self.root, &self.metadata, &self.back_matter)?;
        rows.push_table(&self.results)?;
        self.inventory.push_rows(&mut rows)?;
        self.records.push_rows(&mut rows)?;
        Ok(rows)
    }

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self> {
        let root: AssessmentResultsRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::AssessmentResults)?;
        Ok(Self {
            metadata,
            back_matter,
            results: index.table()?,
            inventory: Inventory::from_index(index)?,
            records: Records::from_index(index)?,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESULT_A: &str = "b0000000-0000-4000-8000-0000000000a1";
    const RESULT_B: &str = "b0000000-0000-4000-8000-0000000000a2";

    fn results_json() -> serde_json::Value {
        let finding = |uuid: &str, state: &str| {
            json!({
                "uuid": uuid,
                "title": "AC-2 gap",
                "description": "accounts not reviewed",
                "target": {"type": "objective-id", "target-id": "ac-2_obj", "status": {"state": state}},
                "related-observations": [{"observation-uuid": "b0000000-0000-4000-8000-0000000000c1"}]
            })
        };
        json!({
            "uuid": "b0000000-0000-4000-8000-000000000001",
            "metadata": {
                "title": "Results",
                "last-modified": "2024-05-01T00:00:00Z",
                "version": "1",
                "oscal-version": "1.1.2"
            },
            "import-ap": {"href": "ap.json"},
            "results": [
                {
                    "uuid": RESULT_A,
                    "title": "Q1",
                    "description": "first quarter",
                    "start": "2024-01-01T00:00:00Z",
                    "end": "2024-03-31T23:59:59Z",
                    "local-definitions": {
                        "components": [{
                            "uuid": "b0000000-0000-4000-8000-0000000000d1",
                            "type": "software", "title": "scanner", "description": "vuln scanner",
                            "status": {"state": "operational"}
                        }]
                    },
                    "reviewed-controls": {"control-selections": [{"include-controls": [{"control-id": "ac-2"}]}]},
                    "assessment-log": {"entries": [{"uuid": "b0000000-0000-4000-8000-0000000000e1", "start": "2024-01-02T10:00:00Z"}]},
                    "observations": [{
                        "uuid": "b0000000-0000-4000-8000-0000000000c1",
                        "description": "stale accounts",
                        "methods": ["EXAMINE"],
                        "collected": "2024-01-05T00:00:00Z"
                    }],
                    "findings": [finding("b0000000-0000-4000-8000-0000000000f1", "not-satisfied")]
                },
                {
                    "uuid": RESULT_B,
                    "title": "Q2",
                    "description": "second quarter",
                    "start": "2024-04-01T00:00:00Z",
                    "reviewed-controls": {"control-selections": [{"include-all": {}}]},
                    "findings": [finding("b0000000-0000-4000-8000-0000000000f2", "satisfied")],
                    "risks": []
                }
            ]
        })
    }

    #[test]
    fn results_round_trip() {
        let ext: ext::AssessmentResults = serde_json::from_value(results_json()).unwrap();
        let ar = AssessmentResults::decode(&ext).unwrap();
        assert_eq!(ar.results.len(), 2);
        assert_eq!(ar.encode(), ext);
    }

    #[test]
    fn findings_stay_with_their_result() {
        let ext: ext::AssessmentResults = serde_json::from_value(results_json()).unwrap();
        let ar = AssessmentResults::decode(&ext).unwrap();
        let a = Uuid::parse_str(RESULT_A).unwrap();
        let b = Uuid::parse_str(RESULT_B).unwrap();
        assert_eq!(ar.findings_of(a).len(), 1);
        assert!(ar.findings_of(a)[0].owner.is(a, "result"));
        assert!(ar.findings_of(b)[0].owner.is(b, "result"));
        assert_eq!(ar.unsatisfied_findings().count(), 1);
    }

    #[test]
    fn rows_reassemble() {
        let ext: ext::AssessmentResults = serde_json::from_value(results_json()).unwrap();
        let ar = AssessmentResults::decode(&ext).unwrap();
        let rows = ar.to_rows().unwrap();
        let observation_rows = rows.rows.iter().filter(|r| r.kind == EntityKind::Observation).count();
        assert_eq!(observation_rows, 1);
        let root = rows.root().unwrap().clone();
        let back = AssessmentResults::from_rows(&root, RowIndex::new(&rows.rows)).unwrap();
        assert_eq!(back.encode(), ext);
    }

    #[test]
    fn bad_collected_date_names_its_path() {
        let mut value = results_json();
        value["results"][0]["observations"][0]["collected"] = json!("yesterday");
        let ext: ext::AssessmentResults = serde_json::from_value(value).unwrap();
        let err = AssessmentResults::decode(&ext).unwrap_err();
        assert_eq!(
            err.path().map(FieldPath::as_str),
            Some("assessment-results.results[0].observations[0].collected")
        );
    }
}
