use oscal_model::common as ext_common;
use oscal_model::poam as ext;
use oscal_model::ssp::SystemId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::arena::Table;
use crate::assessment::{
    parse_related_observations, parse_related_risks, render_related_observations, render_related_risks, Origin,
    Records,
};
use crate::back_matter::BackMatter;
use crate::column::{decode_list, encode_list, map_opt, try_map_opt, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_opt_uuid, parse_uuid, render_opt_uuid, render_uuid, structural_uuid};
use crate::implementation::Inventory;
use crate::metadata::Metadata;
use crate::owner::{ComponentOwner, DocumentKind, InventoryItemOwner, Owner, RecordOwner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{Links, Props};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoamLocalDefinitions {
    pub id: Uuid,
    pub components: Option<Vec<Uuid>>,
    pub inventory_items: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl PoamLocalDefinitions {
    fn decode(
        ext: &ext::PoamLocalDefinitions,
        root_id: Uuid,
        inventory: &mut Inventory,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = structural_uuid(root_id, path);
        Ok(Self {
            id,
            components: inventory.decode_components(
                &ext.components,
                Owner::new(id, ComponentOwner::PoamLocalDefinitions),
                &path.field("components"),
            )?,
            inventory_items: inventory.decode_items(
                &ext.inventory_items,
                Owner::new(id, InventoryItemOwner::PoamLocalDefinitions),
                &path.field("inventory-items"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self, inventory: &Inventory) -> ext::PoamLocalDefinitions {
        ext::PoamLocalDefinitions {
            components: inventory.encode_components(&self.components),
            inventory_items: inventory.encode_items(&self.inventory_items),
            remarks: self.remarks.clone(),
        }
    }
}

/// One POA&M entry. `item_uuid` is the optional native identifier; rows
/// always carry `id`, which falls back to a structural identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoamItem {
    pub id: Uuid,
    pub root_id: Uuid,
    pub item_uuid: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub origins: Option<Vec<Origin>>,
    pub related_findings: Option<Vec<Uuid>>,
    pub related_observations: Option<Vec<Uuid>>,
    pub related_risks: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl Entity for PoamItem {
    const KIND: EntityKind = EntityKind::PoamItem;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.root_id)
    }
}

impl PoamItem {
    fn decode(ext: &ext::PoamItem, root_id: Uuid, path: &FieldPath) -> Result<Self> {
        let item_uuid = parse_opt_uuid(&ext.uuid, &path.field("uuid"))?;
        let related_findings = try_map_opt(&ext.related_findings, |i, r| {
            parse_uuid(&r.finding_uuid, &path.item("related-findings", i).field("finding-uuid"))
        })?;
        Ok(Self {
            id: item_uuid.unwrap_or_else(|| structural_uuid(root_id, path)),
            root_id,
            item_uuid,
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            origins: decode_list(&ext.origins, &path.field("origins"))?,
            related_findings,
            related_observations: parse_related_observations(
                &ext.related_observations,
                &path.field("related-observations"),
            )?,
            related_risks: parse_related_risks(&ext.related_risks, &path.field("related-risks"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::PoamItem {
        ext::PoamItem {
            uuid: render_opt_uuid(&self.item_uuid),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            origins: encode_list(&self.origins),
            related_findings: map_opt(&self.related_findings, |id| ext::RelatedFinding {
                finding_uuid: render_uuid(id),
            }),
            related_observations: render_related_observations(&self.related_observations),
            related_risks: render_related_risks(&self.related_risks),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoamRoot {
    pub id: Uuid,
    pub import_ssp: Option<ext_common::ImportRef>,
    pub system_id: Option<SystemId>,
    pub local_definitions: Option<PoamLocalDefinitions>,
    pub observations: Option<Vec<Uuid>>,
    pub risks: Option<Vec<Uuid>>,
    pub findings: Option<Vec<Uuid>>,
    pub poam_items: Option<Vec<Uuid>>,
}

impl Entity for PoamRoot {
    const KIND: EntityKind = EntityKind::PlanOfActionAndMilestones;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanOfActionAndMilestones {
    pub root: PoamRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
    pub inventory: Inventory,
    pub records: Records,
    pub items: Table<PoamItem>,
}

impl PlanOfActionAndMilestones {
    /// POA&M items that track `risk_id`.
    pub fn items_for_risk(&self, risk_id: Uuid) -> Vec<&PoamItem> {
        self.items
            .iter()
            .filter(|item| item.related_risks.iter().flatten().any(|r| *r == risk_id))
            .collect()
    }
}

impl Aggregate for PlanOfActionAndMilestones {
    const KIND: DocumentKind = DocumentKind::PlanOfActionAndMilestones;
    type External = ext::PlanOfActionAndMilestones;

    fn decode(ext: &ext::PlanOfActionAndMilestones) -> Result<Self> {
        let path = FieldPath::root("plan-of-action-and-milestones");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::PlanOfActionAndMilestones);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;

        let mut inventory = Inventory::default();
        let local_definitions = match &ext.local_definitions {
            Some(local) => Some(PoamLocalDefinitions::decode(
                local,
                id,
                &mut inventory,
                &path.field("local-definitions"),
            )?),
            None => None,
        };

        let record_owner = Owner::new(id, RecordOwner::PlanOfActionAndMilestones);
        let mut records = Records::default();
        let observations = records.decode_observations(&ext.observations, record_owner, &path.field("observations"))?;
        let risks = records.decode_risks(&ext.risks, record_owner, &path.field("risks"))?;
        let findings = records.decode_findings(&ext.findings, record_owner, &path.field("findings"))?;

        let mut items = Table::new();
        let poam_items = try_map_opt(&ext.poam_items, |i, item| {
            let item_path = path.item("poam-items", i);
            items.insert(PoamItem::decode(item, id, &item_path)?, &item_path)
        })?;

        tracing::debug!(
            poam = %id,
            items = items.len(),
            risks = records.risks.len(),
            "decoded plan of action and milestones"
        );

        Ok(Self {
            root: PoamRoot {
                id,
                import_ssp: ext.import_ssp.clone(),
                system_id: ext.system_id.clone(),
                local_definitions,
                observations,
                risks,
                findings,
                poam_items,
            },
            metadata,
            back_matter,
            inventory,
            records,
            items,
        })
    }

    fn encode(&self) -> ext::PlanOfActionAndMilestones {
        let root = &self.root;
        ext::PlanOfActionAndMilestones {
            uuid: render_uuid(&root.id),
            metadata: Some(self.metadata.encode()),
            import_ssp: root.import_ssp.clone(),
            system_id: root.system_id.clone(),
            local_definitions: root.local_definitions.as_ref().map(|l| l.encode(&self.inventory)),
            observations: self.records.encode_observations(&root.observations),
            risks: self.records.encode_risks(&root.risks),
            findings: self.records.encode_findings(&root.findings),
            poam_items: self.items.encode_children(&root.poam_items, PoamItem::encode),
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
        self.inventory.push_rows(&mut rows)?;
        self.records.push_rows(&mut rows)?;
        rows.push_table(&self.items)?;
        Ok(rows)
    }

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self> {
        let root: PoamRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::PlanOfActionAndMilestones)?;
        Ok(Self {
            metadata,
            back_matter,
            inventory: Inventory::from_index(index)?,
            records: Records::from_index(index)?,
            items: index.table()?,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn poam_json() -> serde_json::Value {
        json!({
            "uuid": "c0000000-0000-4000-8000-000000000001",
            "metadata": {
                "title": "POA&M",
                "last-modified": "2024-06-01T00:00:00Z",
                "version": "1",
                "oscal-version": "1.1.2"
            },
            "system-id": {"identifier-type": "https://ietf.org/rfc/rfc4122", "id": "sys-1"},
            "risks": [{
                "uuid": "c0000000-0000-4000-8000-0000000000b1",
                "title": "Stale accounts",
                "description": "accounts not disabled",
                "statement": "risk of misuse",
                "status": "open",
                "deadline": "2024-09-30T00:00:00Z"
            }],
            "poam-items": [
                {
                    "uuid": "c0000000-0000-4000-8000-0000000000a1",
                    "title": "Disable accounts",
                    "description": "review quarterly",
                    "related-risks": [{"risk-uuid": "c0000000-0000-4000-8000-0000000000b1"}]
                },
                {"title": "Untracked", "description": "no native id"}
            ]
        })
    }

    #[test]
    fn poam_round_trip_keeps_absent_item_uuid() {
        let ext: ext::PlanOfActionAndMilestones = serde_json::from_value(poam_json()).unwrap();
        let poam = PlanOfActionAndMilestones::decode(&ext).unwrap();
        let encoded = poam.encode();
        assert_eq!(encoded, ext);
        assert!(encoded.poam_items.unwrap()[1].uuid.is_none());
    }

    #[test]
    fn item_without_uuid_gets_stable_identity() {
        let ext: ext::PlanOfActionAndMilestones = serde_json::from_value(poam_json()).unwrap();
        let first = PlanOfActionAndMilestones::decode(&ext).unwrap();
        let second = PlanOfActionAndMilestones::decode(&ext).unwrap();
        let ids = |p: &PlanOfActionAndMilestones| p.items.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn risks_are_owned_by_the_poam() {
        let ext: ext::PlanOfActionAndMilestones = serde_json::from_value(poam_json()).unwrap();
        let poam = PlanOfActionAndMilestones::decode(&ext).unwrap();
        let risk_id = Uuid::parse_str("c0000000-0000-4000-8000-0000000000b1").unwrap();
        let risk = poam.records.risks.get(risk_id).unwrap();
        assert!(risk.owner.is(poam.root.id, "plan-of-action-and-milestones"));
        assert_eq!(poam.items_for_risk(risk_id).len(), 1);
        assert_eq!(poam.records.open_risks().count(), 1);
    }

    #[test]
    fn rows_reassemble() {
        let ext: ext::PlanOfActionAndMilestones = serde_json::from_value(poam_json()).unwrap();
        let poam = PlanOfActionAndMilestones::decode(&ext).unwrap();
        let rows = poam.to_rows().unwrap();
        let root = rows.root().unwrap().clone();
        let back = PlanOfActionAndMilestones::from_rows(&root, RowIndex::new(&rows.rows)).unwrap();
        assert_eq!(back.encode(), ext);
    }

    #[test]
    fn bad_related_finding_names_its_path() {
        let mut value = poam_json();
        value["poam-items"][0]["related-findings"] = json!([{"finding-uuid": "nope"}]);
        let ext: ext::PlanOfActionAndMilestones = serde_json::from_value(value).unwrap();
        let err = PlanOfActionAndMilestones::decode(&ext).unwrap_err();
        assert_eq!(
            err.path().map(FieldPath::as_str),
            Some("plan-of-action-and-milestones.poam-items[0].related-findings[0].finding-uuid")
        );
    }
}
