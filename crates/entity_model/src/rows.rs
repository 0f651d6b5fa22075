//! Flattening of decoded documents into rows and back.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arena::Table;
use crate::column::JsonColumn;
use crate::error::{FieldPath, MappingError, Result};
use crate::owner::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Catalog,
    Profile,
    ComponentDefinition,
    SystemSecurityPlan,
    AssessmentPlan,
    AssessmentResults,
    PlanOfActionAndMilestones,
    Metadata,
    BackMatter,
    Group,
    Control,
    Part,
    Task,
    SystemComponent,
    InventoryItem,
    Diagram,
    #[serde(rename = "result")]
    AssessmentResult,
    Observation,
    Risk,
    Finding,
    PoamItem,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Catalog,
        EntityKind::Profile,
        EntityKind::ComponentDefinition,
        EntityKind::SystemSecurityPlan,
        EntityKind::AssessmentPlan,
        EntityKind::AssessmentResults,
        EntityKind::PlanOfActionAndMilestones,
        EntityKind::Metadata,
        EntityKind::BackMatter,
        EntityKind::Group,
        EntityKind::Control,
        EntityKind::Part,
        EntityKind::Task,
        EntityKind::SystemComponent,
        EntityKind::InventoryItem,
        EntityKind::Diagram,
        EntityKind::AssessmentResult,
        EntityKind::Observation,
        EntityKind::Risk,
        EntityKind::Finding,
        EntityKind::PoamItem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Catalog => "catalog",
            EntityKind::Profile => "profile",
            EntityKind::ComponentDefinition => "component-definition",
            EntityKind::SystemSecurityPlan => "system-security-plan",
            EntityKind::AssessmentPlan => "assessment-plan",
            EntityKind::AssessmentResults => "assessment-results",
            EntityKind::PlanOfActionAndMilestones => "plan-of-action-and-milestones",
            EntityKind::Metadata => "metadata",
            EntityKind::BackMatter => "back-matter",
            EntityKind::Group => "group",
            EntityKind::Control => "control",
            EntityKind::Part => "part",
            EntityKind::Task => "task",
            EntityKind::SystemComponent => "system-component",
            EntityKind::InventoryItem => "inventory-item",
            EntityKind::Diagram => "diagram",
            EntityKind::AssessmentResult => "result",
            EntityKind::Observation => "observation",
            EntityKind::Risk => "risk",
            EntityKind::Finding => "finding",
            EntityKind::PoamItem => "poam-item",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    pub fn document_kind(self) -> Option<DocumentKind> {
        match self {
            EntityKind::Catalog => Some(DocumentKind::Catalog),
            EntityKind::Profile => Some(DocumentKind::Profile),
            EntityKind::ComponentDefinition => Some(DocumentKind::ComponentDefinition),
            EntityKind::SystemSecurityPlan => Some(DocumentKind::SystemSecurityPlan),
            EntityKind::AssessmentPlan => Some(DocumentKind::AssessmentPlan),
            EntityKind::AssessmentResults => Some(DocumentKind::AssessmentResults),
            EntityKind::PlanOfActionAndMilestones => Some(DocumentKind::PlanOfActionAndMilestones),
            _ => None,
        }
    }
}

impl From<DocumentKind> for EntityKind {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Catalog => EntityKind::Catalog,
            DocumentKind::Profile => EntityKind::Profile,
            DocumentKind::ComponentDefinition => EntityKind::ComponentDefinition,
            DocumentKind::SystemSecurityPlan => EntityKind::SystemSecurityPlan,
            DocumentKind::AssessmentPlan => EntityKind::AssessmentPlan,
            DocumentKind::AssessmentResults => EntityKind::AssessmentResults,
            DocumentKind::PlanOfActionAndMilestones => EntityKind::PlanOfActionAndMilestones,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Entity: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    /// Immediate parent for tree nodes and directly owned children.
    fn parent_id(&self) -> Option<Uuid> {
        None
    }

    /// Polymorphic owner as `(owner_id, owner_kind tag)`.
    fn owner(&self) -> Option<(Uuid, &'static str)> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub kind: EntityKind,
    pub id: Uuid,
    pub root_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub owner_kind: Option<String>,
    pub position: i64,
    pub body: JsonColumn<serde_json::Value>,
}

impl EntityRow {
    pub fn from_entity<T: Entity>(root_id: Uuid, position: i64, entity: &T) -> Result<Self> {
        let id = entity.id();
        let body = serde_json::to_value(entity).map_err(|source| MappingError::RowCodec {
            kind: T::KIND.as_str(),
            id,
            source,
        })?;
        let (owner_id, owner_kind) = match entity.owner() {
            Some((owner_id, tag)) => (Some(owner_id), Some(tag.to_string())),
            None => (None, None),
        };
        Ok(Self {
            kind: T::KIND,
            id,
            root_id,
            parent_id: entity.parent_id(),
            owner_id,
            owner_kind,
            position,
            body: JsonColumn(body),
        })
    }

    pub fn decode<T: Entity>(&self) -> Result<T> {
        self.body.decode_as(self.kind.as_str(), self.id)
    }

    pub fn is_owned_by(&self, owner_id: Uuid, owner_kind: &str) -> bool {
        self.owner_id == Some(owner_id) && self.owner_kind.as_deref() == Some(owner_kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkRelation {
    /// inventory item → implemented component
    ImplementedComponent,
}

impl LinkRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkRelation::ImplementedComponent => "implemented-component",
        }
    }

    pub fn parse(s: &str) -> Option<LinkRelation> {
        match s {
            "implemented-component" => Some(LinkRelation::ImplementedComponent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLink {
    pub root_id: Uuid,
    pub relation: LinkRelation,
    pub left_id: Uuid,
    pub right_id: Uuid,
    pub position: i64,
}

/// Rows of one document, root first.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub root_id: Uuid,
    pub rows: Vec<EntityRow>,
    pub links: Vec<EntityLink>,
}

impl RowSet {
    pub fn new(root_id: Uuid) -> Self {
        Self { root_id, rows: Vec::new(), links: Vec::new() }
    }

    pub fn push<T: Entity>(&mut self, entity: &T) -> Result<()> {
        let row = EntityRow::from_entity(self.root_id, self.rows.len() as i64, entity)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn push_opt<T: Entity>(&mut self, entity: &Option<T>) -> Result<()> {
        match entity {
            Some(e) => self.push(e),
            None => Ok(()),
        }
    }

    pub fn push_table<T: Entity>(&mut self, table: &Table<T>) -> Result<()> {
        for entity in table.iter() {
            self.push(entity)?;
        }
        Ok(())
    }

    pub fn link(&mut self, relation: LinkRelation, left_id: Uuid, right_id: Uuid) {
        let position = self.links.len() as i64;
        self.links.push(EntityLink { root_id: self.root_id, relation, left_id, right_id, position });
    }

    pub fn root(&self) -> Option<&EntityRow> {
        self.rows.first()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RowIndex<'a> {
    rows: &'a [EntityRow],
}

impl<'a> RowIndex<'a> {
    pub fn new(rows: &'a [EntityRow]) -> Self {
        Self { rows }
    }

    fn of_kind(&self, kind: EntityKind) -> Vec<&'a EntityRow> {
        let mut rows: Vec<&EntityRow> = self.rows.iter().filter(|r| r.kind == kind).collect();
        rows.sort_by_key(|r| r.position);
        rows
    }

    /// All rows of `T`'s kind as an arena, in stored order.
    pub fn table<T: Entity>(&self) -> Result<Table<T>> {
        let mut table = Table::new();
        let path = FieldPath::root(T::KIND.as_str());
        for row in self.of_kind(T::KIND) {
            table.insert(row.decode::<T>()?, &path)?;
        }
        Ok(table)
    }

    /// Children owned by `(owner_id, owner_kind)`; both must match.
    pub fn owned<T: Entity>(&self, owner_id: Uuid, owner_kind: &str) -> Result<Vec<T>> {
        self.of_kind(T::KIND)
            .into_iter()
            .filter(|r| r.is_owned_by(owner_id, owner_kind))
            .map(|r| r.decode::<T>())
            .collect()
    }

    pub fn owned_one<T: Entity>(&self, owner_id: Uuid, owner_kind: &str) -> Result<Option<T>> {
        Ok(self.owned::<T>(owner_id, owner_kind)?.into_iter().next())
    }

    /// Like [`owned_one`](Self::owned_one) but the block is mandatory.
    pub fn require_owned<T: Entity>(&self, owner_id: Uuid, owner_kind: &str) -> Result<T> {
        self.owned_one::<T>(owner_id, owner_kind)?.ok_or(MappingError::NotFound {
            kind: T::KIND.as_str(),
            id: owner_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(*kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()), "{kind:?}");
        }
    }
}
