//! Components, inventory items, users and diagrams.

use oscal_model::common as ext;
use oscal_model::ssp as ext_ssp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arena::Table;
use crate::column::{decode_list, encode_list, try_map_opt, try_map_vec, Codec};
use crate::error::{FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid, structural_uuid};
use crate::owner::{ComponentOwner, DiagramOwner, InventoryItemOwner, Owner, OwnerKind, ResponsibleRoleOwner};
use crate::rows::{Entity, EntityKind, LinkRelation, RowSet};
use crate::scalar::{decode_roles, encode_roles, Links, Props, Protocol, ResponsibleParties, ResponsibleRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemComponent {
    pub id: Uuid,
    pub owner: Owner<ComponentOwner>,
    pub component_type: String,
    pub title: String,
    pub description: String,
    pub purpose: Option<String>,
    pub props: Props,
    pub links: Links,
    pub status: ext::Status,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub protocols: Option<Vec<Protocol>>,
    pub remarks: Option<String>,
}

impl SystemComponent {
    pub fn decode(ext: &ext::SystemComponent, owner: Owner<ComponentOwner>, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            owner,
            component_type: ext.component_type.clone(),
            title: ext.title.clone(),
            description: ext.description.clone(),
            purpose: ext.purpose.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            status: ext.status.clone(),
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::SystemComponent,
                &path.field("responsible-roles"),
            )?,
            protocols: decode_list(&ext.protocols, &path.field("protocols"))?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::SystemComponent {
        ext::SystemComponent {
            uuid: render_uuid(&self.id),
            component_type: self.component_type.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            purpose: self.purpose.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            status: self.status.clone(),
            responsible_roles: encode_roles(&self.responsible_roles),
            protocols: encode_list(&self.protocols),
            remarks: self.remarks.clone(),
        }
    }
}

impl Entity for SystemComponent {
    const KIND: EntityKind = EntityKind::SystemComponent;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<(Uuid, &'static str)> {
        Some((self.owner.owner_id, self.owner.owner_kind.tag()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementedComponent {
    pub component_id: Uuid,
    pub props: Props,
    pub links: Links,
    pub responsible_parties: ResponsibleParties,
    pub remarks: Option<String>,
}

impl Codec for ImplementedComponent {
    type External = ext::ImplementedComponent;

    fn decode(ext: &ext::ImplementedComponent, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            component_id: parse_uuid(&ext.component_uuid, &path.field("component-uuid"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ImplementedComponent {
        ext::ImplementedComponent {
            component_uuid: render_uuid(&self.component_id),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_parties: encode_list(&self.responsible_parties),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub owner: Owner<InventoryItemOwner>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub responsible_parties: ResponsibleParties,
    pub implemented_components: Option<Vec<ImplementedComponent>>,
    pub remarks: Option<String>,
}

impl InventoryItem {
    pub fn decode(ext: &ext::InventoryItem, owner: Owner<InventoryItemOwner>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            owner,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            implemented_components: decode_list(
                &ext.implemented_components,
                &path.field("implemented-components"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::InventoryItem {
        ext::InventoryItem {
            uuid: render_uuid(&self.id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_parties: encode_list(&self.responsible_parties),
            implemented_components: encode_list(&self.implemented_components),
            remarks: self.remarks.clone(),
        }
    }

    pub fn component_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.implemented_components.iter().flatten().map(|c| c.component_id)
    }
}

impl Entity for InventoryItem {
    const KIND: EntityKind = EntityKind::InventoryItem;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<(Uuid, &'static str)> {
        Some((self.owner.owner_id, self.owner.owner_kind.tag()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemUser {
    pub id: Uuid,
    pub title: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub role_ids: Option<Vec<String>>,
    pub authorized_privileges: Option<Vec<ext::AuthorizedPrivilege>>,
    pub remarks: Option<String>,
}

impl Codec for SystemUser {
    type External = ext::SystemUser;

    fn decode(ext: &ext::SystemUser, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            short_name: ext.short_name.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            role_ids: ext.role_ids.clone(),
            authorized_privileges: ext.authorized_privileges.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::SystemUser {
        ext::SystemUser {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            short_name: self.short_name.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            role_ids: self.role_ids.clone(),
            authorized_privileges: self.authorized_privileges.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub id: Uuid,
    pub owner: Owner<DiagramOwner>,
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub caption: Option<String>,
    pub remarks: Option<String>,
}

impl Diagram {
    pub fn decode(ext: &ext_ssp::Diagram, owner: Owner<DiagramOwner>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            owner,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            caption: ext.caption.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext_ssp::Diagram {
        ext_ssp::Diagram {
            uuid: render_uuid(&self.id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            caption: self.caption.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

impl Entity for Diagram {
    const KIND: EntityKind = EntityKind::Diagram;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<(Uuid, &'static str)> {
        Some((self.owner.owner_id, self.owner.owner_kind.tag()))
    }
}

/// Authorization-boundary, network-architecture or data-flow block. Its
/// diagrams are rows owned by `(id, kind)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramBlock {
    pub id: Uuid,
    pub kind: DiagramOwner,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub diagrams: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl DiagramBlock {
    pub fn decode(
        ext: &ext_ssp::DiagramBlock,
        kind: DiagramOwner,
        root_id: Uuid,
        diagrams: &mut Table<Diagram>,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = structural_uuid(root_id, path);
        let owner = Owner::new(id, kind);
        let ids = try_map_opt(&ext.diagrams, |i, d| {
            let diagram_path = path.item("diagrams", i);
            diagrams.insert(Diagram::decode(d, owner, &diagram_path)?, &diagram_path)
        })?;
        Ok(Self {
            id,
            kind,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            diagrams: ids,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self, diagrams: &Table<Diagram>) -> ext_ssp::DiagramBlock {
        ext_ssp::DiagramBlock {
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            diagrams: diagrams.encode_children(&self.diagrams, Diagram::encode),
            remarks: self.remarks.clone(),
        }
    }
}

/// Components and inventory items of one document, plus the block owning
/// each list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub components: Table<SystemComponent>,
    pub items: Table<InventoryItem>,
}

impl Inventory {
    pub fn decode_components(
        &mut self,
        src: &Option<Vec<ext::SystemComponent>>,
        owner: Owner<ComponentOwner>,
        path: &FieldPath,
    ) -> Result<Option<Vec<Uuid>>> {
        try_map_opt(src, |i, c| self.add_component(c, owner, &path.index(i)))
    }

    pub fn decode_component_vec(
        &mut self,
        src: &[ext::SystemComponent],
        owner: Owner<ComponentOwner>,
        path: &FieldPath,
    ) -> Result<Vec<Uuid>> {
        try_map_vec(src, |i, c| self.add_component(c, owner, &path.index(i)))
    }

    fn add_component(
        &mut self,
        ext: &ext::SystemComponent,
        owner: Owner<ComponentOwner>,
        path: &FieldPath,
    ) -> Result<Uuid> {
        self.components.insert(SystemComponent::decode(ext, owner, path)?, path)
    }

    pub fn decode_items(
        &mut self,
        src: &Option<Vec<ext::InventoryItem>>,
        owner: Owner<InventoryItemOwner>,
        path: &FieldPath,
    ) -> Result<Option<Vec<Uuid>>> {
        try_map_opt(src, |i, item| {
            let item_path = path.index(i);
            self.items.insert(InventoryItem::decode(item, owner, &item_path)?, &item_path)
        })
    }

    pub fn encode_components(&self, ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::SystemComponent>> {
        self.components.encode_children(ids, SystemComponent::encode)
    }

    pub fn encode_component_vec(&self, ids: &[Uuid]) -> Vec<ext::SystemComponent> {
        ids.iter()
            .filter_map(|id| self.components.get(*id))
            .map(SystemComponent::encode)
            .collect()
    }

    pub fn encode_items(&self, ids: &Option<Vec<Uuid>>) -> Option<Vec<ext::InventoryItem>> {
        self.items.encode_children(ids, InventoryItem::encode)
    }

    /// Writes component and item rows plus one join row per
    /// inventory item → implemented component pair.
    pub fn push_rows(&self, rows: &mut RowSet) -> Result<()> {
        rows.push_table(&self.components)?;
        rows.push_table(&self.items)?;
        for item in self.items.iter() {
            for component_id in item.component_ids() {
                rows.link(LinkRelation::ImplementedComponent, item.id, component_id);
            }
        }
        Ok(())
    }

    pub fn from_index(index: crate::rows::RowIndex<'_>) -> Result<Self> {
        Ok(Self { components: index.table()?, items: index.table()? })
    }

    /// Inventory items implementing `component_id`.
    pub fn items_implementing(&self, component_id: Uuid) -> Vec<&InventoryItem> {
        self.items.iter().filter(|item| item.component_ids().any(|c| c == component_id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inventory_links_follow_implemented_components() {
        let root = Uuid::new_v4();
        let block = Uuid::new_v4();
        let components: Vec<ext::SystemComponent> = serde_json::from_value(json!([{
            "uuid": "11111111-1111-4111-8111-111111111111",
            "type": "software", "title": "sshd", "description": "daemon",
            "status": {"state": "operational"},
            "responsible-roles": [{"role-id": "admin"}]
        }]))
        .unwrap();
        let items: Vec<ext::InventoryItem> = serde_json::from_value(json!([{
            "uuid": "22222222-2222-4222-8222-222222222222",
            "description": "host",
            "implemented-components": [{"component-uuid": "11111111-1111-4111-8111-111111111111"}]
        }]))
        .unwrap();

        let mut inventory = Inventory::default();
        let path = FieldPath::root("x");
        let component_ids = inventory
            .decode_component_vec(&components, Owner::new(block, ComponentOwner::SystemImplementation), &path)
            .unwrap();
        inventory
            .decode_items(&Some(items), Owner::new(block, InventoryItemOwner::SystemImplementation), &path)
            .unwrap();

        let role = &inventory.components.get(component_ids[0]).unwrap().responsible_roles.as_ref().unwrap()[0];
        assert!(role.owner.is(component_ids[0], "system-component"));
        assert_eq!(inventory.items_implementing(component_ids[0]).len(), 1);

        let mut rows = RowSet::new(root);
        inventory.push_rows(&mut rows).unwrap();
        assert_eq!(rows.links.len(), 1);
        assert_eq!(rows.links[0].right_id, component_ids[0]);
    }
}
