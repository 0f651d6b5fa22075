use oscal_model::common as ext_common;
use oscal_model::component_definition as ext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::back_matter::BackMatter;
use crate::column::{decode_list, decode_vec, encode_list, encode_vec, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid};
use crate::metadata::Metadata;
use crate::owner::{DocumentKind, Owner, ResponsibleRoleOwner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{decode_roles, encode_roles, Links, Props, Protocol, ResponsibleRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatement {
    pub statement_id: String,
    pub id: Uuid,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub remarks: Option<String>,
}

impl Codec for ComponentStatement {
    type External = ext::ComponentStatement;

    fn decode(ext: &ext::ComponentStatement, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            statement_id: ext.statement_id.clone(),
            id,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::ComponentStatement,
                &path.field("responsible-roles"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ComponentStatement {
        ext::ComponentStatement {
            statement_id: self.statement_id.clone(),
            uuid: render_uuid(&self.id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_roles: encode_roles(&self.responsible_roles),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRequirement {
    pub id: Uuid,
    pub control_id: String,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub set_parameters: Option<Vec<ext_common::SetParameter>>,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub statements: Option<Vec<ComponentStatement>>,
    pub remarks: Option<String>,
}

impl Codec for ComponentRequirement {
    type External = ext::ComponentRequirement;

    fn decode(ext: &ext::ComponentRequirement, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            control_id: ext.control_id.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            set_parameters: ext.set_parameters.clone(),
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::ComponentRequirement,
                &path.field("responsible-roles"),
            )?,
            statements: decode_list(&ext.statements, &path.field("statements"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ComponentRequirement {
        ext::ComponentRequirement {
            uuid: render_uuid(&self.id),
            control_id: self.control_id.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            set_parameters: self.set_parameters.clone(),
            responsible_roles: encode_roles(&self.responsible_roles),
            statements: encode_list(&self.statements),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentControlImplementation {
    pub id: Uuid,
    pub source: String,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub set_parameters: Option<Vec<ext_common::SetParameter>>,
    pub implemented_requirements: Vec<ComponentRequirement>,
}

impl Codec for ComponentControlImplementation {
    type External = ext::ComponentControlImplementation;

    fn decode(ext: &ext::ComponentControlImplementation, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            source: ext.source.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            set_parameters: ext.set_parameters.clone(),
            implemented_requirements: decode_vec(
                &ext.implemented_requirements,
                &path.field("implemented-requirements"),
            )?,
        })
    }

    fn encode(&self) -> ext::ComponentControlImplementation {
        ext::ComponentControlImplementation {
            uuid: render_uuid(&self.id),
            source: self.source.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            set_parameters: self.set_parameters.clone(),
            implemented_requirements: encode_vec(&self.implemented_requirements),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinedComponent {
    pub id: Uuid,
    pub component_type: String,
    pub title: String,
    pub description: String,
    pub purpose: Option<String>,
    pub props: Props,
    pub links: Links,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub protocols: Option<Vec<Protocol>>,
    pub control_implementations: Option<Vec<ComponentControlImplementation>>,
    pub remarks: Option<String>,
}

impl DefinedComponent {
    pub fn implements(&self, control_id: &str) -> bool {
        self.control_implementations
            .iter()
            .flatten()
            .flat_map(|ci| ci.implemented_requirements.iter())
            .any(|req| req.control_id == control_id)
    }
}

impl Codec for DefinedComponent {
    type External = ext::DefinedComponent;

    fn decode(ext: &ext::DefinedComponent, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            component_type: ext.component_type.clone(),
            title: ext.title.clone(),
            description: ext.description.clone(),
            purpose: ext.purpose.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::DefinedComponent,
                &path.field("responsible-roles"),
            )?,
            protocols: decode_list(&ext.protocols, &path.field("protocols"))?,
            control_implementations: decode_list(
                &ext.control_implementations,
                &path.field("control-implementations"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::DefinedComponent {
        ext::DefinedComponent {
            uuid: render_uuid(&self.id),
            component_type: self.component_type.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            purpose: self.purpose.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_roles: encode_roles(&self.responsible_roles),
            protocols: encode_list(&self.protocols),
            control_implementations: encode_list(&self.control_implementations),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncorporatesComponent {
    pub component_id: Uuid,
    pub description: String,
}

impl Codec for IncorporatesComponent {
    type External = ext::IncorporatesComponent;

    fn decode(ext: &ext::IncorporatesComponent, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            component_id: parse_uuid(&ext.component_uuid, &path.field("component-uuid"))?,
            description: ext.description.clone(),
        })
    }

    fn encode(&self) -> ext::IncorporatesComponent {
        ext::IncorporatesComponent {
            component_uuid: render_uuid(&self.component_id),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub incorporates_components: Option<Vec<IncorporatesComponent>>,
    pub control_implementations: Option<Vec<ComponentControlImplementation>>,
    pub remarks: Option<String>,
}

impl Codec for Capability {
    type External = ext::Capability;

    fn decode(ext: &ext::Capability, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            name: ext.name.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            incorporates_components: decode_list(
                &ext.incorporates_components,
                &path.field("incorporates-components"),
            )?,
            control_implementations: decode_list(
                &ext.control_implementations,
                &path.field("control-implementations"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Capability {
        ext::Capability {
            uuid: render_uuid(&self.id),
            name: self.name.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            incorporates_components: encode_list(&self.incorporates_components),
            control_implementations: encode_list(&self.control_implementations),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinitionRoot {
    pub id: Uuid,
    pub import_component_definitions: Option<Vec<ext::ImportComponentDefinition>>,
    pub components: Option<Vec<DefinedComponent>>,
    pub capabilities: Option<Vec<Capability>>,
}

impl Entity for ComponentDefinitionRoot {
    const KIND: EntityKind = EntityKind::ComponentDefinition;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    pub root: ComponentDefinitionRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
}

impl ComponentDefinition {
    pub fn components_implementing(&self, control_id: &str) -> Vec<&DefinedComponent> {
        self.root
            .components
            .iter()
            .flatten()
            .filter(|c| c.implements(control_id))
            .collect()
    }
}

impl Aggregate for ComponentDefinition {
    const KIND: DocumentKind = DocumentKind::ComponentDefinition;
    type External = ext::ComponentDefinition;

    fn decode(ext: &ext::ComponentDefinition) -> Result<Self> {
        let path = FieldPath::root("component-definition");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::ComponentDefinition);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;

        Ok(Self {
            root: ComponentDefinitionRoot {
                id,
                import_component_definitions: ext.import_component_definitions.clone(),
                components: decode_list(&ext.components, &path.field("components"))?,
                capabilities: decode_list(&ext.capabilities, &path.field("capabilities"))?,
            },
            metadata,
            back_matter,
        })
    }

    fn encode(&self) -> ext::ComponentDefinition {
        ext::ComponentDefinition {
            uuid: render_uuid(&self.root.id),
            metadata: Some(self.metadata.encode()),
            import_component_definitions: self.root.import_component_definitions.clone(),
            components: encode_list(&self.root.components),
            capabilities: encode_list(&self.root.capabilities),
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
        start_rows(&self.root, &self.metadata, &self.back_matter)
    }

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self> {
        let root: ComponentDefinitionRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::ComponentDefinition)?;
        Ok(Self { root, metadata, back_matter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> ext::ComponentDefinition {
        let doc: serde_json::Value =
            serde_json::from_str(include_str!("../tests/data/component_definition.json")).unwrap();
        serde_json::from_value(doc["component-definition"].clone()).unwrap()
    }

    #[test]
    fn round_trip_is_exact() {
        let ext = fixture();
        let def = ComponentDefinition::decode(&ext).unwrap();
        assert_eq!(def.encode(), ext);
    }

    #[test]
    fn finds_components_by_control() {
        let def = ComponentDefinition::decode(&fixture()).unwrap();
        let titles: Vec<_> = def.components_implementing("ac-17").iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["OpenSSH"]);
        assert!(def.components_implementing("ac-2").is_empty());
    }

    #[test]
    fn statement_roles_are_owned_by_the_statement() {
        let def = ComponentDefinition::decode(&fixture()).unwrap();
        let component = &def.root.components.as_ref().unwrap()[0];
        let requirement = &component.control_implementations.as_ref().unwrap()[0].implemented_requirements[0];
        let statement = &requirement.statements.as_ref().unwrap()[0];
        let role = &statement.responsible_roles.as_ref().unwrap()[0];
        assert!(role.owner.is(statement.id, "component-statement"));
        assert!(!role.owner.is(statement.id, "statement"));
    }

    #[test]
    fn rows_reassemble() {
        let ext = fixture();
        let def = ComponentDefinition::decode(&ext).unwrap();
        let rows = def.to_rows().unwrap();
        assert_eq!(rows.rows.len(), 2);
        let root = rows.root().unwrap().clone();
        let back = ComponentDefinition::from_rows(&root, RowIndex::new(&rows.rows)).unwrap();
        assert_eq!(back.encode(), ext);
    }
}
