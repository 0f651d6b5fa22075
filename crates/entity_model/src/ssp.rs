use oscal_model::common as ext_common;
use oscal_model::ssp as ext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::arena::Table;
use crate::back_matter::BackMatter;
use crate::column::{decode_list, decode_opt, decode_vec, encode_list, encode_opt, encode_vec, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_opt_uuid, parse_uuid, render_opt_uuid, render_uuid, structural_uuid};
use crate::implementation::{Diagram, DiagramBlock, Inventory, SystemUser};
use crate::metadata::Metadata;
use crate::owner::{ComponentOwner, DiagramOwner, DocumentKind, InventoryItemOwner, Owner, ResponsibleRoleOwner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{decode_roles, encode_roles, DateLiteral, Links, Props, ResponsibleParties, ResponsibleRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub props: Props,
    pub links: Links,
    pub base: String,
    pub selected: Option<String>,
    pub adjustment_justification: Option<String>,
}

impl Codec for Impact {
    type External = ext::Impact;

    fn decode(ext: &ext::Impact, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            base: ext.base.clone(),
            selected: ext.selected.clone(),
            adjustment_justification: ext.adjustment_justification.clone(),
        })
    }

    fn encode(&self) -> ext::Impact {
        ext::Impact {
            props: self.props.encode(),
            links: self.links.encode(),
            base: self.base.clone(),
            selected: self.selected.clone(),
            adjustment_justification: self.adjustment_justification.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationType {
    pub id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub categorizations: Option<Vec<ext::InformationTypeCategorization>>,
    pub props: Props,
    pub links: Links,
    pub confidentiality_impact: Option<Impact>,
    pub integrity_impact: Option<Impact>,
    pub availability_impact: Option<Impact>,
}

impl Codec for InformationType {
    type External = ext::InformationType;

    fn decode(ext: &ext::InformationType, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_opt_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            description: ext.description.clone(),
            categorizations: ext.categorizations.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            confidentiality_impact: decode_opt(&ext.confidentiality_impact, &path.field("confidentiality-impact"))?,
            integrity_impact: decode_opt(&ext.integrity_impact, &path.field("integrity-impact"))?,
            availability_impact: decode_opt(&ext.availability_impact, &path.field("availability-impact"))?,
        })
    }

    fn encode(&self) -> ext::InformationType {
        ext::InformationType {
            uuid: render_opt_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            categorizations: self.categorizations.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            confidentiality_impact: encode_opt(&self.confidentiality_impact),
            integrity_impact: encode_opt(&self.integrity_impact),
            availability_impact: encode_opt(&self.availability_impact),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInformation {
    pub props: Props,
    pub links: Links,
    pub information_types: Vec<InformationType>,
}

impl Codec for SystemInformation {
    type External = ext::SystemInformation;

    fn decode(ext: &ext::SystemInformation, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            information_types: decode_vec(&ext.information_types, &path.field("information-types"))?,
        })
    }

    fn encode(&self) -> ext::SystemInformation {
        ext::SystemInformation {
            props: self.props.encode(),
            links: self.links.encode(),
            information_types: encode_vec(&self.information_types),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemCharacteristics {
    pub system_ids: Vec<ext::SystemId>,
    pub system_name: String,
    pub system_name_short: Option<String>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub date_authorized: Option<DateLiteral>,
    pub security_sensitivity_level: Option<String>,
    pub system_information: SystemInformation,
    pub security_impact_level: Option<ext::SecurityImpactLevel>,
    pub status: ext_common::Status,
    pub authorization_boundary: DiagramBlock,
    pub network_architecture: Option<DiagramBlock>,
    pub data_flow: Option<DiagramBlock>,
    pub responsible_parties: ResponsibleParties,
    pub remarks: Option<String>,
}

impl SystemCharacteristics {
    fn decode(
        ext: &ext::SystemCharacteristics,
        root_id: Uuid,
        diagrams: &mut Table<Diagram>,
        path: &FieldPath,
    ) -> Result<Self> {
        let block = |ext: &Option<ext::DiagramBlock>, kind, name: &str, diagrams: &mut Table<Diagram>| {
            ext.as_ref()
                .map(|b| DiagramBlock::decode(b, kind, root_id, diagrams, &path.field(name)))
                .transpose()
        };
        Ok(Self {
            system_ids: ext.system_ids.clone(),
            system_name: ext.system_name.clone(),
            system_name_short: ext.system_name_short.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            date_authorized: decode_opt(&ext.date_authorized, &path.field("date-authorized"))?,
            security_sensitivity_level: ext.security_sensitivity_level.clone(),
            system_information: SystemInformation::decode(&ext.system_information, &path.field("system-information"))?,
            security_impact_level: ext.security_impact_level.clone(),
            status: ext.status.clone(),
            authorization_boundary: DiagramBlock::decode(
                &ext.authorization_boundary,
                DiagramOwner::AuthorizationBoundary,
                root_id,
                diagrams,
                &path.field("authorization-boundary"),
            )?,
            network_architecture: block(
                &ext.network_architecture,
                DiagramOwner::NetworkArchitecture,
                "network-architecture",
                diagrams,
            )?,
            data_flow: block(&ext.data_flow, DiagramOwner::DataFlow, "data-flow", diagrams)?,
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self, diagrams: &Table<Diagram>) -> ext::SystemCharacteristics {
        ext::SystemCharacteristics {
            system_ids: self.system_ids.clone(),
            system_name: self.system_name.clone(),
            system_name_short: self.system_name_short.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            date_authorized: encode_opt(&self.date_authorized),
            security_sensitivity_level: self.security_sensitivity_level.clone(),
            system_information: self.system_information.encode(),
            security_impact_level: self.security_impact_level.clone(),
            status: self.status.clone(),
            authorization_boundary: self.authorization_boundary.encode(diagrams),
            network_architecture: self.network_architecture.as_ref().map(|b| b.encode(diagrams)),
            data_flow: self.data_flow.as_ref().map(|b| b.encode(diagrams)),
            responsible_parties: encode_list(&self.responsible_parties),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveragedAuthorization {
    pub id: Uuid,
    pub title: String,
    pub props: Props,
    pub links: Links,
    pub party_id: Uuid,
    pub date_authorized: DateLiteral,
    pub remarks: Option<String>,
}

impl Codec for LeveragedAuthorization {
    type External = ext::LeveragedAuthorization;

    fn decode(ext: &ext::LeveragedAuthorization, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            party_id: parse_uuid(&ext.party_uuid, &path.field("party-uuid"))?,
            date_authorized: DateLiteral::decode(&ext.date_authorized, &path.field("date-authorized"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::LeveragedAuthorization {
        ext::LeveragedAuthorization {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            party_uuid: render_uuid(&self.party_id),
            date_authorized: self.date_authorized.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

/// `system-implementation`. Components and inventory items are rows owned
/// by this block; the block keeps their order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemImplementation {
    pub id: Uuid,
    pub props: Props,
    pub links: Links,
    pub leveraged_authorizations: Option<Vec<LeveragedAuthorization>>,
    pub users: Vec<SystemUser>,
    pub components: Vec<Uuid>,
    pub inventory_items: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl SystemImplementation {
    fn decode(
        ext: &ext::SystemImplementation,
        root_id: Uuid,
        inventory: &mut Inventory,
        path: &FieldPath,
    ) -> Result<Self> {
        let id = structural_uuid(root_id, path);
        Ok(Self {
            id,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            leveraged_authorizations: decode_list(
                &ext.leveraged_authorizations,
                &path.field("leveraged-authorizations"),
            )?,
            users: decode_vec(&ext.users, &path.field("users"))?,
            components: inventory.decode_component_vec(
                &ext.components,
                Owner::new(id, ComponentOwner::SystemImplementation),
                &path.field("components"),
            )?,
            inventory_items: inventory.decode_items(
                &ext.inventory_items,
                Owner::new(id, InventoryItemOwner::SystemImplementation),
                &path.field("inventory-items"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self, inventory: &Inventory) -> ext::SystemImplementation {
        ext::SystemImplementation {
            props: self.props.encode(),
            links: self.links.encode(),
            leveraged_authorizations: encode_list(&self.leveraged_authorizations),
            users: encode_vec(&self.users),
            components: inventory.encode_component_vec(&self.components),
            inventory_items: inventory.encode_items(&self.inventory_items),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for Export {
    type External = ext::Export;

    fn decode(ext: &ext::Export, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Export {
        ext::Export {
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inherited {
    pub id: Uuid,
    pub provided_id: Option<Uuid>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
}

impl Codec for Inherited {
    type External = ext::Inherited;

    fn decode(ext: &ext::Inherited, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            provided_id: parse_opt_uuid(&ext.provided_uuid, &path.field("provided-uuid"))?,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::Inherited,
                &path.field("responsible-roles"),
            )?,
        })
    }

    fn encode(&self) -> ext::Inherited {
        ext::Inherited {
            uuid: render_uuid(&self.id),
            provided_uuid: render_opt_uuid(&self.provided_id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_roles: encode_roles(&self.responsible_roles),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Satisfied {
    pub id: Uuid,
    pub responsibility_id: Option<Uuid>,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub remarks: Option<String>,
}

impl Codec for Satisfied {
    type External = ext::Satisfied;

    fn decode(ext: &ext::Satisfied, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            responsibility_id: parse_opt_uuid(&ext.responsibility_uuid, &path.field("responsibility-uuid"))?,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::Satisfied,
                &path.field("responsible-roles"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Satisfied {
        ext::Satisfied {
            uuid: render_uuid(&self.id),
            responsibility_uuid: render_opt_uuid(&self.responsibility_id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_roles: encode_roles(&self.responsible_roles),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByComponent {
    pub component_id: Uuid,
    pub id: Uuid,
    pub description: String,
    pub props: Props,
    pub links: Links,
    pub set_parameters: Option<Vec<ext_common::SetParameter>>,
    pub implementation_status: Option<ext_common::Status>,
    pub export: Option<Export>,
    pub inherited: Option<Vec<Inherited>>,
    pub satisfied: Option<Vec<Satisfied>>,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub remarks: Option<String>,
}

impl Codec for ByComponent {
    type External = ext::ByComponent;

    fn decode(ext: &ext::ByComponent, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            component_id: parse_uuid(&ext.component_uuid, &path.field("component-uuid"))?,
            id,
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            set_parameters: ext.set_parameters.clone(),
            implementation_status: ext.implementation_status.clone(),
            export: decode_opt(&ext.export, &path.field("export"))?,
            inherited: decode_list(&ext.inherited, &path.field("inherited"))?,
            satisfied: decode_list(&ext.satisfied, &path.field("satisfied"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::ByComponent,
                &path.field("responsible-roles"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ByComponent {
        ext::ByComponent {
            component_uuid: render_uuid(&self.component_id),
            uuid: render_uuid(&self.id),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            set_parameters: self.set_parameters.clone(),
            implementation_status: self.implementation_status.clone(),
            export: encode_opt(&self.export),
            inherited: encode_list(&self.inherited),
            satisfied: encode_list(&self.satisfied),
            responsible_roles: encode_roles(&self.responsible_roles),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub statement_id: String,
    pub id: Uuid,
    pub props: Props,
    pub links: Links,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub by_components: Option<Vec<ByComponent>>,
    pub remarks: Option<String>,
}

impl Codec for Statement {
    type External = ext::Statement;

    fn decode(ext: &ext::Statement, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            statement_id: ext.statement_id.clone(),
            id,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::Statement,
                &path.field("responsible-roles"),
            )?,
            by_components: decode_list(&ext.by_components, &path.field("by-components"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Statement {
        ext::Statement {
            statement_id: self.statement_id.clone(),
            uuid: render_uuid(&self.id),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_roles: encode_roles(&self.responsible_roles),
            by_components: encode_list(&self.by_components),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementedRequirement {
    pub id: Uuid,
    pub control_id: String,
    pub props: Props,
    pub links: Links,
    pub set_parameters: Option<Vec<ext_common::SetParameter>>,
    pub responsible_roles: Option<Vec<ResponsibleRole>>,
    pub statements: Option<Vec<Statement>>,
    pub by_components: Option<Vec<ByComponent>>,
    pub remarks: Option<String>,
}

impl ImplementedRequirement {
    /// Every by-component binding, directly on the requirement or under one
    /// of its statements.
    pub fn all_by_components(&self) -> impl Iterator<Item = &ByComponent> {
        let direct = self.by_components.iter().flatten();
        let nested = self
            .statements
            .iter()
            .flatten()
            .flat_map(|s| s.by_components.iter().flatten());
        direct.chain(nested)
    }
}

impl Codec for ImplementedRequirement {
    type External = ext::ImplementedRequirement;

    fn decode(ext: &ext::ImplementedRequirement, path: &FieldPath) -> Result<Self> {
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        Ok(Self {
            id,
            control_id: ext.control_id.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            set_parameters: ext.set_parameters.clone(),
            responsible_roles: decode_roles(
                &ext.responsible_roles,
                id,
                ResponsibleRoleOwner::ImplementedRequirement,
                &path.field("responsible-roles"),
            )?,
            statements: decode_list(&ext.statements, &path.field("statements"))?,
            by_components: decode_list(&ext.by_components, &path.field("by-components"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::ImplementedRequirement {
        ext::ImplementedRequirement {
            uuid: render_uuid(&self.id),
            control_id: self.control_id.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            set_parameters: self.set_parameters.clone(),
            responsible_roles: encode_roles(&self.responsible_roles),
            statements: encode_list(&self.statements),
            by_components: encode_list(&self.by_components),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlImplementation {
    pub description: String,
    pub set_parameters: Option<Vec<ext_common::SetParameter>>,
    pub implemented_requirements: Vec<ImplementedRequirement>,
}

impl Codec for ControlImplementation {
    type External = ext::ControlImplementation;

    fn decode(ext: &ext::ControlImplementation, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            description: ext.description.clone(),
            set_parameters: ext.set_parameters.clone(),
            implemented_requirements: decode_vec(
                &ext.implemented_requirements,
                &path.field("implemented-requirements"),
            )?,
        })
    }

    fn encode(&self) -> ext::ControlImplementation {
        ext::ControlImplementation {
            description: self.description.clone(),
            set_parameters: self.set_parameters.clone(),
            implemented_requirements: encode_vec(&self.implemented_requirements),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSecurityPlanRoot {
    pub id: Uuid,
    pub import_profile: ext_common::ImportRef,
    pub system_characteristics: SystemCharacteristics,
    pub system_implementation: SystemImplementation,
    pub control_implementation: ControlImplementation,
}

impl Entity for SystemSecurityPlanRoot {
    const KIND: EntityKind = EntityKind::SystemSecurityPlan;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSecurityPlan {
    pub root: SystemSecurityPlanRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
    pub inventory: Inventory,
    pub diagrams: Table<Diagram>,
}

impl SystemSecurityPlan {
    /// Control ids whose implementation names `component_id` in a
    /// by-component binding, in document order.
    pub fn controls_satisfied_by(&self, component_id: Uuid) -> Vec<&str> {
        self.root
            .control_implementation
            .implemented_requirements
            .iter()
            .filter(|req| req.all_by_components().any(|bc| bc.component_id == component_id))
            .map(|req| req.control_id.as_str())
            .collect()
    }
}

impl Aggregate for SystemSecurityPlan {
    const KIND: DocumentKind = DocumentKind::SystemSecurityPlan;
    type External = ext::SystemSecurityPlan;

    fn decode(ext: &ext::SystemSecurityPlan) -> Result<Self> {
        let path = FieldPath::root("system-security-plan");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::SystemSecurityPlan);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;

        let import_profile = require(&ext.import_profile, &path.field("import-profile"))?.clone();

        let mut diagrams = Table::new();
        let characteristics_path = path.field("system-characteristics");
        let system_characteristics = SystemCharacteristics::decode(
            require(&ext.system_characteristics, &characteristics_path)?,
            id,
            &mut diagrams,
            &characteristics_path,
        )?;

        let mut inventory = Inventory::default();
        let implementation_path = path.field("system-implementation");
        let system_implementation = SystemImplementation::decode(
            require(&ext.system_implementation, &implementation_path)?,
            id,
            &mut inventory,
            &implementation_path,
        )?;

        let control_path = path.field("control-implementation");
        let control_implementation =
            ControlImplementation::decode(require(&ext.control_implementation, &control_path)?, &control_path)?;

        tracing::debug!(
            ssp = %id,
            components = inventory.components.len(),
            inventory_items = inventory.items.len(),
            requirements = control_implementation.implemented_requirements.len(),
            "decoded system security plan"
        );

        Ok(Self {
            root: SystemSecurityPlanRoot {
                id,
                import_profile,
                system_characteristics,
                system_implementation,
                control_implementation,
            },
            metadata,
            back_matter,
            inventory,
            diagrams,
        })
    }

    fn encode(&self) -> ext::SystemSecurityPlan {
        ext::SystemSecurityPlan {
            uuid: render_uuid(&self.root.id),
            metadata: Some(self.metadata.encode()),
            import_profile: Some(self.root.import_profile.clone()),
            system_characteristics: Some(self.root.system_characteristics.encode(&self.diagrams)),
            system_implementation: Some(self.root.system_implementation.encode(&self.inventory)),
            control_implementation: Some(self.root.control_implementation.encode()),
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
        rows.push_table(&self.diagrams)?;
        Ok(rows)
    }

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self> {
        let root: SystemSecurityPlanRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::SystemSecurityPlan)?;
        Ok(Self {
            metadata,
            back_matter,
            inventory: Inventory::from_index(index)?,
            diagrams: index.table()?,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> ext::SystemSecurityPlan {
        let doc: serde_json::Value = serde_json::from_str(include_str!("../tests/data/ssp.json")).unwrap();
        serde_json::from_value(doc["system-security-plan"].clone()).unwrap()
    }

    #[test]
    fn diagrams_are_owned_by_their_block() {
        let ssp = SystemSecurityPlan::decode(&fixture()).unwrap();
        let boundary = &ssp.root.system_characteristics.authorization_boundary;
        let diagram_ids = boundary.diagrams.as_ref().unwrap();
        let diagram = ssp.diagrams.get(diagram_ids[0]).unwrap();
        assert!(diagram.owner.is(boundary.id, "authorization-boundary"));
        assert_eq!(
            ssp.root.system_characteristics.network_architecture.as_ref().unwrap().diagrams,
            Some(vec![])
        );
    }

    #[test]
    fn components_keep_system_implementation_owner() {
        let ssp = SystemSecurityPlan::decode(&fixture()).unwrap();
        let block = ssp.root.system_implementation.id;
        assert_eq!(ssp.inventory.components.len(), 2);
        assert!(ssp.inventory.components.iter().all(|c| c.owner.is(block, "system-implementation")));
    }

    #[test]
    fn controls_follow_by_component_bindings() {
        let ssp = SystemSecurityPlan::decode(&fixture()).unwrap();
        let db: Uuid = "9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c11".parse().unwrap();
        let app: Uuid = "9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c10".parse().unwrap();
        assert_eq!(ssp.controls_satisfied_by(db), vec!["au-2"]);
        assert_eq!(ssp.controls_satisfied_by(app), vec!["ac-2"]);
    }

    #[test]
    fn missing_import_profile_is_reported() {
        let mut ext = fixture();
        ext.import_profile = None;
        let err = SystemSecurityPlan::decode(&ext).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("system-security-plan.import-profile"));
    }

    #[test]
    fn bad_component_reference_names_its_path() {
        let mut ext = fixture();
        let control = ext.control_implementation.as_mut().unwrap();
        control.implemented_requirements[1].by_components.as_mut().unwrap()[0].component_uuid = "db".to_string();
        let err = SystemSecurityPlan::decode(&ext).unwrap_err();
        assert_eq!(
            err.path().map(FieldPath::as_str),
            Some("system-security-plan.control-implementation.implemented-requirements[1].by-components[0].component-uuid")
        );
    }
}
