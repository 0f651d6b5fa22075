use oscal_model::metadata as ext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::column::{decode_list, decode_opt, encode_list, encode_opt, Codec};
use crate::error::{FieldPath, Result};
use crate::identity::{parse_uuid, parse_uuid_list, render_uuid, render_uuid_list, structural_uuid};
use crate::owner::{DocumentKind, Owner, OwnerKind};
use crate::rows::{Entity, EntityKind};
use crate::scalar::{
    Address, DateTimeLiteral, DocumentId, Links, Props, ResponsibleParties, TelephoneNumber,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub title: Option<String>,
    pub published: Option<DateTimeLiteral>,
    pub last_modified: Option<DateTimeLiteral>,
    pub version: String,
    pub oscal_version: Option<String>,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for Revision {
    type External = ext::Revision;

    fn decode(ext: &ext::Revision, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            title: ext.title.clone(),
            published: decode_opt(&ext.published, &path.field("published"))?,
            last_modified: decode_opt(&ext.last_modified, &path.field("last-modified"))?,
            version: ext.version.clone(),
            oscal_version: ext.oscal_version.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Revision {
        ext::Revision {
            title: self.title.clone(),
            published: encode_opt(&self.published),
            last_modified: encode_opt(&self.last_modified),
            version: self.version.clone(),
            oscal_version: self.oscal_version.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

/// Roles are keyed by their natural string id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub title: String,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for Role {
    type External = ext::Role;

    fn decode(ext: &ext::Role, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: ext.id.clone(),
            title: ext.title.clone(),
            short_name: ext.short_name.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Role {
        ext::Role {
            id: self.id.clone(),
            title: self.title.clone(),
            short_name: self.short_name.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub title: Option<String>,
    pub address: Option<Address>,
    pub email_addresses: Option<Vec<String>>,
    pub telephone_numbers: Option<Vec<TelephoneNumber>>,
    pub urls: Option<Vec<String>>,
    pub props: Props,
    pub links: Links,
    pub remarks: Option<String>,
}

impl Codec for Location {
    type External = ext::Location;

    fn decode(ext: &ext::Location, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            address: decode_opt(&ext.address, &path.field("address"))?,
            email_addresses: ext.email_addresses.clone(),
            telephone_numbers: decode_list(&ext.telephone_numbers, &path.field("telephone-numbers"))?,
            urls: ext.urls.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Location {
        ext::Location {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            address: encode_opt(&self.address),
            email_addresses: self.email_addresses.clone(),
            telephone_numbers: encode_list(&self.telephone_numbers),
            urls: self.urls.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub party_type: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub external_ids: Option<Vec<ext::ExternalId>>,
    pub props: Props,
    pub links: Links,
    pub email_addresses: Option<Vec<String>>,
    pub telephone_numbers: Option<Vec<TelephoneNumber>>,
    pub addresses: Option<Vec<Address>>,
    pub location_ids: Option<Vec<Uuid>>,
    pub member_of_organizations: Option<Vec<Uuid>>,
    pub remarks: Option<String>,
}

impl Codec for Party {
    type External = ext::Party;

    fn decode(ext: &ext::Party, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            party_type: ext.party_type.clone(),
            name: ext.name.clone(),
            short_name: ext.short_name.clone(),
            external_ids: ext.external_ids.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            email_addresses: ext.email_addresses.clone(),
            telephone_numbers: decode_list(&ext.telephone_numbers, &path.field("telephone-numbers"))?,
            addresses: decode_list(&ext.addresses, &path.field("addresses"))?,
            location_ids: parse_uuid_list(&ext.location_uuids, &path.field("location-uuids"))?,
            member_of_organizations: parse_uuid_list(
                &ext.member_of_organizations,
                &path.field("member-of-organizations"),
            )?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Party {
        ext::Party {
            uuid: render_uuid(&self.id),
            party_type: self.party_type.clone(),
            name: self.name.clone(),
            short_name: self.short_name.clone(),
            external_ids: self.external_ids.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            email_addresses: self.email_addresses.clone(),
            telephone_numbers: encode_list(&self.telephone_numbers),
            addresses: encode_list(&self.addresses),
            location_uuids: render_uuid_list(&self.location_ids),
            member_of_organizations: render_uuid_list(&self.member_of_organizations),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub date: Option<DateTimeLiteral>,
    pub action_type: String,
    pub system: String,
    pub props: Props,
    pub links: Links,
    pub responsible_parties: ResponsibleParties,
    pub remarks: Option<String>,
}

impl Codec for Action {
    type External = ext::Action;

    fn decode(ext: &ext::Action, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            date: decode_opt(&ext.date, &path.field("date"))?,
            action_type: ext.action_type.clone(),
            system: ext.system.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Action {
        ext::Action {
            uuid: render_uuid(&self.id),
            date: encode_opt(&self.date),
            action_type: self.action_type.clone(),
            system: self.system.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            responsible_parties: encode_list(&self.responsible_parties),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: Uuid,
    pub owner: Owner<DocumentKind>,
    pub title: String,
    pub published: Option<DateTimeLiteral>,
    pub last_modified: DateTimeLiteral,
    pub version: String,
    pub oscal_version: String,
    pub revisions: Option<Vec<Revision>>,
    pub document_ids: Option<Vec<DocumentId>>,
    pub props: Props,
    pub links: Links,
    pub roles: Option<Vec<Role>>,
    pub locations: Option<Vec<Location>>,
    pub parties: Option<Vec<Party>>,
    pub responsible_parties: ResponsibleParties,
    pub actions: Option<Vec<Action>>,
    pub remarks: Option<String>,
}

impl Metadata {
    /// Decodes the block and attaches it to the document `owner`. The block
    /// has no native id; its id is derived from the owner and `path`.
    pub fn decode(ext: &ext::Metadata, owner: Owner<DocumentKind>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: structural_uuid(owner.owner_id, path),
            owner,
            title: ext.title.clone(),
            published: decode_opt(&ext.published, &path.field("published"))?,
            last_modified: DateTimeLiteral::decode(&ext.last_modified, &path.field("last-modified"))?,
            version: ext.version.clone(),
            oscal_version: ext.oscal_version.clone(),
            revisions: decode_list(&ext.revisions, &path.field("revisions"))?,
            document_ids: decode_list(&ext.document_ids, &path.field("document-ids"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            roles: decode_list(&ext.roles, &path.field("roles"))?,
            locations: decode_list(&ext.locations, &path.field("locations"))?,
            parties: decode_list(&ext.parties, &path.field("parties"))?,
            responsible_parties: decode_list(&ext.responsible_parties, &path.field("responsible-parties"))?,
            actions: decode_list(&ext.actions, &path.field("actions"))?,
            remarks: ext.remarks.clone(),
        })
    }

    pub fn encode(&self) -> ext::Metadata {
        ext::Metadata {
            title: self.title.clone(),
            published: encode_opt(&self.published),
            last_modified: self.last_modified.encode(),
            version: self.version.clone(),
            oscal_version: self.oscal_version.clone(),
            revisions: encode_list(&self.revisions),
            document_ids: encode_list(&self.document_ids),
            props: self.props.encode(),
            links: self.links.encode(),
            roles: encode_list(&self.roles),
            locations: encode_list(&self.locations),
            parties: encode_list(&self.parties),
            responsible_parties: encode_list(&self.responsible_parties),
            actions: encode_list(&self.actions),
            remarks: self.remarks.clone(),
        }
    }
}

impl Entity for Metadata {
    const KIND: EntityKind = EntityKind::Metadata;

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Option<(Uuid, &'static str)> {
        Some((self.owner.owner_id, self.owner.owner_kind.tag()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner() -> Owner<DocumentKind> {
        Owner::new(Uuid::new_v4(), DocumentKind::Catalog)
    }

    #[test]
    fn full_metadata_round_trips() {
        let value = json!({
            "title": "Sample",
            "published": "2023-01-01T00:00:00Z",
            "last-modified": "2024-02-02T10:00:00.123+01:00",
            "version": "2.0",
            "oscal-version": "1.1.2",
            "revisions": [{"version": "1.0", "published": "2022-01-01T00:00:00Z"}],
            "document-ids": [{"scheme": "http://example.com/ids", "identifier": "doc-1"}],
            "roles": [{"id": "creator", "title": "Creator"}],
            "locations": [{
                "uuid": "c1b8c5b8-4f6e-4b9e-9a3c-3e0e5f2c9a11",
                "address": {"type": "work", "addr-lines": ["1 Main St"], "city": "Springfield"},
                "telephone-numbers": [{"type": "office", "number": "+1-555-0100"}]
            }],
            "parties": [{
                "uuid": "7f2a2e0a-3d53-4c57-95d9-6c5f6cd9c001",
                "type": "organization",
                "name": "Example Org",
                "location-uuids": ["c1b8c5b8-4f6e-4b9e-9a3c-3e0e5f2c9a11"],
                "props": []
            }],
            "responsible-parties": [{
                "role-id": "creator",
                "party-uuids": ["7f2a2e0a-3d53-4c57-95d9-6c5f6cd9c001"]
            }],
            "actions": [{
                "uuid": "0a64a1c7-9a61-4f31-8d5d-bc3e8a2e2b01",
                "type": "approval",
                "system": "http://example.com/actions",
                "date": "2024-01-01T00:00:00Z"
            }]
        });
        let ext: ext::Metadata = serde_json::from_value(value.clone()).unwrap();
        let meta = Metadata::decode(&ext, owner(), &FieldPath::root("catalog").field("metadata")).unwrap();
        assert_eq!(serde_json::to_value(meta.encode()).unwrap(), value);
    }

    #[test]
    fn bad_party_reference_names_field() {
        let value = json!({
            "title": "T", "last-modified": "2024-01-01T00:00:00Z", "version": "1", "oscal-version": "1.1.2",
            "responsible-parties": [{"role-id": "x", "party-uuids": ["invalid-uuid"]}]
        });
        let ext: ext::Metadata = serde_json::from_value(value).unwrap();
        let err = Metadata::decode(&ext, owner(), &FieldPath::root("profile").field("metadata")).unwrap_err();
        assert_eq!(
            err.path().map(FieldPath::as_str),
            Some("profile.metadata.responsible-parties[0].party-uuids[0]")
        );
    }

    #[test]
    fn metadata_id_is_stable_per_owner() {
        let ext: ext::Metadata = serde_json::from_value(json!({
            "title": "T", "last-modified": "2024-01-01T00:00:00Z", "version": "1", "oscal-version": "1.1.2"
        }))
        .unwrap();
        let o = owner();
        let path = FieldPath::root("catalog").field("metadata");
        let a = Metadata::decode(&ext, o, &path).unwrap();
        let b = Metadata::decode(&ext, o, &path).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, Metadata::decode(&ext, owner(), &path).unwrap().id);
    }
}
