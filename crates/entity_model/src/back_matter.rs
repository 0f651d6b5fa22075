use oscal_model::back_matter as ext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::column::{decode_list, decode_opt, encode_list, encode_opt, Codec};
use crate::error::{FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid, structural_uuid};
use crate::owner::{DocumentKind, Owner, OwnerKind};
use crate::rows::{Entity, EntityKind};
use crate::scalar::{DocumentId, Hash, Links, Props};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    pub props: Props,
    pub links: Links,
}

impl Codec for Citation {
    type External = ext::Citation;

    fn decode(ext: &ext::Citation, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            text: ext.text.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
        })
    }

    fn encode(&self) -> ext::Citation {
        ext::Citation {
            text: self.text.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub href: String,
    pub media_type: Option<String>,
    pub hashes: Option<Vec<Hash>>,
}

impl Codec for ResourceLink {
    type External = ext::ResourceLink;

    fn decode(ext: &ext::ResourceLink, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            href: ext.href.clone(),
            media_type: ext.media_type.clone(),
            hashes: decode_list(&ext.hashes, &path.field("hashes"))?,
        })
    }

    fn encode(&self) -> ext::ResourceLink {
        ext::ResourceLink {
            href: self.href.clone(),
            media_type: self.media_type.clone(),
            hashes: encode_list(&self.hashes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub props: Props,
    pub document_ids: Option<Vec<DocumentId>>,
    pub citation: Option<Citation>,
    pub rlinks: Option<Vec<ResourceLink>>,
    /// Embedded blob, stored verbatim.
    pub base64: Option<ext::Base64>,
    pub remarks: Option<String>,
}

impl Codec for Resource {
    type External = ext::Resource;

    fn decode(ext: &ext::Resource, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&ext.uuid, &path.field("uuid"))?,
            title: ext.title.clone(),
            description: ext.description.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            document_ids: decode_list(&ext.document_ids, &path.field("document-ids"))?,
            citation: decode_opt(&ext.citation, &path.field("citation"))?,
            rlinks: decode_list(&ext.rlinks, &path.field("rlinks"))?,
            base64: ext.base64.clone(),
            remarks: ext.remarks.clone(),
        })
    }

    fn encode(&self) -> ext::Resource {
        ext::Resource {
            uuid: render_uuid(&self.id),
            title: self.title.clone(),
            description: self.description.clone(),
            props: self.props.encode(),
            document_ids: encode_list(&self.document_ids),
            citation: encode_opt(&self.citation),
            rlinks: encode_list(&self.rlinks),
            base64: self.base64.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackMatter {
    pub id: Uuid,
    pub owner: Owner<DocumentKind>,
    pub resources: Option<Vec<Resource>>,
}

impl BackMatter {
    pub fn decode(ext: &ext::BackMatter, owner: Owner<DocumentKind>, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            id: structural_uuid(owner.owner_id, path),
            owner,
            resources: decode_list(&ext.resources, &path.field("resources"))?,
        })
    }

    /// Decodes an optional block; absent stays absent.
    pub fn decode_opt(
        ext: &Option<ext::BackMatter>,
        owner: Owner<DocumentKind>,
        path: &FieldPath,
    ) -> Result<Option<Self>> {
        ext.as_ref().map(|bm| Self::decode(bm, owner, path)).transpose()
    }

    pub fn encode(&self) -> ext::BackMatter {
        ext::BackMatter { resources: encode_list(&self.resources) }
    }

    pub fn resource(&self, id: Uuid) -> Option<&Resource> {
        self.resources.as_ref()?.iter().find(|r| r.id == id)
    }
}

impl Entity for BackMatter {
    const KIND: EntityKind = EntityKind::BackMatter;

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

    #[test]
    fn resources_round_trip_with_hashes_and_blobs() {
        let value = json!({
            "resources": [{
                "uuid": "8e0b8d61-5a2c-4c88-bd3b-8a0b9d0d7c10",
                "title": "Policy",
                "citation": {"text": "Policy v1", "links": [{"href": "#x"}]},
                "rlinks": [{
                    "href": "https://example.com/policy.pdf",
                    "media-type": "application/pdf",
                    "hashes": [{"algorithm": "SHA-256", "value": "abc123"}]
                }],
                "base64": {"filename": "logo.png", "media-type": "image/png", "value": "iVBORw0KGgo="}
            }]
        });
        let ext: ext::BackMatter = serde_json::from_value(value.clone()).unwrap();
        let owner = Owner::new(Uuid::new_v4(), DocumentKind::SystemSecurityPlan);
        let bm = BackMatter::decode(&ext, owner, &FieldPath::root("ssp").field("back-matter")).unwrap();
        assert!(bm.resource(Uuid::parse_str("8e0b8d61-5a2c-4c88-bd3b-8a0b9d0d7c10").unwrap()).is_some());
        assert_eq!(serde_json::to_value(bm.encode()).unwrap(), value);
    }

    #[test]
    fn empty_block_stays_empty() {
        let ext: ext::BackMatter = serde_json::from_value(json!({})).unwrap();
        let owner = Owner::new(Uuid::new_v4(), DocumentKind::Catalog);
        let bm = BackMatter::decode(&ext, owner, &FieldPath::root("catalog").field("back-matter")).unwrap();
        assert_eq!(serde_json::to_value(bm.encode()).unwrap(), json!({}));
    }
}
