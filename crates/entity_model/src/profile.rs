use oscal_model::profile as ext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::back_matter::{BackMatter, Resource};
use crate::column::{decode_list, decode_opt, encode_list, encode_opt, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid};
use crate::metadata::Metadata;
use crate::owner::{DocumentKind, Owner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{Links, Parameter, Part, Props};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSetParameter {
    pub param_id: String,
    pub class: Option<String>,
    pub depends_on: Option<String>,
    pub props: Props,
    pub links: Links,
    pub label: Option<String>,
    pub usage: Option<String>,
    pub constraints: Option<Vec<oscal_model::common::ParameterConstraint>>,
    pub guidelines: Option<Vec<oscal_model::common::ParameterGuideline>>,
    pub values: Option<Vec<String>>,
    pub select: Option<oscal_model::common::ParameterSelection>,
}

impl Codec for ProfileSetParameter {
    type External = ext::ProfileSetParameter;

    fn decode(ext: &ext::ProfileSetParameter, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            param_id: ext.param_id.clone(),
            class: ext.class.clone(),
            depends_on: ext.depends_on.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            label: ext.label.clone(),
            usage: ext.usage.clone(),
            constraints: ext.constraints.clone(),
            guidelines: ext.guidelines.clone(),
            values: ext.values.clone(),
            select: ext.select.clone(),
        })
    }

    fn encode(&self) -> ext::ProfileSetParameter {
        ext::ProfileSetParameter {
            param_id: self.param_id.clone(),
            class: self.class.clone(),
            depends_on: self.depends_on.clone(),
            props: self.props.encode(),
            links: self.links.encode(),
            label: self.label.clone(),
            usage: self.usage.clone(),
            constraints: self.constraints.clone(),
            guidelines: self.guidelines.clone(),
            values: self.values.clone(),
            select: self.select.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addition {
    pub position: Option<String>,
    pub by_id: Option<String>,
    pub title: Option<String>,
    pub params: Option<Vec<Parameter>>,
    pub props: Props,
    pub links: Links,
    pub parts: Option<Vec<Part>>,
}

impl Codec for Addition {
    type External = ext::Addition;

    fn decode(ext: &ext::Addition, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            position: ext.position.clone(),
            by_id: ext.by_id.clone(),
            title: ext.title.clone(),
            params: decode_list(&ext.params, &path.field("params"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            parts: decode_list(&ext.parts, &path.field("parts"))?,
        })
    }

    fn encode(&self) -> ext::Addition {
        ext::Addition {
            position: self.position.clone(),
            by_id: self.by_id.clone(),
            title: self.title.clone(),
            params: encode_list(&self.params),
            props: self.props.encode(),
            links: self.links.encode(),
            parts: encode_list(&self.parts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alteration {
    pub control_id: String,
    pub removes: Option<Vec<ext::Removal>>,
    pub adds: Option<Vec<Addition>>,
}

impl Codec for Alteration {
    type External = ext::Alteration;

    fn decode(ext: &ext::Alteration, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            control_id: ext.control_id.clone(),
            removes: ext.removes.clone(),
            adds: decode_list(&ext.adds, &path.field("adds"))?,
        })
    }

    fn encode(&self) -> ext::Alteration {
        ext::Alteration {
            control_id: self.control_id.clone(),
            removes: self.removes.clone(),
            adds: encode_list(&self.adds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modify {
    pub set_parameters: Option<Vec<ProfileSetParameter>>,
    pub alters: Option<Vec<Alteration>>,
}

impl Codec for Modify {
    type External = ext::Modify;

    fn decode(ext: &ext::Modify, path: &FieldPath) -> Result<Self> {
        Ok(Self {
            set_parameters: decode_list(&ext.set_parameters, &path.field("set-parameters"))?,
            alters: decode_list(&ext.alters, &path.field("alters"))?,
        })
    }

    fn encode(&self) -> ext::Modify {
        ext::Modify {
            set_parameters: encode_list(&self.set_parameters),
            alters: encode_list(&self.alters),
        }
    }
}

/// Import selections carry no identifiers and are kept in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRoot {
    pub id: Uuid,
    pub imports: Vec<ext::Import>,
    pub merge: Option<ext::Merge>,
    pub modify: Option<Modify>,
}

impl Entity for ProfileRoot {
    const KIND: EntityKind = EntityKind::Profile;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub root: ProfileRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
}

impl Profile {
    /// Back-matter resources referenced by `#<uuid>` import hrefs, in
    /// import order. External hrefs are skipped.
    pub fn imported_resources(&self) -> Vec<&Resource> {
        let Some(back_matter) = &self.back_matter else {
            return Vec::new();
        };
        self.root
            .imports
            .iter()
            .filter_map(|import| import.href.strip_prefix('#'))
            .filter_map(|fragment| Uuid::try_parse(fragment).ok())
            .filter_map(|id| back_matter.resource(id))
            .collect()
    }
}

impl Aggregate for Profile {
    const KIND: DocumentKind = DocumentKind::Profile;
    type External = ext::Profile;

    fn decode(ext: &ext::Profile) -> Result<Self> {
        let path = FieldPath::root("profile");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::Profile);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;
        let modify = decode_opt(&ext.modify, &path.field("modify"))?;

        tracing::debug!(profile = %id, imports = ext.imports.len(), "decoded profile");

        Ok(Self {
            root: ProfileRoot {
                id,
                imports: ext.imports.clone(),
                merge: ext.merge.clone(),
                modify,
            },
            metadata,
            back_matter,
        })
    }

    fn encode(&self) -> ext::Profile {
        ext::Profile {
            uuid: render_uuid(&self.root.id),
            metadata: Some(self.metadata.encode()),
            imports: self.root.imports.clone(),
            merge: self.root.merge.clone(),
            modify: encode_opt(&self.root.modify),
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
        let root: ProfileRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::Profile)?;
        Ok(Self { root, metadata, back_matter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile_json() -> serde_json::Value {
        json!({
            "uuid": "b0c1d2e3-f405-4617-8829-3a4b5c6d7e8f",
            "metadata": {
                "title": "Baseline", "last-modified": "2024-05-05T05:05:05Z",
                "version": "1.0", "oscal-version": "1.1.2"
            },
            "imports": [{
                "href": "#5f3c9a2e-1b7d-4e6a-8c0f-2d4e6a8c0f11",
                "include-controls": [{"with-child-controls": "yes", "with-ids": ["ac-1", "ac-2"]}],
                "exclude-controls": [{"matching": [{"pattern": "ac-2.*"}]}]
            }, {
                "href": "https://example.com/other.json",
                "include-all": {}
            }],
            "merge": {"combine": {"method": "merge"}, "as-is": true},
            "modify": {
                "set-parameters": [{"param-id": "ac-1_prm_1", "values": ["monthly"], "props": []}],
                "alters": [{
                    "control-id": "ac-1",
                    "removes": [{"by-name": "guidance"}],
                    "adds": [{
                        "position": "ending",
                        "parts": [{"name": "guidance", "parts": [{"name": "item", "prose": "x"}]}]
                    }]
                }]
            },
            "back-matter": {"resources": [{"uuid": "5f3c9a2e-1b7d-4e6a-8c0f-2d4e6a8c0f11", "title": "Catalog"}]}
        })
    }

    #[test]
    fn profile_round_trips() {
        let ext: ext::Profile = serde_json::from_value(profile_json()).unwrap();
        let profile = Profile::decode(&ext).unwrap();
        assert_eq!(serde_json::to_value(profile.encode()).unwrap(), profile_json());
    }

    #[test]
    fn internal_import_resolves_to_back_matter() {
        let ext: ext::Profile = serde_json::from_value(profile_json()).unwrap();
        let profile = Profile::decode(&ext).unwrap();
        let resources = profile.imported_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].title.as_deref(), Some("Catalog"));
    }

    #[test]
    fn rows_reassemble_profile() {
        let ext: ext::Profile = serde_json::from_value(profile_json()).unwrap();
        let profile = Profile::decode(&ext).unwrap();
        let rows = profile.to_rows().unwrap();
        let back = Profile::from_rows(rows.root().unwrap(), RowIndex::new(&rows.rows)).unwrap();
        assert_eq!(back, profile);
    }
}
