//! Catalog aggregate and its Group / Control / Part tree.
//!
//! Tree nodes live in three arenas. Every node carries its immediate parent
//! as a polymorphic owner and the catalog id as `root_id`; node ids are
//! derived from the catalog id and the node's field path.

use oscal_model::catalog as ext;
use oscal_model::common as ext_common;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{load_blocks, start_rows, Aggregate};
use crate::arena::Table;
use crate::back_matter::BackMatter;
use crate::column::{decode_list, encode_list, try_map_opt, Codec};
use crate::error::{require, FieldPath, Result};
use crate::identity::{parse_uuid, render_uuid, structural_uuid};
use crate::metadata::Metadata;
use crate::owner::{ControlOwner, DocumentKind, GroupOwner, Owner, OwnerKind, PartOwner};
use crate::rows::{Entity, EntityKind, EntityRow, RowIndex, RowSet};
use crate::scalar::{Links, Parameter, Props};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRoot {
    pub id: Uuid,
    pub params: Option<Vec<Parameter>>,
    pub controls: Option<Vec<Uuid>>,
    pub groups: Option<Vec<Uuid>>,
}

impl Entity for CatalogRoot {
    const KIND: EntityKind = EntityKind::Catalog;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub root_id: Uuid,
    pub parent: Owner<GroupOwner>,
    pub group_id: Option<String>,
    pub class: Option<String>,
    pub title: String,
    pub params: Option<Vec<Parameter>>,
    pub props: Props,
    pub links: Links,
    pub parts: Option<Vec<Uuid>>,
    pub groups: Option<Vec<Uuid>>,
    pub controls: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub id: Uuid,
    pub root_id: Uuid,
    pub parent: Owner<ControlOwner>,
    pub control_id: String,
    pub class: Option<String>,
    pub title: String,
    pub params: Option<Vec<Parameter>>,
    pub props: Props,
    pub links: Links,
    pub parts: Option<Vec<Uuid>>,
    pub controls: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartNode {
    pub id: Uuid,
    pub root_id: Uuid,
    pub parent: Owner<PartOwner>,
    pub part_id: Option<String>,
    pub name: String,
    pub ns: Option<String>,
    pub class: Option<String>,
    pub title: Option<String>,
    pub props: Props,
    pub prose: Option<String>,
    pub parts: Option<Vec<Uuid>>,
    pub links: Links,
}

macro_rules! tree_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn parent_id(&self) -> Option<Uuid> {
                Some(self.parent.owner_id)
            }

            fn owner(&self) -> Option<(Uuid, &'static str)> {
                Some((self.parent.owner_id, self.parent.owner_kind.tag()))
            }
        }
    };
}

tree_entity!(Group, EntityKind::Group);
tree_entity!(Control, EntityKind::Control);
tree_entity!(PartNode, EntityKind::Part);

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub root: CatalogRoot,
    pub metadata: Metadata,
    pub back_matter: Option<BackMatter>,
    pub groups: Table<Group>,
    pub controls: Table<Control>,
    pub parts: Table<PartNode>,
}

impl Catalog {
    /// Looks a control up by its natural id, e.g. `ac-2.1`.
    pub fn control(&self, control_id: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.control_id == control_id)
    }

    /// Walks parent links from `part` up to the first non-part ancestor.
    pub fn part_depth(&self, part: &PartNode) -> usize {
        let mut depth = 1;
        let mut current = part;
        while current.parent.owner_kind == PartOwner::Part {
            match self.parts.get(current.parent.owner_id) {
                Some(parent) => {
                    depth += 1;
                    current = parent;
                }
                None => break,
            }
        }
        depth
    }
}

struct TreeDecoder {
    root_id: Uuid,
    groups: Table<Group>,
    controls: Table<Control>,
    parts: Table<PartNode>,
}

impl TreeDecoder {
    fn new(root_id: Uuid) -> Self {
        Self { root_id, groups: Table::new(), controls: Table::new(), parts: Table::new() }
    }

    fn group(&mut self, ext: &ext::Group, parent: Owner<GroupOwner>, path: &FieldPath) -> Result<Uuid> {
        let id = structural_uuid(self.root_id, path);
        let parts = self.parts_of(&ext.parts, Owner::new(id, PartOwner::Group), path)?;
        let groups = try_map_opt(&ext.groups, |i, g| {
            self.group(g, Owner::new(id, GroupOwner::Group), &path.item("groups", i))
        })?;
        let controls = try_map_opt(&ext.controls, |i, c| {
            self.control(c, Owner::new(id, ControlOwner::Group), &path.item("controls", i))
        })?;
        let node = Group {
            id,
            root_id: self.root_id,
            parent,
            group_id: ext.id.clone(),
            class: ext.class.clone(),
            title: ext.title.clone(),
            params: decode_list(&ext.params, &path.field("params"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            parts,
            groups,
            controls,
        };
        self.groups.insert(node, path)
    }

    fn control(&mut self, ext: &ext::Control, parent: Owner<ControlOwner>, path: &FieldPath) -> Result<Uuid> {
        let id = structural_uuid(self.root_id, path);
        let parts = self.parts_of(&ext.parts, Owner::new(id, PartOwner::Control), path)?;
        let controls = try_map_opt(&ext.controls, |i, c| {
            self.control(c, Owner::new(id, ControlOwner::Control), &path.item("controls", i))
        })?;
        let node = Control {
            id,
            root_id: self.root_id,
            parent,
            control_id: ext.id.clone(),
            class: ext.class.clone(),
            title: ext.title.clone(),
            params: decode_list(&ext.params, &path.field("params"))?,
            props: Props::decode(&ext.props, &path.field("props"))?,
            links: Links::decode(&ext.links, &path.field("links"))?,
            parts,
            controls,
        };
        self.controls.insert(node, path)
    }

    fn parts_of(
        &mut self,
        parts: &Option<Vec<ext_common::Part>>,
        parent: Owner<PartOwner>,
        path: &FieldPath,
    ) -> Result<Option<Vec<Uuid>>> {
        try_map_opt(parts, |i, p| self.part(p, parent, &path.item("parts", i)))
    }

    fn part(&mut self, ext: &ext_common::Part, parent: Owner<PartOwner>, path: &FieldPath) -> Result<Uuid> {
        let id = structural_uuid(self.root_id, path);
        let parts = self.parts_of(&ext.parts, Owner::new(id, PartOwner::Part), path)?;
        let node = PartNode {
            id,
            root_id: self.root_id,
            parent,
            part_id: ext.id.clone(),
            name: ext.name.clone(),
            ns: ext.ns.clone(),
            class: ext.class.clone(),
            title: ext.title.clone(),
            props: Props::decode(&ext.props, &path.field("props"))?,
            prose: ext.prose.clone(),
            parts,
            links: Links::decode(&ext.links, &path.field("links"))?,
        };
        self.parts.insert(node, path)
    }
}

impl Catalog {
    fn encode_group(&self, g: &Group) -> ext::Group {
        ext::Group {
            id: g.group_id.clone(),
            class: g.class.clone(),
            title: g.title.clone(),
            params: encode_list(&g.params),
            props: g.props.encode(),
            links: g.links.encode(),
            parts: self.parts.encode_children(&g.parts, |p| self.encode_part(p)),
            groups: self.groups.encode_children(&g.groups, |c| self.encode_group(c)),
            controls: self.controls.encode_children(&g.controls, |c| self.encode_control(c)),
        }
    }

    fn encode_control(&self, c: &Control) -> ext::Control {
        ext::Control {
            id: c.control_id.clone(),
            class: c.class.clone(),
            title: c.title.clone(),
            params: encode_list(&c.params),
            props: c.props.encode(),
            links: c.links.encode(),
            parts: self.parts.encode_children(&c.parts, |p| self.encode_part(p)),
            controls: self.controls.encode_children(&c.controls, |child| self.encode_control(child)),
        }
    }

    fn encode_part(&self, p: &PartNode) -> ext_common::Part {
        ext_common::Part {
            id: p.part_id.clone(),
            name: p.name.clone(),
            ns: p.ns.clone(),
            class: p.class.clone(),
            title: p.title.clone(),
            props: p.props.encode(),
            prose: p.prose.clone(),
            parts: self.parts.encode_children(&p.parts, |child| self.encode_part(child)),
            links: p.links.encode(),
        }
    }
}

impl Aggregate for Catalog {
    const KIND: DocumentKind = DocumentKind::Catalog;
    type External = ext::Catalog;

    fn decode(ext: &ext::Catalog) -> Result<Self> {
        let path = FieldPath::root("catalog");
        let id = parse_uuid(&ext.uuid, &path.field("uuid"))?;
        let owner = Owner::new(id, DocumentKind::Catalog);

        let metadata_path = path.field("metadata");
        let metadata = Metadata::decode(require(&ext.metadata, &metadata_path)?, owner, &metadata_path)?;
        let back_matter = BackMatter::decode_opt(&ext.back_matter, owner, &path.field("back-matter"))?;

        let mut tree = TreeDecoder::new(id);
        let controls = try_map_opt(&ext.controls, |i, c| {
            tree.control(c, Owner::new(id, ControlOwner::Catalog), &path.item("controls", i))
        })?;
        let groups = try_map_opt(&ext.groups, |i, g| {
            tree.group(g, Owner::new(id, GroupOwner::Catalog), &path.item("groups", i))
        })?;

        tracing::debug!(
            catalog = %id,
            groups = tree.groups.len(),
            controls = tree.controls.len(),
            parts = tree.parts.len(),
            "decoded catalog"
        );

        Ok(Self {
            root: CatalogRoot {
                id,
                params: decode_list(&ext.params, &path.field("params"))?,
                controls,
                groups,
            },
            metadata,
            back_matter,
            groups: tree.groups,
            controls: tree.controls,
            parts: tree.parts,
        })
    }

    fn encode(&self) -> ext::Catalog {
        ext::Catalog {
            uuid: render_uuid(&self.root.id),
            metadata: Some(self.metadata.encode()),
            params: encode_list(&self.root.params),
            controls: self.controls.encode_children(&self.root.controls, |c| self.encode_control(c)),
            groups: self.groups.encode_children(&self.root.groups, |g| self.encode_group(g)),
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
        rows.push_table(&self.groups)?;
        rows.push_table(&self.controls)?;
        rows.push_table(&self.parts)?;
        Ok(rows)
    }

    fn from_rows(root: &EntityRow, index: RowIndex<'_>) -> Result<Self> {
        let root: CatalogRoot = root.decode()?;
        let (metadata, back_matter) = load_blocks(index, root.id, DocumentKind::Catalog)?;
        Ok(Self {
            metadata,
            back_matter,
            groups: index.table()?,
            controls: index.table()?,
            parts: index.table()?,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG_ID: &str = "2a7c2f6e-0f4b-4a8e-9b7d-3c3b2a1f0e01";

    fn deep_catalog() -> serde_json::Value {
        json!({
            "uuid": CATALOG_ID,
            "metadata": {
                "title": "Deep", "last-modified": "2024-01-01T00:00:00Z",
                "version": "1", "oscal-version": "1.1.2"
            },
            "groups": [{
                "id": "ac",
                "title": "Access Control",
                "controls": [{
                    "id": "ac-1",
                    "title": "Policy",
                    "parts": [{
                        "id": "ac-1_smt",
                        "name": "statement",
                        "props": [{"name": "sort-id", "value": "ac-01"}],
                        "parts": [{
                            "id": "ac-1_smt.a",
                            "name": "item",
                            "links": [{"href": "#ref", "rel": "reference"}],
                            "parts": [{
                                "id": "ac-1_smt.a.1",
                                "name": "item",
                                "prose": "deepest",
                                "props": [{"name": "label", "value": "1."}],
                                "links": []
                            }]
                        }]
                    }],
                    "controls": [{"id": "ac-1.1", "title": "Enhancement"}]
                }]
            }]
        })
    }

    #[test]
    fn deep_parts_keep_root_reference() {
        let ext: ext::Catalog = serde_json::from_value(deep_catalog()).unwrap();
        let catalog = Catalog::decode(&ext).unwrap();

        assert_eq!(catalog.parts.len(), 3);
        let deepest = catalog.parts.iter().find(|p| p.prose.as_deref() == Some("deepest")).unwrap();
        assert_eq!(deepest.root_id, catalog.id());
        assert_eq!(catalog.part_depth(deepest), 3);
        assert!(catalog.groups.iter().all(|g| g.root_id == catalog.id()));
        assert!(catalog.controls.iter().all(|c| c.root_id == catalog.id()));

        let enhancement = catalog.control("ac-1.1").unwrap();
        assert_eq!(enhancement.parent.owner_kind, ControlOwner::Control);
        assert_eq!(Some(enhancement.parent.owner_id), catalog.control("ac-1").map(|c| c.id));

        assert_eq!(serde_json::to_value(catalog.encode()).unwrap(), deep_catalog());
    }

    #[test]
    fn control_lookup_accepts_borrowed_ids() {
        let ext: ext::Catalog = serde_json::from_value(deep_catalog()).unwrap();
        let catalog = Catalog::decode(&ext).unwrap();
        let wanted = format!("ac-{}.{}", 1, 1);
        assert_eq!(catalog.control(&wanted).map(|c| c.title.as_str()), Some("Enhancement"));
        assert!(catalog.control(&wanted[..3]).is_none());
    }

    #[test]
    fn tree_ids_are_stable_across_decodes() {
        let ext: ext::Catalog = serde_json::from_value(deep_catalog()).unwrap();
        let a = Catalog::decode(&ext).unwrap();
        let b = Catalog::decode(&ext).unwrap();
        let ids_a: Vec<Uuid> = a.parts.iter().map(|p| p.id).collect();
        let ids_b: Vec<Uuid> = b.parts.iter().map(|p| p.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn rows_reassemble_the_same_catalog() {
        let ext: ext::Catalog = serde_json::from_value(deep_catalog()).unwrap();
        let catalog = Catalog::decode(&ext).unwrap();
        let rows = catalog.to_rows().unwrap();
        assert_eq!(rows.rows.len(), 1 + 1 + 1 + 2 + 3);

        let root = rows.root().unwrap();
        let back = Catalog::from_rows(root, RowIndex::new(&rows.rows)).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn missing_metadata_is_reported() {
        let ext: ext::Catalog = serde_json::from_value(json!({"uuid": CATALOG_ID})).unwrap();
        let err = Catalog::decode(&ext).unwrap_err();
        assert_eq!(err.path().map(FieldPath::as_str), Some("catalog.metadata"));
    }
}
