//! Id-addressed node storage; insertion order is row order.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{FieldPath, MappingError, Result};
use crate::rows::Entity;

#[derive(Debug, Clone)]
pub struct Table<T> {
    nodes: Vec<T>,
    index: HashMap<Uuid, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { nodes: Vec::new(), index: HashMap::new() }
    }
}

impl<T: PartialEq> PartialEq for Table<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<T: Entity> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; an id already present is a decode error at `path`.
    pub fn insert(&mut self, node: T, path: &FieldPath) -> Result<Uuid> {
        let id = node.id();
        if self.index.contains_key(&id) {
            return Err(MappingError::DuplicateIdentifier { path: path.clone(), id });
        }
        self.index.insert(id, self.nodes.len());
        self.nodes.push(node);
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves an ordered child list, keeping `None` as `None`. Ids with no
    /// node are skipped.
    pub fn resolve(&self, ids: &Option<Vec<Uuid>>) -> Option<Vec<&T>> {
        ids.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|id| {
                    let node = self.get(*id);
                    if node.is_none() {
                        tracing::warn!(kind = T::KIND.as_str(), %id, "dangling arena reference skipped");
                    }
                    node
                })
                .collect()
        })
    }

    /// Resolves and encodes an ordered child list.
    pub fn encode_children<U>(&self, ids: &Option<Vec<Uuid>>, mut f: impl FnMut(&T) -> U) -> Option<Vec<U>> {
        self.resolve(ids).map(|nodes| nodes.into_iter().map(&mut f).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::EntityKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Node {
        id: Uuid,
        label: String,
    }

    impl Entity for Node {
        const KIND: EntityKind = EntityKind::Part;

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn node(label: &str) -> Node {
        Node { id: Uuid::new_v4(), label: label.to_string() }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut table = Table::new();
        let n = node("a");
        table.insert(n.clone(), &FieldPath::root("t")).unwrap();
        let err = table.insert(n.clone(), &FieldPath::root("t").index(1)).unwrap_err();
        assert!(matches!(err, MappingError::DuplicateIdentifier { id, .. } if id == n.id));
    }

    #[test]
    fn resolve_preserves_order_and_nullability() {
        let mut table = Table::new();
        let a = table.insert(node("a"), &FieldPath::root("t")).unwrap();
        let b = table.insert(node("b"), &FieldPath::root("t")).unwrap();

        assert!(table.resolve(&None).is_none());
        assert_eq!(table.resolve(&Some(vec![])).map(|v| v.len()), Some(0));

        let labels = table.encode_children(&Some(vec![b, Uuid::new_v4(), a]), |n| n.label.clone());
        assert_eq!(labels, Some(vec!["b".to_string(), "a".to_string()]));
    }
}
