use std::collections::BTreeMap;
use std::time::Duration;

use entity_model::{
    component_uuid, Document, DocumentKind, Entity, EntityKind, EntityLink, EntityRow, JsonColumn, LinkRelation,
    MappingError, OwnerKind, RowSet,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_DB_PATH: &str = "./oscal_store.sqlite";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("sqlite journal_mode is '{0}', expected 'wal'")]
    JournalModeNotWal(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },
    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: &'static str, id: Uuid },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: String,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    /// Reads `OSCAL_STORE_DB` and `OSCAL_STORE_BUSY_TIMEOUT_MS`. Unset or
    /// unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let db_path = std::env::var("OSCAL_STORE_DB")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let busy_ms = std::env::var("OSCAL_STORE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
        Self {
            db_path,
            busy_timeout: Duration::from_millis(busy_ms),
        }
    }

    pub fn with_db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = path.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedComponent {
    pub id: Uuid,
    pub identifier: String,
    pub attributes: BTreeMap<String, String>,
}

impl DerivedComponent {
    pub fn new(identifier: &str, attributes: BTreeMap<String, String>) -> Self {
        let id = component_uuid(identifier, attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Self {
            id,
            identifier: identifier.to_string(),
            attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub kind: DocumentKind,
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Root(EntityRow),
    Document(Box<Document>),
}

/// SQLite-backed row store for decomposed documents.
///
/// Every row carries its document's root id, so deleting a document is a
/// single sweep over `root_id` in both tables.
pub struct EntityStore {
    conn: Connection,
}

const ROW_COLUMNS: &str = "kind, id, root_id, parent_id, owner_id, owner_kind, position, body";

impl EntityStore {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.db_path.as_str();
        let conn = Connection::open(path)?;

        conn.busy_timeout(config.busy_timeout)?;

        let is_memory = path == ":memory:"
            || (path.starts_with("file:") && path.contains("mode=memory"));

        for _ in 0..50 {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            let mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
            if mode.eq_ignore_ascii_case("wal") || (is_memory && mode.eq_ignore_ascii_case("memory")) {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        let mode: String = conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") && !is_memory {
            return Err(StoreError::JournalModeNotWal(mode));
        }

        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = EntityStore { conn };
        store.migrate()?;
        debug!(path, "entity store opened");
        Ok(store)
    }

    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(&StoreConfig::default().with_db_path(path))
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                root_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                parent_id TEXT,
                owner_id TEXT,
                owner_kind TEXT,
                position INTEGER NOT NULL,
                body JSON NOT NULL,
                PRIMARY KEY (root_id, kind, id)
            );

            CREATE INDEX IF NOT EXISTS idx_entities_owner ON entities(owner_id, owner_kind);
            CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind, id);

            CREATE TABLE IF NOT EXISTS entity_links (
                root_id TEXT NOT NULL,
                relation TEXT NOT NULL,
                left_id TEXT NOT NULL,
                right_id TEXT NOT NULL,
                position INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_links_root ON entity_links(root_id);
            CREATE INDEX IF NOT EXISTS idx_links_right ON entity_links(relation, right_id);

            CREATE TABLE IF NOT EXISTS derived_components (
                id TEXT PRIMARY KEY,
                identifier TEXT NOT NULL,
                body JSON NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn exists(&self, id: Uuid) -> Result<bool> {
        root_present(&self.conn, id)
    }

    /// Writes every row of `doc` in one transaction.
    pub fn insert(&mut self, doc: &Document) -> Result<Uuid> {
        let rows = doc.to_rows()?;
        let tx = self.conn.transaction()?;
        if root_present(&tx, rows.root_id)? {
            return Err(StoreError::AlreadyExists {
                kind: doc.kind().tag(),
                id: rows.root_id,
            });
        }
        let written = write_rows(&tx, &rows)?;
        tx.commit()?;
        info!(kind = %doc.kind(), id = %rows.root_id, rows = written, "inserted document");
        Ok(rows.root_id)
    }

    /// Replaces a stored document wholesale. A missing document is simply
    /// inserted.
    pub fn replace(&mut self, doc: &Document) -> Result<usize> {
        let rows = doc.to_rows()?;
        let tx = self.conn.transaction()?;
        let removed = delete_rows(&tx, rows.root_id)?;
        let written = write_rows(&tx, &rows)?;
        tx.commit()?;
        info!(kind = %doc.kind(), id = %rows.root_id, removed, rows = written, "replaced document");
        Ok(written)
    }

    pub fn load_root(&self, kind: DocumentKind, id: Uuid) -> Result<EntityRow> {
        let sql = format!("SELECT {ROW_COLUMNS} FROM entities WHERE root_id = ?1 AND kind = ?2 AND id = ?1");
        self.conn
            .query_row(&sql, params![id.to_string(), EntityKind::from(kind).as_str()], read_row)
            .optional()?
            .ok_or(StoreError::NotFound { kind: kind.tag(), id })
    }

    pub fn load_document(&self, kind: DocumentKind, id: Uuid) -> Result<Document> {
        // Fails with NotFound before touching the rest of the rows.
        self.load_root(kind, id)?;
        let rows = self.rows_of(id)?;
        let doc = Document::from_rows(id, &rows)?;
        debug!(kind = %kind, %id, rows = rows.len(), "loaded document");
        Ok(doc)
    }

    pub fn load_by_id(&self, kind: DocumentKind, id: Uuid, with_associations: bool) -> Result<Loaded> {
        if with_associations {
            Ok(Loaded::Document(Box::new(self.load_document(kind, id)?)))
        } else {
            Ok(Loaded::Root(self.load_root(kind, id)?))
        }
    }

    /// Rows of `kind` owned by `(owner_id, owner_kind)`. Both halves must
    /// match; an equal id under another owner kind is not returned.
    pub fn load_owned(&self, kind: EntityKind, owner_id: Uuid, owner_kind: &str) -> Result<Vec<EntityRow>> {
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM entities
             WHERE kind = ?1 AND owner_id = ?2 AND owner_kind = ?3
             ORDER BY root_id, position"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![kind.as_str(), owner_id.to_string(), owner_kind], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_owned_as<T: Entity>(&self, owner_id: Uuid, owner_kind: &str) -> Result<Vec<T>> {
        self.load_owned(T::KIND, owner_id, owner_kind)?
            .iter()
            .map(|row| row.decode::<T>().map_err(StoreError::from))
            .collect()
    }

    /// Join rows pointing at `right_id`, e.g. the inventory items that
    /// implement a component.
    pub fn linked_to(&self, relation: LinkRelation, right_id: Uuid) -> Result<Vec<EntityLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT root_id, relation, left_id, right_id, position FROM entity_links
             WHERE relation = ?1 AND right_id = ?2 ORDER BY root_id, position",
        )?;
        let links = stmt
            .query_map(params![relation.as_str(), right_id.to_string()], read_link)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    pub fn links_of(&self, root_id: Uuid) -> Result<Vec<EntityLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT root_id, relation, left_id, right_id, position FROM entity_links
             WHERE root_id = ?1 ORDER BY position",
        )?;
        let links = stmt
            .query_map(params![root_id.to_string()], read_link)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// Inserts a derived component unless its id is already stored.
    /// Returns whether a row was written. Existing rows are never updated.
    pub fn upsert_ignore_conflict(&self, component: &DerivedComponent) -> Result<bool> {
        let body = serde_json::to_string(&component.attributes)?;
        let n = self.conn.execute(
            "INSERT INTO derived_components (id, identifier, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO NOTHING",
            params![component.id.to_string(), component.identifier, body],
        )?;
        debug!(id = %component.id, identifier = %component.identifier, inserted = n == 1, "derived component upsert");
        Ok(n == 1)
    }

    pub fn register_component(
        &self,
        identifier: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<DerivedComponent> {
        let component = DerivedComponent::new(identifier, attributes);
        if self.upsert_ignore_conflict(&component)? {
            info!(id = %component.id, identifier, "registered component");
        }
        Ok(component)
    }

    pub fn get_component(&self, id: Uuid) -> Result<Option<DerivedComponent>> {
        let found: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT identifier, body FROM derived_components WHERE id = ?1",
                params![id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match found {
            Some((identifier, body)) => Ok(Some(DerivedComponent {
                id,
                identifier,
                attributes: serde_json::from_str(&body)?,
            })),
            None => Ok(None),
        }
    }

    /// Deletes a document with every row and join row under it. Returns the
    /// number of rows removed, 0 when no such document is stored.
    pub fn delete(&mut self, kind: DocumentKind, id: Uuid) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let present: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM entities WHERE root_id = ?1 AND kind = ?2 AND id = ?1",
                params![id.to_string(), EntityKind::from(kind).as_str()],
                |r| r.get(0),
            )
            .optional()?;
        if present.is_none() {
            return Ok(0);
        }
        let removed = delete_rows(&tx, id)?;
        tx.commit()?;
        info!(kind = %kind, %id, removed, "deleted document");
        Ok(removed)
    }

    pub fn list(&self, kind: DocumentKind) -> Result<Vec<DocumentSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, m.body FROM entities r
             JOIN entities m ON m.root_id = r.root_id AND m.kind = ?2
                 AND m.owner_id = r.id AND m.owner_kind = ?1
             WHERE r.kind = ?1 AND r.id = r.root_id",
        )?;
        let mut out = stmt
            .query_map(params![kind.tag(), EntityKind::Metadata.as_str()], |r| {
                let id = uuid_col(r, 0)?;
                let body: JsonColumn<serde_json::Value> = r.get(1)?;
                let title = body.0.get("title").and_then(|t| t.as_str()).unwrap_or_default().to_string();
                Ok(DocumentSummary { kind, id, title })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        out.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn rows_of(&self, root_id: Uuid) -> Result<Vec<EntityRow>> {
        let sql = format!("SELECT {ROW_COLUMNS} FROM entities WHERE root_id = ?1 ORDER BY position");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![root_id.to_string()], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn root_present(conn: &Connection, root_id: Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM entities WHERE root_id = ?1 LIMIT 1",
            params![root_id.to_string()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write_rows(conn: &Connection, rows: &RowSet) -> Result<usize> {
    let mut insert_row = conn.prepare_cached(
        "INSERT INTO entities (root_id, kind, id, parent_id, owner_id, owner_kind, position, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for row in &rows.rows {
        insert_row.execute(params![
            row.root_id.to_string(),
            row.kind.as_str(),
            row.id.to_string(),
            row.parent_id.map(|id| id.to_string()),
            row.owner_id.map(|id| id.to_string()),
            row.owner_kind.as_deref(),
            row.position,
            row.body,
        ])?;
    }

    let mut insert_link = conn.prepare_cached(
        "INSERT INTO entity_links (root_id, relation, left_id, right_id, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for link in &rows.links {
        insert_link.execute(params![
            link.root_id.to_string(),
            link.relation.as_str(),
            link.left_id.to_string(),
            link.right_id.to_string(),
            link.position,
        ])?;
    }
    Ok(rows.rows.len() + rows.links.len())
}

fn delete_rows(conn: &Connection, root_id: Uuid) -> Result<usize> {
    let id = root_id.to_string();
    let entities = conn.execute("DELETE FROM entities WHERE root_id = ?1", params![id])?;
    let links = conn.execute("DELETE FROM entity_links WHERE root_id = ?1", params![id])?;
    Ok(entities + links)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn uuid_col(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = r.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_uuid_col(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = r.get(idx)?;
    text.map(|t| {
        Uuid::parse_str(&t).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn read_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    let kind: String = r.get(0)?;
    let kind = EntityKind::parse(&kind).ok_or_else(|| conversion_error(0, format!("unknown entity kind {kind:?}")))?;
    Ok(EntityRow {
        kind,
        id: uuid_col(r, 1)?,
        root_id: uuid_col(r, 2)?,
        parent_id: opt_uuid_col(r, 3)?,
        owner_id: opt_uuid_col(r, 4)?,
        owner_kind: r.get(5)?,
        position: r.get(6)?,
        body: r.get(7)?,
    })
}

fn read_link(r: &rusqlite::Row<'_>) -> rusqlite::Result<EntityLink> {
    let relation: String = r.get(1)?;
    let relation =
        LinkRelation::parse(&relation).ok_or_else(|| conversion_error(1, format!("unknown relation {relation:?}")))?;
    Ok(EntityLink {
        root_id: uuid_col(r, 0)?,
        relation,
        left_id: uuid_col(r, 2)?,
        right_id: uuid_col(r, 3)?,
        position: r.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn entity_store_smoke_test() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("entities.sqlite");
        let store = EntityStore::open_path(path.to_str().unwrap()).expect("open store");
        assert!(store.list(DocumentKind::Catalog).expect("list").is_empty());
    }

    #[test]
    fn reopen_keeps_schema() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("entities.sqlite");
        drop(EntityStore::open_path(path.to_str().unwrap()).expect("first open"));
        EntityStore::open_path(path.to_str().unwrap()).expect("second open");
    }

    #[test]
    fn config_defaults() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        assert_eq!(cfg.busy_timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.with_db_path("/tmp/x.sqlite").db_path, "/tmp/x.sqlite");
    }

    #[test]
    fn derived_component_ignores_second_insert() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("entities.sqlite");
        let store = EntityStore::open_path(path.to_str().unwrap()).expect("open store");

        let mut attrs = BTreeMap::new();
        attrs.insert("vendor".to_string(), "openbsd".to_string());
        let first = DerivedComponent::new("components/common/ssh", attrs.clone());
        assert!(store.upsert_ignore_conflict(&first).expect("first upsert"));
        assert!(!store.upsert_ignore_conflict(&first).expect("second upsert"));

        let again = store.register_component("components/common/ssh", attrs).expect("register");
        assert_eq!(again.id, first.id);
        assert_eq!(store.get_component(first.id).expect("get"), Some(first));
    }

    #[test]
    fn components_with_separators_in_attributes_are_kept_apart() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("entities.sqlite");
        let store = EntityStore::open_path(path.to_str().unwrap()).expect("open store");

        let packed: BTreeMap<String, String> = [("a".to_string(), "1,b=2".to_string())].into_iter().collect();
        let split: BTreeMap<String, String> =
            [("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())].into_iter().collect();
        let first = store.register_component("components/common/ssh", packed).expect("register packed");
        let second = store.register_component("components/common/ssh", split).expect("register split");

        assert_ne!(first.id, second.id);
        assert_eq!(store.get_component(first.id).expect("get"), Some(first));
        assert_eq!(store.get_component(second.id).expect("get"), Some(second));
    }
}
