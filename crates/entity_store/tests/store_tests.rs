use entity_model::assessment::Observation;
use entity_model::{Document, DocumentKind, EntityKind, LinkRelation};
use entity_store::{EntityStore, Loaded, StoreError};
use oscal_model::{load_document_from_file, OscalDocument};
use tempfile::TempDir;
use uuid::Uuid;

const CATALOG_ID: &str = "6f1d6a7e-2c4b-4f0e-9a51-3b8e7d0c1a01";
const SSP_ID: &str = "9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c01";
const RESULTS_ID: &str = "be6c9f54-8071-4c23-8e5f-6a7b8c9d0e01";
const POAM_ID: &str = "cf7da065-9182-4d34-9f60-7b8c9d0e1f01";

fn id(s: &str) -> Uuid {
    s.parse().expect("uuid literal")
}

fn open(tmp: &TempDir) -> EntityStore {
    let path = tmp.path().join("entities.sqlite");
    EntityStore::open_path(path.to_str().unwrap()).expect("open store")
}

fn fixture(name: &str) -> (OscalDocument, Document) {
    let path = format!("{}/../entity_model/tests/data/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let ext = load_document_from_file(path).expect("load fixture");
    let doc = Document::decode(&ext).expect("decode fixture");
    (ext, doc)
}

#[test]
fn stored_documents_export_unchanged() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);

    for name in [
        "catalog",
        "profile",
        "component_definition",
        "ssp",
        "assessment_plan",
        "assessment_results",
        "poam",
        "minimal_catalog",
        "minimal_profile",
        "minimal_component_definition",
        "minimal_ssp",
        "minimal_assessment_plan",
        "minimal_assessment_results",
        "minimal_poam",
    ] {
        let (ext, doc) = fixture(name);
        let id = store.insert(&doc).expect("insert");
        let loaded = store.load_document(doc.kind(), id).expect("load_document");
        assert_eq!(loaded.encode(), ext, "{name}");
    }
}

#[test]
fn second_insert_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, doc) = fixture("catalog");

    store.insert(&doc).expect("first insert");
    let err = store.insert(&doc).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { id, .. } if id == doc.id()));
}

#[test]
fn load_by_id_without_associations_returns_root_row() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, doc) = fixture("ssp");
    store.insert(&doc).expect("insert");

    match store.load_by_id(DocumentKind::SystemSecurityPlan, id(SSP_ID), false).expect("load root") {
        Loaded::Root(row) => {
            assert_eq!(row.kind, EntityKind::SystemSecurityPlan);
            assert_eq!(row.id, row.root_id);
        }
        other => panic!("expected root row, got {other:?}"),
    }
    match store.load_by_id(DocumentKind::SystemSecurityPlan, id(SSP_ID), true).expect("load full") {
        Loaded::Document(loaded) => assert_eq!(*loaded, doc),
        other => panic!("expected document, got {other:?}"),
    }
}

#[test]
fn missing_or_mismatched_kind_is_not_found() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, doc) = fixture("catalog");
    store.insert(&doc).expect("insert");

    let err = store.load_root(DocumentKind::Profile, id(CATALOG_ID)).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "profile", .. }));
    let err = store.load_document(DocumentKind::Catalog, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "catalog", .. }));
}

#[test]
fn delete_cascades_to_rows_and_links() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, ssp) = fixture("ssp");
    let (_, catalog) = fixture("catalog");
    let expected = {
        let rows = ssp.to_rows().expect("to_rows");
        rows.rows.len() + rows.links.len()
    };
    store.insert(&ssp).expect("insert ssp");
    store.insert(&catalog).expect("insert catalog");

    assert_eq!(store.delete(DocumentKind::Catalog, id(SSP_ID)).expect("wrong kind"), 0);
    assert_eq!(store.delete(DocumentKind::SystemSecurityPlan, id(SSP_ID)).expect("delete"), expected);
    assert!(!store.exists(id(SSP_ID)).expect("exists"));
    assert!(store.links_of(id(SSP_ID)).expect("links").is_empty());
    assert!(store.exists(id(CATALOG_ID)).expect("catalog still there"));
    assert_eq!(store.delete(DocumentKind::SystemSecurityPlan, id(SSP_ID)).expect("again"), 0);
}

#[test]
fn replace_overwrites_whole_document() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (ext, doc) = fixture("poam");
    store.insert(&doc).expect("insert");

    let mut changed = ext.clone();
    if let OscalDocument::PlanOfActionAndMilestones(p) = &mut changed {
        p.metadata.as_mut().expect("metadata").title = "Payroll POA&M, revised".to_string();
        p.poam_items = Some(vec![]);
    }
    let changed_doc = Document::decode(&changed).expect("decode changed");
    store.replace(&changed_doc).expect("replace");

    let loaded = store.load_document(DocumentKind::PlanOfActionAndMilestones, id(POAM_ID)).expect("load");
    assert_eq!(loaded.encode(), changed);
    let titles: Vec<String> = store
        .list(DocumentKind::PlanOfActionAndMilestones)
        .expect("list")
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(titles, vec!["Payroll POA&M, revised".to_string()]);
}

#[test]
fn owned_rows_match_id_and_kind_jointly() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, results) = fixture("assessment_results");
    store.insert(&results).expect("insert results");

    let result_id = id("be6c9f54-8071-4c23-8e5f-6a7b8c9d0e10");
    let observations: Vec<Observation> = store.load_owned_as(result_id, "result").expect("load_owned_as");
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].id, id("be6c9f54-8071-4c23-8e5f-6a7b8c9d0e20"));

    let wrong_kind = store
        .load_owned(EntityKind::Observation, result_id, "plan-of-action-and-milestones")
        .expect("load_owned");
    assert!(wrong_kind.is_empty());

    let metadata = store
        .load_owned(EntityKind::Metadata, id(RESULTS_ID), "assessment-results")
        .expect("metadata");
    assert_eq!(metadata.len(), 1);
    assert!(store
        .load_owned(EntityKind::Metadata, id(RESULTS_ID), "catalog")
        .expect("metadata under wrong kind")
        .is_empty());
}

#[test]
fn groups_hang_off_the_catalog() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, catalog) = fixture("catalog");
    store.insert(&catalog).expect("insert");

    let top = store.load_owned(EntityKind::Group, id(CATALOG_ID), "catalog").expect("groups");
    assert_eq!(top.len(), 1);
    assert!(top.iter().all(|row| row.root_id == id(CATALOG_ID)));
    assert!(store.load_owned(EntityKind::Group, id(CATALOG_ID), "group").expect("groups").is_empty());
}

#[test]
fn inventory_links_point_at_components() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, ssp) = fixture("ssp");
    store.insert(&ssp).expect("insert");

    let db = id("9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c11");
    let app = id("9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c10");
    let to_db = store.linked_to(LinkRelation::ImplementedComponent, db).expect("linked_to");
    let items: Vec<Uuid> = to_db.iter().map(|l| l.left_id).collect();
    assert_eq!(
        items,
        vec![id("9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c20"), id("9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c21")]
    );
    assert_eq!(store.linked_to(LinkRelation::ImplementedComponent, app).expect("linked_to").len(), 1);
    assert_eq!(store.links_of(id(SSP_ID)).expect("links_of").len(), 3);
}

#[test]
fn list_reports_titles_per_kind() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    for name in ["catalog", "profile", "ssp"] {
        let (_, doc) = fixture(name);
        store.insert(&doc).expect("insert");
    }

    let catalogs = store.list(DocumentKind::Catalog).expect("list");
    assert_eq!(catalogs.len(), 1);
    assert_eq!(catalogs[0].id, id(CATALOG_ID));
    assert_eq!(catalogs[0].title, "Access Control Catalog");
    assert!(store.list(DocumentKind::AssessmentPlan).expect("list").is_empty());
}

#[test]
fn reingesting_after_delete_gives_same_row_ids() {
    let tmp = TempDir::new().expect("tempdir");
    let mut store = open(&tmp);
    let (_, catalog) = fixture("catalog");

    store.insert(&catalog).expect("insert");
    let before: Vec<Uuid> = store
        .load_owned(EntityKind::Group, id(CATALOG_ID), "catalog")
        .expect("groups")
        .iter()
        .map(|r| r.id)
        .collect();
    store.delete(DocumentKind::Catalog, id(CATALOG_ID)).expect("delete");

    let (_, again) = fixture("catalog");
    store.insert(&again).expect("reinsert");
    let after: Vec<Uuid> = store
        .load_owned(EntityKind::Group, id(CATALOG_ID), "catalog")
        .expect("groups")
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(before, after);
}
