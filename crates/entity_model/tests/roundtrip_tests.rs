use std::collections::HashSet;
use std::fs;

use entity_model::catalog::Catalog;
use entity_model::{Document, EntityKind, FieldPath, MappingError, RowIndex};
use serde_json::{json, Value};
use uuid::Uuid;

const FIXTURES: &[&str] = &[
    "tests/data/catalog.json",
    "tests/data/profile.json",
    "tests/data/component_definition.json",
    "tests/data/ssp.json",
    "tests/data/assessment_plan.json",
    "tests/data/assessment_results.json",
    "tests/data/poam.json",
];

const MINIMAL: &[&str] = &[
    "tests/data/minimal_catalog.json",
    "tests/data/minimal_profile.json",
    "tests/data/minimal_component_definition.json",
    "tests/data/minimal_ssp.json",
    "tests/data/minimal_assessment_plan.json",
    "tests/data/minimal_assessment_results.json",
    "tests/data/minimal_poam.json",
];

fn read_fixture(path: &str) -> (String, Value) {
    let text = fs::read_to_string(path).expect("read fixture");
    let value: Value = serde_json::from_str(&text).expect("fixture is json");
    (text, value)
}

#[test]
fn every_fixture_round_trips_field_for_field() {
    for path in FIXTURES {
        let (text, original) = read_fixture(path);
        let doc = Document::from_json_str(&text).unwrap_or_else(|e| panic!("{path}: {e}"));
        let encoded = serde_json::to_value(doc.encode()).expect("encode to json");
        assert_eq!(encoded, original, "{path} changed on round trip");
    }
}

#[test]
fn every_fixture_survives_row_decomposition() {
    for path in FIXTURES {
        let (text, original) = read_fixture(path);
        let doc = Document::from_json_str(&text).expect("decode");
        let rows = doc.to_rows().expect("rows");
        assert_eq!(rows.root_id, doc.id());
        assert_eq!(rows.root().map(|r| r.id), Some(doc.id()));
        assert!(rows.rows.iter().all(|r| r.root_id == doc.id()), "{path}: root id not denormalised");

        let back = Document::from_rows(doc.id(), &rows.rows).expect("reassemble");
        let encoded = serde_json::to_value(back.encode()).expect("encode to json");
        assert_eq!(encoded, original, "{path} changed through rows");
    }
}

#[test]
fn minimal_documents_keep_absent_members_absent() {
    for path in MINIMAL {
        let (text, original) = read_fixture(path);
        let doc = Document::from_json_str(&text).unwrap_or_else(|e| panic!("{path}: {e}"));
        assert_eq!(serde_json::to_value(doc.encode()).expect("encode"), original, "{path}");

        let rows = doc.to_rows().expect("rows");
        let back = Document::from_rows(doc.id(), &rows.rows).expect("reassemble");
        assert_eq!(serde_json::to_value(back.encode()).expect("encode"), original, "{path} through rows");
    }

    let (text, _) = read_fixture("tests/data/minimal_catalog.json");
    let out = serde_json::to_value(Document::from_json_str(&text).expect("decode").encode()).expect("encode");
    assert!(out["catalog"].get("groups").is_none());
    assert!(out["catalog"].get("back-matter").is_none());
}

#[test]
fn minimal_and_full_fixtures_cover_every_kind() {
    let kinds = |paths: &[&str]| {
        paths
            .iter()
            .map(|p| Document::from_json_str(&read_fixture(p).0).expect("decode").kind())
            .collect::<Vec<_>>()
    };
    assert_eq!(kinds(MINIMAL), kinds(FIXTURES));
    assert_eq!(kinds(MINIMAL).len(), 7);
}

#[test]
fn missing_nested_member_reports_its_path() {
    let (_, mut value) = read_fixture("tests/data/ssp.json");
    value["system-security-plan"]["control-implementation"]
        .as_object_mut()
        .expect("control-implementation")
        .remove("implemented-requirements");
    let err = Document::from_json_str(&value.to_string()).unwrap_err();
    assert!(matches!(err, MappingError::MissingField { .. }));
    assert_eq!(
        err.path().map(FieldPath::as_str),
        Some("system-security-plan.control-implementation.implemented-requirements")
    );
}

#[test]
fn missing_member_in_a_list_item_reports_the_index() {
    let (_, mut value) = read_fixture("tests/data/ssp.json");
    value["system-security-plan"]["control-implementation"]["implemented-requirements"][1]
        .as_object_mut()
        .expect("requirement")
        .remove("control-id");
    let err = Document::from_json_str(&value.to_string()).unwrap_err();
    assert_eq!(
        err.path().map(FieldPath::as_str),
        Some("system-security-plan.control-implementation.implemented-requirements[1].control-id")
    );
}

#[test]
fn empty_lists_stay_empty() {
    let (text, _) = read_fixture("tests/data/catalog.json");
    let doc = Document::from_json_str(&text).expect("decode");
    let out = serde_json::to_value(doc.encode()).expect("encode");
    assert_eq!(out["catalog"]["groups"][0]["groups"][0]["controls"], json!([]));
    assert!(out["catalog"]["groups"][0]["groups"][0].get("parts").is_none());
}

#[test]
fn invalid_uuid_fails_with_its_path() {
    let (text, _) = read_fixture("tests/data/catalog_invalid_uuid.json");
    let err = Document::from_json_str(&text).unwrap_err();
    match &err {
        MappingError::InvalidIdentifier { path, value } => {
            assert_eq!(path.as_str(), "catalog.groups[0].controls[0].parts[0].props[0].uuid");
            assert_eq!(value, "invalid-uuid");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("invalid-uuid"));
}

#[test]
fn structural_ids_are_stable_across_ingestion() {
    for path in FIXTURES {
        let (text, _) = read_fixture(path);
        let first = Document::from_json_str(&text).expect("decode").to_rows().expect("rows");
        let second = Document::from_json_str(&text).expect("decode").to_rows().expect("rows");
        let ids = |rows: &entity_model::RowSet| rows.rows.iter().map(|r| (r.kind, r.id)).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second), "{path}");
    }
}

#[test]
fn row_ids_are_unique_per_kind() {
    for path in FIXTURES {
        let (text, _) = read_fixture(path);
        let rows = Document::from_json_str(&text).expect("decode").to_rows().expect("rows");
        let mut seen = HashSet::new();
        for row in &rows.rows {
            assert!(seen.insert((row.kind, row.id)), "{path}: duplicate {} {}", row.kind, row.id);
        }
    }
}

#[test]
fn deep_parts_keep_document_id() {
    let (text, _) = read_fixture("tests/data/catalog.json");
    let catalog = match Document::from_json_str(&text).expect("decode") {
        Document::Catalog(c) => c,
        other => panic!("expected catalog, got {:?}", other.kind()),
    };
    let deepest = catalog
        .parts
        .iter()
        .find(|p| p.part_id.as_deref() == Some("ac-2_smt.a.1"))
        .expect("deep part");
    assert_eq!(catalog.part_depth(deepest), 3);
    assert_eq!(deepest.root_id, catalog.root.id);

    let enhancement = catalog.control("ac-2.1").expect("enhancement");
    let parent = catalog.control("ac-2").expect("parent control");
    assert!(enhancement.parent.is(parent.id, "control"));
}

#[test]
fn owner_filter_matches_id_and_kind_jointly() {
    let (text, _) = read_fixture("tests/data/catalog.json");
    let doc = Document::from_json_str(&text).expect("decode");
    let rows = doc.to_rows().expect("rows");
    let index = RowIndex::new(&rows.rows);

    let catalog: Catalog = match &doc {
        Document::Catalog(c) => c.clone(),
        _ => unreachable!(),
    };
    let group_id = catalog.root.groups.as_ref().expect("groups")[0];

    // Same owner id under two kinds: top-level groups are owned by the
    // catalog, metadata is owned by the catalog as a document.
    let groups: Vec<entity_model::catalog::Group> = index.owned(doc.id(), "catalog").expect("owned groups");
    assert_eq!(groups.len(), 1);
    let metadata: Vec<entity_model::metadata::Metadata> = index.owned(doc.id(), "catalog").expect("owned metadata");
    assert_eq!(metadata.len(), 1);

    let wrong_kind: Vec<entity_model::catalog::Group> = index.owned(group_id, "catalog").expect("query");
    assert!(wrong_kind.is_empty());
    let nested: Vec<entity_model::catalog::Group> = index.owned(group_id, "group").expect("nested groups");
    assert_eq!(nested.len(), 1);
}

#[test]
fn inventory_links_are_emitted_per_implemented_component() {
    let (text, _) = read_fixture("tests/data/ssp.json");
    let doc = Document::from_json_str(&text).expect("decode");
    let rows = doc.to_rows().expect("rows");
    assert_eq!(rows.links.len(), 3);
    let db = Uuid::parse_str("9c4a7d32-6e5f-4a01-8c3d-4e5f6a7b8c11").expect("uuid");
    assert_eq!(rows.links.iter().filter(|l| l.right_id == db).count(), 2);

    let Document::SystemSecurityPlan(ssp) = &doc else { panic!("expected ssp") };
    assert_eq!(ssp.inventory.items_implementing(db).len(), 2);
    assert_eq!(ssp.controls_satisfied_by(db), vec!["au-2"]);
}

#[test]
fn records_are_split_between_owners() {
    let (text, _) = read_fixture("tests/data/assessment_results.json");
    let doc = Document::from_json_str(&text).expect("decode");
    let rows = doc.to_rows().expect("rows");
    let index = RowIndex::new(&rows.rows);
    let first = Uuid::parse_str("be6c9f54-8071-4c23-8e5f-6a7b8c9d0e10").expect("uuid");
    let second = Uuid::parse_str("be6c9f54-8071-4c23-8e5f-6a7b8c9d0e50").expect("uuid");

    let observations: Vec<entity_model::assessment::Observation> =
        index.owned(first, "result").expect("observations");
    assert_eq!(observations.len(), 1);
    let none: Vec<entity_model::assessment::Observation> = index.owned(second, "result").expect("observations");
    assert!(none.is_empty());
    let wrong_kind: Vec<entity_model::assessment::Observation> =
        index.owned(first, "plan-of-action-and-milestones").expect("observations");
    assert!(wrong_kind.is_empty());
}

#[test]
fn dates_are_checked_on_decode() {
    let (_, mut value) = read_fixture("tests/data/ssp.json");
    value["system-security-plan"]["system-implementation"]["leveraged-authorizations"][0]["date-authorized"] =
        json!("05/01/2022");
    let err = Document::from_json_str(&value.to_string()).unwrap_err();
    assert!(matches!(err, MappingError::InvalidDate { .. }));
    assert_eq!(
        err.path().map(FieldPath::as_str),
        Some("system-security-plan.system-implementation.leveraged-authorizations[0].date-authorized")
    );
}

#[test]
fn duplicate_native_ids_are_rejected() {
    let (_, mut value) = read_fixture("tests/data/poam.json");
    let risk = value["plan-of-action-and-milestones"]["risks"][0].clone();
    value["plan-of-action-and-milestones"]["risks"]
        .as_array_mut()
        .expect("risks")
        .push(risk);
    let err = Document::from_json_str(&value.to_string()).unwrap_err();
    assert!(matches!(err, MappingError::DuplicateIdentifier { .. }));
    assert_eq!(err.path().map(FieldPath::as_str), Some("plan-of-action-and-milestones.risks[2]"));
}

#[test]
fn kinds_are_reported_for_every_fixture() {
    let kinds: Vec<EntityKind> = FIXTURES
        .iter()
        .map(|p| {
            let (text, _) = read_fixture(p);
            let doc = Document::from_json_str(&text).expect("decode");
            doc.to_rows().expect("rows").root().expect("root row").kind
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Catalog,
            EntityKind::Profile,
            EntityKind::ComponentDefinition,
            EntityKind::SystemSecurityPlan,
            EntityKind::AssessmentPlan,
            EntityKind::AssessmentResults,
            EntityKind::PlanOfActionAndMilestones,
        ]
    );
}
