use oscal_model::{load_document_from_file, ModelError, OscalDocument};
use serde_json::json;

fn round_trip(value: serde_json::Value) -> serde_json::Value {
    let doc: OscalDocument = serde_json::from_value(value).expect("parse document");
    serde_json::to_value(&doc).expect("serialize document")
}

#[test]
fn profile_markers_and_selections_survive() {
    let input = json!({
        "profile": {
            "uuid": "7a2e5b10-4c3d-4e8f-8a1b-2c3d4e5f6a99",
            "metadata": {
                "title": "Baseline",
                "last-modified": "2024-01-01T00:00:00Z",
                "version": "1.0",
                "oscal-version": "1.1.2"
            },
            "imports": [
                {"href": "#catalog", "include-all": {}},
                {
                    "href": "#other",
                    "include-controls": [{"with-ids": ["ac-1", "ac-2"]}],
                    "exclude-controls": [{"matching": [{"pattern": "ac-2.*"}]}]
                }
            ],
            "merge": {"as-is": true},
            "modify": {
                "alters": [{"control-id": "ac-1", "removes": [{"by-name": "guidance"}]}]
            }
        }
    });
    assert_eq!(round_trip(input.clone()), input);
}

#[test]
fn poam_item_without_uuid_keeps_it_absent() {
    let input = json!({
        "plan-of-action-and-milestones": {
            "uuid": "cf7da065-9182-4d34-9f60-7b8c9d0e1f99",
            "poam-items": [
                {"title": "Patch", "description": "Apply vendor patch", "related-risks": []}
            ]
        }
    });
    let out = round_trip(input.clone());
    assert_eq!(out, input);
    assert!(out["plan-of-action-and-milestones"]["poam-items"][0].get("uuid").is_none());
}

#[test]
fn unknown_envelope_key_is_a_syntax_error() {
    let err = OscalDocument::from_json_str(r#"{"mapping-collection": {"uuid": "x"}}"#).unwrap_err();
    assert!(matches!(err, ModelError::Json(_)));
}

#[test]
fn missing_required_member_reports_its_path() {
    let err = OscalDocument::from_json_str(r#"{"profile": {"uuid": "7a2e5b10-4c3d-4e8f-8a1b-2c3d4e5f6a99"}}"#)
        .unwrap_err();
    match err {
        ModelError::MissingField { path } => assert_eq!(path, "profile.imports"),
        other => panic!("expected missing field, got {other}"),
    }
}

#[test]
fn missing_member_inside_a_list_carries_the_index() {
    let input = json!({
        "profile": {
            "uuid": "7a2e5b10-4c3d-4e8f-8a1b-2c3d4e5f6a99",
            "imports": [{"href": "#catalog", "include-all": {}}, {"include-all": {}}]
        }
    });
    let err = OscalDocument::from_json_str(&input.to_string()).unwrap_err();
    assert_eq!(err.to_string(), "profile.imports[1].href: required field is missing");
}

#[test]
fn trailing_content_is_rejected() {
    let err = OscalDocument::from_json_str(r#"{"profile": {"uuid": "x", "imports": []}} {}"#).unwrap_err();
    assert!(matches!(err, ModelError::Json(_)));
}

#[test]
fn pretty_output_reloads_from_disk() {
    let doc = OscalDocument::from_json_str(
        r#"{"assessment-results": {"uuid": "be6c9f54-8071-4c23-8e5f-6a7b8c9d0e99", "results": []}}"#,
    )
    .expect("parse");
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("ar.json");
    std::fs::write(&path, doc.to_json_pretty().expect("pretty")).expect("write");

    let loaded = load_document_from_file(&path).expect("reload");
    assert_eq!(loaded, doc);
    assert_eq!(loaded.kind_name(), "assessment-results");
}
