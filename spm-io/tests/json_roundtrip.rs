use spm_core::document::{Document, Entity, TypedValue};
use spm_core::geometry::Point2;
use spm_io::{DocumentLoader, DocumentSaver, IoError, JsonFacade};

fn sample() -> Document {
    let mut doc = Document::new();
    let line = doc.add_line(Point2::new(0.0, 0.0), Point2::new(400.0, 0.0), "Stringer");
    doc.write_record(
        line,
        "Stringer",
        &[
            TypedValue::Real(100.0),
            TypedValue::Real(250.0),
            TypedValue::Integer(2),
            TypedValue::Real(10.0),
            TypedValue::Real(500.0),
            TypedValue::Real(210_000.0),
        ],
        true,
    );
    let label = doc.add_text(Point2::new(1.0, 1.0), "5.00 kN", 30.0, 0.0, "ForceText");
    doc.write_record(label, "Owner", &[TypedValue::Handle(line.get())], true);
    doc.write_named(
        "CrossSection:100.000x250.000",
        &[TypedValue::Real(100.0), TypedValue::Real(250.0)],
        false,
    );
    doc
}

#[test]
fn saved_drawing_keeps_records_and_ids() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("frame.json");
    let facade = JsonFacade::new();
    let original = sample();

    facade.save(&original, &path).expect("save drawing");
    let loaded = facade.load(&path).expect("load drawing");

    let ids: Vec<u64> = original.entities().map(|(id, _)| id.get()).collect();
    let loaded_ids: Vec<u64> = loaded.entities().map(|(id, _)| id.get()).collect();
    assert_eq!(ids, loaded_ids);

    let (line, _) = loaded
        .entities()
        .find(|(_, entity)| matches!(entity, Entity::Line(_)))
        .expect("line survives");
    let handle = loaded.dictionary_handle(*line).expect("dictionary survives");
    assert_eq!(
        loaded.read_record(handle, "Stringer").map(<[_]>::len),
        Some(6)
    );
    assert_eq!(
        loaded.read_named("CrossSection:100.000x250.000"),
        Some(&[TypedValue::Real(100.0), TypedValue::Real(250.0)][..])
    );
}

#[test]
fn new_entities_after_reload_get_fresh_ids() {
    let facade = JsonFacade::new();
    let original = sample();
    let data = facade.to_json(&original).expect("serialize");
    let mut loaded = facade.parse_str(&data).expect("deserialize");

    let max = original.entities().map(|(id, _)| id.get()).max().unwrap();
    let fresh = loaded.add_point(Point2::new(0.0, 0.0), "ExtNode");
    assert!(fresh.get() > max);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = JsonFacade::new()
        .load(&dir.path().join("absent.json"))
        .expect_err("load should fail");
    assert!(matches!(err, IoError::ReadError { .. }));
}
