mod common;

use _core::{FieldTestError, FormStatus, MemoryStore, Partition};

use common::*;

fn completed_form(model: &_core::FieldTestModel<MemoryStore>) -> String {
    let form = model.create_form(&jordan(), details("Clay-A")).unwrap();
    model.submit_test(&form.form_id, &moisture("200", "180")).unwrap();
    model
        .submit_test(&form.form_id, &deflection(&["0.5"]))
        .unwrap();
    model.complete_form(&form.form_id).unwrap();
    form.form_id
}

#[test]
fn test_archiving_pending_form_is_invalid_state() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let form = model.create_form(&jordan(), details("Clay-A")).unwrap();
    model.submit_test(&form.form_id, &moisture("200", "180")).unwrap();
    let pending = model
        .submit_test(&form.form_id, &deflection(&["0.5"]))
        .unwrap();
    assert_eq!(pending.status, FormStatus::Pending);

    let err = model.archive_forms(&[form.form_id.as_str()]).unwrap_err();
    assert!(matches!(err, FieldTestError::InvalidState(_)));

    let (after, partition) = model.locate_form(&form.form_id).unwrap();
    assert_eq!(partition, Partition::Active);
    assert_eq!(after, pending);
}

#[test]
fn test_one_ineligible_form_blocks_the_batch() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let done = completed_form(&model);
    let open = model.create_form(&jordan(), details("Clay-A")).unwrap();

    assert!(model.archive_forms(&[done.as_str(), open.form_id.as_str()]).is_err());
    assert_eq!(model.locate_form(&done).unwrap().1, Partition::Active);
}

#[test]
fn test_archived_forms_move_with_tests_and_are_read_only() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let done = completed_form(&model);
    let closed = model.create_form(&jordan(), details("Clay-A")).unwrap();
    model.close_form(&closed.form_id, "Duplicate visit").unwrap();

    model.archive_forms(&[done.as_str(), closed.form_id.as_str()]).unwrap();

    assert!(model.list_forms(Partition::Active, "").unwrap().is_empty());
    let archived = model.list_forms(Partition::Archived, "").unwrap();
    assert_eq!(archived.len(), 2);
    assert_eq!(model.tests(&done).unwrap().len(), 2);

    assert!(matches!(
        model.archive_forms(&[done.as_str()]),
        Err(FieldTestError::ReadOnlyArchive(_))
    ));
    assert!(matches!(
        model.submit_test(&closed.form_id, &moisture("200", "180")),
        Err(FieldTestError::ReadOnlyArchive(_))
    ));
    assert!(matches!(
        model.close_form(&done, "again"),
        Err(FieldTestError::ReadOnlyArchive(_))
    ));
    assert!(matches!(
        model.complete_form(&done),
        Err(FieldTestError::ReadOnlyArchive(_))
    ));

    // The report view still resolves archived forms.
    let view = model.resolved_form(&done).unwrap();
    assert_eq!(view.partition, Partition::Archived);
}

#[test]
fn test_repeated_id_in_batch_archives_once() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let done = completed_form(&model);

    model.archive_forms(&[done.as_str(), done.as_str()]).unwrap();

    let (form, partition) = model.locate_form(&done).unwrap();
    assert_eq!(partition, Partition::Archived);
    assert_eq!(form.status, FormStatus::Complete);
    assert!(model.list_forms(Partition::Active, "").unwrap().is_empty());
}

#[test]
fn test_archived_ids_are_not_reused() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let first = completed_form(&model);
    model.archive_forms(&[first.as_str()]).unwrap();

    let next = model.create_form(&jordan(), details("Clay-A")).unwrap();
    assert_ne!(next.form_id, first);
    assert_eq!(next.form_id, "FJL20240601_0830_2");
}

#[test]
fn test_archive_curve_is_a_move() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let grant = model.authorize_admin(ADMIN).unwrap();
    let original = model.curves().get("Clay-A", Partition::Active).unwrap();

    model.archive_curve(&grant, "Clay-A").unwrap();

    assert!(matches!(
        model.curves().get("Clay-A", Partition::Active),
        Err(FieldTestError::NotFound(_))
    ));
    assert_eq!(
        model.curves().get("Clay-A", Partition::Archived).unwrap(),
        original
    );

    assert!(matches!(
        model.archive_curve(&grant, "Clay-A"),
        Err(FieldTestError::ReadOnlyArchive(_))
    ));
    assert!(matches!(
        model.create_curve(&grant, &clay_curve("Clay-A")),
        Err(FieldTestError::DuplicateName(_))
    ));
    assert!(matches!(
        model.archive_curve(&grant, "Missing"),
        Err(FieldTestError::NotFound(_))
    ));
}

#[test]
fn test_curve_in_use_by_open_form() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    let grant = model.authorize_admin(ADMIN).unwrap();
    let form = model.create_form(&jordan(), details("Clay-A")).unwrap();

    assert!(matches!(
        model.archive_curve(&grant, "Clay-A"),
        Err(FieldTestError::CurveInUse(_))
    ));
    assert!(model.curves().exists("Clay-A", Partition::Active).unwrap());

    model.close_form(&form.form_id, "Cancelled").unwrap();
    model.archive_curve(&grant, "Clay-A").unwrap();

    // New forms can no longer pick the archived curve.
    assert!(matches!(
        model.create_form(&jordan(), details("Clay-A")),
        Err(FieldTestError::MissingCurve(_))
    ));
}

#[test]
fn test_curve_search_and_duplicate_names() {
    let (model, _clock) = engine(MemoryStore::new());
    add_curve(&model, "Clay-A");
    add_curve(&model, "Sand-B");
    let grant = model.authorize_admin(ADMIN).unwrap();

    assert!(matches!(
        model.create_curve(&grant, &clay_curve("Clay-A")),
        Err(FieldTestError::DuplicateName(_))
    ));

    let hits = model.curves().search(Partition::Active, "sand").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Sand-B");
    assert_eq!(
        model.curves().search(Partition::Active, "ngi-7").unwrap().len(),
        2
    );

    let mut bad = clay_curve("Clay-C");
    bad.lower_limit = "3".into();
    assert!(matches!(
        model.create_curve(&grant, &bad),
        Err(FieldTestError::Validation { .. })
    ));
}
