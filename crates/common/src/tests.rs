use super::*;
use crate::pretty::{TableStyleKind, render_rows};
use pretty_assertions::assert_eq;
use types::Value;

#[test]
fn record_builders() {
    let rec = Record::zeroed(8);
    assert_eq!(rec.data, vec![0u8; 8]);
    assert_eq!(rec.id, None);

    let rid = Rid::new(3, 2);
    let rec = rec.with_rid(rid);
    assert_eq!(rec.id, Some(rid));
}

#[test]
fn config_defaults_and_builder() {
    assert_eq!(Config::default().buffer_frames, 10);
    assert_eq!(Config::builder().build().buffer_frames, 10);
    assert_eq!(Config::builder().buffer_frames(3).build().buffer_frames, 3);
}

#[test]
fn error_messages_name_the_failure() {
    let err = DbError::ReadNonExistingPage { page: 9, total: 4 };
    assert_eq!(err.to_string(), "read of non-existing page 9 (file has 4 pages)");

    let err = DbError::RecordNotFound(Rid::new(1, 0));
    assert!(err.to_string().contains("does not exist"));

    let err = DbError::PinnedPagesRemain(2);
    assert!(err.to_string().contains("2 page(s) still pinned"));
}

#[test]
fn render_rows_plain_style() {
    let columns = vec!["id".to_string(), "name".to_string()];
    let rows = vec![
        vec![Value::Int(1), Value::Str("alice".into())],
        vec![Value::Int(2), Value::Str("bob".into())],
    ];

    let out = render_rows(&columns, &rows, TableStyleKind::Plain);
    assert!(out.contains("id"));
    assert!(out.contains("alice"));
    assert!(out.contains("bob"));
}

#[test]
fn render_rows_empty_is_placeholder() {
    assert_eq!(render_rows(&[], &[], TableStyleKind::Modern), "<empty>");
}
