//! Common test fixtures and data generators.

use catalog::{Attribute, Schema};
use common::Record;
use expr::{BinaryOp, Expr};
use std::path::PathBuf;
use tempfile::TempDir;
use types::{DataType, Value};

/// The canonical three-column test schema:
/// `(id: INT, name: STRING[10], salary: FLOAT)` with key `id`.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let schema = employee_schema();
/// assert_eq!(schema.record_size(), 18);
/// ```
pub fn employee_schema() -> Schema {
    Schema::try_new(
        vec![
            Attribute::new("id", DataType::Int),
            Attribute::string("name", 10),
            Attribute::new("salary", DataType::Float),
        ],
        vec![0],
    )
    .unwrap()
}

/// Deterministic employee tuple `(i, "name_<i>", i * 1.5)`.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
/// use types::Value;
///
/// let rec = employee_record(&employee_schema(), 4);
/// assert_eq!(
///     employee_schema().get_attr(&rec, 1).unwrap(),
///     Value::Str("name_4".into())
/// );
/// ```
pub fn employee_record(schema: &Schema, i: i32) -> Record {
    schema
        .record_from_values(&[
            Value::Int(i),
            Value::Str(format!("name_{i}")),
            Value::Float(i as f32 * 1.5),
        ])
        .unwrap()
}

/// A schema whose records span multiple 256-byte slots.
pub fn wide_schema(text_capacity: u32) -> Schema {
    Schema::try_new(
        vec![
            Attribute::new("id", DataType::Int),
            Attribute::string("payload", text_capacity),
        ],
        vec![0],
    )
    .unwrap()
}

/// Integer comparison predicate `attr < value`.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let pred = int_lt("id", 15);
/// ```
pub fn int_lt(attr: &str, value: i32) -> Expr {
    Expr::binary(Expr::attr(attr), BinaryOp::Lt, Expr::literal(Value::Int(value)))
}

/// Integer equality predicate `attr == value`.
pub fn int_eq(attr: &str, value: i32) -> Expr {
    Expr::binary(Expr::attr(attr), BinaryOp::Eq, Expr::literal(Value::Int(value)))
}

/// A scratch location for a table's page file inside a fresh tempdir.
/// Keep the `TempDir` alive for as long as the file is in use.
pub fn scratch_table(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}
