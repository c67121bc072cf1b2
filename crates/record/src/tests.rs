use super::*;
use common::pretty::{TableStyleKind, render_rows};
use pretty_assertions::assert_eq;
use testsupport::prelude::*;
use types::Value;

#[test]
fn create_and_open_round_trips_schema() {
    let (_dir, path) = scratch_table("users.tbl");
    let schema = employee_schema();

    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    assert_eq!(table.schema(), &schema);
    assert_eq!(table.name(), "users");
    assert_eq!(table.num_tuples().unwrap(), 0);
    table.close().unwrap();
}

#[test]
fn open_missing_table_fails() {
    let (_dir, path) = scratch_table("absent.tbl");
    assert!(matches!(
        Table::open(&path).unwrap_err(),
        DbError::FileNotFound(_)
    ));
}

#[test]
fn create_rejects_records_larger_than_a_page() {
    let (_dir, path) = scratch_table("wide.tbl");
    let schema = wide_schema(5000);
    assert!(matches!(
        Table::create(&path, &schema).unwrap_err(),
        DbError::Schema(_)
    ));
}

#[test]
fn insert_then_get_returns_identical_bytes() {
    // Thirty deterministic records; every returned RID reads back the
    // exact bytes that went in.
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let mut rids = Vec::new();
    for i in 0..30 {
        let record = employee_record(&schema, i);
        let rid = table.insert(&record).unwrap();
        rids.push((rid, record));
    }

    assert_eq!(table.num_tuples().unwrap(), 30);

    for (rid, record) in &rids {
        let got = table.get(*rid).unwrap();
        assert_eq!(got.data, record.data);
        assert_eq!(got.id, Some(*rid));
    }

    // 16 records fit one data page (18-byte bodies in single slots), so
    // the batch spans two data pages.
    assert_eq!(rids[0].0, Rid::new(2, 0));
    assert_eq!(rids[15].0, Rid::new(2, 15));
    assert_eq!(rids[16].0, Rid::new(3, 0));
    table.close().unwrap();
}

#[test]
fn delete_then_get_reports_missing_record() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let rid = table.insert(&employee_record(&schema, 1)).unwrap();
    table.delete(rid).unwrap();

    assert!(matches!(
        table.get(rid).unwrap_err(),
        DbError::RecordNotFound(_)
    ));
    assert!(matches!(
        table.delete(rid).unwrap_err(),
        DbError::RecordNotFound(_)
    ));
    assert_eq!(table.num_tuples().unwrap(), 0);
    table.close().unwrap();
}

#[test]
fn delete_then_scan_with_predicate() {
    // Insert 30, delete the multiples of three, and scan for id < 15:
    // exactly the ten surviving small ids come back in RID order.
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let mut rids = Vec::new();
    for i in 0..30 {
        rids.push(table.insert(&employee_record(&schema, i)).unwrap());
    }
    for (i, rid) in rids.iter().enumerate() {
        if i % 3 == 0 {
            table.delete(*rid).unwrap();
        }
    }
    assert_eq!(table.num_tuples().unwrap(), 20);

    let mut scan = table.scan(Some(int_lt("id", 15)));
    let mut ids = Vec::new();
    let mut seen_rids = Vec::new();
    while let Some(record) = scan.next().unwrap() {
        let Value::Int(id) = schema.get_attr(&record, 0).unwrap() else {
            panic!("id must decode as INT");
        };
        ids.push(id);
        seen_rids.push(record.id.unwrap());
    }

    assert_eq!(ids, vec![1, 2, 4, 5, 7, 8, 10, 11, 13, 14]);
    let mut sorted = seen_rids.clone();
    sorted.sort_by_key(|rid| (rid.page, rid.slot));
    assert_eq!(seen_rids, sorted);
    table.close().unwrap();
}

#[test]
fn tuple_count_matches_live_records() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let mut rids = Vec::new();
    for i in 0..20 {
        rids.push(table.insert(&employee_record(&schema, i)).unwrap());
    }
    for rid in &rids[0..5] {
        table.delete(*rid).unwrap();
    }

    let live = table.scan(None).collect_records().unwrap().len() as u32;
    assert_eq!(live, table.num_tuples().unwrap());
    assert_eq!(live, 15);
    table.close().unwrap();
}

#[test]
fn update_overwrites_in_place() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let rid = table.insert(&employee_record(&schema, 1)).unwrap();
    let replacement = schema
        .record_from_values(&[
            Value::Int(99),
            Value::Str("renamed".into()),
            Value::Float(0.5),
        ])
        .unwrap();
    table.update(rid, &replacement).unwrap();

    let got = table.get(rid).unwrap();
    assert_eq!(got.data, replacement.data);
    // Updating in place never changes the tuple count.
    assert_eq!(table.num_tuples().unwrap(), 1);

    let short = Record::new(vec![0u8; 3]);
    assert!(matches!(
        table.update(rid, &short).unwrap_err(),
        DbError::Schema(_)
    ));

    table.delete(rid).unwrap();
    assert!(matches!(
        table.update(rid, &replacement).unwrap_err(),
        DbError::RecordNotFound(_)
    ));
    table.close().unwrap();
}

#[test]
fn deleted_slots_are_reused() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let _first = table.insert(&employee_record(&schema, 0)).unwrap();
    let second = table.insert(&employee_record(&schema, 1)).unwrap();
    let _third = table.insert(&employee_record(&schema, 2)).unwrap();

    table.delete(second).unwrap();
    let replacement = table.insert(&employee_record(&schema, 9)).unwrap();

    // The hole in the middle of the page is the first free slot again.
    assert_eq!(replacement, second);
    assert_eq!(table.num_tuples().unwrap(), 3);
    table.close().unwrap();
}

#[test]
fn scan_without_predicate_visits_every_live_record() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    for i in 0..5 {
        table.insert(&employee_record(&schema, i)).unwrap();
    }

    let records = table.scan(None).collect_records().unwrap();
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(
            schema.get_attr(record, 0).unwrap(),
            Value::Int(i as i32)
        );
    }
    table.close().unwrap();
}

#[test]
fn scan_on_empty_table_stays_exhausted() {
    let (_dir, path) = scratch_table("emp.tbl");
    Table::create(&path, &employee_schema()).unwrap();
    let mut table = Table::open(&path).unwrap();

    let mut scan = table.scan(None);
    assert_eq!(scan.next().unwrap(), None);
    // Every call after exhaustion keeps reporting the end of the table.
    assert_eq!(scan.next().unwrap(), None);
    assert_eq!(scan.next().unwrap(), None);
    drop(scan);
    table.close().unwrap();
}

#[test]
fn scan_releases_every_pin() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    for i in 0..10 {
        table.insert(&employee_record(&schema, i)).unwrap();
    }
    let matched = table
        .scan(Some(int_eq("id", 7)))
        .collect_records()
        .unwrap();
    assert_eq!(matched.len(), 1);

    assert!(table.pool().fix_counts().iter().all(|fc| *fc == 0));
    // A pin-free pool shuts down cleanly.
    table.close().unwrap();
}

#[test]
fn scan_propagates_predicate_type_errors() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();
    table.insert(&employee_record(&schema, 1)).unwrap();

    // `id` alone is an INT, not a boolean predicate.
    let mut scan = table.scan(Some(Expr::attr("id")));
    assert!(matches!(scan.next().unwrap_err(), DbError::Expr(_)));
    drop(scan);

    assert!(table.pool().fix_counts().iter().all(|fc| *fc == 0));
    table.close().unwrap();
}

#[test]
fn multi_slot_records_round_trip() {
    // 304-byte bodies occupy two slots each; eight records per page.
    let (_dir, path) = scratch_table("wide.tbl");
    let schema = wide_schema(300);
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let mut rids = Vec::new();
    for i in 0..10 {
        let record = schema
            .record_from_values(&[
                Value::Int(i),
                Value::Str(format!("payload_{i}").repeat(5)),
            ])
            .unwrap();
        rids.push((table.insert(&record).unwrap(), record));
    }

    // Records start on even slot boundaries.
    assert_eq!(rids[0].0.slot, 0);
    assert_eq!(rids[1].0.slot, 2);
    // Eight records fill the first data page; the ninth opens another.
    assert_ne!(rids[8].0.page, rids[0].0.page);

    for (rid, record) in &rids {
        assert_eq!(table.get(*rid).unwrap().data, record.data);
    }
    table.close().unwrap();
}

#[test]
fn tuple_count_persists_across_reopen() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();

    let rid = {
        let mut table = Table::open(&path).unwrap();
        let mut rid = None;
        for i in 0..5 {
            rid = Some(table.insert(&employee_record(&schema, i)).unwrap());
        }
        table.close().unwrap();
        rid.unwrap()
    };

    let mut table = Table::open(&path).unwrap();
    assert_eq!(table.num_tuples().unwrap(), 5);
    let got = table.get(rid).unwrap();
    assert_eq!(schema.get_attr(&got, 0).unwrap(), Value::Int(4));
    table.close().unwrap();
}

#[test]
fn directory_chain_grows_past_one_page() {
    // Two records per data page (eight-slot records): 1022 records fill
    // all 511 entries of the first directory page, so the 1023rd insert
    // links a second directory page.
    let (_dir, path) = scratch_table("big.tbl");
    let schema = wide_schema(1800);
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    let total = 1025;
    let mut rids = Vec::new();
    for i in 0..total {
        let record = schema
            .record_from_values(&[Value::Int(i), Value::Str(format!("r{i}"))])
            .unwrap();
        rids.push(table.insert(&record).unwrap());
    }

    assert_eq!(table.num_tuples().unwrap(), total as u32);

    // Spot-check records on both sides of the directory boundary.
    for &i in &[0usize, 1021, 1022, 1024] {
        let got = table.get(rids[i]).unwrap();
        assert_eq!(schema.get_attr(&got, 0).unwrap(), Value::Int(i as i32));
    }

    let live = table.scan(None).collect_records().unwrap().len();
    assert_eq!(live, total as usize);
    table.close().unwrap();
}

#[test]
fn schema_text_spanning_header_pages_round_trips() {
    // Five hundred columns push the serialized schema well past one page,
    // so the header range grows and the directory moves with it.
    let (_dir, path) = scratch_table("manycols.tbl");
    let attrs: Vec<catalog::Attribute> = (0..500)
        .map(|i| catalog::Attribute::new(format!("col{i}"), types::DataType::Int))
        .collect();
    let schema = catalog::Schema::try_new(attrs, vec![0, 499]).unwrap();

    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();
    assert_eq!(table.schema(), &schema);

    let values: Vec<Value> = (0..500).map(Value::Int).collect();
    let record = schema.record_from_values(&values).unwrap();
    let rid = table.insert(&record).unwrap();
    assert_eq!(table.get(rid).unwrap().data, record.data);
    table.close().unwrap();
}

#[test]
fn destroy_removes_the_table_file() {
    let (_dir, path) = scratch_table("gone.tbl");
    Table::create(&path, &employee_schema()).unwrap();
    Table::destroy(&path).unwrap();
    assert!(matches!(
        Table::open(&path).unwrap_err(),
        DbError::FileNotFound(_)
    ));
}

#[test]
fn bogus_rids_are_rejected() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();
    let rid = table.insert(&employee_record(&schema, 1)).unwrap();

    // Header page and out-of-range slot positions.
    for bogus in [
        Rid::new(0, 0),
        Rid::new(rid.page, rid.slot + 17),
        Rid::new(rid.page, 4096),
    ] {
        assert!(matches!(
            table.get(bogus).unwrap_err(),
            DbError::RecordNotFound(_)
        ));
    }
    table.close().unwrap();
}

#[test]
fn scan_results_render_as_a_table() {
    let (_dir, path) = scratch_table("emp.tbl");
    let schema = employee_schema();
    Table::create(&path, &schema).unwrap();
    let mut table = Table::open(&path).unwrap();

    for i in 0..3 {
        table.insert(&employee_record(&schema, i)).unwrap();
    }

    let rows: Vec<Vec<Value>> = table
        .scan(None)
        .collect_records()
        .unwrap()
        .iter()
        .map(|record| schema.values(record).unwrap())
        .collect();
    let rendered = render_rows(&schema.attr_names(), &rows, TableStyleKind::Ascii);

    assert!(rendered.contains("name_1"));
    assert!(rendered.contains("salary"));
    table.close().unwrap();
}
