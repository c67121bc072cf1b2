//! Predicate scans over a table's live records.

use crate::Table;
use crate::layout::{DIR_ENTRIES_PER_PAGE, DirEntry};
use common::{DbError, DbResult, Record, Rid};
use expr::{EvalContext, Expr};

/// Cursor over a table's records in ascending RID order.
///
/// The cursor walks the free-space directory entry by entry and each data
/// page slot by slot, skipping dead slots and records the predicate
/// rejects. The first unassigned directory entry ends the scan (entries
/// are assigned in order). Dropping the scan closes it; calling `next`
/// after exhaustion keeps returning `Ok(None)`.
#[derive(Debug)]
pub struct TableScan<'a> {
    table: &'a mut Table,
    predicate: Option<Expr>,
    dir_page: common::PageNum,
    entry_idx: usize,
    /// Record ordinal within the current data page.
    ordinal: u32,
    exhausted: bool,
}

impl<'a> TableScan<'a> {
    pub(crate) fn new(table: &'a mut Table, predicate: Option<Expr>) -> Self {
        let dir_page = table.first_dir_page();
        Self {
            table,
            predicate,
            dir_page,
            entry_idx: 0,
            ordinal: 0,
            exhausted: false,
        }
    }

    /// Produce the next record the predicate accepts, or `Ok(None)` once
    /// the table is exhausted.
    pub fn next(&mut self) -> DbResult<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        let capacity = self.table.geometry().records_per_page();
        let slots = self.table.geometry().slots_per_record;

        loop {
            if self.entry_idx >= DIR_ENTRIES_PER_PAGE {
                let (_, next) = self.table.read_dir_entry(self.dir_page, 0)?;
                match next {
                    Some(next) => {
                        self.dir_page = next;
                        self.entry_idx = 0;
                        self.ordinal = 0;
                        continue;
                    }
                    None => {
                        self.exhausted = true;
                        return Ok(None);
                    }
                }
            }

            let (entry, _) = self.table.read_dir_entry(self.dir_page, self.entry_idx)?;
            let DirEntry::Assigned { page, .. } = entry else {
                self.exhausted = true;
                return Ok(None);
            };

            while self.ordinal < capacity {
                let rid = Rid::new(page, self.ordinal * slots);
                self.ordinal += 1;

                let record = match self.table.get(rid) {
                    Ok(record) => record,
                    Err(DbError::RecordNotFound(_)) => continue,
                    Err(err) => return Err(err),
                };
                let ctx = EvalContext::new(self.table.schema());
                if ctx.eval_predicate(self.predicate.as_ref(), &record)? {
                    return Ok(Some(record));
                }
            }

            self.entry_idx += 1;
            self.ordinal = 0;
        }
    }

    /// Drain the scan into a vector.
    pub fn collect_records(&mut self) -> DbResult<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(record) = self.next()? {
            out.push(record);
        }
        Ok(out)
    }
}
