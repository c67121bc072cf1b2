//! Record manager: slotted-page tables over the buffer pool.
//!
//! A table lives in one page file. Page 0 (and possibly following pages)
//! hold the table header and serialized schema; the free-space directory
//! chain starts right after the header range and maps each data page to
//! its live-record count; data pages hold fixed-size records in 256-byte
//! slots behind a one-byte live flag.
//!
//! Every page access goes through the table's buffer pool: pin, mutate,
//! mark dirty, unpin. Closing the table shuts the pool down, which flushes
//! dirty pages back to the file.
//!
//! # Example
//!
//! ```no_run
//! use catalog::{Attribute, Schema};
//! use record::Table;
//! use types::{DataType, Value};
//!
//! let schema = Schema::try_new(
//!     vec![Attribute::new("id", DataType::Int), Attribute::string("name", 10)],
//!     vec![0],
//! ).unwrap();
//!
//! Table::create("/tmp/users.tbl", &schema).unwrap();
//! let mut table = Table::open("/tmp/users.tbl").unwrap();
//! let record = table.schema().record_from_values(&[
//!     Value::Int(1),
//!     Value::Str("alice".into()),
//! ]).unwrap();
//! let rid = table.insert(&record).unwrap();
//! assert_eq!(table.get(rid).unwrap().data, record.data);
//! table.close().unwrap();
//! ```

mod layout;
mod scan;
#[cfg(test)]
mod tests;

pub use scan::TableScan;

use buffer::{BufferPool, ReplacementStrategy};
use catalog::Schema;
use common::{Config, DbError, DbResult, PageNum, Record, Rid};
use expr::Expr;
use layout::{
    DIR_ENTRIES_PER_PAGE, DirEntry, HEADER_LEN, NUM_TUPLES_OFFSET, SLOT_SIZE, TableHeader,
    dir_next, init_directory_page, read_u32, set_dir_next, slot_offset, write_u32,
};
use std::path::Path;
use storage::{PAGE_SIZE, PageFile};
use tracing::{debug, trace};

/// An open table: its parsed schema, its buffer pool (which owns the open
/// page file), and the cached header geometry.
#[derive(Debug)]
pub struct Table {
    name: String,
    schema: Schema,
    pool: BufferPool,
    header: TableHeader,
}

impl Table {
    /// Create the page file for a new table and lay down its header,
    /// schema text, and an empty free-space directory.
    ///
    /// A failure part-way through leaves a partial file behind; callers
    /// treat create-then-fail as delete-and-retry.
    pub fn create(path: impl AsRef<Path>, schema: &Schema) -> DbResult<()> {
        let path = path.as_ref();
        let slots_per_record = (schema.record_size() + 1).div_ceil(SLOT_SIZE) as u32;
        if slots_per_record as usize * SLOT_SIZE > PAGE_SIZE {
            return Err(DbError::Schema(format!(
                "record of {} bytes does not fit one data page",
                schema.record_size()
            )));
        }

        let text = schema.serialize();
        let text = text.as_bytes();
        let header_pages = (HEADER_LEN + text.len()).div_ceil(PAGE_SIZE) as u32;

        PageFile::create(path)?;
        let mut file = PageFile::open(path)?;
        file.ensure_capacity(header_pages)?;

        let header = TableHeader {
            header_pages,
            slots_per_record,
            slot_size: SLOT_SIZE as u32,
            num_tuples: 0,
        };

        // Page 0: header fields, then as much schema text as fits.
        let mut page = [0u8; PAGE_SIZE];
        header.encode_into(&mut page);
        let first = text.len().min(PAGE_SIZE - HEADER_LEN);
        page[HEADER_LEN..HEADER_LEN + first].copy_from_slice(&text[..first]);
        file.write_block(0, &page)?;

        // Remaining schema text continues from the start of each page.
        let mut written = first;
        for page_idx in 1..header_pages {
            let mut page = [0u8; PAGE_SIZE];
            let n = (text.len() - written).min(PAGE_SIZE);
            page[..n].copy_from_slice(&text[written..written + n]);
            file.write_block(page_idx, &page)?;
            written += n;
        }

        // Seed the directory chain at page H.
        let dir_page = file.append_empty_block()?;
        let mut page = [0u8; PAGE_SIZE];
        init_directory_page(&mut page);
        file.write_block(dir_page, &page)?;

        debug!(table = %path.display(), attrs = schema.attrs().len(), "created table");
        Ok(())
    }

    /// Open a table with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_with(path, &Config::default())
    }

    /// Open a table, recovering its schema from the header pages.
    pub fn open_with(path: impl AsRef<Path>, config: &Config) -> DbResult<Self> {
        let path = path.as_ref();
        let mut pool = BufferPool::open(path, config.buffer_frames, ReplacementStrategy::Lru)?;

        let (header, mut text_bytes) = {
            let handle = pool.pin(0)?;
            let page = pool.data(&handle);
            let header = TableHeader::decode(page);
            let text = page[HEADER_LEN..].to_vec();
            pool.unpin(handle);
            (header, text)
        };
        for page_idx in 1..header.header_pages {
            let handle = pool.pin(page_idx)?;
            text_bytes.extend_from_slice(pool.data(&handle));
            pool.unpin(handle);
        }

        // Header pages are zero-filled past the text.
        let end = text_bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(text_bytes.len());
        let text = std::str::from_utf8(&text_bytes[..end])
            .map_err(|_| DbError::Schema("schema text in header is not valid UTF-8".into()))?;
        let schema = Schema::parse(text)?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(table = %name, tuples = header.num_tuples, "opened table");
        Ok(Self {
            name,
            schema,
            pool,
            header,
        })
    }

    /// Flush all dirty pages and release the pool and file.
    pub fn close(mut self) -> DbResult<()> {
        self.pool.shutdown()?;
        debug!(table = %self.name, "closed table");
        Ok(())
    }

    /// Remove a table's page file from disk.
    pub fn destroy(path: impl AsRef<Path>) -> DbResult<()> {
        PageFile::destroy(path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The table's buffer pool, exposed for statistics.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Current live-record count, read from the header page.
    pub fn num_tuples(&mut self) -> DbResult<u32> {
        let handle = self.pool.pin(0)?;
        let n = read_u32(self.pool.data(&handle), NUM_TUPLES_OFFSET);
        self.pool.unpin(handle);
        Ok(n)
    }

    /// Insert a record, returning the RID it was placed at.
    pub fn insert(&mut self, record: &Record) -> DbResult<Rid> {
        let body_len = self.check_body(record)?;
        let capacity = self.header.records_per_page();
        let slots = self.header.slots_per_record;

        let (dir_page, entry_idx, entry) = self.find_free_entry(capacity)?;
        let (data_page, live) = match entry {
            DirEntry::Unassigned => (self.pool.file_mut().append_empty_block()?, 0),
            DirEntry::Assigned { page, live } => (page, live),
        };

        // First dead slot on the page; on a page that never saw a delete
        // this is exactly record ordinal `live`.
        let handle = self.pool.pin(data_page)?;
        let ordinal = (0..capacity)
            .find(|k| self.pool.data(&handle)[slot_offset(k * slots)] == 0);
        let Some(ordinal) = ordinal else {
            self.pool.unpin(handle);
            return Err(DbError::Corrupted(format!(
                "directory says data page {data_page} has space but every slot is live"
            )));
        };
        let offset = slot_offset(ordinal * slots);
        let page = self.pool.data_mut(&handle);
        page[offset] = 1;
        page[offset + 1..offset + 1 + body_len].copy_from_slice(&record.data);
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);

        self.write_dir_entry(
            dir_page,
            entry_idx,
            DirEntry::Assigned {
                page: data_page,
                live: live + 1,
            },
        )?;
        self.add_to_num_tuples(1)?;

        let rid = Rid::new(data_page, ordinal * slots);
        trace!(table = %self.name, page = rid.page, slot = rid.slot, "inserted record");
        Ok(rid)
    }

    /// Fetch the record at `rid`.
    ///
    /// # Errors
    ///
    /// `DbError::RecordNotFound` if the slot is dead or the RID is not a
    /// valid record position for this table.
    pub fn get(&mut self, rid: Rid) -> DbResult<Record> {
        self.check_rid(rid)?;
        let body_len = self.schema.record_size();

        let handle = self.pool.pin(rid.page)?;
        let page = self.pool.data(&handle);
        let offset = slot_offset(rid.slot);
        if page[offset] == 0 {
            self.pool.unpin(handle);
            return Err(DbError::RecordNotFound(rid));
        }
        let body = page[offset + 1..offset + 1 + body_len].to_vec();
        self.pool.unpin(handle);

        Ok(Record {
            id: Some(rid),
            data: body,
        })
    }

    /// Overwrite the record at `rid` with `record`'s body. Records are
    /// fixed-size, so the new body must pack to the schema's record size.
    pub fn update(&mut self, rid: Rid, record: &Record) -> DbResult<()> {
        let body_len = self.check_body(record)?;
        self.check_rid(rid)?;

        let handle = self.pool.pin(rid.page)?;
        let offset = slot_offset(rid.slot);
        if self.pool.data(&handle)[offset] == 0 {
            self.pool.unpin(handle);
            return Err(DbError::RecordNotFound(rid));
        }
        let page = self.pool.data_mut(&handle);
        page[offset + 1..offset + 1 + body_len].copy_from_slice(&record.data);
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);
        Ok(())
    }

    /// Delete the record at `rid`: clear its live flag and body, release
    /// its directory count, and decrement the table's tuple count.
    pub fn delete(&mut self, rid: Rid) -> DbResult<()> {
        self.check_rid(rid)?;
        let body_len = self.schema.record_size();

        let handle = self.pool.pin(rid.page)?;
        let offset = slot_offset(rid.slot);
        if self.pool.data(&handle)[offset] == 0 {
            self.pool.unpin(handle);
            return Err(DbError::RecordNotFound(rid));
        }
        let page = self.pool.data_mut(&handle);
        page[offset..offset + 1 + body_len].fill(0);
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);

        self.release_dir_slot(rid.page)?;
        self.add_to_num_tuples(-1)?;
        trace!(table = %self.name, page = rid.page, slot = rid.slot, "deleted record");
        Ok(())
    }

    /// Start a scan over the table's live records. `None` matches every
    /// record; a predicate is evaluated against each candidate.
    pub fn scan(&mut self, predicate: Option<Expr>) -> TableScan<'_> {
        TableScan::new(self, predicate)
    }

    pub(crate) fn first_dir_page(&self) -> PageNum {
        self.header.header_pages
    }

    pub(crate) fn geometry(&self) -> &TableHeader {
        &self.header
    }

    /// Read one directory entry and the page's chain link.
    pub(crate) fn read_dir_entry(
        &mut self,
        dir_page: PageNum,
        idx: usize,
    ) -> DbResult<(DirEntry, Option<PageNum>)> {
        let handle = self.pool.pin(dir_page)?;
        let page = self.pool.data(&handle);
        let entry = DirEntry::decode(page, idx);
        let next = dir_next(page);
        self.pool.unpin(handle);
        Ok((entry, next))
    }

    fn write_dir_entry(&mut self, dir_page: PageNum, idx: usize, entry: DirEntry) -> DbResult<()> {
        let handle = self.pool.pin(dir_page)?;
        entry.encode_into(self.pool.data_mut(&handle), idx);
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);
        Ok(())
    }

    /// Walk the directory chain for the first entry that can still take a
    /// record, growing the chain by one page when it is exhausted.
    fn find_free_entry(&mut self, capacity: u32) -> DbResult<(PageNum, usize, DirEntry)> {
        let mut dir_page = self.first_dir_page();
        loop {
            let (found, next) = {
                let handle = self.pool.pin(dir_page)?;
                let page = self.pool.data(&handle);
                let mut found = None;
                for idx in 0..DIR_ENTRIES_PER_PAGE {
                    match DirEntry::decode(page, idx) {
                        DirEntry::Unassigned => {
                            found = Some((idx, DirEntry::Unassigned));
                            break;
                        }
                        entry @ DirEntry::Assigned { live, .. } if live < capacity => {
                            found = Some((idx, entry));
                            break;
                        }
                        DirEntry::Assigned { .. } => {}
                    }
                }
                let next = dir_next(page);
                self.pool.unpin(handle);
                (found, next)
            };

            if let Some((idx, entry)) = found {
                return Ok((dir_page, idx, entry));
            }
            match next {
                Some(next) => dir_page = next,
                None => dir_page = self.append_directory_page(dir_page)?,
            }
        }
    }

    /// Append a fresh directory page and link it behind the current tail.
    fn append_directory_page(&mut self, tail: PageNum) -> DbResult<PageNum> {
        let new_dir = self.pool.file_mut().append_empty_block()?;

        let handle = self.pool.pin(new_dir)?;
        init_directory_page(self.pool.data_mut(&handle));
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);

        let handle = self.pool.pin(tail)?;
        set_dir_next(self.pool.data_mut(&handle), Some(new_dir));
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);

        trace!(table = %self.name, page = new_dir, "grew directory chain");
        Ok(new_dir)
    }

    /// Decrement the live count of the directory entry describing
    /// `data_page`.
    fn release_dir_slot(&mut self, data_page: PageNum) -> DbResult<()> {
        let mut dir_page = self.first_dir_page();
        loop {
            let (found, next) = {
                let handle = self.pool.pin(dir_page)?;
                let page = self.pool.data(&handle);
                let mut found = None;
                for idx in 0..DIR_ENTRIES_PER_PAGE {
                    if let DirEntry::Assigned { page: p, live } = DirEntry::decode(page, idx) {
                        if p == data_page {
                            found = Some((idx, live));
                            break;
                        }
                    }
                }
                let next = dir_next(page);
                self.pool.unpin(handle);
                (found, next)
            };

            if let Some((idx, live)) = found {
                return self.write_dir_entry(
                    dir_page,
                    idx,
                    DirEntry::Assigned {
                        page: data_page,
                        live: live.saturating_sub(1),
                    },
                );
            }
            match next {
                Some(n) => dir_page = n,
                None => {
                    return Err(DbError::Corrupted(format!(
                        "data page {data_page} is missing from the directory"
                    )));
                }
            }
        }
    }

    /// Adjust the header's tuple count in place.
    fn add_to_num_tuples(&mut self, delta: i32) -> DbResult<()> {
        let handle = self.pool.pin(0)?;
        let page = self.pool.data_mut(&handle);
        let n = read_u32(page, NUM_TUPLES_OFFSET);
        let n = if delta >= 0 {
            n + delta as u32
        } else {
            n.saturating_sub(delta.unsigned_abs())
        };
        write_u32(page, NUM_TUPLES_OFFSET, n);
        self.pool.mark_dirty(&handle);
        self.pool.unpin(handle);
        Ok(())
    }

    fn check_body(&self, record: &Record) -> DbResult<usize> {
        let body_len = self.schema.record_size();
        if record.data.len() != body_len {
            return Err(DbError::Schema(format!(
                "record body is {} bytes, schema packs to {}",
                record.data.len(),
                body_len
            )));
        }
        Ok(body_len)
    }

    /// A RID must point past the header range, at the first slot of a
    /// record position.
    fn check_rid(&self, rid: Rid) -> DbResult<()> {
        let slots = self.header.slots_per_record;
        let valid = rid.page > self.header.header_pages
            && rid.slot % slots == 0
            && rid.slot / slots < self.header.records_per_page();
        if valid {
            Ok(())
        } else {
            Err(DbError::RecordNotFound(rid))
        }
    }
}
