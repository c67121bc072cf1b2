//! Buffer pool manager for page-level caching and I/O.
//!
//! The pool caches a fixed number of page frames for one page file and
//! mediates every page access above the block I/O layer:
//! - pin/unpin with per-frame fix counts; a pinned frame is never evicted
//! - dirty tracking with write-back on eviction, force, or flush
//! - FIFO and LRU replacement driven by a monotonic policy tag
//! - read/write I/O counters and per-frame statistics
//!
//! The pool is single-threaded: every operation takes `&mut self` and runs
//! to completion. Callers serialize externally if they need sharing.
//!
//! # Example
//!
//! ```no_run
//! use buffer::{BufferPool, ReplacementStrategy};
//!
//! let mut pool = BufferPool::open("/tmp/table.pf", 10, ReplacementStrategy::Lru).unwrap();
//! let handle = pool.pin(0).unwrap();
//! pool.data_mut(&handle)[0] = 42;
//! pool.mark_dirty(&handle);
//! pool.unpin(handle);
//! pool.shutdown().unwrap();
//! ```


use common::{DbError, DbResult, PageNum};
use std::fmt;
use std::path::Path;
use storage::{PAGE_SIZE, PageFile};
use tracing::{debug, trace};

/// Page-replacement policies. Only FIFO and LRU select victims; pinning
/// under the remaining strategies fails with `UnsupportedStrategy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplacementStrategy {
    Fifo,
    Lru,
    Clock,
    Lfu,
    LruK,
}

impl fmt::Display for ReplacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplacementStrategy::Fifo => "FIFO",
            ReplacementStrategy::Lru => "LRU",
            ReplacementStrategy::Clock => "CLOCK",
            ReplacementStrategy::Lfu => "LFU",
            ReplacementStrategy::LruK => "LRU-K",
        };
        f.write_str(name)
    }
}

/// Past this point the tag counter is rebased by the minimum live tag,
/// preserving relative order.
const TAG_REBASE_THRESHOLD: u64 = 1 << 30;

/// One slot of the pool, holding at most one cached page.
#[derive(Debug)]
struct Frame {
    /// Page currently cached, `None` while the frame is empty.
    page_num: Option<PageNum>,
    data: Box<[u8; PAGE_SIZE]>,
    /// Whether the frame was mutated since it was loaded or last written.
    dirty: bool,
    /// Outstanding pins; the frame is evictable only at zero.
    fix_count: u32,
    /// Replacement-policy stamp: load order for FIFO, last use for LRU.
    policy_tag: u64,
}

impl Frame {
    fn new() -> Self {
        Self {
            page_num: None,
            data: Box::new([0u8; PAGE_SIZE]),
            dirty: false,
            fix_count: 0,
            policy_tag: 0,
        }
    }

    fn is_evictable(&self) -> bool {
        self.page_num.is_some() && self.fix_count == 0
    }

    fn reset(&mut self) {
        self.page_num = None;
        self.dirty = false;
        self.fix_count = 0;
        self.policy_tag = 0;
    }
}

/// Token for a pinned page. Obtained from `BufferPool::pin` and consumed
/// by `BufferPool::unpin`, so every pin is balanced by construction and a
/// double unpin does not compile. Frame data is reached through the pool
/// while the handle is alive.
#[derive(Debug)]
pub struct PageHandle {
    page_num: PageNum,
    frame_idx: usize,
}

impl PageHandle {
    pub fn page_num(&self) -> PageNum {
        self.page_num
    }
}

/// In-memory cache of page frames bound to one page file.
#[derive(Debug)]
pub struct BufferPool {
    file: PageFile,
    frames: Vec<Frame>,
    strategy: ReplacementStrategy,
    /// Monotonic stamp source for `Frame::policy_tag`.
    timer: u64,
    read_io: u64,
    write_io: u64,
}

impl BufferPool {
    /// Bind a pool of `num_frames` empty frames to an existing page file.
    ///
    /// # Errors
    ///
    /// Returns `DbError::FileNotFound` if the file does not exist.
    ///
    /// # Panics
    ///
    /// Panics if `num_frames` is 0.
    pub fn open(
        path: impl AsRef<Path>,
        num_frames: usize,
        strategy: ReplacementStrategy,
    ) -> DbResult<Self> {
        assert!(num_frames > 0, "num_frames must be > 0");
        let file = PageFile::open(path)?;
        let frames = (0..num_frames).map(|_| Frame::new()).collect();
        Ok(Self {
            file,
            frames,
            strategy,
            timer: 0,
            read_io: 0,
            write_io: 0,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    /// The underlying page file. The record manager appends data and
    /// directory pages through this accessor.
    pub fn file(&self) -> &PageFile {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut PageFile {
        &mut self.file
    }

    /// Pin `page_num`, loading it from disk if it is not cached.
    ///
    /// On return the page's frame has its fix count raised by one; access
    /// the bytes with `data`/`data_mut` and release with `unpin`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedStrategy` for strategies without victim selection
    /// - `NoVictim` when every frame is pinned
    /// - block I/O errors propagate unchanged
    pub fn pin(&mut self, page_num: PageNum) -> DbResult<PageHandle> {
        if !matches!(
            self.strategy,
            ReplacementStrategy::Fifo | ReplacementStrategy::Lru
        ) {
            return Err(DbError::UnsupportedStrategy(self.strategy.to_string()));
        }

        // Cache hit: bump the fix count; only LRU refreshes the tag.
        if let Some(idx) = self
            .frames
            .iter()
            .position(|f| f.page_num == Some(page_num))
        {
            self.frames[idx].fix_count += 1;
            if self.strategy == ReplacementStrategy::Lru {
                self.stamp(idx);
            }
            return Ok(PageHandle {
                page_num,
                frame_idx: idx,
            });
        }

        // Miss: take an empty frame, or make one by evicting a victim.
        let idx = match self.frames.iter().position(|f| f.page_num.is_none()) {
            Some(idx) => idx,
            None => self.evict_victim()?,
        };
        self.load_into(idx, page_num)?;

        Ok(PageHandle {
            page_num,
            frame_idx: idx,
        })
    }

    /// Release one pin on the handle's page.
    pub fn unpin(&mut self, handle: PageHandle) {
        let frame = &mut self.frames[handle.frame_idx];
        debug_assert_eq!(frame.page_num, Some(handle.page_num));
        frame.fix_count = frame.fix_count.saturating_sub(1);
    }

    /// Flag the handle's page as mutated; it will be written back at the
    /// next flush, force, or eviction of its frame.
    pub fn mark_dirty(&mut self, handle: &PageHandle) {
        self.frames[handle.frame_idx].dirty = true;
    }

    /// Write the handle's page to disk now and clear its dirty flag. The
    /// caller keeps its pin.
    pub fn force_page(&mut self, handle: &PageHandle) -> DbResult<()> {
        self.write_frame(handle.frame_idx)
    }

    /// Write every dirty, unpinned frame back to disk. Pinned frames are
    /// skipped and stay dirty.
    pub fn force_flush(&mut self) -> DbResult<()> {
        for idx in 0..self.frames.len() {
            if self.frames[idx].dirty && self.frames[idx].fix_count == 0 {
                self.write_frame(idx)?;
            }
        }
        Ok(())
    }

    /// Flush all dirty pages and empty every frame.
    ///
    /// # Errors
    ///
    /// Returns `DbError::PinnedPagesRemain` (leaving the pool untouched)
    /// if any frame still has an outstanding pin.
    pub fn shutdown(&mut self) -> DbResult<()> {
        let pinned = self.frames.iter().filter(|f| f.fix_count > 0).count();
        if pinned > 0 {
            return Err(DbError::PinnedPagesRemain(pinned));
        }
        self.force_flush()?;
        for frame in &mut self.frames {
            frame.reset();
        }
        debug!(file = %self.file.path().display(), "buffer pool shut down");
        Ok(())
    }

    /// Read access to the pinned page's bytes.
    pub fn data(&self, handle: &PageHandle) -> &[u8; PAGE_SIZE] {
        &self.frames[handle.frame_idx].data
    }

    /// Write access to the pinned page's bytes. Mutations are not flagged
    /// automatically; call `mark_dirty` as well.
    pub fn data_mut(&mut self, handle: &PageHandle) -> &mut [u8; PAGE_SIZE] {
        &mut self.frames[handle.frame_idx].data
    }

    /// Per-frame cached page numbers, `None` for empty frames.
    pub fn frame_contents(&self) -> Vec<Option<PageNum>> {
        self.frames.iter().map(|f| f.page_num).collect()
    }

    /// Per-frame dirty flags.
    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.dirty).collect()
    }

    /// Per-frame fix counts.
    pub fn fix_counts(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.fix_count).collect()
    }

    /// Pages read from disk since the pool was opened.
    pub fn read_io(&self) -> u64 {
        self.read_io
    }

    /// Pages written to disk since the pool was opened.
    pub fn write_io(&self) -> u64 {
        self.write_io
    }

    /// Snapshot of the pool state.
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            num_frames: self.frames.len(),
            pages_cached: self.frames.iter().filter(|f| f.page_num.is_some()).count(),
            dirty_pages: self.frames.iter().filter(|f| f.dirty).count(),
            pinned_pages: self.frames.iter().filter(|f| f.fix_count > 0).count(),
            read_io: self.read_io,
            write_io: self.write_io,
        }
    }

    /// Load `page_num` from disk into the (empty) frame at `idx` and pin it
    /// once. The frame is left empty if the read fails.
    fn load_into(&mut self, idx: usize, page_num: PageNum) -> DbResult<()> {
        let frame = &mut self.frames[idx];
        if let Err(err) = self.file.read_block(page_num, &mut frame.data) {
            frame.reset();
            return Err(err);
        }
        frame.page_num = Some(page_num);
        frame.dirty = false;
        frame.fix_count = 1;
        self.read_io += 1;
        self.stamp(idx);
        trace!(page = page_num, frame = idx, "loaded page");
        Ok(())
    }

    /// Select the evictable frame with the smallest policy tag (ties go to
    /// the lower frame index), write it back if dirty, and empty it.
    fn evict_victim(&mut self) -> DbResult<usize> {
        let victim = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_evictable())
            .min_by_key(|(_, f)| f.policy_tag)
            .map(|(idx, _)| idx)
            .ok_or(DbError::NoVictim)?;

        if self.frames[victim].dirty {
            self.write_frame(victim)?;
        }
        trace!(
            page = ?self.frames[victim].page_num,
            frame = victim,
            "evicting page"
        );
        self.frames[victim].reset();
        Ok(victim)
    }

    fn write_frame(&mut self, idx: usize) -> DbResult<()> {
        let frame = &mut self.frames[idx];
        if let Some(page_num) = frame.page_num {
            self.file.write_block(page_num, &frame.data)?;
            frame.dirty = false;
            self.write_io += 1;
        }
        Ok(())
    }

    /// Stamp frame `idx` with the next tag, rebasing the counter when it
    /// crosses the threshold.
    fn stamp(&mut self, idx: usize) {
        self.frames[idx].policy_tag = self.timer;
        self.timer += 1;
        if self.timer > TAG_REBASE_THRESHOLD {
            self.rebase_tags();
        }
    }

    fn rebase_tags(&mut self) {
        let min = self
            .frames
            .iter()
            .filter(|f| f.page_num.is_some())
            .map(|f| f.policy_tag)
            .min()
            .unwrap_or(self.timer);
        self.timer -= min;
        for frame in self.frames.iter_mut().filter(|f| f.page_num.is_some()) {
            frame.policy_tag -= min;
        }
    }
}

/// Statistics about the pool at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub num_frames: usize,
    pub pages_cached: usize,
    pub dirty_pages: usize,
    pub pinned_pages: usize,
    pub read_io: u64,
    pub write_io: u64,
}
