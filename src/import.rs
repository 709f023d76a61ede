//! Dump import
//!
//! Every import becomes a new generation. Inserts are committed in batches;
//! if a record cannot be parsed the import stops, keeping earlier batches.

use std::io::BufRead;

use crate::object::ObjectRecord;
use crate::storage::MemStore;
use crate::Result;

/// Default number of objects per committed batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Counts describing what an import read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub generation: u32,
    pub objects: usize,
    pub refs: usize,
    pub bytes: u64,
    /// Edges added from the root to otherwise unreferenced objects
    pub roots: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} objects and {} references totalling {} bytes",
            crate::ui::human_count(self.objects as u64),
            crate::ui::human_count(self.refs as u64),
            crate::ui::human_count(self.bytes),
        )
    }
}

/// Imports newline-delimited dump records into a fresh generation
pub struct Importer<'a> {
    store: &'a MemStore,
    batch_size: usize,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a MemStore) -> Self {
        Self { store, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Read every record from `reader`.
    ///
    /// `progress` is called after each committed batch with the running totals.
    pub fn run<R: BufRead>(
        &self,
        reader: R,
        mut progress: impl FnMut(&ImportStats),
    ) -> Result<ImportStats> {
        let generation = self.store.begin_import()?;
        let mut stats = ImportStats { generation, ..Default::default() };

        self.store.begin_transaction()?;
        if let Err(e) = self.load(reader, &mut stats, &mut progress) {
            // Batches already committed stay in place.
            if let Err(rollback) = self.store.rollback() {
                tracing::error!("rollback failed: {}", rollback);
            }
            return Err(e);
        }
        self.store.commit()?;

        stats.roots = self.store.link_roots()?;
        tracing::info!(
            "generation {}: {} objects, {} refs, {} root links",
            generation,
            stats.objects,
            stats.refs,
            stats.roots
        );
        Ok(stats)
    }

    fn load<R: BufRead>(
        &self,
        reader: R,
        stats: &mut ImportStats,
        progress: &mut impl FnMut(&ImportStats),
    ) -> Result<()> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = ObjectRecord::parse_line(&line, idx + 1)?;
            self.store.insert_object(&record)?;

            stats.objects += 1;
            stats.refs += record.refs.len();
            stats.bytes += record.size.max(0) as u64;

            if stats.objects % self.batch_size == 0 {
                self.store.commit()?;
                self.store.begin_transaction()?;
                tracing::info!("loaded {} objects, {} refs", stats.objects, stats.refs);
                progress(&*stats);
            }
        }
        Ok(())
    }
}
