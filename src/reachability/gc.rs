//! Mark and sweep over the active generation
//!
//! Marks hold the BFS depth from the root. The root itself is marked 0 and
//! its direct children 1. Marks are committed after every level, so an
//! interrupted run can be resumed from the deepest existing mark.
//!
//! Sweeping deletes unmarked objects only; their reference rows are left
//! behind as dangling edges.

use crate::compiler::children_of;
use crate::object::ROOT_ADDRESS;
use crate::storage::MemStore;
use crate::Result;

/// Result of a mark phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkReport {
    /// Direct children of the root marked when the phase had to seed
    pub top_level: usize,
    /// Objects newly marked at each depth, in order
    pub levels: Vec<(i64, usize)>,
}

impl MarkReport {
    pub fn total(&self) -> usize {
        self.top_level + self.levels.iter().map(|(_, n)| n).sum::<usize>()
    }
}

/// Result of a full collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    pub mark: MarkReport,
    pub deleted: usize,
}

impl std::fmt::Display for GcReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Garbage collection:")?;
        writeln!(f, "  Top level objects: {}", self.mark.top_level)?;
        for (depth, count) in &self.mark.levels {
            writeln!(f, "  Marked {} objects at depth {}", count, depth)?;
        }
        write!(f, "  Deleted {} objects", self.deleted)
    }
}

/// Mark and sweep collector for the active generation
pub struct Collector<'a> {
    store: &'a MemStore,
}

impl<'a> Collector<'a> {
    pub fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    /// Clear all marks, mark from the root and sweep.
    pub fn collect(&self) -> Result<GcReport> {
        self.store
            .execute("UPDATE obj SET mark = NULL WHERE mark IS NOT NULL")?;
        let top_level = self.seed()?;
        let mut mark = self.mark_levels()?;
        mark.top_level = top_level;
        let deleted = self.sweep()?;
        Ok(GcReport { mark, deleted })
    }

    /// Continue marking from the deepest existing mark, then sweep.
    pub fn resume(&self) -> Result<GcReport> {
        let mark = self.mark()?;
        let deleted = self.sweep()?;
        Ok(GcReport { mark, deleted })
    }

    /// Mark phase alone, resuming from existing marks.
    ///
    /// With no marks at all this starts from the root without clearing anything.
    pub fn mark(&self) -> Result<MarkReport> {
        let existing = self.store.fetch_int("SELECT MAX(mark) FROM obj", [])?;
        let top_level = match existing {
            Some(_) => 0,
            None => self.seed()?,
        };
        let mut report = self.mark_levels()?;
        report.top_level = top_level;
        Ok(report)
    }

    /// Delete every object left unmarked.
    pub fn sweep(&self) -> Result<usize> {
        let deleted = self.store.execute("DELETE FROM obj WHERE mark IS NULL")?;
        tracing::info!("deleted {} objects", deleted);
        Ok(deleted)
    }

    fn seed(&self) -> Result<usize> {
        self.store.conn.execute(
            "UPDATE obj SET mark = 0 WHERE address = ?1",
            [ROOT_ADDRESS],
        )?;
        let marked = self.store.execute(&format!(
            "UPDATE obj SET mark = 1 WHERE mark IS NULL AND address IN {}",
            children_of(ROOT_ADDRESS)
        ))?;
        tracing::info!("marked {} top level objects", marked);
        Ok(marked)
    }

    fn mark_levels(&self) -> Result<MarkReport> {
        let mut report = MarkReport::default();
        let Some(mut depth) = self.store.fetch_int("SELECT MAX(mark) FROM obj", [])? else {
            return Ok(report);
        };

        loop {
            let marked = self.store.conn.execute(
                r#"
                UPDATE obj
                   SET mark = ?1 + 1
                 WHERE address IN (
                       SELECT child
                         FROM ref, obj p, obj c
                        WHERE ref.parent = p.address
                          AND ref.child = c.address
                          AND p.mark = ?1
                          AND c.mark IS NULL
                       )
                "#,
                [depth],
            )?;
            if marked == 0 {
                tracing::info!("marking complete at depth {}", depth);
                break;
            }
            depth += 1;
            tracing::info!("marked {} objects at depth {}", marked, depth);
            report.levels.push((depth, marked));
        }
        Ok(report)
    }
}
