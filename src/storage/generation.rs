//! Generation management
//!
//! Each imported dump is a numbered generation. The current generation's
//! tables carry the plain names `obj`/`ref`; every other generation is parked
//! under `obj{N}`/`ref{N}`. All renames for one rotation run in a single
//! transaction.

use super::schema::{self, GEN_TABLES};
use super::sqlite::MemStore;
use crate::Result;

/// One row of the generation metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub number: u32,
    pub current: bool,
}

impl MemStore {
    /// Number of the generation whose tables are active, if any
    pub fn current_generation(&self) -> Result<Option<u32>> {
        Ok(self
            .fetch_int("SELECT num FROM gen WHERE current = 1", [])?
            .map(|n| n as u32))
    }

    pub fn generation_count(&self) -> Result<u32> {
        Ok(self.fetch_int("SELECT COUNT(*) FROM gen", [])?.unwrap_or(0) as u32)
    }

    pub fn generations(&self) -> Result<Vec<Generation>> {
        let mut stmt = self.conn.prepare("SELECT num, current FROM gen ORDER BY num")?;
        let gens = stmt
            .query_map([], |row| {
                Ok(Generation {
                    number: row.get(0)?,
                    current: row.get::<_, i64>(1)? == 1,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(gens)
    }

    /// Park the current generation and create a fresh, current one.
    ///
    /// Returns the new generation number.
    pub fn begin_import(&self) -> Result<u32> {
        self.atomically(|store| {
            store.park_current()?;
            let number = store
                .fetch_int("SELECT MAX(num) FROM gen", [])?
                .map(|n| n as u32 + 1)
                .unwrap_or(1);
            store
                .conn
                .execute("INSERT INTO gen (num, current) VALUES (?1, 1)", [number])?;
            for stmt in schema::generation_schema_statements(number) {
                store.conn.execute(&stmt, [])?;
            }
            tracing::info!("created generation {}", number);
            Ok(number)
        })
    }

    /// Make generation `target` active, or park everything for `None`.
    ///
    /// The number is not validated here.
    pub fn switch_to(&self, target: Option<u32>) -> Result<()> {
        self.atomically(|store| {
            store.park_current()?;
            if let Some(number) = target {
                for table in GEN_TABLES {
                    store.conn.execute(
                        &format!("ALTER TABLE {} RENAME TO {}", schema::parked_name(table, number), table),
                        [],
                    )?;
                }
                store
                    .conn
                    .execute("UPDATE gen SET current = 1 WHERE num = ?1", [number])?;
            }
            tracing::debug!("switched to generation {:?}", target);
            Ok(())
        })
    }

    /// Move the active tables under their numbered names and clear the flag.
    fn park_current(&self) -> Result<()> {
        if let Some(current) = self.current_generation()? {
            for table in GEN_TABLES {
                self.conn.execute(
                    &format!("ALTER TABLE {} RENAME TO {}", table, schema::parked_name(table, current)),
                    [],
                )?;
            }
        }
        self.conn.execute("UPDATE gen SET current = 0", [])?;
        Ok(())
    }
}
