//! SQLite storage implementation

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Params, params};

use super::schema;
use crate::object::ObjectRecord;
use crate::session::{Cell, ResultSet};
use crate::{Error, Result};

/// What running an arbitrary statement produced
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOutcome {
    Rows(ResultSet),
    Changed(usize),
}

/// SQLite-backed storage for object graphs
pub struct MemStore {
    pub(crate) conn: Connection,
    path: Option<PathBuf>,
}

impl MemStore {
    /// Create a database file (or reuse an existing one) with the base schema
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn, path: Some(path.to_path_buf()) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an existing database file
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Usage(format!("No database at {}", path.display())));
        }
        Self::create(path)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, path: None };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::base_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ========== Generic SQL ==========

    /// Run a row-returning query and collect it as a [`ResultSet`]
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        self.query_with(sql, [])
    }

    pub fn query_with<P: Params>(&self, sql: &str, params: P) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query(params)?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(Cell::from(row.get_ref(i)?));
            }
            rows.push(cells);
        }

        Ok(ResultSet::new(columns, rows))
    }

    /// Run a statement that does not return rows; yields the affected-row count
    pub fn execute(&self, sql: &str) -> Result<usize> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Run any single statement, returning rows when it produces them
    pub fn run(&self, sql: &str) -> Result<SqlOutcome> {
        let returns_rows = self.conn.prepare(sql)?.column_count() > 0;
        if returns_rows {
            Ok(SqlOutcome::Rows(self.query(sql)?))
        } else {
            Ok(SqlOutcome::Changed(self.execute(sql)?))
        }
    }

    /// First column of the first row as an integer; `None` for no row or NULL
    pub fn fetch_int<P: Params>(&self, sql: &str, params: P) -> Result<Option<i64>> {
        let value: Option<Option<i64>> = self
            .conn
            .query_row(sql, params, |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    /// Whether a table exists in the main schema
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count = self.fetch_int(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    // ========== Object Operations ==========

    /// Insert an object and all of its outgoing references
    pub fn insert_object(&self, record: &ObjectRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO obj (address, type, name, value, size, len, repr)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.address,
                record.kind,
                record.name,
                record.value,
                record.size,
                record.len,
                record.repr(),
            ],
        )?;
        for child in &record.refs {
            self.insert_ref(record.address, *child)?;
        }
        Ok(())
    }

    pub fn insert_ref(&self, parent: i64, child: i64) -> Result<()> {
        self.conn
            .execute("INSERT INTO ref (parent, child) VALUES (?1, ?2)", params![parent, child])?;
        Ok(())
    }

    /// Full record of one object
    pub fn object(&self, address: i64) -> Result<ResultSet> {
        self.query_with("SELECT * FROM obj WHERE address = ?1", [address])
    }

    /// Distinct objects holding a reference to `address`
    pub fn parents(&self, address: i64) -> Result<ResultSet> {
        self.query_with(
            r#"
            SELECT DISTINCT address, type, name, value, size, len
              FROM obj, ref
             WHERE obj.address = ref.parent
               AND ref.child = ?1
             ORDER BY address
            "#,
            [address],
        )
    }

    /// Children of any of `addresses`, each with its number of referrers
    pub fn children_with_ref_counts(&self, addresses: &[i64]) -> Result<ResultSet> {
        let list: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
        self.query(&format!(
            r#"
            SELECT obj.*,
                   (SELECT COUNT(*) FROM ref WHERE child = obj.address) AS refs
              FROM obj
             WHERE address IN (SELECT child FROM ref WHERE parent IN ({}))
             ORDER BY address
            "#,
            list.join(",")
        ))
    }

    /// Full records for `addresses`, in the given order; missing ones are skipped
    pub fn objects_in_order(&self, addresses: &[i64]) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare("SELECT * FROM obj WHERE address = ?1")?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::with_capacity(addresses.len());
        for address in addresses {
            let mut cursor = stmt.query([address])?;
            if let Some(row) = cursor.next()? {
                let mut cells = Vec::with_capacity(width);
                for i in 0..width {
                    cells.push(Cell::from(row.get_ref(i)?));
                }
                rows.push(cells);
            }
        }
        Ok(ResultSet::new(columns, rows))
    }

    /// Link every object nobody refers to under the root, creating the root itself.
    ///
    /// Returns the number of edges added.
    pub fn link_roots(&self) -> Result<usize> {
        self.conn.execute(
            "INSERT OR IGNORE INTO obj (address) VALUES (?1)",
            [crate::object::ROOT_ADDRESS],
        )?;
        let linked = self.conn.execute(
            r#"
            INSERT INTO ref (parent, child)
            SELECT ?1, address FROM obj
             WHERE address != ?1
               AND address NOT IN (SELECT child FROM ref)
            "#,
            [crate::object::ROOT_ADDRESS],
        )?;
        Ok(linked)
    }

    /// Count objects in the active generation
    pub fn count_objects(&self) -> Result<usize> {
        Ok(self.fetch_int("SELECT COUNT(*) FROM obj", [])?.unwrap_or(0) as usize)
    }

    /// Count references in the active generation
    pub fn count_refs(&self) -> Result<usize> {
        Ok(self.fetch_int("SELECT COUNT(*) FROM ref", [])?.unwrap_or(0) as usize)
    }

    pub fn total_bytes(&self) -> Result<u64> {
        Ok(self.fetch_int("SELECT SUM(size) FROM obj", [])?.unwrap_or(0) as u64)
    }

    /// Get database statistics for the active generation
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            objects: self.count_objects()?,
            refs: self.count_refs()?,
            bytes: self.total_bytes()?,
        })
    }

    // ========== Variable Operations ==========

    /// Persist a named variable, replacing any earlier definition
    pub fn define_variable(&self, name: &str, value: &str) -> Result<()> {
        self.atomically(|store| {
            store.conn.execute("DELETE FROM env WHERE name = ?1", [name])?;
            store.conn.execute(
                "INSERT INTO env (name, value) VALUES (?1, ?2)",
                params![name, value],
            )?;
            Ok(())
        })
    }

    /// All persisted variables, oldest definition first
    pub fn all_variables(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT name, value FROM env ORDER BY rowid")?;
        let vars = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(vars)
    }

    // ========== Transactions ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Run `f` inside one transaction, rolling back if it fails
    pub fn atomically<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    tracing::error!("rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbStats {
    pub objects: usize,
    pub refs: usize,
    pub bytes: u64,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} objects, {} references, {} total bytes",
            crate::ui::human_count(self.objects as u64),
            crate::ui::human_count(self.refs as u64),
            crate::ui::human_count(self.bytes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_generation() -> MemStore {
        let store = MemStore::open_in_memory().unwrap();
        store.begin_import().unwrap();
        store
    }

    #[test]
    fn test_object_crud() {
        let store = store_with_generation();
        store
            .insert_object(&ObjectRecord::new(10, "dict", 280).with_refs(&[20, 30]))
            .unwrap();

        let record = store.object(10).unwrap();
        assert_eq!(record.len(), 1);
        let repr = record.column_index("repr").unwrap();
        assert_eq!(record.rows[0][repr], Cell::Text("dict".to_string()));
        assert_eq!(store.count_refs().unwrap(), 2);
    }

    #[test]
    fn test_parents_are_distinct() {
        let store = store_with_generation();
        store.insert_object(&ObjectRecord::new(2, "list", 72).with_refs(&[5, 5])).unwrap();
        store.insert_object(&ObjectRecord::new(3, "list", 72).with_refs(&[5])).unwrap();
        store.insert_object(&ObjectRecord::new(5, "int", 24)).unwrap();

        let parents = store.parents(5).unwrap();
        assert_eq!(parents.addresses(), vec![2, 3]);
    }

    #[test]
    fn test_run_distinguishes_queries_from_changes() {
        let store = store_with_generation();
        store.insert_object(&ObjectRecord::new(1, "list", 72)).unwrap();

        match store.run("SELECT address FROM obj").unwrap() {
            SqlOutcome::Rows(rows) => assert_eq!(rows.addresses(), vec![1]),
            other => panic!("expected rows, got {:?}", other),
        }
        assert_eq!(
            store.run("UPDATE obj SET size = 1").unwrap(),
            SqlOutcome::Changed(1)
        );
    }

    #[test]
    fn test_link_roots() {
        let store = store_with_generation();
        store.insert_object(&ObjectRecord::new(1, "dict", 10).with_refs(&[2])).unwrap();
        store.insert_object(&ObjectRecord::new(2, "list", 10)).unwrap();
        store.insert_object(&ObjectRecord::new(3, "list", 10)).unwrap();

        assert_eq!(store.link_roots().unwrap(), 2);
        let roots = store.query("SELECT child FROM ref WHERE parent = 0 ORDER BY child").unwrap();
        assert_eq!(roots.rows, vec![vec![Cell::Integer(1)], vec![Cell::Integer(3)]]);
    }

    #[test]
    fn test_variables_persist_latest_definition() {
        let store = MemStore::open_in_memory().unwrap();
        store.define_variable("x", "1").unwrap();
        store.define_variable("y", "2").unwrap();
        store.define_variable("x", "3").unwrap();

        let vars = store.all_variables().unwrap();
        assert_eq!(
            vars,
            vec![("y".to_string(), "2".to_string()), ("x".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn test_store_error_surfaces() {
        let store = store_with_generation();
        assert!(matches!(store.query("SELEC nonsense"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MemStore::open(&dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_stats() {
        let store = store_with_generation();
        store.insert_object(&ObjectRecord::new(1, "dict", 100).with_refs(&[2])).unwrap();
        store.insert_object(&ObjectRecord::new(2, "dict", 50)).unwrap();
        assert_eq!(store.stats().unwrap(), DbStats { objects: 2, refs: 1, bytes: 150 });
    }
}
