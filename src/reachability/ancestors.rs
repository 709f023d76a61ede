//! Ancestor type classification
//!
//! Starting from a selection at depth 0, repeatedly records the parents of
//! the deepest frontier at depth + 1 until an iteration adds nothing. A
//! parent is recorded once per distinct child it was reached through, so
//! objects reachable along several routes appear once per route.
//!
//! Parents whose type is excluded are never recorded; the root has no type
//! and is never recorded either.

use crate::session::{Cell, ResultSet};
use crate::storage::MemStore;
use crate::Result;

/// Types that stop the upward walk by default
pub const DEFAULT_EXCLUDED_TYPES: &[&str] = &["module", "Settings"];

const CREATE_WORK_TABLE: &str = r#"
CREATE TEMP TABLE tmp_ancestor_types (
    address INTEGER,
    type TEXT,
    depth INTEGER,
    child INTEGER,
    PRIMARY KEY (address, child)
)
"#;

pub struct AncestorClassifier<'a> {
    store: &'a MemStore,
    excluded: Vec<String>,
}

impl<'a> AncestorClassifier<'a> {
    pub fn new(store: &'a MemStore) -> Self {
        Self {
            store,
            excluded: DEFAULT_EXCLUDED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_excluded(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    /// Classify ancestors of the objects matching `condition`, an SQL predicate over `obj`.
    ///
    /// The report has columns `depth`, `type` and `count`: for each type, the
    /// number of distinct addresses whose deepest recorded depth is `depth`.
    pub fn classify(&self, condition: &str) -> Result<ResultSet> {
        self.store
            .execute("DROP TABLE IF EXISTS temp.tmp_ancestor_types")?;
        self.store.execute(CREATE_WORK_TABLE)?;

        let seeded = self.store.execute(&format!(
            "INSERT INTO tmp_ancestor_types SELECT address, type, 0, NULL FROM obj WHERE {}",
            condition
        ))?;
        tracing::info!("classifying ancestors of {} objects", seeded);

        let excluded: Vec<String> = self
            .excluded
            .iter()
            .map(|t| Cell::Text(t.clone()).to_sql_literal())
            .collect();
        let step = format!(
            r#"
            INSERT INTO tmp_ancestor_types
            SELECT DISTINCT r.parent, p.type, ?1 + 1, r.child
              FROM ref r
              JOIN obj p ON p.address = r.parent
              JOIN tmp_ancestor_types f ON f.address = r.child AND f.depth = ?1
              LEFT JOIN tmp_ancestor_types seen
                     ON seen.address = r.parent AND seen.child = r.child
             WHERE seen.address IS NULL
               AND p.type IS NOT NULL
               AND p.type NOT IN ({})
            "#,
            excluded.join(",")
        );

        let mut depth: i64 = 0;
        let mut inserted = seeded;
        while inserted > 0 {
            inserted = self.store.conn.execute(&step, [depth])?;
            tracing::info!("found {} new ancestors at depth {}", inserted, depth + 1);
            depth += 1;
        }

        self.store.query(
            r#"
            SELECT depth, type, COUNT(*) AS count
              FROM (
                  SELECT MAX(depth) AS depth, type
                    FROM tmp_ancestor_types
                GROUP BY address
              )
          GROUP BY depth, type
          ORDER BY depth, type
            "#,
        )
    }
}
