//! Session state - result history and named variables
//!
//! Everything here lives for one analysis session: it is reset whenever a
//! database is opened or created. Result sets are appended once and never
//! mutated afterwards, so `#R.N` and `#R.col` references stay stable.

use std::collections::HashMap;
use std::fmt;

/// Name of the column used to resolve row references.
pub const IDENTITY_COLUMN: &str = "address";

/// A single scalar cell of a query result
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Render the cell as a literal usable inside query text.
    ///
    /// Text is single-quoted with embedded quotes doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Null => "NULL".to_string(),
            Cell::Integer(n) => n.to_string(),
            Cell::Real(r) => r.to_string(),
            Cell::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(n) => write!(f, "{}", n),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for Cell {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(n) => Cell::Integer(n),
            ValueRef::Real(r) => Cell::Real(r),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Rows returned by one query, with the position of the identity column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub identity: Option<usize>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let identity = columns.iter().position(|c| c == IDENTITY_COLUMN);
        Self { columns, rows, identity }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Identity cell of row `row`, if both the column and the row exist
    pub fn identity_of(&self, row: usize) -> Option<&Cell> {
        let col = self.identity?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Every value of column `name`, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|r| r.get(col)).collect())
    }

    /// Integer identity values of every row, skipping non-integers
    pub fn addresses(&self) -> Vec<i64> {
        match self.identity {
            Some(col) => self
                .rows
                .iter()
                .filter_map(|r| r.get(col).and_then(Cell::as_integer))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Outcome of looking up `#R.N`
#[derive(Debug, Clone, PartialEq)]
pub enum RowLookup<'a> {
    Found(&'a Cell),
    NoResult,
    NoIdentity,
    NoRow,
}

/// Outcome of looking up `#R.col`
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnLookup<'a> {
    Found(Vec<&'a Cell>),
    NoResult,
    NoColumn,
}

/// Append-only log of result sets, addressed by index
#[derive(Debug, Default)]
pub struct ResultHistory {
    results: Vec<ResultSet>,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result set and return its index.
    pub fn push(&mut self, result: ResultSet) -> usize {
        self.results.push(result);
        self.results.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&ResultSet> {
        self.results.get(index)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn row(&self, result: usize, row: usize) -> RowLookup<'_> {
        let Some(set) = self.results.get(result) else {
            return RowLookup::NoResult;
        };
        if set.identity.is_none() {
            return RowLookup::NoIdentity;
        }
        match set.identity_of(row) {
            Some(cell) => RowLookup::Found(cell),
            None => RowLookup::NoRow,
        }
    }

    pub fn column(&self, result: usize, name: &str) -> ColumnLookup<'_> {
        let Some(set) = self.results.get(result) else {
            return ColumnLookup::NoResult;
        };
        match set.column(name) {
            Some(values) => ColumnLookup::Found(values),
            None => ColumnLookup::NoColumn,
        }
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

/// Bidirectional name <-> value map backing `$name`
#[derive(Debug, Default)]
pub struct Variables {
    by_name: HashMap<String, String>,
    by_value: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, dropping the reverse entry of any previous value.
    pub fn bind(&mut self, name: &str, value: &str) {
        if let Some(old) = self.by_name.insert(name.to_string(), value.to_string()) {
            if self.by_value.get(&old).is_some_and(|n| n == name) {
                self.by_value.remove(&old);
            }
        }
        self.by_value.insert(value.to_string(), name.to_string());
    }

    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn name_for(&self, value: &str) -> Option<&str> {
        self.by_value.get(value).map(String::as_str)
    }

    /// All bindings sorted by name
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<_> = self
            .by_name
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_value.clear();
    }
}

/// Per-session state owned by the caller
#[derive(Debug, Default)]
pub struct Session {
    pub history: ResultHistory,
    pub variables: Variables,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.variables.clear();
    }

    /// Record a result and return the index it was stored under.
    pub fn record(&mut self, result: ResultSet) -> usize {
        self.history.push(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses(values: &[i64]) -> ResultSet {
        ResultSet::new(
            vec!["address".to_string(), "type".to_string()],
            values
                .iter()
                .map(|v| vec![Cell::Integer(*v), Cell::Text("dict".to_string())])
                .collect(),
        )
    }

    #[test]
    fn test_identity_column_detected() {
        let set = addresses(&[10, 20]);
        assert_eq!(set.identity, Some(0));

        let other = ResultSet::new(vec!["count".to_string()], vec![vec![Cell::Integer(3)]]);
        assert_eq!(other.identity, None);
    }

    #[test]
    fn test_row_and_column_lookup() {
        let mut history = ResultHistory::new();
        assert_eq!(history.push(addresses(&[10, 20, 30])), 0);

        assert_eq!(history.row(0, 1), RowLookup::Found(&Cell::Integer(20)));
        assert_eq!(history.row(0, 3), RowLookup::NoRow);
        assert_eq!(history.row(1, 0), RowLookup::NoResult);

        match history.column(0, "address") {
            ColumnLookup::Found(values) => assert_eq!(values.len(), 3),
            other => panic!("unexpected lookup: {:?}", other),
        }
        assert_eq!(history.column(0, "missing"), ColumnLookup::NoColumn);
    }

    #[test]
    fn test_row_lookup_without_identity() {
        let mut history = ResultHistory::new();
        history.push(ResultSet::new(vec!["n".to_string()], vec![vec![Cell::Integer(1)]]));
        assert_eq!(history.row(0, 0), RowLookup::NoIdentity);
    }

    #[test]
    fn test_rebinding_variable_updates_both_directions() {
        let mut vars = Variables::new();
        vars.bind("top", "100");
        vars.bind("top", "200");

        assert_eq!(vars.value_of("top"), Some("200"));
        assert_eq!(vars.name_for("200"), Some("top"));
        assert_eq!(vars.name_for("100"), None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = Session::new();
        session.record(addresses(&[1]));
        session.variables.bind("x", "1");
        session.reset();
        assert!(session.history.is_empty());
        assert!(session.variables.is_empty());
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(Cell::Integer(5).to_sql_literal(), "5");
        assert_eq!(Cell::Null.to_sql_literal(), "NULL");
        assert_eq!(Cell::Text("it's".to_string()).to_sql_literal(), "'it''s'");
    }
}
