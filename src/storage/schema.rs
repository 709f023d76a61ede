//! Database schema definitions
//!
//! The generation tables are always created under their active names
//! (`obj`, `ref`). Parked generations carry their number as a suffix.

/// SQL to create the generations table
pub const CREATE_GEN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS gen (
    num INTEGER NOT NULL,
    current INTEGER NOT NULL DEFAULT 0
)
"#;

/// SQL to create the named variables table
pub const CREATE_ENV_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS env (
    name TEXT NOT NULL,
    value TEXT NOT NULL
)
"#;

/// Tables that belong to a generation
pub const GEN_TABLES: &[&str] = &["obj", "ref"];

const CREATE_OBJ_TABLE: &str = r#"
CREATE TABLE obj (
    address INTEGER PRIMARY KEY,
    type TEXT,
    name TEXT,
    value TEXT,
    size INTEGER,
    len INTEGER,
    mark INTEGER,
    repr TEXT
)
"#;

const CREATE_REF_TABLE: &str = r#"
CREATE TABLE ref (
    parent INTEGER,
    child INTEGER
)
"#;

/// Secondary indexes, `{gen}` is replaced by the generation number
const GEN_INDEXES: &[&str] = &[
    "CREATE INDEX size{gen} ON obj (size)",
    "CREATE INDEX type{gen} ON obj (type)",
    "CREATE INDEX name{gen} ON obj (name)",
    "CREATE INDEX value{gen} ON obj (value)",
    "CREATE INDEX mark{gen} ON obj (mark)",
    "CREATE INDEX repr{gen} ON obj (repr)",
    "CREATE INDEX child{gen} ON ref (child)",
    "CREATE INDEX parent{gen} ON ref (parent)",
];

/// Statements creating the fixed, generation independent schema
pub fn base_schema_statements() -> Vec<&'static str> {
    vec![CREATE_GEN_TABLE, CREATE_ENV_TABLE]
}

/// Statements creating a fresh, active set of tables for generation `number`
pub fn generation_schema_statements(number: u32) -> Vec<String> {
    let mut stmts = vec![CREATE_OBJ_TABLE.to_string(), CREATE_REF_TABLE.to_string()];
    stmts.extend(
        GEN_INDEXES
            .iter()
            .map(|stmt| stmt.replace("{gen}", &number.to_string())),
    );
    stmts
}

/// Name of `table` while its generation is parked
pub fn parked_name(table: &str, number: u32) -> String {
    format!("{}{}", table, number)
}
