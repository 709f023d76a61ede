//! Query macro compiler
//!
//! Extends SQL with a few shorthands that are expanded before execution:
//! - `X^` parents of X, `X&` children of X (chainable: `X^^&`)
//! - `#R.N` the address in row N of result R
//! - `#R.col` every value of column `col` in result R, as `(v1,v2,...)`
//! - `$name` the value of a named variable
//!
//! Text is scanned once into a [`Query`] tree and then rendered, so
//! expansions are never rescanned.

pub mod ast;
pub mod render;
pub mod scanner;

pub use ast::{Query, RelOp, Segment, Term};
pub use render::apply_ops;
pub use scanner::scan;

use crate::session::Session;

/// A macro reference that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("{0} doesn't name a result")]
    UnknownResult(String),

    #[error("Result reference out of range: {0}")]
    RowOutOfRange(String),

    #[error("Results had no address column: {0}")]
    NoIdentityColumn(String),

    #[error("No such column: {0}")]
    UnknownColumn(String),

    #[error("Named reference undefined: {0}")]
    UndefinedVariable(String),
}

/// Expand every macro in `text`.
pub fn compile(text: &str, session: &Session) -> Result<String, SubstitutionError> {
    let query = scan(text);
    let sql = query.render(session)?;
    if !query.is_plain() {
        tracing::debug!("compiled {:?} -> {:?}", text, sql);
    }
    Ok(sql)
}

/// SQL selecting the children of the object at `address`
pub fn children_of(address: i64) -> String {
    apply_ops(address.to_string(), &[RelOp::Children])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Cell, ResultSet};

    fn session_with_addresses(values: &[i64]) -> Session {
        let mut session = Session::new();
        session.record(ResultSet::new(
            vec!["address".to_string(), "type".to_string()],
            values
                .iter()
                .map(|v| vec![Cell::Integer(*v), Cell::Text("list".to_string())])
                .collect(),
        ));
        session
    }

    #[test]
    fn test_parents_operator() {
        let sql = compile("5^", &Session::new()).unwrap();
        assert_eq!(sql, "(select parent from ref where child = 5)");
    }

    #[test]
    fn test_chained_operators_nest_innermost_first() {
        let sql = compile("5^&", &Session::new()).unwrap();
        assert_eq!(
            sql,
            "(select child from ref where parent IN (select parent from ref where child = 5))"
        );
    }

    #[test]
    fn test_group_uses_in() {
        let sql = compile("(select address from obj)&", &Session::new()).unwrap();
        assert_eq!(sql, "(select child from ref where parent IN (select address from obj))");
    }

    #[test]
    fn test_references_inside_group_resolved_first() {
        let session = session_with_addresses(&[10, 20]);
        let sql = compile("(#0.1)^", &session).unwrap();
        assert_eq!(sql, "(select parent from ref where child IN (20))");
    }

    #[test]
    fn test_column_reference() {
        let session = session_with_addresses(&[10, 20, 30]);
        assert_eq!(compile("#0.address", &session).unwrap(), "(10,20,30)");
    }

    #[test]
    fn test_column_reference_quotes_text() {
        let session = session_with_addresses(&[10]);
        assert_eq!(compile("#0.type", &session).unwrap(), "('list')");
    }

    #[test]
    fn test_row_reference() {
        let session = session_with_addresses(&[10, 20, 30]);
        assert_eq!(compile("#0.1", &session).unwrap(), "20");
        assert_eq!(
            compile("select * from obj where address = #0.2^", &session).unwrap(),
            "select * from obj where address = (select parent from ref where child = 30)"
        );
    }

    #[test]
    fn test_column_reference_in_chain_uses_in() {
        let session = session_with_addresses(&[10, 20]);
        assert_eq!(
            compile("#0.address&", &session).unwrap(),
            "(select child from ref where parent IN (10,20))"
        );
    }

    #[test]
    fn test_variable_substitution() {
        let mut session = Session::new();
        session.variables.bind("big", "12345");
        assert_eq!(
            compile("address = $big", &session).unwrap(),
            "address = 12345"
        );
        assert_eq!(
            compile("$big^", &session).unwrap(),
            "(select parent from ref where child = 12345)"
        );
    }

    #[test]
    fn test_expanded_values_are_not_rescanned() {
        let mut session = Session::new();
        session.variables.bind("tricky", "$other");
        assert_eq!(compile("$tricky", &session).unwrap(), "$other");
    }

    #[test]
    fn test_errors() {
        let session = session_with_addresses(&[10]);
        assert_eq!(
            compile("#3.0", &session),
            Err(SubstitutionError::UnknownResult("#3.0".to_string()))
        );
        assert_eq!(
            compile("#0.5", &session),
            Err(SubstitutionError::RowOutOfRange("#0.5".to_string()))
        );
        assert_eq!(
            compile("#0.size", &session),
            Err(SubstitutionError::UnknownColumn("#0.size".to_string()))
        );
        assert_eq!(
            compile("$nope", &session),
            Err(SubstitutionError::UndefinedVariable("$nope".to_string()))
        );
    }

    #[test]
    fn test_row_reference_needs_identity_column() {
        let mut session = Session::new();
        session.record(ResultSet::new(vec!["n".to_string()], vec![vec![Cell::Integer(1)]]));
        assert_eq!(
            compile("#0.0", &session),
            Err(SubstitutionError::NoIdentityColumn("#0.0".to_string()))
        );
    }

    #[test]
    fn test_children_of() {
        assert_eq!(children_of(0), "(select child from ref where parent = 0)");
    }
}
