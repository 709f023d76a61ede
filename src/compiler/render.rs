//! Rendering of a [`Query`] tree back into executable SQL

use super::ast::{Query, RelOp, Segment, Term};
use super::SubstitutionError;
use crate::session::{ColumnLookup, RowLookup, Session};

type Result<T> = std::result::Result<T, SubstitutionError>;

impl Query {
    /// Resolve every reference against `session` and produce SQL text.
    ///
    /// Fails on the first unresolvable reference; no partial text is returned.
    pub fn render(&self, session: &Session) -> Result<String> {
        render_segments(&self.segments, session)
    }
}

fn render_segments(segments: &[Segment], session: &Session) -> Result<String> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Term(term) => out.push_str(&render_term(term, session)?),
            Segment::Chain { base, ops } => {
                let base = render_term(base, session)?;
                out.push_str(&apply_ops(base, ops));
            }
        }
    }
    Ok(out)
}

fn render_term(term: &Term, session: &Session) -> Result<String> {
    match term {
        Term::Word(word) => Ok(word.clone()),
        Term::Row { result, row, token } => match session.history.row(*result, *row) {
            RowLookup::Found(cell) => Ok(cell.to_string()),
            RowLookup::NoResult => Err(SubstitutionError::UnknownResult(token.clone())),
            RowLookup::NoIdentity => Err(SubstitutionError::NoIdentityColumn(token.clone())),
            RowLookup::NoRow => Err(SubstitutionError::RowOutOfRange(token.clone())),
        },
        Term::Column { result, column, token } => match session.history.column(*result, column) {
            ColumnLookup::Found(values) => {
                let list: Vec<String> = values.iter().map(|c| c.to_sql_literal()).collect();
                Ok(format!("({})", list.join(",")))
            }
            ColumnLookup::NoResult => Err(SubstitutionError::UnknownResult(token.clone())),
            ColumnLookup::NoColumn => Err(SubstitutionError::UnknownColumn(token.clone())),
        },
        Term::Variable { name } => session
            .variables
            .value_of(name)
            .map(str::to_string)
            .ok_or_else(|| SubstitutionError::UndefinedVariable(format!("${}", name))),
        Term::Group { inner, closed } => {
            let inner = render_segments(inner, session)?;
            Ok(if *closed { format!("({})", inner) } else { format!("({}", inner) })
        }
    }
}

/// Wrap an already rendered reference in one subquery per operator.
pub fn apply_ops(mut reference: String, ops: &[RelOp]) -> String {
    for op in ops {
        let condition = if reference.starts_with('(') { "IN" } else { "=" };
        reference = match op {
            RelOp::Parents => format!("(select parent from ref where child {} {})", condition, reference),
            RelOp::Children => format!("(select child from ref where parent {} {})", condition, reference),
        };
    }
    reference
}
