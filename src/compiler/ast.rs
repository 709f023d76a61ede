//! Expression tree produced by the scanner

/// A relationship operator applied to a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    /// `^` - objects referring to the operand
    Parents,
    /// `&` - objects the operand refers to
    Children,
}

impl RelOp {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '^' => Some(RelOp::Parents),
            '&' => Some(RelOp::Children),
            _ => None,
        }
    }
}

/// Something a relationship operator can be applied to
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Plain identifier or number, copied through verbatim
    Word(String),
    /// `#R.N`
    Row { result: usize, row: usize, token: String },
    /// `#R.col`
    Column { result: usize, column: String, token: String },
    /// `$name`
    Variable { name: String },
    /// Parenthesised text; `closed` is false when input ended before `)`
    Group { inner: Vec<Segment>, closed: bool },
}

impl Term {
    pub fn word(text: impl Into<String>) -> Self {
        Term::Word(text.into())
    }
}

/// One piece of scanned query text
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Term(Term),
    /// A term followed by one or more relationship operators, applied left to right
    Chain { base: Term, ops: Vec<RelOp> },
}

impl Segment {
    pub fn chain(base: Term, ops: Vec<RelOp>) -> Self {
        Segment::Chain { base, ops }
    }
}

/// A fully scanned query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub segments: Vec<Segment>,
}

impl Query {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// True when nothing in the query needs resolving
    pub fn is_plain(&self) -> bool {
        fn plain(segments: &[Segment]) -> bool {
            segments.iter().all(|s| match s {
                Segment::Text(_) => true,
                Segment::Term(Term::Word(_)) => true,
                Segment::Term(Term::Group { inner, .. }) => plain(inner),
                _ => false,
            })
        }
        plain(&self.segments)
    }
}
