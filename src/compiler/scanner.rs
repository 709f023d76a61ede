//! Single left-to-right scan of query text into a [`Query`] tree
//!
//! Token shapes:
//! - `[\w.:]+` words, `#R.N` rows, `#R.col` columns, `$name` variables
//! - `( ... )` groups, scanned recursively
//! - any of the above immediately followed by `^`/`&` becomes a chain
//!
//! Single-quoted string literals are copied through untouched.

use super::ast::{Query, RelOp, Segment, Term};

pub fn scan(input: &str) -> Query {
    let chars: Vec<char> = input.chars().collect();
    let mut scanner = Scanner { chars, pos: 0 };
    let (segments, _) = scanner.segments(false);
    Query::new(segments)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == ':'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Scan until end of input, or until the `)` closing a group when `nested`.
    fn segments(&mut self, nested: bool) -> (Vec<Segment>, bool) {
        let mut out = Vec::new();
        let mut text = String::new();

        while let Some(c) = self.peek() {
            if c == ')' && nested {
                self.pos += 1;
                flush(&mut out, &mut text);
                return (out, true);
            }

            if c == '\'' {
                self.quoted(&mut text);
                continue;
            }

            match self.term() {
                Some(term) => {
                    flush(&mut out, &mut text);
                    let ops = self.ops();
                    if ops.is_empty() {
                        out.push(Segment::Term(term));
                    } else {
                        out.push(Segment::chain(term, ops));
                    }
                }
                None => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }

        flush(&mut out, &mut text);
        (out, false)
    }

    fn quoted(&mut self, text: &mut String) {
        text.push('\'');
        self.pos += 1;
        while let Some(c) = self.peek() {
            text.push(c);
            self.pos += 1;
            if c == '\'' {
                break;
            }
        }
    }

    fn term(&mut self) -> Option<Term> {
        let c = self.peek()?;
        match c {
            '(' => {
                self.pos += 1;
                let (inner, closed) = self.segments(true);
                Some(Term::Group { inner, closed })
            }
            '#' => self.back_reference(),
            '$' => {
                let start = self.pos;
                self.pos += 1;
                let name = self.take_while(is_word_char);
                if name.is_empty() {
                    self.pos = start;
                    None
                } else {
                    Some(Term::Variable { name })
                }
            }
            c if is_word_char(c) => Some(Term::Word(self.take_while(is_word_char))),
            _ => None,
        }
    }

    /// `#R.N` or `#R.col`; rewinds and yields nothing for any other shape.
    fn back_reference(&mut self) -> Option<Term> {
        let start = self.pos;
        self.pos += 1;
        let result = self.take_while(|c| c.is_ascii_digit());
        if result.is_empty() || self.peek() != Some('.') {
            self.pos = start;
            return None;
        }
        self.pos += 1;
        let tail = self.take_while(is_ident_char);
        if tail.is_empty() {
            self.pos = start;
            return None;
        }

        let token: String = self.chars[start..self.pos].iter().collect();
        // Indices too large for usize can only ever be out of range.
        let result = result.parse().unwrap_or(usize::MAX);
        if tail.chars().all(|c| c.is_ascii_digit()) {
            let row = tail.parse().unwrap_or(usize::MAX);
            Some(Term::Row { result, row, token })
        } else {
            Some(Term::Column { result, column: tail, token })
        }
    }

    fn ops(&mut self) -> Vec<RelOp> {
        let mut ops = Vec::new();
        while let Some(op) = self.peek().and_then(RelOp::from_char) {
            ops.push(op);
            self.pos += 1;
        }
        ops
    }
}

fn flush(out: &mut Vec<Segment>, text: &mut String) {
    if !text.is_empty() {
        out.push(Segment::Text(std::mem::take(text)));
    }
}
