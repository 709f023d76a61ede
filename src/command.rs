//! Command parsing
//!
//! One line of input is one command: a keyword followed by its arguments.
//! Arguments are kept as raw text because most of them still have to go
//! through the macro compiler.

use std::path::PathBuf;

use crate::{Error, Result};

/// Argument of the `gen` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenTarget {
    Show,
    Detach,
    Number(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(PathBuf),
    Open(PathBuf),
    Read(PathBuf),
    Stats,
    Gen(GenTarget),
    /// `set` alone lists variables; otherwise `NAME VALUE`
    Set(Option<String>),
    Echo(String),
    Select(String),
    Insert(String),
    Update(String),
    Delete(String),
    Pin(String),
    Gc,
    ContinueGc,
    Path(String),
    AncestorTypes(String),
    Parents(String),
    Info(String),
    Kids(String),
    Shell(String),
    Help,
}

impl Command {
    /// Parse one input line; blank lines and `--` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "create" => Command::Create(one_path(rest, "create DBFILE")?),
            "open" => Command::Open(one_path(rest, "open DBFILE")?),
            "read" => Command::Read(one_path(rest, "read DATAFILE")?),
            "stats" => Command::Stats,
            "gen" => Command::Gen(gen_target(rest)?),
            "set" => Command::Set(if rest.is_empty() { None } else { Some(rest.to_string()) }),
            "echo" => Command::Echo(rest.to_string()),
            "select" => Command::Select(required(rest, "select ...")?),
            "insert" => Command::Insert(required(rest, "insert ...")?),
            "update" => Command::Update(required(rest, "update ...")?),
            "delete" => Command::Delete(required(rest, "delete ...")?),
            "pin" => Command::Pin(required(rest, "pin CONDITION")?),
            "gc" => Command::Gc,
            "continue_gc" => Command::ContinueGc,
            "path" => Command::Path(required(rest, PATH_SYNTAX)?),
            "ancestor_types" => Command::AncestorTypes(required(rest, "ancestor_types CONDITION")?),
            "parents" => Command::Parents(required(rest, "parents ADDRESS")?),
            "info" => Command::Info(required(rest, "info ADDRESS")?),
            "kids" => Command::Kids(required(rest, "kids ADDRESS")?),
            "shell" => Command::Shell(required(rest, "shell SQL")?),
            "help" | "?" => Command::Help,
            other => return Err(Error::Usage(format!("Unknown command: {}", other))),
        };
        Ok(Some(command))
    }

    /// Whether the command can take long enough to deserve a spinner
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Command::Read(_)
                | Command::Gc
                | Command::ContinueGc
                | Command::Path(_)
                | Command::AncestorTypes(_)
        )
    }

    /// Whether the command needs an open database
    pub fn needs_database(&self) -> bool {
        !matches!(self, Command::Create(_) | Command::Open(_) | Command::Echo(_) | Command::Help)
    }
}

pub const PATH_SYNTAX: &str = r#"path from "condition1" to "condition2" [reversed]"#;

pub const HELP: &str = r#"Commands:
  create DBFILE              create a new database
  open DBFILE                open an existing database
  read DATAFILE              import a dump as a new generation
  stats                      object, reference and byte counts
  gen [N|none]               show or switch the active generation
  set [NAME VALUE]           list or define named values ($NAME)
  echo TEXT                  show TEXT with shorthands expanded
  select ... / insert ... / update ... / delete ...
  pin CONDITION              keep matching objects alive through gc
  gc / continue_gc           mark from the root and delete the rest
  path from "C1" to "C2" [reversed]
  ancestor_types CONDITION   types of the ancestors of matching objects
  parents ADDRESS / info ADDRESS / kids ADDRESS
  shell SQL                  run any SQL statement

Shorthands: X^ parents, X& children, #R.N row address, #R.col column values, $name"#;

fn required(rest: &str, syntax: &str) -> Result<String> {
    if rest.is_empty() {
        Err(Error::Usage(format!("Syntax: {}", syntax)))
    } else {
        Ok(rest.to_string())
    }
}

fn one_path(rest: &str, syntax: &str) -> Result<PathBuf> {
    let words = split_words(rest)?;
    match words.as_slice() {
        [path] => Ok(PathBuf::from(expand_home(path))),
        _ => Err(Error::Usage(format!("Syntax: {}", syntax))),
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home, rest),
        _ => path.to_string(),
    }
}

fn gen_target(rest: &str) -> Result<GenTarget> {
    match rest {
        "" => Ok(GenTarget::Show),
        "none" => Ok(GenTarget::Detach),
        other => other
            .parse()
            .map(GenTarget::Number)
            .map_err(|_| Error::Usage(format!("Didn't understand {:?} as a generation", other))),
    }
}

/// Split on whitespace, keeping single- or double-quoted runs together.
///
/// Quotes are removed; a quote of the other kind inside a run is kept.
pub fn split_words(text: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::Usage("Unclosed quote".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
