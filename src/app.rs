//! Interactive command layer
//!
//! [`App`] owns the open database, the session state and the graph cache,
//! and turns each input line into a list of [`Reply`] values for a front
//! end to display. Errors never escape [`App::run_line`]; they become
//! [`Reply::Error`] and the session carries on.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use crate::command::{split_words, Command, GenTarget, HELP, PATH_SYNTAX};
use crate::compiler::compile;
use crate::config::{ensure_db_dir, Settings};
use crate::graph::{Direction, GraphCache};
use crate::import::Importer;
use crate::reachability::{AncestorClassifier, Collector};
use crate::session::{ResultSet, Session, Variables};
use crate::storage::{MemStore, SqlOutcome};
use crate::ui::render_variables;
use crate::{Error, Result};

/// Something to show the user
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A recorded result, addressable as `#index.row`
    Table { index: usize, result: ResultSet },
    Message(String),
    Error(String),
}

pub struct App {
    store: Option<MemStore>,
    session: Session,
    graphs: GraphCache,
    settings: Settings,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            store: None,
            session: Session::new(),
            graphs: GraphCache::new(),
            settings,
        }
    }

    pub fn store(&self) -> Option<&MemStore> {
        self.store.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn variables(&self) -> &Variables {
        &self.session.variables
    }

    /// Parse and execute one line
    pub fn run_line(&mut self, line: &str) -> Vec<Reply> {
        match Command::parse(line) {
            Ok(Some(command)) => self.run(command),
            Ok(None) => Vec::new(),
            Err(e) => vec![Reply::Error(e.to_string())],
        }
    }

    /// Execute a parsed command, reporting failure as a reply
    pub fn run(&mut self, command: Command) -> Vec<Reply> {
        match self.execute(command) {
            Ok(replies) => replies,
            Err(e) => {
                tracing::debug!("command failed: {:?}", e);
                vec![Reply::Error(e.to_string())]
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Vec<Reply>> {
        if command.needs_database() && self.store.is_none() {
            return Err(Error::NoDatabase);
        }

        match command {
            Command::Create(path) => self.create(&path),
            Command::Open(path) => self.open(&path),
            Command::Read(path) => self.read(&path),
            Command::Stats => Ok(vec![message(self.db()?.stats()?)]),
            Command::Gen(target) => self.generation(target),
            Command::Set(None) => Ok(vec![message(render_variables(&self.session.variables))]),
            Command::Set(Some(definition)) => self.set(&definition),
            Command::Echo(text) => Ok(vec![message(compile(&text, &self.session)?)]),
            Command::Select(rest) => self.select(&format!("select {}", rest)),
            Command::Insert(rest) => self.modify(&format!("insert {}", rest), "inserted"),
            Command::Update(rest) => self.modify(&format!("update {}", rest), "updated"),
            Command::Delete(rest) => self.modify(&format!("delete {}", rest), "deleted"),
            Command::Pin(condition) => self.modify(
                &format!(
                    "insert into ref (parent, child) select 0, address from obj where {}",
                    condition
                ),
                "pinned",
            ),
            Command::Gc => self.gc(false),
            Command::ContinueGc => self.gc(true),
            Command::Path(rest) => self.path(&rest),
            Command::AncestorTypes(condition) => self.ancestor_types(&condition),
            Command::Parents(arg) => {
                let address = self.address_argument(&arg, "parents ADDRESS")?;
                let result = self.db()?.parents(address)?;
                Ok(vec![self.record(result)])
            }
            Command::Info(arg) => {
                let address = self.address_argument(&arg, "info ADDRESS")?;
                let result = self.db()?.object(address)?;
                Ok(vec![self.record(result)])
            }
            Command::Kids(arg) => self.kids(&arg),
            Command::Shell(sql) => self.shell(&sql),
            Command::Help => Ok(vec![message(HELP)]),
        }
    }

    fn db(&self) -> Result<&MemStore> {
        self.store.as_ref().ok_or(Error::NoDatabase)
    }

    /// Store a result in the history; empty results get no index
    fn record(&mut self, result: ResultSet) -> Reply {
        if result.is_empty() {
            return message("No results found.");
        }
        let index = self.session.record(result.clone());
        Reply::Table { index, result }
    }

    fn attach(&mut self, store: MemStore) {
        self.session.reset();
        self.graphs.clear();
        self.store = Some(store);
    }

    fn create(&mut self, path: &Path) -> Result<Vec<Reply>> {
        ensure_db_dir(path)?;
        let store = MemStore::create(path)?;
        self.attach(store);
        tracing::info!("created database {}", path.display());
        Ok(vec![message(format!("Database created: {}", path.display()))])
    }

    fn open(&mut self, path: &Path) -> Result<Vec<Reply>> {
        let store = MemStore::open(path)?;
        let variables = store.all_variables()?;
        self.attach(store);
        for (name, value) in &variables {
            self.session.variables.bind(name, value);
        }
        tracing::info!("opened database {} with {} variables", path.display(), variables.len());
        Ok(vec![message(format!(
            "Database opened: {} ({} variables)",
            path.display(),
            variables.len()
        ))])
    }

    fn read(&mut self, path: &Path) -> Result<Vec<Reply>> {
        let store = self.db()?;
        let file = File::open(path)?;
        let start = Instant::now();

        let stats = Importer::new(store)
            .with_batch_size(self.settings.batch_size)
            .run(BufReader::new(file), |_| {})?;

        Ok(vec![
            message(format!("Marked {} top objects", stats.roots)),
            message(format!(
                "Generation {}: {} ({:.1}s)",
                stats.generation,
                stats,
                start.elapsed().as_secs_f64()
            )),
        ])
    }

    fn generation(&mut self, target: GenTarget) -> Result<Vec<Reply>> {
        let store = self.db()?;
        let count = store.generation_count()?;

        let text = match target {
            GenTarget::Show => {
                let current = store
                    .current_generation()?
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| "-none-".to_string());
                format!("{} generations, current is {}", count, current)
            }
            GenTarget::Detach => {
                store.switch_to(None)?;
                format!("Using no generation, of {}", count)
            }
            GenTarget::Number(n) => {
                if n == 0 || n > count {
                    return Err(Error::Usage(format!("Not a valid generation number: {}", n)));
                }
                store.switch_to(Some(n))?;
                format!("Using generation {} of {}", n, count)
            }
        };
        Ok(vec![message(text)])
    }

    fn set(&mut self, definition: &str) -> Result<Vec<Reply>> {
        let compiled = compile(definition, &self.session)?;
        let Some((name, value)) = compiled.trim().split_once(char::is_whitespace) else {
            return Err(Error::Usage("Syntax: set NAME VALUE".to_string()));
        };
        let value = value.trim();

        self.db()?.define_variable(name, value)?;
        self.session.variables.bind(name, value);
        Ok(vec![message(format!("${} = {}", name, value))])
    }

    fn select(&mut self, text: &str) -> Result<Vec<Reply>> {
        let sql = compile(text, &self.session)?;
        let result = self.db()?.query(&sql)?;
        Ok(vec![self.record(result)])
    }

    fn modify(&mut self, text: &str, verb: &str) -> Result<Vec<Reply>> {
        let sql = compile(text, &self.session)?;
        let changed = self.db()?.execute(&sql)?;
        Ok(vec![message(format!("{} rows {}", changed, verb))])
    }

    fn shell(&mut self, text: &str) -> Result<Vec<Reply>> {
        let sql = compile(text, &self.session)?;
        match self.db()?.run(&sql)? {
            SqlOutcome::Rows(result) => Ok(vec![self.record(result)]),
            SqlOutcome::Changed(n) => Ok(vec![message(format!("{} rows affected", n))]),
        }
    }

    fn gc(&mut self, resume: bool) -> Result<Vec<Reply>> {
        let store = self.db()?;
        let before = store.stats()?;
        let collector = Collector::new(store);
        let report = if resume { collector.resume()? } else { collector.collect()? };
        let after = store.stats()?;

        Ok(vec![
            message(format!("Before: {}", before)),
            message(report.to_string()),
            message(format!("After: {}", after)),
        ])
    }

    fn ancestor_types(&mut self, condition: &str) -> Result<Vec<Reply>> {
        let condition = compile(condition, &self.session)?;
        let result = AncestorClassifier::new(self.db()?)
            .with_excluded(self.settings.excluded_ancestor_types.clone())
            .classify(&condition)?;
        Ok(vec![self.record(result)])
    }

    fn path(&mut self, rest: &str) -> Result<Vec<Reply>> {
        let compiled = compile(rest, &self.session)?;
        let words = split_words(&compiled)?;
        let direction = match words.as_slice() {
            [from, _, to, _] if from == "from" && to == "to" => Direction::Outgoing,
            [from, _, to, _, rev] if from == "from" && to == "to" && rev == "reversed" => {
                Direction::Incoming
            }
            _ => return Err(Error::Usage(format!("Syntax: {}", PATH_SYNTAX))),
        };
        let (from_condition, to_condition) = (&words[1], &words[3]);

        let store = self.store.as_ref().ok_or(Error::NoDatabase)?;
        let source = store
            .query(&format!("SELECT address FROM obj WHERE {}", from_condition))?
            .addresses()
            .first()
            .copied()
            .ok_or_else(|| Error::NoMatch(from_condition.clone()))?;
        let targets = store
            .query(&format!("SELECT address FROM obj WHERE {}", to_condition))?
            .addresses();

        let generation = store
            .current_generation()?
            .ok_or_else(|| Error::Usage("No current generation".to_string()))?;
        let paths = self.graphs.get_or_load(store, generation)?.shortest_paths(source, &targets, direction);
        tracing::debug!("{} paths from {} to {} targets", paths.len(), source, targets.len());

        let mut results = Vec::with_capacity(paths.len());
        for path in &paths {
            results.push(store.objects_in_order(path)?);
        }

        if results.is_empty() {
            return Ok(vec![message("No path found.")]);
        }
        Ok(results.into_iter().map(|result| self.record(result)).collect())
    }

    /// Show an object, then keep descending through children referenced only once
    fn kids(&mut self, arg: &str) -> Result<Vec<Reply>> {
        let address = self.address_argument(arg, "kids ADDRESS")?;
        let object = self.db()?.object(address)?;
        let mut replies = vec![self.record(object)];

        let mut shown = std::collections::HashSet::new();
        let mut to_show = vec![address];
        while !to_show.is_empty() {
            shown.extend(to_show.iter().copied());
            let children = self.db()?.children_with_ref_counts(&to_show)?;

            to_show = match (children.column_index("address"), children.column_index("refs")) {
                (Some(addr), Some(refs)) => children
                    .rows
                    .iter()
                    .filter(|row| row[refs].as_integer() == Some(1))
                    .filter_map(|row| row[addr].as_integer())
                    .filter(|a| !shown.contains(a))
                    .collect(),
                _ => Vec::new(),
            };

            if !children.is_empty() {
                replies.push(self.record(children));
            }
        }
        Ok(replies)
    }

    fn address_argument(&self, arg: &str, syntax: &str) -> Result<i64> {
        let compiled = compile(arg, &self.session)?;
        let words = split_words(&compiled)?;
        match words.as_slice() {
            [word] => word
                .parse()
                .map_err(|_| Error::Usage(format!("Need an object address: {}", syntax))),
            _ => Err(Error::Usage(format!("Need an object address: {}", syntax))),
        }
    }
}

fn message(text: impl ToString) -> Reply {
    Reply::Message(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Cell;
    use std::io::Write;

    const DUMP: &str = r#"{"address": 1, "type": "dict", "size": 100, "len": 2, "refs": [2, 3]}
{"address": 2, "type": "str", "size": 40, "value": "hello", "refs": []}
{"address": 3, "type": "list", "size": 72, "len": 1, "refs": [4]}
{"address": 4, "type": "int", "size": 24, "value": 7, "refs": []}
"#;

    fn app_with_dump() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("heap.json");
        std::fs::File::create(&dump).unwrap().write_all(DUMP.as_bytes()).unwrap();

        let mut app = App::new(Settings::default());
        let db = dir.path().join("heap.db");
        assert!(matches!(app.run_line(&format!("create {}", db.display()))[0], Reply::Message(_)));
        let replies = app.run_line(&format!("read {}", dump.display()));
        assert!(replies.iter().all(|r| matches!(r, Reply::Message(_))), "{:?}", replies);
        (dir, app)
    }

    fn table(replies: &[Reply]) -> (usize, &ResultSet) {
        match &replies[0] {
            Reply::Table { index, result } => (*index, result),
            other => panic!("expected a table, got {:?}", other),
        }
    }

    #[test]
    fn test_needs_database() {
        let mut app = App::new(Settings::default());
        assert_eq!(
            app.run_line("stats"),
            vec![Reply::Error("Need an open database".to_string())]
        );
        // echo works without one
        assert_eq!(app.run_line("echo 5&").len(), 1);
    }

    #[test]
    fn test_select_records_results() {
        let (_dir, mut app) = app_with_dump();
        let replies = app.run_line("select address from obj where type = 'dict'");
        let (index, result) = table(&replies);
        assert_eq!(index, 0);
        assert_eq!(result.addresses(), vec![1]);

        let replies = app.run_line("select address from obj where address in #0.0&");
        let (index, result) = table(&replies);
        assert_eq!(index, 1);
        assert_eq!(result.addresses(), vec![2, 3]);
    }

    #[test]
    fn test_empty_result_is_not_recorded() {
        let (_dir, mut app) = app_with_dump();
        assert_eq!(
            app.run_line("select * from obj where address = 12345"),
            vec![message("No results found.")]
        );
        assert!(app.session().history.is_empty());
    }

    #[test]
    fn test_set_binds_compiled_value() {
        let (_dir, mut app) = app_with_dump();
        app.run_line("select address from obj where type = 'list'");
        app.run_line("set lst #0.0");
        assert_eq!(app.variables().value_of("lst"), Some("3"));

        let replies = app.run_line("select address from obj where address in $lst&");
        assert_eq!(table(&replies).1.addresses(), vec![4]);
        assert!(matches!(app.run_line("set lonely")[0], Reply::Error(_)));
    }

    #[test]
    fn test_gen_validation() {
        let (_dir, mut app) = app_with_dump();
        assert_eq!(app.run_line("gen"), vec![message("1 generations, current is 1")]);
        assert_eq!(
            app.run_line("gen 2"),
            vec![Reply::Error("Not a valid generation number: 2".to_string())]
        );
        assert_eq!(app.run_line("gen none"), vec![message("Using no generation, of 1")]);
        assert_eq!(app.run_line("gen"), vec![message("1 generations, current is -none-")]);
        assert_eq!(app.run_line("gen 1"), vec![message("Using generation 1 of 1")]);
    }

    #[test]
    fn test_modifications_report_counts() {
        let (_dir, mut app) = app_with_dump();
        assert_eq!(app.run_line("pin address = 4"), vec![message("1 rows pinned")]);
        assert_eq!(
            app.run_line("update obj set name = 'x' where address = 4"),
            vec![message("1 rows updated")]
        );
        assert_eq!(app.run_line("delete from obj where address = 4"), vec![message("1 rows deleted")]);
    }

    #[test]
    fn test_gc_keeps_reachable_objects() {
        let (_dir, mut app) = app_with_dump();
        app.run_line("delete from ref where parent = 0");
        let replies = app.run_line("gc");
        assert_eq!(replies.len(), 3);
        // Nothing is reachable from the root any more, except the root itself
        assert_eq!(app.store().unwrap().count_objects().unwrap(), 1);
    }

    #[test]
    fn test_path_and_reversed_path() {
        let (_dir, mut app) = app_with_dump();
        let replies = app.run_line(r#"path from "address = 1" to "address = 4""#);
        assert_eq!(table(&replies).1.addresses(), vec![1, 3, 4]);

        let replies = app.run_line(r#"path from "address = 4" to "address = 1" reversed"#);
        assert_eq!(table(&replies).1.addresses(), vec![4, 3, 1]);

        assert_eq!(
            app.run_line(r#"path from "address = 4" to "address = 1""#),
            vec![message("No path found.")]
        );
        assert!(matches!(
            &app.run_line(r#"path from "address = 99" to "address = 1""#)[0],
            Reply::Error(e) if e.starts_with("No match")
        ));
        assert!(matches!(&app.run_line("path to nowhere")[0], Reply::Error(e) if e.starts_with("Syntax")));
    }

    #[test]
    fn test_kids_descends_through_single_references() {
        let (_dir, mut app) = app_with_dump();
        let replies = app.run_line("kids 1");
        let tables: Vec<Vec<i64>> = replies
            .iter()
            .map(|r| match r {
                Reply::Table { result, .. } => result.addresses(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(tables, vec![vec![1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_parents_and_info() {
        let (_dir, mut app) = app_with_dump();
        assert_eq!(table(&app.run_line("parents 4")).1.addresses(), vec![3]);
        let replies = app.run_line("info 2");
        let (_, result) = table(&replies);
        assert_eq!(result.column("value").unwrap(), vec![&Cell::Text("hello".to_string())]);
        assert!(matches!(app.run_line("info two")[0], Reply::Error(_)));
    }

    #[test]
    fn test_shell_and_ancestor_types() {
        let (_dir, mut app) = app_with_dump();
        assert_eq!(
            app.run_line("shell UPDATE obj SET mark = 1 WHERE address > 2"),
            vec![message("2 rows affected")]
        );

        let replies = app.run_line("ancestor_types address = 4");
        let (_, result) = table(&replies);
        assert_eq!(result.columns, vec!["depth", "type", "count"]);
    }

    #[test]
    fn test_generations_keep_their_own_graphs() {
        let (dir, mut app) = app_with_dump();
        let second = dir.path().join("second.json");
        std::fs::write(&second, "{\"address\": 1, \"type\": \"dict\", \"size\": 8, \"refs\": [4]}\n{\"address\": 4, \"type\": \"int\", \"size\": 8, \"refs\": []}\n").unwrap();
        app.run_line(&format!("read {}", second.display()));
        assert_eq!(app.run_line("gen"), vec![message("2 generations, current is 2")]);

        let replies = app.run_line(r#"path from "address = 1" to "address = 4""#);
        assert_eq!(table(&replies).1.addresses(), vec![1, 4]);

        app.run_line("gen 1");
        let replies = app.run_line(r#"path from "address = 1" to "address = 4""#);
        assert_eq!(table(&replies).1.addresses(), vec![1, 3, 4]);
    }

    #[test]
    fn test_reopen_restores_variables() {
        let (dir, mut app) = app_with_dump();
        app.run_line("set big 1");
        let db = dir.path().join("heap.db");
        app.run_line(&format!("open {}", db.display()));
        assert_eq!(app.variables().value_of("big"), Some("1"));
        assert!(app.session().history.is_empty());
    }
}
