use memsee::config::Settings;
use memsee::object::VALUE_SENTINEL;
use memsee::{App, Cell, Reply, ResultSet};

// 1 -> 2 -> 3, 1 -> 4, 5 alone; record 4 has an unescaped quote in its value
const DUMP: &str = r#"{"address": 1, "type": "module", "name": "app", "size": 56, "refs": [2, 4]}
{"address": 2, "type": "dict", "size": 280, "len": 1, "refs": [3]}
{"address": 3, "type": "str", "size": 50, "value": "needle", "refs": []}
{"address": 4, "type": "str", "size": 60, "value": "say "hi"", "refs": []}
{"address": 5, "type": "list", "size": 72, "len": 0, "refs": []}
"#;

struct Fixture {
    dir: tempfile::TempDir,
    app: App,
}

impl Fixture {
    fn new(settings: Settings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("heap.json"), DUMP).unwrap();
        let mut app = App::new(settings);
        let db = dir.path().join("heap.db");
        expect_ok(&app.run_line(&format!("create {}", db.display())));
        Self { dir, app }
    }

    fn read_dump(&mut self) -> Vec<Reply> {
        let path = self.dir.path().join("heap.json");
        self.app.run_line(&format!("read {}", path.display()))
    }

    fn table(&mut self, line: &str) -> ResultSet {
        match self.app.run_line(line).into_iter().next() {
            Some(Reply::Table { result, .. }) => result,
            other => panic!("{:?} gave {:?}", line, other),
        }
    }
}

fn expect_ok(replies: &[Reply]) {
    assert!(
        replies.iter().all(|r| !matches!(r, Reply::Error(_))),
        "unexpected failure: {:?}",
        replies
    );
}

#[test]
fn import_recovers_malformed_value_and_links_roots() {
    let mut fx = Fixture::new(Settings::default());
    let replies = fx.read_dump();
    expect_ok(&replies);
    assert_eq!(replies[0], Reply::Message("Marked 2 top objects".to_string()));

    let result = fx.table("select value from obj where address = 4");
    assert_eq!(result.rows[0][0], Cell::Text(VALUE_SENTINEL.to_string()));

    // 1 and 5 had no referrers
    let roots = fx.table("select address from obj where address in 0& order by address");
    assert_eq!(roots.addresses(), vec![1, 5]);
}

#[test]
fn back_references_feed_later_queries() {
    let mut fx = Fixture::new(Settings::default());
    expect_ok(&fx.read_dump());

    let strings = fx.table("select address, value from obj where type = 'str' order by address");
    assert_eq!(strings.addresses(), vec![3, 4]);

    // A text column expands to quoted literals
    let same = fx.table("select address from obj where value in #0.value order by address");
    assert_eq!(same.addresses(), vec![3, 4]);

    // Row reference plus a parents chain
    let parent = fx.table("select address from obj where address in #0.0^");
    assert_eq!(parent.addresses(), vec![2]);

    assert_eq!(
        fx.app.run_line("select * from obj where address = #7.0"),
        vec![Reply::Error("#7.0 doesn't name a result".to_string())]
    );
    assert_eq!(
        fx.app.run_line("echo $missing"),
        vec![Reply::Error("Named reference undefined: $missing".to_string())]
    );
}

#[test]
fn gc_after_dropping_a_root_edge() {
    let mut fx = Fixture::new(Settings::default());
    expect_ok(&fx.read_dump());

    assert_eq!(
        fx.app.run_line("delete from ref where parent = 0 and child = 5"),
        vec![Reply::Message("1 rows deleted".to_string())]
    );
    expect_ok(&fx.app.run_line("gc"));
    let left = fx.table("select address from obj order by address");
    assert_eq!(left.addresses(), vec![0, 1, 2, 3, 4]);

    // Nothing left to do on a second pass
    expect_ok(&fx.app.run_line("continue_gc"));
    assert_eq!(fx.app.store().unwrap().count_objects().unwrap(), 5);
}

#[test]
fn ancestor_exclusions_come_from_settings() {
    let settings = Settings {
        excluded_ancestor_types: vec!["dict".to_string()],
        ..Settings::default()
    };
    let mut fx = Fixture::new(settings);
    expect_ok(&fx.read_dump());

    // The dict parent of 3 is excluded, so only depth 0 is recorded
    let report = fx.table("ancestor_types address = 3");
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0][0], Cell::Integer(0));
}

#[test]
fn variables_survive_reopening() {
    let mut fx = Fixture::new(Settings::default());
    expect_ok(&fx.read_dump());
    fx.table("select address from obj where type = 'list'");
    expect_ok(&fx.app.run_line("set lonely #0.0"));

    let db = fx.dir.path().join("heap.db");
    expect_ok(&fx.app.run_line(&format!("open {}", db.display())));
    assert!(fx.app.session().history.is_empty());

    let result = fx.table("select address, type from obj where address = $lonely");
    assert_eq!(result.addresses(), vec![5]);
}

#[test]
fn commands_without_database_fail_cleanly() {
    let mut app = App::new(Settings::default());
    for line in ["stats", "gc", "select 1", "kids 1", "gen"] {
        assert_eq!(
            app.run_line(line),
            vec![Reply::Error("Need an open database".to_string())],
            "{}",
            line
        );
    }
}
