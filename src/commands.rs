use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use memsee::config::{load_config, write_config, MemseeConfig};
use memsee::ui::{self, Spinner};
use memsee::{App, Command, Reply};
use owo_colors::OwoColorize;

const PROMPT: &str = "memsee> ";

/// Build the app from config and open or create the start-up database
pub fn start(config_path: Option<&Path>, database: Option<PathBuf>) -> anyhow::Result<App> {
    let config = load_config(config_path)?.unwrap_or_default();
    let mut app = App::new(config.settings());

    let database = database.or_else(|| config.database.as_ref().map(PathBuf::from));
    if let Some(path) = database {
        let (verb, command) = if path.exists() {
            ("open", Command::Open(path.clone()))
        } else {
            ("create", Command::Create(path.clone()))
        };
        let replies = app.run(command);
        if failed(&replies) {
            show(&app, &replies);
            anyhow::bail!("could not {} {}", verb, path.display());
        }
        ui::header(&format!("{}", path.display()));
    }
    Ok(app)
}

/// Read commands from stdin until end of input
pub fn run_shell(app: &mut App) -> anyhow::Result<()> {
    let interactive = io::stdin().is_terminal();
    if interactive {
        ui::info("Type `help` for commands, Ctrl-D to leave");
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("{}", PROMPT.style(ui::theme().prompt.clone()));
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        execute_line(app, &line?);
    }

    if interactive {
        println!();
    }
    Ok(())
}

/// Run each argument as one command; fails if any command failed
pub fn run_batch(app: &mut App, lines: &[String]) -> anyhow::Result<()> {
    let failures = lines.iter().filter(|line| !execute_line(app, line)).count();
    if failures > 0 {
        anyhow::bail!("{} of {} commands failed", failures, lines.len());
    }
    Ok(())
}

pub fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    write_config(path, &MemseeConfig::with_defaults(), force)?;
    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}

/// Run one line and print its replies; returns false if it failed
fn execute_line(app: &mut App, line: &str) -> bool {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            ui::error(&e.to_string());
            return false;
        }
    };

    let replies = if command.is_long_running() {
        let spinner = Spinner::new(line.trim());
        let start = Instant::now();
        let replies = app.run(command);
        spinner.finish();
        ui::timing(&format!("{:.1}s", start.elapsed().as_secs_f64()));
        replies
    } else {
        app.run(command)
    };

    show(app, &replies);
    !failed(&replies)
}

fn failed(replies: &[Reply]) -> bool {
    replies.iter().any(|r| matches!(r, Reply::Error(_)))
}

fn show(app: &App, replies: &[Reply]) {
    for reply in replies {
        match reply {
            Reply::Table { index, result } => {
                println!("{}", ui::render_result(*index, result, app.variables()));
            }
            Reply::Message(text) => println!("{}", text),
            Reply::Error(text) => ui::error(text),
        }
    }
}
