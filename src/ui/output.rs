use crate::output::is_quiet;
use crate::ui::{icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", icons::DATABASE, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", icons::CROSS, label.style(theme().error.clone()));
}

pub fn info(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", icons::INFO.style(theme().info.clone()), label);
}

pub fn timing(elapsed: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", icons::CLOCK.style(theme().dim.clone()), elapsed);
}

/// Compact count: `9999`, `12.3K`, `4.5M`, `1.2G`, `3.0T`
pub fn human_count(n: u64) -> String {
    let f = n as f64;
    if n < 10_000 {
        n.to_string()
    } else if f < 1e6 {
        format!("{:.1}K", f / 1e3)
    } else if f < 1e9 {
        format!("{:.1}M", f / 1e6)
    } else if f < 1e12 {
        format!("{:.1}G", f / 1e9)
    } else {
        format!("{:.1}T", f / 1e12)
    }
}
