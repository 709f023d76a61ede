use tabled::builder::Builder;
use tabled::settings::Style;

use crate::session::{Cell, ResultSet, Variables};

/// Shown in place of NULL cells
pub const NULL_MARKER: &str = "∘";

/// Render result number `index` with `#index.row` labels.
///
/// Integers equal to a variable's value are shown as `$name`.
pub fn render_result(index: usize, result: &ResultSet, vars: &Variables) -> String {
    if result.is_empty() {
        return "No results found.".to_string();
    }

    let width = (result.len() - 1).to_string().len();
    let mut builder = Builder::default();

    let mut header = vec!["#".to_string()];
    header.extend(result.columns.iter().cloned());
    builder.push_record(header);

    for (n, row) in result.rows.iter().enumerate() {
        let mut record = vec![format!("#{}.{:0>width$}", index, n, width = width)];
        record.extend(row.iter().map(|cell| display_cell(cell, vars)));
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Render all variables as a name/value table
pub fn render_variables(vars: &Variables) -> String {
    if vars.is_empty() {
        return "No variables defined.".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(vec!["name".to_string(), "value".to_string()]);
    for (name, value) in vars.sorted() {
        builder.push_record(vec![name.to_string(), value.to_string()]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

fn display_cell(cell: &Cell, vars: &Variables) -> String {
    match cell {
        Cell::Null => NULL_MARKER.to_string(),
        Cell::Integer(n) => {
            let text = n.to_string();
            match vars.name_for(&text) {
                Some(name) => format!("${}", name),
                None => text,
            }
        }
        other => other.to_string(),
    }
}
