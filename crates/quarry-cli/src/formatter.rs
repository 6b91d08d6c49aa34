//! Terminal rendering of catalog listings and query results.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use quarry_sql::QueryOutcome;
use quarry_storage::{IndexEntry, Schema, TableEntry, TableStats};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn number(n: impl ToString) -> Cell {
    Cell::new(n.to_string()).set_alignment(CellAlignment::Right)
}

/// Lists tables with their size estimates.
pub fn format_tables(entries: &[TableEntry]) -> String {
    if entries.is_empty() {
        return "No tables.".to_string();
    }
    let mut table = new_table();
    table.set_header(["Table", "Attributes", "Tuples", "Heap file"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.name),
            number(entry.schema.len()),
            number(entry.schema.tuples()),
            Cell::new(entry.data_file.display()),
        ]);
    }
    table.to_string()
}

/// Describes one table's attributes and statistics.
pub fn format_schema(entry: &TableEntry, indexed: &[String]) -> String {
    let mut table = new_table();
    table.set_header(["Attribute", "Type", "Distinct", "Indexed"]);
    for attr in entry.schema.attributes() {
        let is_indexed = indexed.iter().any(|a| a == &attr.name);
        table.add_row(vec![
            Cell::new(&attr.name),
            Cell::new(attr.data_type),
            number(attr.distinct),
            Cell::new(if is_indexed { "yes" } else { "" }),
        ]);
    }
    format!(
        "Table \"{}\" (~{} tuples)\n{table}",
        entry.name,
        entry.schema.tuples()
    )
}

/// Lists registered indexes.
pub fn format_indexes(entries: &[IndexEntry]) -> String {
    if entries.is_empty() {
        return "No indexes.".to_string();
    }
    let mut table = new_table();
    table.set_header(["Table", "Attribute", "Index file"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(&entry.table),
            Cell::new(&entry.attribute),
            Cell::new(entry.file.display()),
        ]);
    }
    table.to_string()
}

/// Summarizes a load.
pub fn format_load(table: &str, schema: &Schema, stats: &TableStats) -> String {
    let mut out = new_table();
    out.set_header(["Attribute", "Distinct"]);
    for (attr, distinct) in schema.attributes().iter().zip(&stats.distinct) {
        out.add_row(vec![Cell::new(&attr.name), number(distinct)]);
    }
    format!("Loaded {} tuples into {table}\n{out}", stats.tuples)
}

/// Summarizes a finished query, with up to `preview` result lines.
pub fn format_outcome(outcome: &QueryOutcome, preview: &[String], timing: bool) -> String {
    let mut out = String::new();
    for line in preview {
        out.push_str(line);
        out.push('\n');
    }
    if !preview.is_empty() && (preview.len() as u64) < outcome.tuples {
        out.push_str("...\n");
    }
    out.push_str(&format!(
        "({} {} written to {})",
        outcome.tuples,
        if outcome.tuples == 1 { "tuple" } else { "tuples" },
        outcome.output.display()
    ));
    if timing {
        out.push_str(&format!("\nTime: {}", format_duration(outcome.elapsed)));
    }
    out
}

/// Formats a duration the way `\timing` output usually reads.
pub fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        format!("{ms:.3} ms")
    } else {
        format!("{:.3} s", ms / 1000.0)
    }
}
