//! Terminal rendering of candidates, matchers, and export results.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use harmon_model::{Candidate, MatchStatus, MatcherEntry};

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn status_cell(status: MatchStatus) -> Cell {
    match status {
        MatchStatus::Idle => Cell::new("idle").fg(Color::Grey),
        MatchStatus::Accepted => Cell::new("accepted").fg(Color::Green),
        MatchStatus::Rejected => Cell::new("rejected").fg(Color::Red),
        MatchStatus::Discarded => Cell::new("discarded").fg(Color::DarkGrey),
    }
}

pub fn print_candidates(candidates: &[Candidate]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Target"),
        header_cell("Score"),
        header_cell("Matcher"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    if let Some(column) = table.column_mut(2) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    for candidate in candidates {
        table.add_row(vec![
            Cell::new(&candidate.source_column),
            Cell::new(&candidate.target_column),
            Cell::new(format!("{:.3}", candidate.score)),
            Cell::new(&candidate.matcher),
            status_cell(candidate.status),
        ]);
    }
    println!("{table}");
    let accepted = candidates
        .iter()
        .filter(|c| c.status == MatchStatus::Accepted)
        .count();
    println!("{} candidates, {accepted} accepted", candidates.len());
}

pub fn print_matchers(entries: &[MatcherEntry]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Matcher"),
        header_cell("Weight"),
        header_cell("Params"),
        header_cell("Origin"),
    ]);
    apply_table_style(&mut table);
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    for entry in entries {
        let params = entry
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        let origin = if entry.code.is_some() {
            Cell::new("registered").fg(Color::Cyan)
        } else {
            Cell::new("built-in")
        };
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(format!("{:.4}", entry.weight)),
            Cell::new(params),
            origin,
        ]);
    }
    println!("{table}");
}
