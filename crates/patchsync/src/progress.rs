//! 📊 progress.rs — "how'd the run go?" — a summary table, graph by graph.
//!
//! 🧠 Knowledge graph: a live streaming throughput bar fits a pipeline that
//! moves one document at a time for minutes on end. This engine's unit of
//! work is a whole graph settled in one filesystem pass — there's nothing
//! to animate mid-graph, only a result to report once it's done. So the
//! bar becomes a per-graph spinner (something to look at while a big batch
//! zips) and the throughput table becomes a per-run summary table, built
//! on the same `comfy_table::Table` + `NOTHING` preset.

use comfy_table::{presets::NOTHING, Cell, CellAlignment, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::RunSummary;

/// 🎡 A spinner shown while one graph is being synchronized — there's no
/// meaningful percentage to report until the batch plan is known, so it
/// just spins rather than pretending to measure progress it can't see.
pub fn graph_spinner(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(format!("synchronizing {label}"));
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

/// 🔢 Comma-grouping helper for file counts — "1,000,000 files" beats
/// "1000000 files".
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 🍽️ Render a `RunSummary` as a comfy two-column table for stdout.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        Cell::new("Graphs processed").set_alignment(CellAlignment::Right),
        Cell::new(format_number(summary.graphs_processed as u64)),
    ]);
    table.add_row(vec![
        Cell::new("Files sealed").set_alignment(CellAlignment::Right),
        Cell::new(format_number(summary.total_sealed)),
    ]);
    table.add_row(vec![
        Cell::new("Open-tail delta").set_alignment(CellAlignment::Right),
        Cell::new(summary.total_open_tail.to_string()),
    ]);

    table.to_string()
}
