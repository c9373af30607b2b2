//! Console, JSON and CSV rendering of run results.

use bench_common::{RequestType, RunConfig};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Table};

use crate::presenter::{Plot, PlotKind, Presentation};

/// Formats presentations and configurations for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Results table: one row per service and concurrency level.
    pub fn format_table(view: &Presentation) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                "Service",
                "Concurrent users",
                "QPS",
                "Mean response time (s)",
            ]);

        for row in &view.table {
            table.add_row(vec![
                Cell::new(&row.service),
                Cell::new(row.concurrent_users),
                Cell::new(format_value(row.qps, 2)),
                Cell::new(format_value(row.response_time, 3)),
            ]);
        }

        table.to_string()
    }

    /// A plot as a table: x labels across, one row per series.
    pub fn format_plot(plot: &Plot) -> String {
        let mut table = Table::new();
        let mut header = vec![format!("{} ({})", plot.kind.title(), plot.kind.unit())];
        header.extend(plot.x_labels.iter().map(|users| format!("{} users", users)));

        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(header);

        let precision = match plot.kind {
            PlotKind::Throughput => 2,
            PlotKind::Latency => 3,
        };
        for series in &plot.series {
            let mut row = vec![series.label.clone()];
            row.extend(series.points.iter().map(|p| format_value(*p, precision)));
            table.add_row(row);
        }

        table.to_string()
    }

    /// Both plots followed by the full results table.
    pub fn format_full(view: &Presentation) -> String {
        [
            Self::format_plot(&view.throughput),
            Self::format_plot(&view.latency),
            Self::format_table(view),
        ]
        .join("\n")
    }

    /// Format a presentation as JSON.
    pub fn format_json(view: &Presentation) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(view)?)
    }

    /// Format the results table as CSV rows (without header).
    pub fn format_csv(view: &Presentation) -> String {
        view.table
            .iter()
            .map(|row| {
                format!(
                    "{},{},{},{}",
                    csv_field(&row.service),
                    row.concurrent_users,
                    row.qps.map(|v| format!("{:.2}", v)).unwrap_or_default(),
                    row.response_time
                        .map(|v| format!("{:.3}", v))
                        .unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "service,concurrent_users,qps,mean_response_time_secs"
    }

    /// Overview of a configuration, as shown before launching.
    pub fn format_config(config: &RunConfig) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["#", "Service", "URL", "Type", "Attachment"]);

        for (index, service) in config.services.iter().enumerate() {
            let summary = service.summary(index);
            let attachment = match service.active_attachment() {
                Some(file) => format!("{} ({} bytes)", file.file_name, file.len()),
                None if service.request_type == RequestType::Image => {
                    "none selected".to_string()
                }
                None => "-".to_string(),
            };
            table.add_row(vec![
                (index + 1).to_string(),
                summary.display_name,
                summary.display_url,
                summary.request_type.as_str().to_string(),
                attachment,
            ]);
        }

        format!(
            "{}\nConcurrency levels: {}\nRequests per user: {}",
            table,
            if config.concurrency_levels.is_empty() {
                "none selected".to_string()
            } else {
                config.concurrency_levels.to_string()
            },
            config.requests_per_user
        )
    }
}

fn format_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
