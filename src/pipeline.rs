use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::analysis::{PacketTable, TrafficReport};
use crate::capture::CaptureReader;
use crate::config::Config;
use crate::traffic::extract_records;
use crate::ui::ChartViewer;
use crate::visualization::{open_in_browser, render_html, write_html, write_top_talkers, ScatterData};

/// Materialized table plus the aggregates computed from it.
pub struct Analysis {
    pub packets_read: u64,
    pub table: PacketTable,
    pub report: TrafficReport,
}

/// Reads the capture, extracts records and aggregates them.
pub fn analyze(config: &Config) -> Result<Analysis> {
    config.validate()?;

    let path = &config.capture.file;
    let mut reader = CaptureReader::open(path)?;
    let records = extract_records(reader.by_ref())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let packets_read = reader.stats().packets_read;
    info!("Read {} packets, kept {} IP records", packets_read, records.len());

    let table = PacketTable::load(records)?;
    let report = TrafficReport::build(&table, &config.analysis)?;

    Ok(Analysis {
        packets_read,
        table,
        report,
    })
}

pub fn print_top_talkers<W: Write>(out: &mut W, report: &TrafficReport) -> io::Result<()> {
    write_top_talkers(out, "Top Sources", &report.top_sources)?;
    writeln!(out)?;
    write_top_talkers(out, "Top Destinations", &report.top_destinations)
}

pub fn export_report(path: &Path, report: &TrafficReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Exported report to {}", path.display());
    Ok(())
}

/// Runs every stage once: analysis, ranked lists, charts, scatter page.
pub fn run(config: &Config) -> Result<()> {
    let Analysis { table, report, .. } = analyze(config)?;

    print_top_talkers(&mut io::stdout().lock(), &report)?;

    if let Some(path) = &config.output.export_json {
        export_report(path, &report)?;
    }

    if config.output.interactive {
        let source_name = config.capture.file.display().to_string();
        ChartViewer::new(&report, source_name).run()?;
    }

    let scatter_file = &config.output.scatter_file;
    let html = render_html(&ScatterData::from_table(&table))?;
    write_html(scatter_file, &html)?;

    if config.output.open_browser {
        open_in_browser(scatter_file)?;
    }
    Ok(())
}
