use ratatui::{
    backend::{Backend, CrosstermBackend},
    widgets::{Block, Borders, Paragraph},
    layout::{Layout, Constraint, Direction, Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    Terminal, Frame,
};
use crossterm::{
    terminal::{enable_raw_mode, disable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    event::{self, Event, KeyCode, KeyEventKind},
    ExecutableCommand,
};
use log::warn;
use std::io::{self, Write};
use std::time::Duration;

use crate::analysis::TrafficReport;
use crate::utils::formatting::{format_bandwidth, format_bytes, format_duration};
use crate::visualization::{LengthHistogramChart, PerMinuteChart, ProtocolPieChart};

/// Leaves raw mode and the alternate screen. Both steps run even if the
/// first one fails; the first error is returned.
fn restore_terminal<W: Write>(out: &mut W, disable_raw: impl FnOnce() -> io::Result<()>) -> io::Result<()> {
    let raw = disable_raw();
    let screen = out.execute(LeaveAlternateScreen).map(|_| ());
    raw.and(screen)
}

const TABS: [&str; 3] = ["Packets per Minute", "Protocols", "Packet Sizes"];

/// Full-screen terminal viewer for the aggregate charts.
pub struct ChartViewer<'a> {
    pub should_quit: bool,
    pub selected_tab: usize,
    report: &'a TrafficReport,
    source_name: String,
    per_minute: PerMinuteChart,
    protocols: ProtocolPieChart,
    lengths: LengthHistogramChart,
}

impl<'a> ChartViewer<'a> {
    pub fn new(report: &'a TrafficReport, source_name: impl Into<String>) -> Self {
        ChartViewer {
            should_quit: false,
            selected_tab: 0,
            report,
            source_name: source_name.into(),
            per_minute: PerMinuteChart::new(&report.packets_per_interval, report.interval_secs),
            protocols: ProtocolPieChart::new(&report.protocols),
            lengths: LengthHistogramChart::new(&report.length_histogram),
        }
    }

    /// Takes over the terminal until the user quits.
    pub fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = stdout.execute(EnterAlternateScreen) {
            if let Err(restore) = restore_terminal(&mut io::stdout(), disable_raw_mode) {
                warn!("Failed to restore terminal: {}", restore);
            }
            return Err(e.into());
        }

        let backend = CrosstermBackend::new(stdout);
        let result = Terminal::new(backend)
            .map_err(anyhow::Error::from)
            .and_then(|mut terminal| self.event_loop(&mut terminal));

        let restored = restore_terminal(&mut io::stdout(), disable_raw_mode);
        result.and(restored.map_err(anyhow::Error::from))
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Right => {
                self.selected_tab = (self.selected_tab + 1) % TABS.len();
            },
            KeyCode::BackTab | KeyCode::Left => {
                self.selected_tab = (self.selected_tab + TABS.len() - 1) % TABS.len();
            },
            KeyCode::Char('1') => self.selected_tab = 0,
            KeyCode::Char('2') => self.selected_tab = 1,
            KeyCode::Char('3') => self.selected_tab = 2,
            _ => {}
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Tabs
                Constraint::Length(3),  // Summary
                Constraint::Min(0),     // Chart
                Constraint::Length(3),  // Footer
            ])
            .split(f.size());

        self.draw_header(f, chunks[0]);
        self.draw_summary(f, chunks[1]);

        match self.selected_tab {
            1 => self.protocols.render(chunks[2], f),
            2 => self.lengths.render(chunks[2], f),
            _ => self.per_minute.render(chunks[2], f),
        }

        self.draw_footer(f, chunks[3]);
    }

    fn draw_header(&self, f: &mut Frame, area: Rect) {
        let selected_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let normal_style = Style::default().fg(Color::White);

        let tab_titles: Vec<Span> = TABS.iter().enumerate().map(|(i, &tab)| {
            let style = if i == self.selected_tab { selected_style } else { normal_style };
            Span::styled(format!(" {}:{} ", i + 1, tab), style)
        }).collect();

        let header = Paragraph::new(Line::from(tab_titles))
            .block(Block::default().borders(Borders::ALL).title(format!("Capture Report - {}", self.source_name)))
            .alignment(Alignment::Center);

        f.render_widget(header, area);
    }

    fn summary_text(&self) -> String {
        let report = self.report;
        match (report.first_seen, report.last_seen) {
            (Some(first), Some(last)) => {
                let span_secs = (last - first).num_seconds().max(0) as u64;
                let mut text = format!(
                    "Packets: {} | Bytes: {} | {} to {} UTC ({})",
                    report.total_records,
                    format_bytes(report.total_bytes),
                    first.format("%Y-%m-%d %H:%M:%S"),
                    last.format("%H:%M:%S"),
                    format_duration(span_secs),
                );
                if span_secs > 0 {
                    text.push_str(&format!(" | Avg: {}", format_bandwidth(report.total_bytes as f64 / span_secs as f64)));
                }
                text
            }
            _ => "Packets: 0 | no IP traffic in capture".to_string(),
        }
    }

    fn draw_summary(&self, f: &mut Frame, area: Rect) {
        let summary = Paragraph::new(self.summary_text())
            .block(Block::default().borders(Borders::ALL).title("Summary"))
            .alignment(Alignment::Center);
        f.render_widget(summary, area);
    }

    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        let footer = Paragraph::new("Press 'q' to quit | Tab/1-3 to switch charts")
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);

        f.render_widget(footer, area);
    }
}
