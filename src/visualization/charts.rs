use ratatui::{
    prelude::*,
    symbols,
    widgets::{
        canvas::{Canvas, Points},
        BarChart, Block, Borders, Paragraph,
    },
    style::{Color, Style},
};
use chrono::{DateTime, Utc};
use std::f64::consts::TAU;

use crate::analysis::{Histogram, TimeBucket, ValueCount};
use crate::utils::formatting::truncate_string;

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Red,
    Color::Blue,
];

pub fn palette_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

fn render_empty(frame: &mut Frame, area: Rect, title: &str) {
    let placeholder = Paragraph::new("No packets to display")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    frame.render_widget(placeholder, area);
}

/// Width per bar so that `count` bars fit inside `area`, clamped to `max`.
fn fit_bar_width(area: Rect, count: usize, gap: u16, max: u16) -> u16 {
    if count == 0 {
        return 1;
    }
    let inner = area.width.saturating_sub(2) as usize;
    let per_bar = inner / count;
    (per_bar.saturating_sub(gap as usize) as u16).clamp(1, max)
}

/// Bar chart of packets per resampling window.
///
/// Labels are formatted at render time, only for the bars that fit.
pub struct PerMinuteChart {
    buckets: Vec<(DateTime<Utc>, u64)>,
    label_format: &'static str,
    interval_secs: i64,
}

impl PerMinuteChart {
    pub fn new(buckets: &[TimeBucket], interval_secs: i64) -> Self {
        let spans_days = match (buckets.first(), buckets.last()) {
            (Some(first), Some(last)) => first.start.date_naive() != last.start.date_naive(),
            _ => false,
        };

        Self {
            buckets: buckets.iter().map(|bucket| (bucket.start, bucket.count)).collect(),
            label_format: if spans_days { "%m-%d %H:%M" } else { "%H:%M" },
            interval_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn label(&self, index: usize) -> Option<String> {
        self.buckets
            .get(index)
            .map(|(start, _)| start.format(self.label_format).to_string())
    }

    /// Number of bars drawn in `area`, at least one column per bar plus the gap.
    fn visible_bars(&self, area: Rect) -> usize {
        let inner = area.width.saturating_sub(2) as usize;
        self.buckets.len().min(inner / 2)
    }

    pub fn title(&self) -> String {
        if self.interval_secs == 60 {
            "Number of Packets per Minute".to_string()
        } else {
            format!("Number of Packets per {}s", self.interval_secs)
        }
    }

    pub fn render(&self, area: Rect, frame: &mut Frame) {
        let title = self.title();
        if self.buckets.is_empty() {
            render_empty(frame, area, &title);
            return;
        }

        let visible = self.visible_bars(area);
        let labels: Vec<String> = (0..visible).filter_map(|i| self.label(i)).collect();
        let data: Vec<(&str, u64)> = labels
            .iter()
            .zip(&self.buckets)
            .map(|(label, (_, count))| (label.as_str(), *count))
            .collect();

        let title = if visible < self.buckets.len() {
            format!("{} (first {} of {})", title, visible, self.buckets.len())
        } else {
            title
        };

        let chart = BarChart::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .data(data.as_slice())
            .bar_width(fit_bar_width(area, data.len(), 1, 11))
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .label_style(Style::default().fg(Color::Gray));

        frame.render_widget(chart, area);
    }
}

/// Protocol distribution drawn as a pie on a braille canvas, with a legend.
pub struct ProtocolPieChart {
    slices: Vec<(String, u64)>,
    total: u64,
}

impl ProtocolPieChart {
    pub fn new(protocols: &[ValueCount]) -> Self {
        Self {
            slices: protocols
                .iter()
                .map(|entry| (entry.value.clone(), entry.count))
                .collect(),
            total: protocols.iter().map(|entry| entry.count).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Upper fraction boundary of each slice, clockwise from 12 o'clock.
    fn cumulative_fractions(&self) -> Vec<f64> {
        let mut running = 0u64;
        self.slices
            .iter()
            .map(|(_, count)| {
                running += count;
                running as f64 / self.total as f64
            })
            .collect()
    }

    /// Canvas dots for every slice, one dot per braille sub-cell inside the unit circle.
    fn slice_points(&self, area: Rect, aspect: f64) -> Vec<Vec<(f64, f64)>> {
        let mut points = vec![Vec::new(); self.slices.len()];
        let bounds = self.cumulative_fractions();
        let cols = area.width.saturating_sub(2) as usize * 2;
        let rows = area.height.saturating_sub(2) as usize * 4;

        for col in 0..cols {
            let x = -aspect + (col as f64 + 0.5) / cols as f64 * 2.0 * aspect;
            for row in 0..rows {
                let y = -1.0 + (row as f64 + 0.5) / rows as f64 * 2.0;
                if x * x + y * y > 1.0 {
                    continue;
                }
                let mut angle = x.atan2(y);
                if angle < 0.0 {
                    angle += TAU;
                }
                let fraction = angle / TAU;
                let slice = bounds
                    .iter()
                    .position(|&upper| fraction < upper)
                    .unwrap_or(bounds.len() - 1);
                points[slice].push((x, y));
            }
        }
        points
    }

    fn legend(&self) -> Vec<Line<'static>> {
        self.slices
            .iter()
            .enumerate()
            .map(|(i, (label, count))| {
                let percentage = *count as f64 / self.total as f64 * 100.0;
                Line::from(vec![
                    Span::styled("■ ", Style::default().fg(palette_color(i))),
                    Span::raw(format!("{:<8} {:>8} ({:.1}%)", truncate_string(label, 8), count, percentage)),
                ])
            })
            .collect()
    }

    pub fn render(&self, area: Rect, frame: &mut Frame) {
        let title = "Protocol Distribution";
        if self.is_empty() {
            render_empty(frame, area, title);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        // terminal cells are about twice as tall as wide
        let inner_height = chunks[0].height.saturating_sub(2) as f64;
        let inner_width = chunks[0].width.saturating_sub(2) as f64;
        let aspect = if inner_height > 0.0 {
            (inner_width / (2.0 * inner_height)).max(1.0)
        } else {
            1.0
        };

        let slices = self.slice_points(chunks[0], aspect);
        let canvas = Canvas::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .marker(symbols::Marker::Braille)
            .x_bounds([-aspect, aspect])
            .y_bounds([-1.0, 1.0])
            .paint(|ctx| {
                for (i, coords) in slices.iter().enumerate() {
                    ctx.draw(&Points {
                        coords,
                        color: palette_color(i),
                    });
                }
            });
        frame.render_widget(canvas, chunks[0]);

        let legend = Paragraph::new(self.legend())
            .block(Block::default().title("Protocols").borders(Borders::ALL));
        frame.render_widget(legend, chunks[1]);
    }
}

/// Packet size histogram, one bar per bin.
pub struct LengthHistogramChart {
    counts: Vec<u64>,
    range: Option<(f64, f64)>,
    bin_width: Option<f64>,
}

impl LengthHistogramChart {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            counts: histogram.bins.iter().map(|bin| bin.count).collect(),
            range: histogram.range(),
            bin_width: histogram.bin_width(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn title(&self) -> String {
        match (self.range, self.bin_width) {
            (Some((low, high)), Some(width)) => format!(
                "Packet Size Distribution ({} bins, {:.0}-{:.0} bytes, {:.1} bytes/bin)",
                self.counts.len(),
                low,
                high,
                width
            ),
            _ => "Packet Size Distribution".to_string(),
        }
    }

    pub fn render(&self, area: Rect, frame: &mut Frame) {
        let title = self.title();
        if self.counts.is_empty() {
            render_empty(frame, area, &title);
            return;
        }

        let data: Vec<(&str, u64)> = self.counts.iter().map(|count| ("", *count)).collect();

        let chart = BarChart::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .data(data.as_slice())
            .bar_width(fit_bar_width(area, data.len(), 0, 4))
            .bar_gap(0)
            .bar_style(Style::default().fg(Color::Yellow))
            .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));

        frame.render_widget(chart, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{histogram, HistogramBin};
    use ratatui::backend::TestBackend;

    fn bucket(secs: i64, count: u64) -> TimeBucket {
        TimeBucket {
            start: DateTime::from_timestamp(secs, 0).unwrap(),
            count,
        }
    }

    fn protocols() -> Vec<ValueCount> {
        vec![
            ValueCount { value: "TCP".to_string(), count: 3 },
            ValueCount { value: "UDP".to_string(), count: 1 },
        ]
    }

    #[test]
    fn test_per_minute_labels() {
        let chart = PerMinuteChart::new(&[bucket(3_600, 4), bucket(3_660, 0)], 60);
        assert_eq!(chart.len(), 2);
        assert_eq!(chart.label(0).as_deref(), Some("01:00"));
        assert_eq!(chart.label(1).as_deref(), Some("01:01"));
        assert_eq!(chart.label(2), None);
        assert_eq!(chart.title(), "Number of Packets per Minute");

        let chart = PerMinuteChart::new(&[bucket(0, 1), bucket(86_400, 1)], 86_400);
        assert_eq!(chart.label(1).as_deref(), Some("01-02 00:00"));
        assert_eq!(chart.title(), "Number of Packets per 86400s");
    }

    #[test]
    fn test_long_span_draws_only_fitting_bars() {
        let buckets: Vec<TimeBucket> = (0..200_000).map(|i| bucket(i * 60, i as u64 % 3)).collect();
        let chart = PerMinuteChart::new(&buckets, 60);
        assert_eq!(chart.len(), 200_000);

        let area = Rect::new(0, 0, 102, 20);
        assert_eq!(chart.visible_bars(area), 50);
        assert_eq!(PerMinuteChart::new(&buckets[..3], 60).visible_bars(area), 3);

        let mut terminal = Terminal::new(TestBackend::new(102, 20)).unwrap();
        terminal.draw(|f| chart.render(f.size(), f)).unwrap();
    }

    #[test]
    fn test_pie_slices_cover_circle() {
        let chart = ProtocolPieChart::new(&protocols());
        let bounds = chart.cumulative_fractions();
        assert_eq!(bounds, vec![0.75, 1.0]);

        let area = Rect::new(0, 0, 42, 22);
        let slices = chart.slice_points(area, 1.0);
        let tcp = slices[0].len() as f64;
        let udp = slices[1].len() as f64;
        assert!(tcp > 0.0 && udp > 0.0);
        let share = tcp / (tcp + udp);
        assert!((share - 0.75).abs() < 0.05, "tcp share was {}", share);
    }

    #[test]
    fn test_histogram_title() {
        let hist = Histogram {
            bins: vec![
                HistogramBin { lower: 60.0, upper: 80.0, count: 2 },
                HistogramBin { lower: 80.0, upper: 100.0, count: 1 },
            ],
        };
        let chart = LengthHistogramChart::new(&hist);
        assert_eq!(chart.title(), "Packet Size Distribution (2 bins, 60-100 bytes, 20.0 bytes/bin)");
    }

    #[test]
    fn test_fit_bar_width() {
        let area = Rect::new(0, 0, 102, 10);
        assert_eq!(fit_bar_width(area, 50, 0, 4), 2);
        assert_eq!(fit_bar_width(area, 500, 0, 4), 1);
        assert_eq!(fit_bar_width(area, 2, 1, 11), 11);
        assert_eq!(fit_bar_width(area, 0, 1, 11), 1);
    }

    #[test]
    fn test_render_with_and_without_data() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        let empty_hist = histogram(&[], 50).unwrap();
        terminal
            .draw(|f| {
                let area = f.size();
                PerMinuteChart::new(&[], 60).render(area, f);
                ProtocolPieChart::new(&[]).render(area, f);
                LengthHistogramChart::new(&empty_hist).render(area, f);
            })
            .unwrap();

        let hist = histogram(&[60, 60, 1500, 576, 40], 50).unwrap();
        terminal
            .draw(|f| {
                let area = f.size();
                PerMinuteChart::new(&[bucket(0, 3), bucket(60, 0), bucket(120, 2)], 60).render(area, f);
                ProtocolPieChart::new(&protocols()).render(area, f);
                LengthHistogramChart::new(&hist).render(area, f);
            })
            .unwrap();
    }
}
