//! Terminal rendering of the stage

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, LineGauge, Paragraph, Wrap},
    Frame,
};

use crate::progress::{ProgressBar, RunStatus};
use crate::stage::{BarParts, Element, ElementContent};

/// Full-screen view of every element mounted on the widget's stage
pub struct ProgressScreen {
    show_help: bool,
}

impl ProgressScreen {
    pub fn new() -> Self {
        Self { show_help: true }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, bar: &ProgressBar) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);

        for element in bar.stage().mounted() {
            if element.is_hidden() || element.opacity <= 0.0 {
                continue;
            }
            self.render_element(frame, chunks[0], &element);
        }

        self.render_status(frame, chunks[1], bar);
    }

    fn render_element(&self, frame: &mut Frame, area: Rect, element: &Element) {
        let mut base = Style::default();
        if let Some(bg) = element.style_value("background-color").and_then(parse_color) {
            base = base.bg(bg);
        }
        if element.opacity < 1.0 {
            base = base.add_modifier(Modifier::DIM);
        }

        frame.render_widget(Clear, area);
        frame.render_widget(Block::default().style(base), area);

        match &element.content {
            ElementContent::Bar(parts) => self.render_bar(frame, area, parts, base),
            ElementContent::Markup(text) => {
                let inner = area.inner(&Margin {
                    vertical: area.height / 3,
                    horizontal: 2,
                });
                let paragraph = Paragraph::new(text.as_str())
                    .style(base)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, inner);
            }
        }
    }

    fn render_bar(&self, frame: &mut Frame, area: Rect, parts: &BarParts, base: Style) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Length(1), // line
                Constraint::Min(0),
                Constraint::Length(1), // label
                Constraint::Length(1),
            ])
            .split(area);

        let line_color = part_style(parts.line.style.as_ref(), "border-top")
            .and_then(|value| value.split_whitespace().last())
            .and_then(parse_color)
            .unwrap_or(Color::Cyan);
        let gauge = LineGauge::default()
            .ratio(parts.ratio())
            .label("")
            .line_set(symbols::line::THICK)
            .style(base)
            .gauge_style(base.fg(line_color));
        frame.render_widget(gauge, rows[1]);

        let label_color = part_style(parts.label.style.as_ref(), "color")
            .and_then(parse_color)
            .unwrap_or(Color::Gray);
        let label = Paragraph::new(parts.label.text.as_str())
            .style(base.fg(label_color))
            .alignment(Alignment::Center);
        frame.render_widget(label, rows[3]);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, bar: &ProgressBar) {
        let mut spans = vec![
            Span::styled(
                format!(" {} ", bar.status()),
                Style::default()
                    .fg(status_color(bar.status()))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{:.2}%", bar.value())),
        ];
        if !bar.is_ready() {
            spans.push(Span::styled(
                format!("  waiting for {} ({} queued)", bar.options().container, bar.pending_commands()),
                Style::default().fg(Color::Yellow),
            ));
        }
        if self.show_help {
            spans.push(Span::styled(
                "  s start  f finish  i fade in  o fade out  h help  q quit",
                Style::default().fg(Color::DarkGray),
            ));
        }
        let status = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::NONE));
        frame.render_widget(status, area);
    }
}

impl Default for ProgressScreen {
    fn default() -> Self {
        Self::new()
    }
}

fn part_style<'a>(
    style: Option<&'a crate::stage::StyleMap>,
    property: &str,
) -> Option<&'a str> {
    style?.get(property).map(String::as_str)
}

fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Idle => Color::Gray,
        RunStatus::Running | RunStatus::Sprint => Color::Cyan,
        RunStatus::SlowCrawl => Color::Yellow,
        RunStatus::TimedOut => Color::Red,
        RunStatus::Done => Color::Green,
    }
}

/// Parse a CSS colour: `#rgb`, `#rrggbb` or a basic colour name
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some(Color::Rgb(r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => Some(Color::Rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            _ => None,
        };
    }
    match value.to_ascii_lowercase().as_str() {
        "black" => Some(Color::Black),
        "white" => Some(Color::White),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "blue" => Some(Color::Blue),
        "yellow" => Some(Color::Yellow),
        "cyan" => Some(Color::Cyan),
        "magenta" => Some(Color::Magenta),
        "gray" | "grey" => Some(Color::Gray),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgressOptions;
    use crate::progress::Callbacks;
    use crate::scheduler::{FrameScheduler, FrameSource, ManualClock};
    use crate::stage::Stage;
    use ratatui::{backend::TestBackend, Terminal};

    fn bar(options: ProgressOptions) -> ProgressBar {
        let clock = ManualClock::new();
        ProgressBar::new(
            options,
            Callbacks::new(),
            Stage::new(),
            FrameScheduler::manual(&clock, FrameSource::Timer),
        )
    }

    fn draw(bar: &ProgressBar) -> String {
        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        let screen = ProgressScreen::new();
        terminal
            .draw(|frame| {
                let area = frame.size();
                screen.render(frame, area, bar);
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_color("#102030"), Some(Color::Rgb(16, 32, 48)));
        assert_eq!(parse_color(" Red "), Some(Color::Red));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("#ggg"), None);
        assert_eq!(parse_color("transparent"), None);
    }

    #[test]
    fn test_render_bar_label() {
        let mut bar = bar(ProgressOptions::default());
        bar.set_progress(42.0);
        let content = draw(&bar);
        assert!(content.contains("42%"));
        assert!(content.contains("idle"));
    }

    #[test]
    fn test_hidden_element_is_skipped() {
        let mut bar = bar(ProgressOptions::default());
        bar.set_progress(42.0).hide();
        let content = draw(&bar);
        assert!(!content.contains("42%"));
    }

    #[test]
    fn test_render_template() {
        let options = ProgressOptions {
            template: Some("<p>Loading assets</p>".to_string()),
            ..ProgressOptions::default()
        };
        let content = draw(&bar(options));
        assert!(content.contains("Loading assets"));
    }
}
