//! Terminal display sink (ratatui/crossterm).
//!
//! Full-screen panel showing the latest decoded values, refreshed on every
//! sample. Enters the alternate screen on init and restores the terminal on
//! drop, so a panic or shutdown never leaves the terminal in raw mode.

use std::io::{self, Stdout};

use chrono::{DateTime, Utc};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::warn;

use super::{DisplayError, DisplaySink};

/// Display sink rendering to the controlling terminal.
pub struct TuiDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl TuiDisplay {
    /// Builds the terminal handle; the screen is not touched until
    /// [`DisplaySink::init`].
    pub fn new() -> Result<Self, DisplayError> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend).map_err(|e| DisplayError(e.to_string()))?;
        Ok(Self {
            terminal,
            active: false,
        })
    }
}

impl DisplaySink for TuiDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        enable_raw_mode().map_err(|e| DisplayError(e.to_string()))?;
        execute!(io::stdout(), EnterAlternateScreen).map_err(|e| {
            let _ = disable_raw_mode();
            DisplayError(e.to_string())
        })?;
        self.terminal
            .clear()
            .map_err(|e| DisplayError(e.to_string()))?;
        self.active = true;
        Ok(())
    }

    fn render(&mut self, measured_at: DateTime<Utc>, pm25: f64, pm10: f64) {
        let result = self.terminal.draw(|frame| {
            let area = frame.area();
            let block = Block::default()
                .borders(Borders::ALL)
                .title(" hava — air quality ");

            let value_style = Style::default().add_modifier(Modifier::BOLD);
            let lines = vec![
                Line::default(),
                Line::from(vec![
                    Span::raw("PM2.5  "),
                    Span::styled(format!("{pm25:7.2} µg/m³"), value_style),
                ]),
                Line::from(vec![
                    Span::raw("PM10   "),
                    Span::styled(format!("{pm10:7.2} µg/m³"), value_style),
                ]),
                Line::default(),
                Line::from(measured_at.format("%d-%m-%Y %H:%M:%S UTC").to_string()),
            ];

            let [content] = Layout::vertical([Constraint::Min(7)]).areas(area);
            frame.render_widget(
                Paragraph::new(lines).alignment(Alignment::Center).block(block),
                content,
            );
        });
        if let Err(e) = result {
            warn!("display render failed: {}", e);
        }
    }
}

impl Drop for TuiDisplay {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}
