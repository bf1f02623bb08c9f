//! Window state and terminal rendering.
//!
//! A [`Window`] is shared as an event argument, so its state sits behind a
//! mutex even though only the dispatch thread mutates it.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};

use dcterm_events::{names, Arg, AsyncChannel, EventError, EventManager};

use crate::error::Result;

/// Scrollback kept per window.
pub const MAX_LINES: usize = 500;

const PROMPT: &str = "> ";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScreenState {
    pub lines: VecDeque<String>,
    pub input: String,
    pub status: String,
}

#[derive(Debug)]
pub struct Window {
    title: String,
    state: Mutex<ScreenState>,
    channel: AsyncChannel,
}

impl Window {
    pub fn new(manager: &EventManager, title: impl Into<String>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            title: title.into(),
            state: Mutex::new(ScreenState::default()),
            channel: AsyncChannel::new(manager)?,
        }))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Channel producers use to run closures against this window on the
    /// dispatch thread.
    pub fn channel(&self) -> &AsyncChannel {
        &self.channel
    }

    fn lock(&self) -> MutexGuard<'_, ScreenState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_line(&self, line: impl Into<String>) {
        let mut state = self.lock();
        state.lines.push_back(line.into());
        while state.lines.len() > MAX_LINES {
            state.lines.pop_front();
        }
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.lock().status = status.into();
    }

    pub fn push_input(&self, text: &str) {
        self.lock().input.push_str(text);
    }

    pub fn pop_input(&self) -> Option<char> {
        self.lock().input.pop()
    }

    /// Takes the input line, leaving it empty.
    pub fn take_input(&self) -> String {
        std::mem::take(&mut self.lock().input)
    }

    pub fn snapshot(&self) -> ScreenState {
        self.lock().clone()
    }

    /// Emits [`names::WINDOW_UPDATED`] for this window.
    pub fn notify_updated(self: &Arc<Self>, manager: &EventManager) -> Result<()> {
        manager.emit(names::WINDOW_UPDATED, Arg::object(self.clone()))?;
        Ok(())
    }

    /// Emits [`names::WINDOW_STATUS_UPDATED`] for this window.
    pub fn notify_status(self: &Arc<Self>, manager: &EventManager) -> Result<()> {
        manager.emit(names::WINDOW_STATUS_UPDATED, Arg::object(self.clone()))?;
        Ok(())
    }
}

/// Upgrades a listener's handle on a window.
///
/// Listeners hold windows weakly: the window owns a channel that owns the
/// manager, so a strong handle inside a listener would never be freed.
pub fn upgrade(window: &Weak<Window>) -> dcterm_events::Result<Arc<Window>> {
    window
        .upgrade()
        .ok_or_else(|| EventError::listener("window closed"))
}

/// Draw a window.
pub fn draw(frame: &mut Frame, title: &str, state: &ScreenState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Output area
            Constraint::Length(1), // Status bar
            Constraint::Length(3), // Input area
        ])
        .split(frame.area());

    draw_header(frame, title, chunks[0]);
    draw_output(frame, state, chunks[1]);
    draw_status(frame, state, chunks[2]);
    draw_input(frame, state, chunks[3]);
}

fn draw_header(frame: &mut Frame, title: &str, area: Rect) {
    let header = Paragraph::new(format!(" {} ", title)).style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );
    frame.render_widget(header, area);
}

/// Newest lines at the bottom; older ones scroll off the top.
fn draw_output(frame: &mut Frame, state: &ScreenState, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize; // Account for borders
    let skip = state.lines.len().saturating_sub(inner_height);

    let items: Vec<ListItem> = state
        .lines
        .iter()
        .skip(skip)
        .map(|line| ListItem::new(line.as_str()))
        .collect();

    let output = List::new(items).block(Block::default().borders(Borders::ALL).title(" Output "));
    frame.render_widget(output, area);
}

fn draw_status(frame: &mut Frame, state: &ScreenState, area: Rect) {
    let status = Paragraph::new(format!(" {} ", state.status))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status, area);
}

fn draw_input(frame: &mut Frame, state: &ScreenState, area: Rect) {
    let input_text = format!("{}{}", PROMPT, state.input);
    let width = input_text.chars().count() as u16;

    let input =
        Paragraph::new(input_text).block(Block::default().borders(Borders::ALL).title(" Input "));
    frame.render_widget(input, area);

    // Inside the border, clamped to the last inner column.
    let max_x = area.x + area.width.saturating_sub(2);
    let cursor_x = (area.x + 1 + width).min(max_x);
    frame.set_cursor_position((cursor_x, area.y + 1));
}

/// A terminal that redraws windows on demand.
///
/// Held by the redraw listeners, so it is only ever drawn from the dispatch
/// thread; the mutex makes it shareable.
pub struct Screen<B: Backend> {
    terminal: Mutex<Terminal<B>>,
}

impl<B: Backend> Screen<B> {
    pub fn new(backend: B) -> io::Result<Self> {
        Ok(Self {
            terminal: Mutex::new(Terminal::new(backend)?),
        })
    }

    pub fn render(&self, window: &Window) -> io::Result<()> {
        let state = window.snapshot();
        let mut terminal = match self.terminal.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        terminal.draw(|frame| draw(frame, window.title(), &state))?;
        Ok(())
    }
}
