//! The tab panel drawn into the local terminal.
//!
//! The bottom row holds the tab bar. The rows above it are a scroll region
//! owned by the active tab. Inactive tabs keep receiving output into their
//! backlog and are repainted from it when switched to.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use tabmux_client::{
    ConnectionState, Dimensions, MuxResult, SessionInfo, SessionKey, SessionKind, Surface,
    SurfaceFactory,
};
use tracing::debug;

use crate::backlog::Backlog;

const BACKLOG_BYTES: usize = 256 * 1024;

struct ScreenState {
    cols: u16,
    rows: u16,
    active: Option<SessionKey>,
    backlogs: HashMap<SessionKey, Backlog>,
    out: Box<dyn Write>,
}

impl ScreenState {
    fn emit(&mut self, data: &[u8]) {
        if let Err(e) = self.out.write_all(data).and_then(|()| self.out.flush()) {
            debug!("terminal write failed: {e}");
        }
    }

    /// Rows available to the active tab.
    fn viewport(&self) -> Dimensions {
        Dimensions::new(self.cols, self.rows.saturating_sub(1))
    }

    fn set_scroll_region(&mut self) {
        let last = self.rows.saturating_sub(1).max(1);
        self.emit(format!("\x1b[1;{last}r").as_bytes());
    }
}

/// Shared handle on the terminal. Cloning it is cheap; every clone and every
/// surface it creates draws to the same terminal.
#[derive(Clone)]
pub struct Screen {
    state: Rc<RefCell<ScreenState>>,
}

impl Screen {
    /// A screen on stdout of the given size.
    pub fn new(size: (u16, u16)) -> Self {
        Self::with_writer(size, Box::new(std::io::stdout()))
    }

    pub fn with_writer(size: (u16, u16), out: Box<dyn Write>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ScreenState {
                cols: size.0,
                rows: size.1,
                active: None,
                backlogs: HashMap::new(),
                out,
            })),
        }
    }

    pub fn resize(&self, cols: u16, rows: u16) {
        let mut state = self.state.borrow_mut();
        state.cols = cols;
        state.rows = rows;
        state.set_scroll_region();
    }

    /// Give the scroll region to `key` and repaint it from its backlog.
    pub fn show(&self, key: &SessionKey) {
        let mut state = self.state.borrow_mut();
        state.active = Some(key.clone());
        state.set_scroll_region();
        state.emit(b"\x1b[2J\x1b[H");
        let replay = state.backlogs.get(key).map(Backlog::snapshot);
        if let Some(replay) = replay {
            state.emit(&replay);
        }
    }

    /// Clear the scroll region and detach it from any tab.
    pub fn blank(&self) {
        let mut state = self.state.borrow_mut();
        state.active = None;
        state.emit(b"\x1b[2J\x1b[H");
    }

    /// Redraw the tab bar on the bottom row without moving the cursor.
    pub fn draw_tab_bar(&self, tabs: &[SessionInfo], note: Option<&str>) {
        let mut state = self.state.borrow_mut();
        let bar = render_tab_bar(tabs, note, state.cols as usize);
        let frame = format!("\x1b7\x1b[{};1H\x1b[2K{bar}\x1b[0m\x1b8", state.rows);
        state.emit(frame.as_bytes());
    }
}

impl SurfaceFactory for Screen {
    fn create(&mut self, key: &SessionKey, kind: SessionKind) -> MuxResult<Box<dyn Surface>> {
        debug!(key = %key, ?kind, "terminal surface created");
        self.state
            .borrow_mut()
            .backlogs
            .insert(key.clone(), Backlog::new(BACKLOG_BYTES));
        Ok(Box::new(TerminalSurface {
            key: key.clone(),
            state: Rc::clone(&self.state),
        }))
    }
}

struct TerminalSurface {
    key: SessionKey,
    state: Rc<RefCell<ScreenState>>,
}

impl TerminalSurface {
    fn is_active(state: &ScreenState, key: &SessionKey) -> bool {
        state.active.as_ref() == Some(key)
    }
}

impl Surface for TerminalSurface {
    fn write(&mut self, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(backlog) = state.backlogs.get_mut(&self.key) {
            backlog.push(data);
        }
        if Self::is_active(&state, &self.key) {
            state.emit(data);
        }
    }

    fn clear(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(backlog) = state.backlogs.get_mut(&self.key) {
            backlog.clear();
        }
        if Self::is_active(&state, &self.key) {
            state.emit(b"\x1b[2J\x1b[H");
        }
    }

    fn fit(&mut self) -> Option<Dimensions> {
        Some(self.state.borrow().viewport()).filter(Dimensions::is_usable)
    }

    fn dispose(&mut self) {
        let mut state = self.state.borrow_mut();
        state.backlogs.remove(&self.key);
        if Self::is_active(&state, &self.key) {
            state.active = None;
        }
    }
}

fn state_marker(state: ConnectionState) -> char {
    match state {
        ConnectionState::Open => '●',
        ConnectionState::PendingConnect | ConnectionState::Connecting => '…',
        ConnectionState::Closed => '×',
        ConnectionState::Idle => '·',
    }
}

/// One line of tabs, the active one in reverse video, cut to `width`
/// visible characters.
pub fn render_tab_bar(tabs: &[SessionInfo], note: Option<&str>, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    let mut push = |out: &mut String, text: &str, active: bool| {
        let room = width.saturating_sub(used);
        let text: String = text.chars().take(room).collect();
        used += text.chars().count();
        if active {
            out.push_str("\x1b[7m");
            out.push_str(&text);
            out.push_str("\x1b[27m");
        } else {
            out.push_str(&text);
        }
    };

    for (i, tab) in tabs.iter().enumerate() {
        let label = format!(" {}:{} {} ", i + 1, tab.name, state_marker(tab.state));
        push(&mut out, &label, tab.active);
    }
    if let Some(note) = note {
        push(&mut out, &format!(" | {note}"), false);
    }
    out
}
