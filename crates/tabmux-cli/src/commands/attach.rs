//! `tabmux attach <tab>...`: multiplex tabs in the local terminal.
//!
//! Opens every requested tab, enters raw mode on the alternate screen and
//! runs the multiplexer until the last tab is closed or `Ctrl+] q` is
//! pressed. Terminal focus changes are reported to the multiplexer as the
//! panel going out of sight and coming back, so idle tabs are reclaimed
//! while the terminal is in the background.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::{self, Event};
use tabmux_client::{
    Endpoint, Multiplexer, MuxConfig, MuxEvent, PanelEvent, Runtime, SessionInfo, SessionKey,
    TAIL_LINE_CHOICES,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::TabSpec;
use crate::keys::{Action, KeyMap};
use crate::screen::Screen;
use crate::terminal as term;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// What the tab bar currently shows.
struct View {
    tabs: Vec<SessionInfo>,
    note: Option<String>,
    dirty: bool,
    /// Where downloaded logs are written.
    downloads: PathBuf,
}

impl Default for View {
    fn default() -> Self {
        Self {
            tabs: Vec::new(),
            note: None,
            dirty: false,
            downloads: PathBuf::from("."),
        }
    }
}

impl View {
    fn note(&mut self, note: impl Into<String>) {
        self.note = Some(note.into());
        self.dirty = true;
    }
}

pub async fn run(endpoint: Endpoint, config: MuxConfig, tabs: Vec<TabSpec>) -> Result<()> {
    if tabs.is_empty() {
        anyhow::bail!("nothing to attach");
    }

    let (cols, rows) = term::get_terminal_size();
    let screen = Screen::new((cols, rows));
    let mut runtime = Runtime::new(config, endpoint, Box::new(screen.clone()));

    let _guard = term::RawModeGuard::enter().context("failed to enter raw terminal mode")?;
    screen.resize(cols, rows);

    for tab in &tabs {
        runtime
            .mux()
            .open(tab.kind, &tab.name(), &tab.instance, &tab.component);
    }
    info!(tabs = tabs.len(), cols, rows, "attached");

    // Read crossterm events on a plain thread; it stays blocked in `read`
    // until the process exits.
    let (tx_events, mut rx_events) = mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(ev) => {
                if tx_events.send(ev).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("crossterm event error: {e}");
                break;
            }
        }
    });

    let mut keys = KeyMap::new();
    let mut view = View::default();
    sync_view(runtime.mux(), &screen, &mut view);

    loop {
        tokio::select! {
            alive = runtime.pump() => {
                if !alive {
                    break;
                }
            }
            event = rx_events.recv() => {
                let Some(event) = event else {
                    break;
                };
                if handle_event(runtime.mux(), &screen, &mut keys, &mut view, event) == Flow::Quit {
                    break;
                }
            }
        }
        if !sync_view(runtime.mux(), &screen, &mut view) {
            break;
        }
    }

    runtime.shutdown();
    info!("detached");
    Ok(())
}

/// Apply the multiplexer's tab events to the screen. Returns false once
/// there is nothing left to show.
fn sync_view(mux: &mut Multiplexer, screen: &Screen, view: &mut View) -> bool {
    for event in mux.drain_events() {
        match event {
            MuxEvent::TabActivated { key } => {
                screen.show(&key);
                view.dirty = true;
            }
            MuxEvent::TabOpened { .. } | MuxEvent::TabClosed { .. } => view.dirty = true,
            MuxEvent::HidePanel => {
                if mux.is_empty() {
                    screen.blank();
                    return false;
                }
            }
            MuxEvent::ShowPanel => {}
        }
    }

    let tabs = mux.sessions();
    if view.dirty || tabs != view.tabs {
        screen.draw_tab_bar(&tabs, view.note.as_deref());
        view.tabs = tabs;
        view.dirty = false;
    }
    true
}

/// Apply one terminal event. Failed actions are reported on the tab bar;
/// only quitting ends the session.
fn handle_event(
    mux: &mut Multiplexer,
    screen: &Screen,
    keys: &mut KeyMap,
    view: &mut View,
    event: Event,
) -> Flow {
    match event {
        Event::Key(key) => {
            let action = keys.translate(&key);
            if action != Action::Nothing && !matches!(action, Action::Input(_)) {
                view.note = None;
                view.dirty = true;
            }
            return match apply(mux, view, action) {
                Ok(flow) => flow,
                Err(e) => {
                    warn!("{e:#}");
                    view.note(format!("error: {e:#}"));
                    Flow::Continue
                }
            };
        }
        Event::Resize(cols, rows) => {
            debug!(cols, rows, "terminal resized");
            screen.resize(cols, rows);
            mux.window_resized();
            view.dirty = true;
        }
        Event::FocusLost => mux.handle_panel_event(PanelEvent::Hidden),
        Event::FocusGained => {
            mux.handle_panel_event(PanelEvent::Shown);
            // Coming back reconnects whatever the reclaimer closed meanwhile.
            if let Some(active) = mux.active_key().cloned() {
                if let Err(e) = mux.activate(&active) {
                    warn!(key = %active, "cannot re-activate tab: {e}");
                }
            }
        }
        _ => {}
    }
    Flow::Continue
}

fn apply(mux: &mut Multiplexer, view: &mut View, action: Action) -> Result<Flow> {
    if action == Action::Quit {
        mux.handle_panel_event(PanelEvent::Unload);
        return Ok(Flow::Quit);
    }
    let Some(active) = mux.active_key().cloned() else {
        return Ok(Flow::Continue);
    };

    match action {
        Action::Input(bytes) => {
            mux.input(&active, &bytes)?;
        }
        Action::NextTab | Action::PrevTab | Action::JumpTo(_) => {
            let order: Vec<SessionKey> = mux.sessions().into_iter().map(|s| s.key).collect();
            let current = order.iter().position(|k| *k == active).unwrap_or(0);
            if let Some(key) = pick_tab(&action, current, order.len()).and_then(|i| order.get(i)) {
                mux.activate(key)?;
            }
        }
        Action::CloseTab => mux.remove(&active)?,
        Action::ToggleTimestamps => match mux.log_view(&active).map(|v| !v.show_timestamps) {
            Some(on) => {
                mux.set_show_timestamps(&active, on)?;
                view.note(format!("timestamps {}", on_off(on)));
            }
            None => view.note("not a log tab"),
        },
        Action::ToggleAutoScroll => match mux.log_view(&active).map(|v| !v.auto_scroll) {
            Some(on) => {
                mux.set_auto_scroll(&active, on)?;
                view.note(format!("auto-scroll {}", on_off(on)));
            }
            None => view.note("not a log tab"),
        },
        Action::CycleTail => match mux.log_view(&active).map(|v| next_tail(v.tail_lines)) {
            Some(tail) => {
                mux.set_tail_lines(&active, tail)?;
                view.note(format!("tail {tail} lines"));
            }
            None => view.note("not a log tab"),
        },
        Action::Clear => mux.clear_output(&active)?,
        Action::Download => {
            if mux.log_view(&active).is_none() {
                view.note("not a log tab");
            } else {
                let export = mux.export_logs(&active, Utc::now())?;
                let path = view.downloads.join(&export.file_name);
                std::fs::write(&path, &export.contents)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(file = %path.display(), bytes = export.contents.len(), "logs saved");
                view.note(format!("saved {}", export.file_name));
            }
        }
        Action::Quit | Action::Nothing => {}
    }
    Ok(Flow::Continue)
}

/// Index of the tab a navigation action lands on.
fn pick_tab(action: &Action, current: usize, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    match action {
        Action::NextTab => Some((current + 1) % count),
        Action::PrevTab => Some((current + count - 1) % count),
        Action::JumpTo(i) if *i < count => Some(*i),
        _ => None,
    }
}

/// The tail choice after `current`, wrapping around.
fn next_tail(current: u32) -> u32 {
    TAIL_LINE_CHOICES
        .iter()
        .copied()
        .find(|&n| n > current)
        .unwrap_or(TAIL_LINE_CHOICES[0])
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
