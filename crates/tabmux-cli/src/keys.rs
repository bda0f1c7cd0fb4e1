//! Prefix-key bindings of the attached terminal.
//!
//! `Ctrl+]` arms the prefix; the next key picks a panel command. Everything
//! else is typed into the active tab. `Ctrl+]` twice sends a literal `0x1d`.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::terminal::key_event_to_bytes;

/// What a key press asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Bytes for the active tab.
    Input(Vec<u8>),
    NextTab,
    PrevTab,
    /// Zero-based tab index.
    JumpTo(usize),
    CloseTab,
    ToggleTimestamps,
    ToggleAutoScroll,
    /// Step the log history depth to the next choice.
    CycleTail,
    Clear,
    Download,
    Quit,
    /// Prefix armed, or a key with no meaning.
    Nothing,
}

#[derive(Debug, Default)]
pub struct KeyMap {
    prefix: bool,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next key will be read as a command.
    pub fn armed(&self) -> bool {
        self.prefix
    }

    pub fn translate(&mut self, event: &KeyEvent) -> Action {
        if event.kind == KeyEventKind::Release {
            return Action::Nothing;
        }
        let is_prefix = event.modifiers.contains(KeyModifiers::CONTROL)
            && event.code == KeyCode::Char(']');

        if !self.prefix {
            if is_prefix {
                self.prefix = true;
                return Action::Nothing;
            }
            return key_event_to_bytes(event).map_or(Action::Nothing, Action::Input);
        }

        self.prefix = false;
        if is_prefix {
            return Action::Input(vec![0x1d]);
        }
        match event.code {
            KeyCode::Char('n') | KeyCode::Right => Action::NextTab,
            KeyCode::Char('p') | KeyCode::Left => Action::PrevTab,
            KeyCode::Char(c @ '1'..='9') => Action::JumpTo(c as usize - '1' as usize),
            KeyCode::Char('x') => Action::CloseTab,
            KeyCode::Char('t') => Action::ToggleTimestamps,
            KeyCode::Char('a') => Action::ToggleAutoScroll,
            KeyCode::Char('l') => Action::CycleTail,
            KeyCode::Char('c') => Action::Clear,
            KeyCode::Char('d') => Action::Download,
            KeyCode::Char('q') => Action::Quit,
            _ => Action::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn prefix() -> KeyEvent {
        KeyEvent::new(KeyCode::Char(']'), KeyModifiers::CONTROL)
    }

    #[test]
    fn plain_keys_are_typed() {
        let mut keys = KeyMap::new();
        assert_eq!(keys.translate(&press(KeyCode::Char('n'))), Action::Input(b"n".to_vec()));
    }

    #[test]
    fn prefix_then_command() {
        let mut keys = KeyMap::new();
        assert_eq!(keys.translate(&prefix()), Action::Nothing);
        assert!(keys.armed());
        assert_eq!(keys.translate(&press(KeyCode::Char('n'))), Action::NextTab);
        assert!(!keys.armed());
        assert_eq!(keys.translate(&press(KeyCode::Char('n'))), Action::Input(b"n".to_vec()));
    }

    #[test]
    fn digits_jump_zero_based() {
        let mut keys = KeyMap::new();
        keys.translate(&prefix());
        assert_eq!(keys.translate(&press(KeyCode::Char('3'))), Action::JumpTo(2));
    }

    #[test]
    fn double_prefix_sends_literal() {
        let mut keys = KeyMap::new();
        keys.translate(&prefix());
        assert_eq!(keys.translate(&prefix()), Action::Input(vec![0x1d]));
    }

    #[test]
    fn unknown_command_is_swallowed() {
        let mut keys = KeyMap::new();
        keys.translate(&prefix());
        assert_eq!(keys.translate(&press(KeyCode::Char('z'))), Action::Nothing);
        assert!(!keys.armed());
    }
}
