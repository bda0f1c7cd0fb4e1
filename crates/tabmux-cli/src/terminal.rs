//! Terminal utilities for raw mode, terminal size, and key translation.
//!
//! Wraps crossterm's terminal operations and provides a RAII guard that
//! restores the terminal state on drop.

use std::io::Write;

use anyhow::{Context, Result};
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::{execute, terminal};

/// RAII guard for the attached terminal.
///
/// While alive, the terminal is in raw mode on the alternate screen and
/// reports focus changes. On drop all of that is undone.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        let guard = Self { _private: () };
        execute!(
            std::io::stdout(),
            terminal::EnterAlternateScreen,
            EnableFocusChange
        )
        .context("failed to prepare terminal")?;
        Ok(guard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = std::io::stdout();
        // Reset the scroll region before leaving the alternate screen.
        let _ = stdout.write_all(b"\x1b[r");
        let _ = execute!(stdout, DisableFocusChange, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Get the current terminal size as (columns, rows).
///
/// Falls back to (80, 24) if the size cannot be determined.
pub fn get_terminal_size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}

/// Convert a crossterm key event to the bytes a remote shell expects.
pub fn key_event_to_bytes(event: &KeyEvent) -> Option<Vec<u8>> {
    let mut bytes = match event.code {
        KeyCode::Char(c) => {
            if event.modifiers.contains(KeyModifiers::CONTROL) {
                // Ctrl+A = 0x01, Ctrl+B = 0x02, etc.
                let byte = (c.to_ascii_lowercase() as u8)
                    .wrapping_sub(b'a')
                    .wrapping_add(1);
                if (1..=26).contains(&byte) {
                    return Some(vec![byte]);
                }
            }
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        KeyCode::Enter => vec![b'\r'],
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Tab => vec![b'\t'],
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Esc => vec![0x1b],
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Insert => b"\x1b[2~".to_vec(),
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::F(n) => {
            let seq = match n {
                1 => "\x1bOP",
                2 => "\x1bOQ",
                3 => "\x1bOR",
                4 => "\x1bOS",
                5 => "\x1b[15~",
                6 => "\x1b[17~",
                7 => "\x1b[18~",
                8 => "\x1b[19~",
                9 => "\x1b[20~",
                10 => "\x1b[21~",
                11 => "\x1b[23~",
                12 => "\x1b[24~",
                _ => return None,
            };
            seq.as_bytes().to_vec()
        }
        _ => return None,
    };
    if event.modifiers.contains(KeyModifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn terminal_size_returns_nonzero() {
        let (cols, rows) = get_terminal_size();
        assert!(cols > 0);
        assert!(rows > 0);
    }

    #[test]
    fn control_letters() {
        let ctrl = KeyModifiers::CONTROL;
        assert_eq!(key_event_to_bytes(&key(KeyCode::Char('c'), ctrl)), Some(vec![3]));
        assert_eq!(key_event_to_bytes(&key(KeyCode::Char('A'), ctrl)), Some(vec![1]));
    }

    #[test]
    fn printable_and_special_keys() {
        let none = KeyModifiers::NONE;
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::Char('é'), none)),
            Some("é".as_bytes().to_vec())
        );
        assert_eq!(key_event_to_bytes(&key(KeyCode::Enter, none)), Some(vec![b'\r']));
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::Up, none)),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(key_event_to_bytes(&key(KeyCode::F(20), none)), None);
    }

    #[test]
    fn alt_prefixes_escape() {
        assert_eq!(
            key_event_to_bytes(&key(KeyCode::Char('b'), KeyModifiers::ALT)),
            Some(vec![0x1b, b'b'])
        );
    }
}
