//! Per-session state of a log tail: the accumulated text plus the display
//! preferences that control how it is rendered.

use chrono::{DateTime, Utc};

use crate::surface::Surface;

/// History depths offered to the user.
pub const TAIL_LINE_CHOICES: [u32; 5] = [50, 100, 200, 500, 1000];

/// Accumulated log text and display flags for one log session.
#[derive(Debug, Clone)]
pub struct LogView {
    /// Raw text received so far, timestamps included.
    content: String,
    pub auto_scroll: bool,
    pub show_timestamps: bool,
    pub tail_lines: u32,
}

impl LogView {
    pub fn new(tail_lines: u32) -> Self {
        Self {
            content: String::new(),
            auto_scroll: true,
            show_timestamps: false,
            tail_lines,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn clear(&mut self) {
        self.content.clear();
    }

    /// Record one structured log line and render it.
    pub fn push_line(&mut self, line: &str, surface: Option<&mut Box<dyn Surface>>) {
        self.content.push_str(line);
        self.content.push('\n');
        if let Some(surface) = surface {
            surface.write_line(self.display(line));
            if self.auto_scroll {
                surface.scroll_to_bottom();
            }
        }
    }

    /// Record unstructured text and render it verbatim.
    pub fn push_raw(&mut self, text: &str, surface: Option<&mut Box<dyn Surface>>) {
        self.content.push_str(text);
        if let Some(surface) = surface {
            surface.write(self.display(text).as_bytes());
            if self.auto_scroll {
                surface.scroll_to_bottom();
            }
        }
    }

    /// Clear the surface and draw the whole buffer again under the current
    /// timestamp preference.
    pub fn redraw(&self, surface: &mut dyn Surface) {
        surface.clear();
        for line in self.content.split('\n') {
            if line.trim().is_empty() {
                continue;
            }
            surface.write_line(self.display(line));
        }
        if self.auto_scroll {
            surface.scroll_to_bottom();
        }
    }

    fn display<'a>(&self, line: &'a str) -> &'a str {
        if self.show_timestamps {
            line
        } else {
            strip_timestamp(line)
        }
    }
}

/// Drop the leading RFC 3339 timestamp the container runtime prefixes to
/// every line (`2024-05-01T10:00:00.123456789Z message`).
pub fn strip_timestamp(line: &str) -> &str {
    if line.trim().is_empty() {
        return line;
    }
    match line.find("Z ") {
        Some(pos) if pos > 0 => &line[pos + 2..],
        _ if line.trim_end().ends_with('Z') => "",
        _ => line,
    }
}

/// A log buffer packaged for saving to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogExport {
    pub file_name: String,
    pub contents: String,
}

/// `<name>-logs-<YYYY-MM-DDTHH-MM-SS>.txt`, with every non-alphanumeric
/// character of the session name replaced by `-` and the result lowercased.
pub fn export_file_name(name: &str, at: DateTime<Utc>) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .to_lowercase();
    format!("{safe}-logs-{}.txt", at.format("%Y-%m-%dT%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn strips_leading_timestamp() {
        assert_eq!(
            strip_timestamp("2024-05-01T10:00:00.123456789Z server started"),
            "server started"
        );
    }

    #[test]
    fn timestamp_only_line_becomes_empty() {
        assert_eq!(strip_timestamp("2024-05-01T10:00:00Z"), "");
    }

    #[test]
    fn lines_without_timestamp_unchanged() {
        assert_eq!(strip_timestamp("plain message"), "plain message");
        assert_eq!(strip_timestamp("   "), "   ");
        assert_eq!(strip_timestamp("Z at start"), "Z at start");
    }

    #[test]
    fn export_name_is_sanitised() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 15).unwrap();
        assert_eq!(
            export_file_name("Web App (main)", at),
            "web-app--main--logs-2024-05-01T10-30-15.txt"
        );
    }

    #[test]
    fn buffer_keeps_timestamps() {
        let mut view = LogView::new(100);
        view.push_line("2024-05-01T10:00:00Z one", None);
        view.push_raw("two", None);
        assert_eq!(view.content(), "2024-05-01T10:00:00Z one\ntwo");
        view.clear();
        assert!(view.content().is_empty());
    }
}
