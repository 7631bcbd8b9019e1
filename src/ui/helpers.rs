//! Utility helper functions for the UI module.

use std::io::{self, Stdout};
use std::process::{Command, Stdio};

use anyhow::Result;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Span;
use ratatui::Terminal;
use tracing::warn;

/// Fill an entire area with a background color
pub fn fill_area(buf: &mut Buffer, area: Rect, color: Color) {
    let style = Style::default().bg(color);
    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            buf.set_string(x, y, " ", style);
        }
    }
}

/// Truncate or pad a string to exactly the given width
pub fn truncate_or_pad(s: &str, width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() >= width {
        chars[..width].iter().collect()
    } else {
        let mut result: String = chars.into_iter().collect();
        result.push_str(&" ".repeat(width - s.chars().count()));
        result
    }
}

/// Cut styled spans to `width` columns, padding the rest with `pad`
pub fn fit_spans(spans: Vec<Span<'static>>, width: usize, pad: Style) -> Vec<Span<'static>> {
    let mut out = Vec::with_capacity(spans.len() + 1);
    let mut used = 0;
    for span in spans {
        if used >= width {
            break;
        }
        let len = span.content.chars().count();
        if used + len <= width {
            used += len;
            out.push(span);
        } else {
            let cut: String = span.content.chars().take(width - used).collect();
            used = width;
            out.push(Span::styled(cut, span.style));
        }
    }
    if used < width {
        out.push(Span::styled(" ".repeat(width - used), pad));
    }
    out
}

/// A rectangle of at most `width` x `height` centered in `area`
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Set up the terminal for TUI mode
pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal mode
pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}

/// Open a URL with the desktop's default handler
pub fn open_in_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    let spawned = Command::new(opener)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        warn!(url, opener, error = %e, "could not open browser");
    }
}

/// Character-based text wrapping, breaking at the width boundary.
/// Tabs expand to four spaces.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut result = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.replace('\t', "    ").chars().collect();
        if chars.is_empty() {
            result.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            result.push(chunk.iter().collect());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Modifier;

    #[test]
    fn test_truncate_or_pad_truncate() {
        assert_eq!(truncate_or_pad("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_or_pad_pad() {
        assert_eq!(truncate_or_pad("hi", 5), "hi   ");
        assert_eq!(truncate_or_pad("é", 3), "é  ");
    }

    #[test]
    fn test_truncate_or_pad_exact() {
        assert_eq!(truncate_or_pad("hello", 5), "hello");
    }

    #[test]
    fn test_fit_spans_cuts_and_pads() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let spans = vec![Span::styled("abc", bold), Span::raw("defg")];
        let fitted = fit_spans(spans.clone(), 5, Style::default());
        let text: String = fitted.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "abcde");
        assert_eq!(fitted[0].style, bold);

        let fitted = fit_spans(spans, 9, Style::default());
        let text: String = fitted.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "abcdefg  ");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_text("a\n\nb", 4), vec!["a", "", "b"]);
        assert_eq!(wrap_text("\tx", 10), vec!["    x"]);
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(area, 60, 10);
        assert_eq!(rect, Rect::new(20, 15, 60, 10));
        let small = centered_rect(Rect::new(0, 0, 20, 6), 60, 10);
        assert_eq!((small.width, small.height), (16, 4));
    }
}
