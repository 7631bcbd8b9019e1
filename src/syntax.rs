use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use tracing::warn;

use crate::config::DisplaySettings;

const FALLBACK_THEME: &str = "base16-eighties.dark";

/// Syntax highlighter for code cells
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    enabled: bool,
    min_brightness: u8,
}

/// Ensure a color has minimum brightness for readability on tinted
/// diff backgrounds
fn ensure_min_brightness(r: u8, g: u8, b: u8, min_brightness: u8) -> (u8, u8, u8) {
    // Perceived brightness (human eye is more sensitive to green)
    let brightness = ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8;

    if brightness >= min_brightness {
        return (r, g, b);
    }

    let scale = min_brightness as f32 / brightness.max(1) as f32;
    let new_r = ((r as f32 * scale).min(255.0)) as u8;
    let new_g = ((g as f32 * scale).min(255.0)) as u8;
    let new_b = ((b as f32 * scale).min(255.0)) as u8;

    // Still too dark (e.g. pure black): fall back to gray
    let new_brightness =
        ((new_r as u32 * 299 + new_g as u32 * 587 + new_b as u32 * 114) / 1000) as u8;
    if new_brightness < min_brightness {
        return (min_brightness, min_brightness, min_brightness);
    }
    (new_r, new_g, new_b)
}

impl Highlighter {
    pub fn new(settings: &DisplaySettings) -> Self {
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = match themes.remove(&settings.theme) {
            Some(theme) => theme,
            None => {
                warn!(theme = %settings.theme, "unknown syntax theme, using {}", FALLBACK_THEME);
                themes.remove(FALLBACK_THEME).unwrap_or_default()
            }
        };
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            enabled: settings.syntax_highlighting,
            min_brightness: settings.min_brightness,
        }
    }

    fn syntax_for(&self, filename: &str) -> &SyntaxReference {
        let ext = filename.rsplit('.').next().unwrap_or("");
        self.syntax_set
            .find_syntax_by_extension(ext)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
    }

    fn convert(&self, ranges: Vec<(syntect::highlighting::Style, &str)>, bg: Color) -> Vec<Span<'static>> {
        ranges
            .into_iter()
            .map(|(style, text)| {
                let (r, g, b) = ensure_min_brightness(
                    style.foreground.r,
                    style.foreground.g,
                    style.foreground.b,
                    self.min_brightness,
                );
                let mut span_style = Style::default().fg(Color::Rgb(r, g, b)).bg(bg);
                if style.font_style.contains(FontStyle::BOLD) {
                    span_style = span_style.add_modifier(Modifier::BOLD);
                }
                if style.font_style.contains(FontStyle::ITALIC) {
                    span_style = span_style.add_modifier(Modifier::ITALIC);
                }
                if style.font_style.contains(FontStyle::UNDERLINE) {
                    span_style = span_style.add_modifier(Modifier::UNDERLINED);
                }
                Span::styled(text.to_string(), span_style)
            })
            .collect()
    }

    /// Highlight the text of one code cell on the given background.
    ///
    /// Cells are highlighted independently; multi-line constructs lose
    /// their context, which is acceptable for a side-by-side view.
    pub fn highlight_cell(&self, content: &str, filename: &str, bg: Color) -> Vec<Span<'static>> {
        if !self.enabled {
            return vec![Span::styled(content.to_string(), Style::default().bg(bg))];
        }
        let mut lines = HighlightLines::new(self.syntax_for(filename), &self.theme);
        match lines.highlight_line(content, &self.syntax_set) {
            Ok(ranges) => self.convert(ranges, bg),
            Err(_) => vec![Span::styled(content.to_string(), Style::default().bg(bg))],
        }
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(&DisplaySettings::default())
    }
}
