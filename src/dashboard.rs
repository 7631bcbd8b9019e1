//! Row cursor for list pages (the dashboard and the changelist file list).

use tracing::debug;

use crate::cookies::CookieJar;
use crate::fragment;
use crate::geometry::{ScrollDirection, Viewport};
use crate::types::IssueSummary;

/// Selected row among the navigable rows of a list, remembered in a cookie
#[derive(Debug, Clone)]
pub struct DashboardCursor {
    cookie_name: String,
    /// Document tops of the navigable rows, in order
    rows: Vec<u32>,
    pos: usize,
}

impl DashboardCursor {
    /// An empty cookie name disables persistence
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            rows: Vec::new(),
            pos: 0,
        }
    }

    /// Take a fresh list of rows and restore the saved position.
    ///
    /// A saved value that is not a number, is negative or is past the last
    /// row falls back to the first row. Nothing scrolls.
    pub fn initialize(&mut self, rows: Vec<u32>, jar: &mut CookieJar, viewport: &mut Viewport) {
        self.rows = rows;
        self.pos = 0;
        if !self.cookie_name.is_empty() {
            if let Some(raw) = jar.get(&self.cookie_name) {
                self.pos = match raw.trim().parse::<i64>() {
                    Ok(n) if n >= 0 && (n as usize) < self.rows.len() => n as usize,
                    _ => {
                        debug!(cookie = %self.cookie_name, value = raw, "discarding saved position");
                        0
                    }
                };
            }
        }
        self.goto(jar, viewport, ScrollDirection::None);
    }

    pub fn goto_next(&mut self, jar: &mut CookieJar, viewport: &mut Viewport) {
        if self.pos + 1 < self.rows.len() {
            self.pos += 1;
        }
        self.goto(jar, viewport, ScrollDirection::Down);
    }

    pub fn goto_prev(&mut self, jar: &mut CookieJar, viewport: &mut Viewport) {
        self.pos = self.pos.saturating_sub(1);
        self.goto(jar, viewport, ScrollDirection::Up);
    }

    fn goto(&mut self, jar: &mut CookieJar, viewport: &mut Viewport, direction: ScrollDirection) {
        let Some(&top) = self.rows.get(self.pos) else {
            return;
        };
        if !self.cookie_name.is_empty() {
            jar.set(&self.cookie_name, self.pos);
        }
        if !viewport.is_visible(top) {
            viewport.scroll_into_view(top, direction);
        }
    }

    /// Index of the selected row, `None` when there are no rows
    pub fn selected(&self) -> Option<usize> {
        (!self.rows.is_empty()).then_some(self.pos)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// An issue line on the dashboard
#[derive(Debug, Clone)]
pub struct DashboardRow {
    pub issue: IssueSummary,
    pub starred: bool,
    /// Reason appended to the title once the issue is closed
    pub close_note: Option<String>,
}

impl DashboardRow {
    pub fn new(issue: IssueSummary) -> Self {
        let close_note = issue.closed.then(|| "closed".to_string());
        Self {
            issue,
            starred: false,
            close_note,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close_note.is_some()
    }

    /// Apply the star control fragment returned by a star/unstar request.
    /// The fragment offers the opposite action, which tells the new state.
    pub fn apply_star_fragment(&mut self, html: &str, requested: bool) {
        let links = fragment::links(html);
        self.starred = if links.iter().any(|l| l.href.contains("unstar") || l.href.contains("RemoveIssueStar")) {
            true
        } else if links.iter().any(|l| l.href.contains("star") || l.href.contains("AddIssueStar")) {
            false
        } else {
            requested
        };
    }

    pub fn apply_close(&mut self, reason: &str) {
        let reason = reason.trim();
        self.close_note = Some(if reason.is_empty() {
            "closed".to_string()
        } else {
            reason.to_string()
        });
    }

    pub fn title(&self) -> String {
        match &self.close_note {
            Some(note) => format!("{} ({})", self.issue.subject, note),
            None => self.issue.subject.clone(),
        }
    }
}
