//! Viewport math shared by the hook navigator and the dashboard cursor.
//!
//! Positions are measured in terminal lines from the top of the rendered
//! document.

/// Scroll direction requested by a navigation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    None,
    Down,
}

/// The visible window onto a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// First document line shown
    pub scroll_top: u32,
    /// Number of lines shown
    pub height: u32,
    /// Total document height
    pub doc_height: u32,
}

impl Viewport {
    pub fn new(height: u32, doc_height: u32) -> Self {
        Self {
            scroll_top: 0,
            height,
            doc_height,
        }
    }

    pub fn scroll_bottom(&self) -> u32 {
        self.scroll_top + self.height
    }

    fn max_scroll(&self) -> u32 {
        self.doc_height.saturating_sub(self.height)
    }

    /// Whether a line at `top` falls inside the window (both edges inclusive)
    pub fn is_visible(&self, top: u32) -> bool {
        top >= self.scroll_top && top <= self.scroll_bottom()
    }

    pub fn scroll_to(&mut self, y: u32) {
        self.scroll_top = y.min(self.max_scroll());
    }

    pub fn scroll_to_end(&mut self) {
        self.scroll_top = self.max_scroll();
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let target = (self.scroll_top as i64 + delta).max(0);
        self.scroll_to(target as u32);
    }

    /// Bring `top` to one third of the window height, but only when that
    /// moves the window in the requested direction.
    pub fn scroll_into_view(&mut self, top: u32, direction: ScrollDirection) {
        let target = top.saturating_sub(self.height / 3);
        let moves = match direction {
            ScrollDirection::Down => self.scroll_top < target,
            ScrollDirection::Up => self.scroll_top > target,
            ScrollDirection::None => false,
        };
        if moves {
            self.scroll_to(target);
        }
    }

    /// Update the window height and document height, keeping the scroll
    /// offset in range.
    pub fn resize(&mut self, height: u32, doc_height: u32) {
        self.height = height;
        self.doc_height = doc_height;
        self.scroll_to(self.scroll_top);
    }
}
