//! Keyboard cursor over the hook rows of a diff table.
//!
//! The navigator keeps a snapshot of the visible hook rows taken at the last
//! [`HookNavigator::recompute`]. Callers must recompute after every
//! structural change to the table (rows inserted, removed, shown, hidden or
//! gaining/losing the hook flag); until then the snapshot is stale.

use std::collections::HashMap;

use crate::geometry::{ScrollDirection, Viewport};
use crate::table::{DiffTable, Row, RowId};
use crate::types::Side;

/// Where the cursor sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPosition {
    /// Before everything, the page header
    Top,
    /// The start of the diff table, before the first hook
    Diffs,
    /// Index into the visible hooks
    Row(usize),
    /// Past the last hook
    End,
}

impl HookPosition {
    fn index(self, len: usize) -> i64 {
        match self {
            HookPosition::Top => -2,
            HookPosition::Diffs => -1,
            HookPosition::Row(i) => i as i64,
            HookPosition::End => len as i64,
        }
    }

    fn from_index(index: i64, len: usize) -> Self {
        if index <= -2 {
            HookPosition::Top
        } else if index == -1 {
            HookPosition::Diffs
        } else if index >= len as i64 {
            HookPosition::End
        } else {
            HookPosition::Row(index as usize)
        }
    }
}

/// What answering the current hook should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Respond {
    /// Follow the reply link of the last comment in the thread
    Reply(String),
    /// Start a new comment on this line
    NewComment { side: Side, line: u32 },
    Nothing,
}

#[derive(Debug, Clone)]
pub struct HookNavigator {
    position: HookPosition,
    hooks: Vec<RowId>,
    indicator: Option<RowId>,
}

impl Default for HookNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl HookNavigator {
    pub fn new() -> Self {
        Self {
            position: HookPosition::Top,
            hooks: Vec::new(),
            indicator: None,
        }
    }

    #[cfg(test)]
    pub fn position(&self) -> HookPosition {
        self.position
    }

    #[cfg(test)]
    pub fn hooks(&self) -> &[RowId] {
        &self.hooks
    }

    /// Row the position indicator is drawn on, if shown
    pub fn indicator(&self) -> Option<RowId> {
        self.indicator
    }

    pub fn current_row(&self) -> Option<RowId> {
        match self.position {
            HookPosition::Row(i) => self.hooks.get(i).copied(),
            _ => None,
        }
    }

    /// Rebuild the visible hook list and remap the position onto it.
    ///
    /// The indicator is repositioned without scrolling.
    pub fn recompute(&mut self, table: &DiffTable, viewport: &mut Viewport) {
        let current = self.current_row();
        self.hooks = table.visible_hooks();
        if let HookPosition::Row(_) = self.position {
            self.position = current
                .and_then(|id| self.hooks.iter().position(|h| *h == id))
                .map_or(HookPosition::Diffs, HookPosition::Row);
        }
        self.goto_hook(table, viewport, ScrollDirection::None);
    }

    /// Move to the next hook (or next comment hook) and scroll it into view
    pub fn goto_next(&mut self, table: &DiffTable, viewport: &mut Viewport, only_comments: bool) {
        sync_height(table, viewport);
        let table_top = table.table_top();
        match self.position {
            HookPosition::Row(i) if self.hook_visible(table, viewport, i) => {
                self.increment(table, only_comments);
            }
            HookPosition::Top
                if viewport.is_visible(table_top) || viewport.scroll_top < table_top =>
            {
                self.increment(table, only_comments);
            }
            HookPosition::End if last_row_visible(table, viewport) => {}
            _ => {
                self.position = self.find_after(table, viewport.scroll_top, only_comments);
            }
        }
        self.goto_hook(table, viewport, ScrollDirection::Down);
    }

    /// Move to the previous hook (or previous comment hook)
    pub fn goto_prev(&mut self, table: &DiffTable, viewport: &mut Viewport, only_comments: bool) {
        sync_height(table, viewport);
        match self.position {
            HookPosition::Row(0) if only_comments => self.position = HookPosition::Top,
            HookPosition::Row(i) if self.hook_visible(table, viewport, i) => {
                self.decrement(table, only_comments);
            }
            HookPosition::Diffs if viewport.is_visible(table.table_top()) => {
                self.decrement(table, only_comments);
            }
            HookPosition::Top if viewport.scroll_top == 0 => {}
            _ => {
                self.position =
                    self.find_before(table, viewport.scroll_bottom(), only_comments);
            }
        }
        // The table start means nothing when hopping between comments
        if only_comments && matches!(self.position, HookPosition::Top | HookPosition::Diffs) {
            self.position = HookPosition::Top;
        }
        self.goto_hook(table, viewport, ScrollDirection::Up);
    }

    /// Set the position directly; scrolls only when a direction is given
    pub fn goto_position(
        &mut self,
        position: HookPosition,
        table: &DiffTable,
        viewport: &mut Viewport,
        direction: ScrollDirection,
    ) {
        self.position = position;
        self.goto_hook(table, viewport, direction);
    }

    /// Reposition the indicator for the current position
    pub fn goto_hook(&mut self, table: &DiffTable, viewport: &mut Viewport, direction: ScrollDirection) {
        sync_height(table, viewport);
        let scroll = direction != ScrollDirection::None;
        match self.position {
            HookPosition::Top => {
                if scroll {
                    viewport.scroll_to(0);
                }
                self.indicator = None;
            }
            HookPosition::Diffs => {
                if scroll {
                    viewport.scroll_to(table.table_top());
                }
                self.indicator = table.first();
            }
            HookPosition::Row(i) if i < self.hooks.len() => {
                let id = self.hooks[i];
                if scroll {
                    if let Some(top) = table.row_top(id) {
                        viewport.scroll_into_view(top, direction);
                    }
                }
                self.indicator = Some(id);
            }
            _ => {
                if scroll {
                    viewport.scroll_to_end();
                }
                self.position = HookPosition::End;
                self.indicator = table.last();
            }
        }
    }

    pub fn indicator_visible(&self, table: &DiffTable, viewport: &Viewport) -> bool {
        self.indicator
            .and_then(|id| table.row_top(id))
            .is_some_and(|top| viewport.is_visible(top))
    }

    /// After rows were spliced in, put the on-screen indicator back on a
    /// sensible hook by stepping back one and moving forward again.
    pub fn reselect(&mut self, table: &DiffTable, viewport: &mut Viewport) {
        if self.position == HookPosition::Top || !self.indicator_visible(table, viewport) {
            return;
        }
        let len = self.hooks.len();
        let back = HookPosition::from_index(self.position.index(len) - 1, len);
        self.goto_position(back, table, viewport, ScrollDirection::None);
        self.goto_next(table, viewport, false);
    }

    /// Decide how to answer the current hook.
    ///
    /// A row holding comments (or directly followed by one) answers the
    /// last comment; a plain code row starts a comment on its right-most
    /// numbered line.
    pub fn respond(&self, table: &DiffTable, viewport: &Viewport) -> Respond {
        let HookPosition::Row(i) = self.position else {
            return Respond::Nothing;
        };
        if !self.hook_visible(table, viewport, i) {
            return Respond::Nothing;
        }
        let Some(row) = self.hooks.get(i).and_then(|id| table.get(*id)) else {
            return Respond::Nothing;
        };

        let thread_row = if row.has_comments() {
            Some(row)
        } else {
            table.next_of(row.id()).filter(|next| next.has_comments())
        };
        if let Some(thread_row) = thread_row {
            return thread_row
                .cells
                .iter()
                .rev()
                .find(|c| !c.thread.is_empty())
                .and_then(|c| c.thread.last_reply_href())
                .map_or(Respond::Nothing, |href| Respond::Reply(href.to_string()));
        }

        row.cells
            .iter()
            .rev()
            .find_map(|c| c.code_line())
            .map_or(Respond::Nothing, |(side, line)| Respond::NewComment { side, line })
    }

    fn hook_visible(&self, table: &DiffTable, viewport: &Viewport, index: usize) -> bool {
        self.hooks
            .get(index)
            .and_then(|id| table.row_top(*id))
            .is_some_and(|top| viewport.is_visible(top))
    }

    fn is_comment_at(&self, table: &DiffTable, index: usize) -> bool {
        self.hooks
            .get(index)
            .and_then(|id| table.get(*id))
            .is_some_and(Row::is_comment)
    }

    fn increment(&mut self, table: &DiffTable, only_comments: bool) {
        let len = self.hooks.len();
        let mut pos = self.position.index(len);
        if only_comments {
            pos = (pos + 1).max(0);
            while pos < len as i64 && !self.is_comment_at(table, pos as usize) {
                pos += 1;
            }
        } else {
            pos = (pos + 1).min(len as i64);
        }
        self.position = HookPosition::from_index(pos, len);
    }

    fn decrement(&mut self, table: &DiffTable, only_comments: bool) {
        let len = self.hooks.len();
        let mut pos = self.position.index(len);
        if only_comments {
            pos = (pos - 1).min(len as i64 - 1);
            while pos >= 0 && !self.is_comment_at(table, pos as usize) {
                pos -= 1;
            }
        } else {
            pos = (pos - 1).max(-2);
        }
        self.position = HookPosition::from_index(pos, len);
    }

    /// Document tops of the visible hooks, in order
    fn hook_tops(&self, table: &DiffTable) -> Vec<Option<u32>> {
        let tops: HashMap<RowId, u32> = table
            .rows()
            .iter()
            .map(Row::id)
            .zip(table.layout())
            .collect();
        self.hooks.iter().map(|id| tops.get(id).copied()).collect()
    }

    /// First hook strictly below `y`
    fn find_after(&self, table: &DiffTable, y: u32, only_comments: bool) -> HookPosition {
        self.hook_tops(table)
            .iter()
            .enumerate()
            .find(|(i, top)| {
                top.is_some_and(|t| t > y) && (!only_comments || self.is_comment_at(table, *i))
            })
            .map_or(HookPosition::End, |(i, _)| HookPosition::Row(i))
    }

    /// Last hook strictly above `y`
    fn find_before(&self, table: &DiffTable, y: u32, only_comments: bool) -> HookPosition {
        self.hook_tops(table)
            .iter()
            .enumerate()
            .rev()
            .find(|(i, top)| {
                top.is_some_and(|t| t < y) && (!only_comments || self.is_comment_at(table, *i))
            })
            .map_or(HookPosition::Diffs, |(i, _)| HookPosition::Row(i))
    }
}

fn sync_height(table: &DiffTable, viewport: &mut Viewport) {
    viewport.resize(viewport.height, table.height());
}

fn last_row_visible(table: &DiffTable, viewport: &Viewport) -> bool {
    table
        .last()
        .and_then(|id| table.row_top(id))
        .is_some_and(|top| viewport.is_visible(top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    const THREAD: &str = r#"<div name="comment-border">alice<br>looks off
<a name="comment-reply" href="javascript:M_replyToInlineComment('alice', '2011-01-02', 'c1', '7', 'b')">Reply</a></div>"#;

    fn code_row(pair: u32, hook: bool) -> Row {
        let mut row = Row::code(
            pair,
            Cell::code(Side::A, Some(pair + 1), "oldequal", "x"),
            Cell::code(Side::B, Some(pair + 1), "newequal", "x"),
        );
        row.hook = hook;
        row
    }

    fn comment_row(line: u32) -> Row {
        let mut row = Row::comments(Some(line), Some(line));
        row.cells[1].set_thread_html(THREAD);
        row.hook = true;
        row
    }

    /// Five hooks, the ones at index 1 and 3 are comment rows
    fn five_hooks() -> DiffTable {
        let mut table = DiffTable::new();
        table.header_height = 2;
        table.push(code_row(0, true));
        table.push(comment_row(1));
        table.push(code_row(1, true));
        table.push(comment_row(2));
        table.push(code_row(2, true));
        table
    }

    fn setup(table: &DiffTable, height: u32) -> (HookNavigator, Viewport) {
        let mut viewport = Viewport::new(height, table.height());
        let mut nav = HookNavigator::new();
        nav.recompute(table, &mut viewport);
        (nav, viewport)
    }

    #[test]
    fn test_next_comment_visits_comment_rows_then_end() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        assert_eq!(nav.position(), HookPosition::Top);

        nav.goto_next(&table, &mut vp, true);
        assert_eq!(nav.position(), HookPosition::Row(1));
        nav.goto_next(&table, &mut vp, true);
        assert_eq!(nav.position(), HookPosition::Row(3));
        nav.goto_next(&table, &mut vp, true);
        assert_eq!(nav.position(), HookPosition::End);
        assert_eq!(nav.indicator(), table.last());
    }

    #[test]
    fn test_next_then_prev_returns_to_same_row() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);

        nav.goto_next(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::Diffs);
        nav.goto_next(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::Row(0));
        nav.goto_next(&table, &mut vp, false);
        nav.goto_next(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::Row(2));

        nav.goto_next(&table, &mut vp, false);
        nav.goto_prev(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::Row(2));
    }

    #[test]
    fn test_sentinels_are_idempotent() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);

        nav.goto_prev(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::Top);
        assert_eq!(nav.indicator(), None);

        nav.goto_position(HookPosition::End, &table, &mut vp, ScrollDirection::Down);
        nav.goto_next(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::End);
    }

    #[test]
    fn test_prev_comment_from_first_goes_to_top() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_position(HookPosition::Row(1), &table, &mut vp, ScrollDirection::None);
        nav.goto_prev(&table, &mut vp, true);
        assert_eq!(nav.position(), HookPosition::Top);
        assert_eq!(vp.scroll_top, 0);
    }

    #[test]
    fn test_next_comment_without_comments_reaches_end() {
        let mut table = DiffTable::new();
        for pair in 0..4 {
            table.push(code_row(pair, true));
        }
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_next(&table, &mut vp, true);
        assert_eq!(nav.position(), HookPosition::End);
    }

    #[test]
    fn test_offscreen_cursor_reanchors_below_scroll_offset() {
        let mut table = DiffTable::new();
        table.header_height = 1;
        for pair in 0..100 {
            table.push(code_row(pair, pair % 10 == 0));
        }
        let (mut nav, mut vp) = setup(&table, 10);
        nav.goto_position(HookPosition::Row(0), &table, &mut vp, ScrollDirection::None);

        vp.scroll_to(50);
        nav.goto_next(&table, &mut vp, false);
        // Hook rows sit at tops 1, 11, 21, ...; the first below 50 is 51
        assert_eq!(nav.position(), HookPosition::Row(5));

        vp.scroll_to(75);
        nav.goto_prev(&table, &mut vp, false);
        // Window bottom is 85; the last hook above it starts at 81
        assert_eq!(nav.position(), HookPosition::Row(8));
        assert!(nav.indicator_visible(&table, &vp));
    }

    #[test]
    fn test_goto_next_scrolls_new_row_to_a_third() {
        let mut table = DiffTable::new();
        for pair in 0..200 {
            table.push(code_row(pair, pair == 120));
        }
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_next(&table, &mut vp, false);
        nav.goto_next(&table, &mut vp, false);
        assert_eq!(nav.position(), HookPosition::Row(0));
        assert_eq!(vp.scroll_top, 110);
    }

    #[test]
    fn test_recompute_remaps_current_row() {
        let mut table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_position(HookPosition::Row(2), &table, &mut vp, ScrollDirection::None);
        let current = nav.current_row().unwrap();

        let first = table.first().unwrap();
        table.get_mut(first).unwrap().hidden = true;
        nav.recompute(&table, &mut vp);
        assert_eq!(nav.position(), HookPosition::Row(1));
        assert_eq!(nav.current_row(), Some(current));
        assert_eq!(nav.hooks().len(), 4);
    }

    #[test]
    fn test_recompute_resets_when_row_disappears() {
        let mut table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_position(HookPosition::Row(4), &table, &mut vp, ScrollDirection::None);
        let current = nav.current_row().unwrap();
        table.remove(current);
        nav.recompute(&table, &mut vp);
        assert_eq!(nav.position(), HookPosition::Diffs);
        assert_eq!(nav.indicator(), table.first());
    }

    #[test]
    fn test_recompute_matches_visible_rows_in_order() {
        let mut table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        let ids: Vec<RowId> = table.rows().iter().map(Row::id).collect();

        table.get_mut(ids[3]).unwrap().hidden = true;
        let extra = table.insert_after(ids[0], code_row(9, true)).unwrap();
        table.get_mut(ids[4]).unwrap().hook = false;
        nav.recompute(&table, &mut vp);
        assert_eq!(nav.hooks(), &[ids[0], extra, ids[1], ids[2]]);
    }

    #[test]
    fn test_respond_on_code_row_creates_comment() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_position(HookPosition::Row(4), &table, &mut vp, ScrollDirection::None);
        assert_eq!(
            nav.respond(&table, &vp),
            Respond::NewComment {
                side: Side::B,
                line: 3
            }
        );
    }

    #[test]
    fn test_respond_on_comment_row_replies() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_position(HookPosition::Row(1), &table, &mut vp, ScrollDirection::None);
        match nav.respond(&table, &vp) {
            Respond::Reply(href) => assert!(href.contains("M_replyToInlineComment")),
            other => panic!("expected reply, got {:?}", other),
        }
        // A code row followed by a thread answers that thread
        nav.goto_position(HookPosition::Row(0), &table, &mut vp, ScrollDirection::None);
        assert!(matches!(nav.respond(&table, &vp), Respond::Reply(_)));
    }

    #[test]
    fn test_respond_off_screen_is_noop() {
        let mut table = DiffTable::new();
        for pair in 0..100 {
            table.push(code_row(pair, pair == 90));
        }
        let (mut nav, mut vp) = setup(&table, 10);
        nav.goto_position(HookPosition::Row(0), &table, &mut vp, ScrollDirection::None);
        assert_eq!(nav.respond(&table, &vp), Respond::Nothing);
    }

    #[test]
    fn test_reselect_steps_back_then_forward() {
        let table = five_hooks();
        let (mut nav, mut vp) = setup(&table, 30);
        nav.goto_position(HookPosition::Row(2), &table, &mut vp, ScrollDirection::None);
        nav.reselect(&table, &mut vp);
        assert_eq!(nav.position(), HookPosition::Row(2));

        nav.goto_position(HookPosition::Top, &table, &mut vp, ScrollDirection::None);
        nav.reselect(&table, &mut vp);
        assert_eq!(nav.position(), HookPosition::Top);
    }
}
