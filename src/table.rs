//! The diff table as an explicit row arena.
//!
//! Rows live in document order. Every structural mutation (insert, remove,
//! show, hide, hook flag changes) is followed by the caller asking the hook
//! navigator to recompute; the table itself never notifies anyone.

use crate::fragment::CommentThread;
use crate::types::Side;

/// Stable handle to a row; survives inserts and removals of other rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u32);

/// Class marking a row that holds comment threads
pub const COMMENT_CLASS: &str = "inline-comments";

/// How a code cell should be painted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTone {
    Context,
    Removed,
    Added,
    Blank,
}

/// A table cell: a code line, or a comment thread for one side
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub id: Option<String>,
    pub class: Option<String>,
    pub text: String,
    /// Parsed server fragment, only for comment cells
    pub thread: CommentThread,
}

impl Cell {
    pub fn code(side: Side, line: Option<u32>, class: &str, text: impl Into<String>) -> Self {
        let prefix = match side {
            Side::A => "oldcode",
            Side::B => "newcode",
        };
        Self {
            id: line.map(|ln| format!("{}{}", prefix, ln)),
            class: Some(class.to_string()),
            text: text.into(),
            thread: CommentThread::default(),
        }
    }

    pub fn comments(side: Side, line: u32) -> Self {
        Self {
            id: Some(format!("{}{}", side.cell_prefix(), line)),
            class: None,
            text: String::new(),
            thread: CommentThread::default(),
        }
    }

    pub fn from_attrs(attrs: &[(String, String)], text: Option<&str>) -> Self {
        let get = |key: &str| attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        Self {
            id: get("id"),
            class: get("class"),
            text: text.unwrap_or_default().to_string(),
            thread: CommentThread::default(),
        }
    }

    /// `(side, line)` for a cell with an `oldcodeN`/`newcodeN` id
    pub fn code_line(&self) -> Option<(Side, u32)> {
        let id = self.id.as_deref()?;
        if let Some(n) = id.strip_prefix("newcode") {
            return n.parse().ok().map(|ln| (Side::B, ln));
        }
        if let Some(n) = id.strip_prefix("oldcode") {
            return n.parse().ok().map(|ln| (Side::A, ln));
        }
        None
    }

    pub fn tone(&self) -> CellTone {
        let class = self.class.as_deref().unwrap_or("");
        if class.contains("blank") || (self.id.is_none() && self.text.is_empty()) {
            CellTone::Blank
        } else if class.starts_with("old")
            && ["delete", "replace", "dark"].iter().any(|k| class.contains(k))
        {
            CellTone::Removed
        } else if class.starts_with("new")
            && ["insert", "replace", "dark"].iter().any(|k| class.contains(k))
        {
            CellTone::Added
        } else {
            CellTone::Context
        }
    }

    /// Replace the thread HTML; a fragment of one character or less empties
    /// the cell.
    pub fn set_thread_html(&mut self, html: &str) {
        if html.len() <= 1 {
            self.text.clear();
            self.thread = CommentThread::default();
        } else {
            self.text = html.to_string();
            self.thread = CommentThread::from_html(html);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A placeholder row standing for unchanged lines the server left out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipInfo {
    pub skip_id: u32,
    /// First skipped pair id
    pub before: u32,
    /// Last skipped pair id
    pub after: u32,
    pub count: u32,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Code,
    Comments,
    Skip(SkipInfo),
}

#[derive(Debug, Clone)]
pub struct Row {
    id: RowId,
    /// `pair-N`, `skip-N`, ...
    pub html_id: Option<String>,
    /// Row takes part in hook navigation (`name="hook"`)
    pub hook: bool,
    pub class: Option<String>,
    /// `display: none`
    pub hidden: bool,
    /// Comment rows only: show one line per thread
    pub collapsed: bool,
    /// Lines taken up by open comment forms inside the row
    pub extra_height: u32,
    pub kind: RowKind,
    pub cells: Vec<Cell>,
}

impl Row {
    fn new(kind: RowKind, cells: Vec<Cell>) -> Self {
        Self {
            id: RowId(0),
            html_id: None,
            hook: false,
            class: None,
            hidden: false,
            collapsed: false,
            extra_height: 0,
            kind,
            cells,
        }
    }

    pub fn code(pair: u32, old: Cell, new: Cell) -> Self {
        let mut row = Self::new(RowKind::Code, vec![old, new]);
        row.html_id = Some(format!("pair-{}", pair));
        row
    }

    /// An empty comment row for the lines of a code row
    pub fn comments(old_line: Option<u32>, new_line: Option<u32>) -> Self {
        let mut cells = Vec::with_capacity(2);
        cells.push(old_line.map_or_else(Cell::default, |ln| Cell::comments(Side::A, ln)));
        cells.push(new_line.map_or_else(Cell::default, |ln| Cell::comments(Side::B, ln)));
        let mut row = Self::new(RowKind::Comments, cells);
        row.class = Some(COMMENT_CLASS.to_string());
        row
    }

    pub fn skip(info: SkipInfo) -> Self {
        let mut row = Self::new(RowKind::Skip(info.clone()), Vec::new());
        row.html_id = Some(format!("skip-{}", info.skip_id));
        row
    }

    /// Build a row from server-provided attributes (skipped-lines splice)
    pub fn from_attrs(attrs: &[(String, String)], cells: Vec<Cell>) -> Self {
        let get = |key: &str| attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        let class = get("class").map(str::to_string);
        let is_comment = class.as_deref().is_some_and(|c| c.split_whitespace().any(|c| c == COMMENT_CLASS));
        let kind = if is_comment {
            RowKind::Comments
        } else {
            RowKind::Code
        };
        let mut row = Self::new(kind, cells);
        row.html_id = get("id").map(str::to_string);
        row.hook = get("name") == Some("hook");
        row.hidden = get("style")
            .is_some_and(|s| s.replace(' ', "").to_ascii_lowercase().contains("display:none"));
        row.class = class;
        row
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn is_comment(&self) -> bool {
        self.class.as_deref() == Some(COMMENT_CLASS)
    }

    pub fn skip_info(&self) -> Option<&SkipInfo> {
        match &self.kind {
            RowKind::Skip(info) => Some(info),
            _ => None,
        }
    }

    pub fn skip_info_mut(&mut self) -> Option<&mut SkipInfo> {
        match &mut self.kind {
            RowKind::Skip(info) => Some(info),
            _ => None,
        }
    }

    pub fn has_comments(&self) -> bool {
        self.cells.iter().any(|c| !c.thread.is_empty())
    }

    pub fn all_cells_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    /// Lines the row occupies when rendered
    pub fn height(&self) -> u32 {
        if self.hidden {
            return 0;
        }
        match self.kind {
            RowKind::Code | RowKind::Skip(_) => 1 + self.extra_height,
            RowKind::Comments => {
                let threads = self
                    .cells
                    .iter()
                    .map(|c| {
                        if c.thread.is_empty() {
                            0
                        } else if self.collapsed {
                            c.thread.comments.len() as u32
                        } else {
                            c.thread.line_count() as u32
                        }
                    })
                    .max()
                    .unwrap_or(0);
                threads + self.extra_height
            }
        }
    }
}

/// The side-by-side diff table of one patch
#[derive(Debug, Clone, Default)]
pub struct DiffTable {
    rows: Vec<Row>,
    next_id: u32,
    /// Lines rendered above the table (title, analysis warnings)
    pub header_height: u32,
}

impl DiffTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn assign_id(&mut self, mut row: Row) -> Row {
        row.id = RowId(self.next_id);
        self.next_id += 1;
        row
    }

    pub fn push(&mut self, row: Row) -> RowId {
        let row = self.assign_id(row);
        let id = row.id;
        self.rows.push(row);
        id
    }

    pub fn insert_before(&mut self, anchor: RowId, row: Row) -> Option<RowId> {
        let pos = self.position(anchor)?;
        let row = self.assign_id(row);
        let id = row.id;
        self.rows.insert(pos, row);
        Some(id)
    }

    pub fn insert_after(&mut self, anchor: RowId, row: Row) -> Option<RowId> {
        let pos = self.position(anchor)?;
        let row = self.assign_id(row);
        let id = row.id;
        self.rows.insert(pos + 1, row);
        Some(id)
    }

    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        let pos = self.position(id)?;
        Some(self.rows.remove(pos))
    }

    pub fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.rows.iter_mut()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn first(&self) -> Option<RowId> {
        self.rows.first().map(Row::id)
    }

    pub fn last(&self) -> Option<RowId> {
        self.rows.last().map(Row::id)
    }

    /// The row following `id` in document order
    pub fn next_of(&self, id: RowId) -> Option<&Row> {
        let pos = self.position(id)?;
        self.rows.get(pos + 1)
    }

    pub fn find_by_html_id(&self, html_id: &str) -> Option<RowId> {
        self.rows
            .iter()
            .find(|r| r.html_id.as_deref() == Some(html_id))
            .map(Row::id)
    }

    /// Locate a cell by its id, returning the row and the cell index
    pub fn find_cell(&self, cell_id: &str) -> Option<(RowId, usize)> {
        self.rows.iter().find_map(|r| {
            r.cells
                .iter()
                .position(|c| c.id.as_deref() == Some(cell_id))
                .map(|i| (r.id, i))
        })
    }

    /// Document line at which a row starts
    pub fn row_top(&self, id: RowId) -> Option<u32> {
        let mut top = self.header_height;
        for row in &self.rows {
            if row.id == id {
                return Some(top);
            }
            top += row.height();
        }
        None
    }

    /// Start line of every row, in document order
    pub fn layout(&self) -> Vec<u32> {
        let mut top = self.header_height;
        self.rows
            .iter()
            .map(|row| {
                let this = top;
                top += row.height();
                this
            })
            .collect()
    }

    /// Document line where the table itself starts
    pub fn table_top(&self) -> u32 {
        self.header_height
    }

    pub fn height(&self) -> u32 {
        self.header_height + self.rows.iter().map(Row::height).sum::<u32>()
    }

    /// Hook rows that are currently displayed, in document order
    pub fn visible_hooks(&self) -> Vec<RowId> {
        self.rows
            .iter()
            .filter(|r| r.hook && !r.hidden)
            .map(Row::id)
            .collect()
    }

    /// Comment row directly following `code_row`, created (empty, not a
    /// hook) when absent.
    pub fn ensure_comment_row(&mut self, code_row: RowId) -> Option<RowId> {
        if let Some(next) = self.next_of(code_row) {
            if next.kind == RowKind::Comments {
                return Some(next.id);
            }
        }
        let row = self.get(code_row)?;
        let mut old_line = None;
        let mut new_line = None;
        for cell in &row.cells {
            match cell.code_line() {
                Some((Side::A, ln)) => old_line = Some(ln),
                Some((Side::B, ln)) => new_line = Some(ln),
                None => {}
            }
        }
        self.insert_after(code_row, Row::comments(old_line, new_line))
    }

    /// Show or hide every comment row that holds at least one thread.
    /// Hidden comment rows also stop being hooks.
    pub fn set_comments_hidden(&mut self, hidden: bool) {
        for row in self.rows.iter_mut().filter(|r| r.is_comment() && r.has_comments()) {
            row.hidden = hidden;
            row.hook = !hidden;
        }
    }

    pub fn comments_hidden(&self) -> bool {
        self.rows
            .iter()
            .any(|r| r.is_comment() && r.has_comments() && r.hidden)
    }

    pub fn set_comments_collapsed(&mut self, collapsed: bool) {
        for row in self.rows.iter_mut().filter(|r| r.is_comment()) {
            row.collapsed = collapsed;
        }
    }

    pub fn comment_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.is_comment())
            .flat_map(|r| r.cells.iter())
            .map(|c| c.thread.comments.len())
            .sum()
    }
}
