//! Inline comment forms (new, edit, reply) and their timed submission.
//!
//! A form lives inside the comment cell of one line of one side. Submitting
//! hands out a [`SubmissionToken`]; the completion must present the same
//! token or it is ignored, so a request abandoned after the deadline can
//! never touch the table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::client::{ApiRequest, Reply, ReviewClient};
use crate::drafts::DraftKey;
use crate::error::ClientError;
use crate::fragment;
use crate::geometry::ScrollDirection;
use crate::page::DiffPage;
use crate::table::{DiffTable, RowId, RowKind};
use crate::types::{Side, Snapshot};

/// Placeholder comment id of a comment the server has not stored yet
const NEW_CID: &str = "-1";

fn reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"M_replyToInlineComment\(\s*'((?:[^'\\]|\\.)*)'\s*,\s*'((?:[^'\\]|\\.)*)'\s*,\s*'?([^',)]+)'?\s*,\s*'?(\d+)'?\s*,\s*'([ab])'"#,
        )
        .expect("static regex")
    })
}

fn edit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"M_(?:restore)?[eE]ditInlineComment\(\s*'?([^',)]+)'?\s*,\s*'?(\d+)'?\s*,\s*'([ab])'"#)
            .expect("static regex")
    })
}

fn div_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<div\b([^>]*)>").expect("static regex"))
}

fn urlized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<a (.*?)href=['"]([^'"]+?)['"](.*?)>(.*?)</a>"#).expect("static regex")
    })
}

/// A comment link found in a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    Reply {
        author: String,
        written_time: String,
        cid: String,
        line: u32,
        side: Side,
    },
    Edit {
        cid: String,
        line: u32,
        side: Side,
    },
}

impl CommentAction {
    /// Recognise the reply and edit links the server puts on comments
    pub fn parse(href: &str) -> Option<Self> {
        if let Some(caps) = reply_re().captures(href) {
            return Some(CommentAction::Reply {
                author: unescape_js(&caps[1]),
                written_time: unescape_js(&caps[2]),
                cid: caps[3].trim().to_string(),
                line: caps[4].parse().ok()?,
                side: Side::parse(&caps[5])?,
            });
        }
        let caps = edit_re().captures(href)?;
        Some(CommentAction::Edit {
            cid: caps[1].trim().to_string(),
            line: caps[2].parse().ok()?,
            side: Side::parse(&caps[3])?,
        })
    }
}

fn unescape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    fragment::decode_entities(&out)
}

/// The body of one comment as plain text lines, taken from its
/// `comment-text-{cid}-{line}-{side}` blocks
pub fn comment_text(html: &str, cid: &str, line: u32, side: Side) -> Vec<String> {
    let name = format!("comment-text-{}-{}-{}", cid, line, side.as_str());
    let mut lines: Vec<String> = Vec::new();
    for caps in div_open_re().captures_iter(html) {
        let attrs = fragment::attributes(&caps[1]);
        if !attrs.iter().any(|(k, v)| k == "name" && *v == name) {
            continue;
        }
        let start = caps.get(0).map_or(0, |m| m.end());
        let body = &html[start..];
        let body = body.find("</div>").map_or(body, |end| &body[..end]);
        lines.extend(body.split('\n').map(str::to_string));
        if lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
    }
    lines
        .into_iter()
        .map(|l| fragment::decode_entities(&urlized_re().replace_all(&l, "$2")))
        .collect()
}

/// Pre-filled text of a reply form
pub fn quote_reply(author: &str, written_time: &str, body: &[String]) -> String {
    let mut text = format!("On {}, {} wrote:\n", written_time, author);
    for line in body {
        text.push_str("> ");
        text.push_str(line);
        text.push('\n');
    }
    text.push('\n');
    text
}

/// `{cid}-{line}-{side}`, the identity of a form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormId {
    pub cid: String,
    pub line: u32,
    pub side: Side,
}

impl FormId {
    fn new_comment(line: u32, side: Side) -> Self {
        Self {
            cid: NEW_CID.to_string(),
            line,
            side,
        }
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.cid, self.line, self.side.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormKind {
    New,
    /// Editing a stored draft; `old_text` is what the server has
    Edit { old_text: String },
    Reply,
}

static SUBMISSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Handle for one submission attempt, unique across every page opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionToken(u64);

impl SubmissionToken {
    fn next() -> Self {
        Self(SUBMISSION_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone)]
pub struct InlineForm {
    pub id: FormId,
    pub kind: FormKind,
    pub snapshot: Snapshot,
    /// Comment row the form sits in
    pub row: RowId,
    pub text: String,
    enabled: bool,
    pending: Option<SubmissionToken>,
}

impl InlineForm {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_submitting(&self) -> bool {
        self.pending.is_some()
    }

    /// Lines the form takes up below the thread
    pub fn height(&self) -> u32 {
        self.text.split('\n').count() as u32 + 2
    }

    fn new_key(&self) -> DraftKey {
        DraftKey::New {
            line: self.id.line,
            snapshot: self.snapshot,
        }
    }

    fn edit_key(&self) -> DraftKey {
        DraftKey::Edit {
            cid: self.id.cid.clone(),
            line: self.id.line,
            side: self.id.side,
        }
    }

    fn reply_key(&self) -> DraftKey {
        DraftKey::Reply {
            cid: self.id.cid.clone(),
            line: self.id.line,
            side: self.id.side,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        if self.enabled {
            self.text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.enabled {
            self.text.pop();
        }
    }
}

/// Every open form of a diff page plus which one has the keyboard
#[derive(Debug, Clone, Default)]
pub struct InlineForms {
    forms: BTreeMap<FormId, InlineForm>,
    focused: Option<FormId>,
}

impl InlineForms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &FormId) -> Option<&InlineForm> {
        self.forms.get(id)
    }

    pub fn get_mut(&mut self, id: &FormId) -> Option<&mut InlineForm> {
        self.forms.get_mut(id)
    }

    pub fn focused(&self) -> Option<&InlineForm> {
        self.focused.as_ref().and_then(|id| self.forms.get(id))
    }

    pub fn focused_mut(&mut self) -> Option<&mut InlineForm> {
        let id = self.focused.clone()?;
        self.forms.get_mut(&id)
    }

    pub fn focused_id(&self) -> Option<&FormId> {
        self.focused.as_ref()
    }

    pub fn in_row(&self, row: RowId) -> impl Iterator<Item = &InlineForm> {
        self.forms.values().filter(move |f| f.row == row)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    fn remove(&mut self, id: &FormId) -> Option<InlineForm> {
        if self.focused.as_ref() == Some(id) {
            self.focused = None;
        }
        self.forms.remove(id)
    }

    /// Reserve room in each comment row for the forms it holds
    pub fn sync_heights(&self, table: &mut DiffTable) {
        for row in table.rows_mut() {
            if row.kind == RowKind::Comments {
                row.extra_height = self.in_row(row.id()).map(InlineForm::height).sum();
            }
        }
    }
}

impl DiffPage {
    fn comment_cell_id(side: Side, line: u32) -> String {
        format!("{}{}", side.cell_prefix(), line)
    }

    /// The comment cell for a line, creating its comment row if needed
    fn comment_cell(&mut self, side: Side, line: u32) -> Option<(RowId, usize)> {
        let cell_id = Self::comment_cell_id(side, line);
        if let Some(found) = self.table.find_cell(&cell_id) {
            return Some(found);
        }
        let code_id = match side {
            Side::A => format!("oldcode{}", line),
            Side::B => format!("newcode{}", line),
        };
        let (code_row, _) = self.table.find_cell(&code_id)?;
        self.table.ensure_comment_row(code_row)?;
        self.table.find_cell(&cell_id)
    }

    fn open_form(&mut self, form: InlineForm) {
        let id = form.id.clone();
        if let Some(row) = self.table.get_mut(form.row) {
            row.hidden = false;
        }
        self.forms.forms.insert(id.clone(), form);
        self.forms.focused = Some(id);
        self.structure_changed();
        self.hooks
            .goto_hook(&self.table, &mut self.viewport, ScrollDirection::None);
    }

    /// Start a new comment on a line, restoring any text left from an
    /// earlier cancel.
    pub fn open_new_comment(&mut self, side: Side, line: u32) -> Result<FormId, ClientError> {
        let id = FormId::new_comment(line, side);
        if self.forms.get(&id).is_some() {
            self.forms.focused = Some(id.clone());
            return Ok(id);
        }
        let (row, _) = self
            .comment_cell(side, line)
            .ok_or_else(|| ClientError::MissingElement(Self::comment_cell_id(side, line)))?;
        if let Some(r) = self.table.get_mut(row) {
            r.hook = true;
        }
        let snapshot = side.snapshot();
        let text = self
            .drafts
            .restore(&DraftKey::New { line, snapshot })
            .unwrap_or_default()
            .to_string();
        self.open_form(InlineForm {
            id: id.clone(),
            kind: FormKind::New,
            snapshot,
            row,
            text,
            enabled: true,
            pending: None,
        });
        Ok(id)
    }

    /// Answer a comment link: reply to it or edit the draft
    pub fn open_action(&mut self, action: &CommentAction) -> Result<FormId, ClientError> {
        match action {
            CommentAction::Reply {
                author,
                written_time,
                cid,
                line,
                side,
            } => self.open_reply(author, written_time, cid, *line, *side),
            CommentAction::Edit { cid, line, side } => self.open_edit(cid, *line, *side),
        }
    }

    fn existing_cell(&self, id: &FormId) -> Result<(RowId, usize), ClientError> {
        self.table
            .find_cell(&Self::comment_cell_id(id.side, id.line))
            .ok_or_else(|| ClientError::MissingElement(format!("inline-comment-{}", id)))
    }

    fn open_reply(
        &mut self,
        author: &str,
        written_time: &str,
        cid: &str,
        line: u32,
        side: Side,
    ) -> Result<FormId, ClientError> {
        let id = FormId {
            cid: cid.to_string(),
            line,
            side,
        };
        if self.forms.get(&id).is_some() {
            self.forms.focused = Some(id.clone());
            return Ok(id);
        }
        let (row, cell) = self.existing_cell(&id)?;
        let mut form = InlineForm {
            id: id.clone(),
            kind: FormKind::Reply,
            snapshot: side.snapshot(),
            row,
            text: String::new(),
            enabled: true,
            pending: None,
        };
        form.text = match self.drafts.restore(&form.reply_key()) {
            Some(saved) => saved.to_string(),
            None => {
                let html = &self.table.rows()[self.row_index(row)?].cells[cell].text;
                quote_reply(author, written_time, &comment_text(html, cid, line, side))
            }
        };
        self.open_form(form);
        Ok(id)
    }

    fn open_edit(&mut self, cid: &str, line: u32, side: Side) -> Result<FormId, ClientError> {
        let id = FormId {
            cid: cid.to_string(),
            line,
            side,
        };
        if self.forms.get(&id).is_some() {
            self.forms.focused = Some(id.clone());
            return Ok(id);
        }
        let (row, cell) = self.existing_cell(&id)?;
        let html = &self.table.rows()[self.row_index(row)?].cells[cell].text;
        let old_text = comment_text(html, cid, line, side).join("\n");
        let mut form = InlineForm {
            id: id.clone(),
            kind: FormKind::Edit {
                old_text: old_text.clone(),
            },
            snapshot: side.snapshot(),
            row,
            text: old_text,
            enabled: true,
            pending: None,
        };
        if let Some(saved) = self.drafts.restore(&form.edit_key()) {
            form.text = saved.to_string();
        }
        self.open_form(form);
        Ok(id)
    }

    fn row_index(&self, row: RowId) -> Result<usize, ClientError> {
        self.table
            .position(row)
            .ok_or_else(|| ClientError::MissingElement("comment row".to_string()))
    }

    /// Close a form without submitting; its text is kept in the draft cache
    pub fn cancel_form(&mut self, id: &FormId) {
        let Some(form) = self.forms.remove(id) else {
            return;
        };
        let key = match form.kind {
            FormKind::New => form.new_key(),
            FormKind::Edit { .. } => form.edit_key(),
            FormKind::Reply => form.reply_key(),
        };
        debug!(form = %id, draft = %key, "inline form cancelled");
        self.drafts.save(key, form.text.clone());
        self.structure_changed();
        self.update_row_hook(form.row);
    }

    /// Drop the hook flag of a comment row left with nothing in it
    fn update_row_hook(&mut self, row: RowId) {
        let has_forms = self.forms.in_row(row).next().is_some();
        let empty = self
            .table
            .get(row)
            .is_some_and(|r| r.all_cells_empty() && !has_forms);
        if empty {
            if let Some(r) = self.table.get_mut(row) {
                r.hook = false;
            }
            self.structure_changed();
        }
        self.hooks
            .goto_hook(&self.table, &mut self.viewport, ScrollDirection::None);
    }

    /// Payload of `POST inline_draft` for a form
    fn payload(&self, form: &InlineForm) -> String {
        let mut body = form_urlencoded::Serializer::new(String::new());
        body.append_pair("snapshot", form.snapshot.as_str());
        body.append_pair("issue", &self.patch.issue.to_string());
        body.append_pair("patchset", &self.patch.patchset.to_string());
        body.append_pair("patch", &self.patch.patch.to_string());
        body.append_pair("lineno", &form.id.line.to_string());
        if let FormKind::Edit { .. } = form.kind {
            body.append_pair("message_id", &form.id.cid);
        }
        body.append_pair("text", &form.text);
        body.append_pair("side", form.id.side.as_str());
        body.finish()
    }

    /// Freeze a form and build its submission.
    ///
    /// Returns `Ok(None)` while an earlier submission of the same form is
    /// still outstanding.
    pub fn begin_submit(
        &mut self,
        id: &FormId,
    ) -> Result<Option<(SubmissionToken, ApiRequest)>, ClientError> {
        let Some(form) = self.forms.get(id) else {
            return Ok(None);
        };
        if form.pending.is_some() {
            return Ok(None);
        }
        if self.table.find_cell(&Self::comment_cell_id(id.side, id.line)).is_none() {
            return Err(ClientError::MissingElement(format!(
                "snapshot {}",
                form.snapshot.as_str()
            )));
        }

        self.drafts
            .clear_for_submit(&id.cid, id.line, id.side, form.snapshot);
        let request = ApiRequest::inline_draft(self.payload(form));
        let token = SubmissionToken::next();
        if let Some(form) = self.forms.get_mut(id) {
            form.enabled = false;
            form.pending = Some(token);
        }
        info!(form = %id, issue = self.patch.issue, patch = self.patch.patch, "submitting inline comment");
        Ok(Some((token, request)))
    }

    /// Delete a stored draft by submitting empty text. The old text is kept
    /// for the next new comment on the line.
    pub fn delete_comment(
        &mut self,
        id: &FormId,
    ) -> Result<Option<(SubmissionToken, ApiRequest)>, ClientError> {
        let Some(form) = self.forms.get_mut(id) else {
            return Ok(None);
        };
        if form.pending.is_some() {
            return Ok(None);
        }
        let saved = std::mem::take(&mut form.text);
        let new_key = form.new_key();
        let submitted = self.begin_submit(id);
        self.drafts.save(new_key, saved);
        submitted
    }

    /// Apply the outcome of a submission.
    ///
    /// A completion for a form that is gone, or carrying a token other
    /// than the one outstanding, is dropped.
    pub fn complete_submit(
        &mut self,
        id: &FormId,
        token: SubmissionToken,
        result: Result<Reply, ClientError>,
    ) -> Result<(), ClientError> {
        let Some(form) = self.forms.get_mut(id) else {
            debug!(form = %id, "completion for a closed form dropped");
            return Ok(());
        };
        if form.pending != Some(token) {
            debug!(form = %id, "stale completion dropped");
            return Ok(());
        }
        form.pending = None;

        let reply = match result {
            Ok(reply) if reply.is_ok() => reply,
            Ok(reply) => {
                form.enabled = true;
                warn!(form = %id, status = reply.status, "inline comment rejected");
                return Err(ClientError::Status {
                    status: reply.status,
                    text: reply.status_text,
                });
            }
            Err(e) => {
                form.enabled = true;
                warn!(form = %id, error = %e, "inline comment not submitted");
                return Err(e);
            }
        };

        self.forms.remove(id);
        self.apply_thread(id.side, id.line, &reply.text)
    }

    /// Replace the thread of a line with a server fragment
    fn apply_thread(&mut self, side: Side, line: u32, html: &str) -> Result<(), ClientError> {
        let (row, cell) = self
            .table
            .find_cell(&Self::comment_cell_id(side, line))
            .ok_or_else(|| ClientError::MissingElement(Self::comment_cell_id(side, line)))?;
        let Some(r) = self.table.get_mut(row) else {
            return Err(ClientError::MissingElement("comment row".to_string()));
        };
        r.cells[cell].set_thread_html(html);
        if html.len() <= 1 {
            self.structure_changed();
            self.update_row_hook(row);
        } else {
            r.hook = true;
            self.structure_changed();
        }
        Ok(())
    }
}

/// Send a submission, giving up after `deadline`. Expiry drops the request
/// future, which aborts it.
pub async fn submit_with_timeout(
    client: &dyn ReviewClient,
    request: ApiRequest,
    deadline: Duration,
) -> Result<Reply, ClientError> {
    match tokio::time::timeout(deadline, client.send(request)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(deadline_secs = deadline.as_secs(), "inline comment submission timed out");
            Err(ClientError::Timeout(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::hooks::HookPosition;
    use crate::page::tests::page;

    const THREAD: &str = r#"<div name="comment-border">
<b>alice</b>
<div name="comment-text-c7-11-b">Use &lt;T&gt; here,
see <a href="http://x.org/t">http://x.org/t</a>
</div>
<a name="comment-reply" href="javascript:M_replyToInlineComment('alice','2011-01-02 10:00','c7','11','b')">Reply</a>
</div>"#;

    #[test]
    fn test_parse_reply_and_edit_links() {
        let action = CommentAction::parse(
            "javascript:M_replyToInlineComment('o\\'neil','Jan 2','c7','11','b')",
        )
        .unwrap();
        assert_eq!(
            action,
            CommentAction::Reply {
                author: "o'neil".to_string(),
                written_time: "Jan 2".to_string(),
                cid: "c7".to_string(),
                line: 11,
                side: Side::B,
            }
        );
        let action = CommentAction::parse("javascript:M_editInlineComment('c9', 4, 'a')").unwrap();
        assert_eq!(
            action,
            CommentAction::Edit {
                cid: "c9".to_string(),
                line: 4,
                side: Side::A,
            }
        );
        assert!(CommentAction::parse("/12/diff/1/2").is_none());
    }

    #[test]
    fn test_comment_text_undoes_urlize_and_escaping() {
        let body = comment_text(THREAD, "c7", 11, Side::B);
        assert_eq!(body, vec!["Use <T> here,", "see http://x.org/t"]);
        assert!(comment_text(THREAD, "c7", 11, Side::A).is_empty());
    }

    #[test]
    fn test_quote_reply() {
        let text = quote_reply("bob", "today", &["a".to_string(), "b".to_string()]);
        assert_eq!(text, "On today, bob wrote:\n> a\n> b\n\n");
    }

    #[test]
    fn test_new_comment_creates_hook_row_and_restores_draft() {
        let mut page = page(20);
        page.drafts.save(
            DraftKey::New {
                line: 12,
                snapshot: Snapshot::New,
            },
            "left over",
        );
        let hooks_before = page.hooks.hooks().len();
        let id = page.open_new_comment(Side::B, 12).unwrap();
        assert_eq!(id.to_string(), "-1-12-b");
        assert_eq!(page.hooks.hooks().len(), hooks_before + 1);
        let form = page.forms.focused().unwrap();
        assert_eq!(form.text, "left over");
        assert_eq!(page.table.get(form.row).unwrap().extra_height, form.height());
    }

    #[test]
    fn test_new_comment_on_unknown_line_is_missing_element() {
        let mut page = page(20);
        assert!(matches!(
            page.open_new_comment(Side::B, 999),
            Err(ClientError::MissingElement(_))
        ));
    }

    #[test]
    fn test_cancel_new_stashes_text_and_drops_hook() {
        let mut page = page(20);
        let hooks_before = page.hooks.hooks().len();
        let id = page.open_new_comment(Side::B, 12).unwrap();
        page.forms.focused_mut().unwrap().text = "unfinished".to_string();
        page.cancel_form(&id);
        assert!(page.forms.is_empty());
        assert_eq!(page.hooks.hooks().len(), hooks_before);
        let key = DraftKey::New {
            line: 12,
            snapshot: Snapshot::New,
        };
        assert_eq!(page.drafts.restore(&key), Some("unfinished"));
    }

    #[test]
    fn test_submit_payload_and_success() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 12).unwrap();
        page.forms.focused_mut().unwrap().text = "nit: rename".to_string();
        let (token, request) = page.begin_submit(&id).unwrap().unwrap();
        assert_eq!(
            request.form.as_deref(),
            Some("snapshot=new&issue=1&patchset=2&patch=3&lineno=12&text=nit%3A+rename&side=b")
        );
        assert!(!page.forms.get(&id).unwrap().is_enabled());
        // One submission at a time
        assert!(page.begin_submit(&id).unwrap().is_none());

        let thread = r#"<div name="comment-border">me: nit: rename</div>"#;
        page.complete_submit(&id, token, Ok(Reply::ok(thread))).unwrap();
        assert!(page.forms.is_empty());
        let (row, cell) = page.table.find_cell("new-line-12").unwrap();
        let row = page.table.get(row).unwrap();
        assert!(row.hook);
        assert_eq!(row.cells[cell].thread.comments.len(), 1);
        assert!(page.hooks.hooks().contains(&row.id()));
    }

    #[test]
    fn test_submit_clears_all_three_drafts() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 12).unwrap();
        page.forms.focused_mut().unwrap().text = "x".to_string();
        page.drafts.save(
            DraftKey::Reply {
                cid: NEW_CID.to_string(),
                line: 12,
                side: Side::B,
            },
            "old reply",
        );
        page.begin_submit(&id).unwrap().unwrap();
        assert!(page.drafts.is_empty());
    }

    #[test]
    fn test_error_status_reenables_form() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 12).unwrap();
        let (token, _) = page.begin_submit(&id).unwrap().unwrap();
        let err = page
            .complete_submit(&id, token, Ok(Reply::with_status(500, "Internal Server Error")))
            .unwrap_err();
        assert!(err.alert_text().ends_with("Internal Server Error"));
        assert!(page.forms.get(&id).unwrap().is_enabled());
    }

    #[test]
    fn test_empty_response_clears_cell_and_hook() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 12).unwrap();
        let (token, _) = page.begin_submit(&id).unwrap().unwrap();
        page.complete_submit(&id, token, Ok(Reply::ok(" "))).unwrap();
        let (row, _) = page.table.find_cell("new-line-12").unwrap();
        assert!(!page.table.get(row).unwrap().hook);
        assert!(!page.hooks.hooks().contains(&row));
    }

    #[test]
    fn test_reply_prefills_quote_and_restores_draft() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 11).unwrap();
        let (token, _) = page.begin_submit(&id).unwrap().unwrap();
        page.complete_submit(&id, token, Ok(Reply::ok(THREAD))).unwrap();

        let href = page
            .table
            .rows()
            .iter()
            .flat_map(|r| r.cells.iter())
            .find_map(|c| c.thread.last_reply_href())
            .unwrap()
            .to_string();
        let action = CommentAction::parse(&href).unwrap();
        let id = page.open_action(&action).unwrap();
        assert_eq!(
            page.forms.get(&id).unwrap().text,
            "On 2011-01-02 10:00, alice wrote:\n> Use <T> here,\n> see http://x.org/t\n\n"
        );

        page.forms.get_mut(&id).unwrap().text = "Done".to_string();
        page.cancel_form(&id);
        let id = page.open_action(&action).unwrap();
        assert_eq!(page.forms.get(&id).unwrap().text, "Done");
    }

    #[test]
    fn test_delete_submits_empty_text_and_keeps_it_for_new() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 11).unwrap();
        let (token, _) = page.begin_submit(&id).unwrap().unwrap();
        page.complete_submit(&id, token, Ok(Reply::ok(THREAD))).unwrap();

        let edit = CommentAction::Edit {
            cid: "c7".to_string(),
            line: 11,
            side: Side::B,
        };
        let id = page.open_action(&edit).unwrap();
        assert_eq!(
            page.forms.get(&id).unwrap().text,
            "Use <T> here,\nsee http://x.org/t"
        );
        let (_, request) = page.delete_comment(&id).unwrap().unwrap();
        let form = request.form.unwrap();
        assert!(form.contains("message_id=c7"));
        assert!(form.contains("&text=&"));
        let key = DraftKey::New {
            line: 11,
            snapshot: Snapshot::New,
        };
        assert_eq!(page.drafts.restore(&key), Some("Use <T> here,\nsee http://x.org/t"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reenables_and_late_reply_is_ignored() {
        let mut page = page(20);
        let id = page.open_new_comment(Side::B, 12).unwrap();
        let (token, request) = page.begin_submit(&id).unwrap().unwrap();

        let client = FakeClient::new().with_delay(Duration::from_secs(120));
        client.push(Ok(Reply::ok(r#"<div name="comment-border">late</div>"#)));
        let result = submit_with_timeout(&client, request, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));

        let err = page.complete_submit(&id, token, result).unwrap_err();
        assert!(err.alert_text().contains("60 seconds"));
        assert!(page.forms.get(&id).unwrap().is_enabled());

        // Whatever arrives for the abandoned attempt changes nothing
        let late = Ok(Reply::ok(r#"<div name="comment-border">late</div>"#));
        page.complete_submit(&id, token, late).unwrap();
        let (row, cell) = page.table.find_cell("new-line-12").unwrap();
        assert!(page.table.get(row).unwrap().cells[cell].is_empty());
        assert!(page.forms.get(&id).is_some());
    }

    #[test]
    fn test_reopened_page_ignores_earlier_page_completion() {
        let mut first = page(20);
        let id = first.open_new_comment(Side::B, 12).unwrap();
        let (old_token, _) = first.begin_submit(&id).unwrap().unwrap();

        // Same patch opened again while the first request is in flight
        let mut second = page(20);
        let same_id = second.open_new_comment(Side::B, 12).unwrap();
        assert_eq!(same_id, id);
        let (token, _) = second.begin_submit(&same_id).unwrap().unwrap();
        assert_ne!(token, old_token);

        second
            .complete_submit(&same_id, old_token, Ok(Reply::ok(r#"<div name="comment-border">old</div>"#)))
            .unwrap();
        assert!(second.forms.get(&same_id).unwrap().is_submitting());

        second.complete_submit(&same_id, token, Ok(Reply::ok(THREAD))).unwrap();
        assert!(second.forms.get(&same_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_within_deadline_succeeds() {
        let client = FakeClient::new().with_delay(Duration::from_secs(59));
        client.push(Ok(Reply::ok("<div>x</div>")));
        let reply = submit_with_timeout(&client, ApiRequest::inline_draft(String::new()), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(reply.is_ok());
    }

    #[test]
    fn test_indicator_stays_put_when_form_opens() {
        let mut page = page(20);
        let before = page.hooks.position();
        page.open_new_comment(Side::B, 12).unwrap();
        assert!(matches!(before, HookPosition::Top));
        assert_eq!(page.hooks.position(), HookPosition::Top);
    }
}
