//! The draft review message dialog.
//!
//! Requests are described, not performed: each operation hands back the
//! [`ApiRequest`] to send, and the matching `*_complete` method takes the
//! result. The UI spawns the request and routes the completion back.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::client::{ApiRequest, Reply};
use crate::error::ClientError;
use crate::types::IssueId;

pub const LOADING: &str = "Loading...";
pub const FAILED: &str = "An error occurred.";
pub const SAVED: &str = "Message saved.";
pub const DISCARDED: &str = "OK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Unloaded,
    Loading,
    Idle,
    Saving,
    Discarding,
}

/// A one-line status that clears itself after a delay.
///
/// Setting a new message replaces any pending clear.
#[derive(Debug, Clone)]
pub struct StatusLine {
    text: Option<String>,
    clear_at: Option<Instant>,
    clear_after: Duration,
}

impl StatusLine {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            text: None,
            clear_at: None,
            clear_after,
        }
    }

    /// Show `text` until `now + clear_after`
    pub fn set(&mut self, text: impl Into<String>, now: Instant) {
        self.text = Some(text.into());
        self.clear_at = Some(now + self.clear_after);
    }

    /// Show `text` until replaced
    pub fn set_sticky(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
        self.clear_at = None;
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.clear_at = None;
    }

    /// Drop the message once its time is up. Returns true if it changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.clear_at {
            Some(at) if now >= at => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone)]
struct PendingSave {
    text: String,
    /// Report the outcome in the status line
    announce: bool,
}

#[derive(Debug, Clone)]
pub struct DraftDialog {
    issue: IssueId,
    state: DialogState,
    visible: bool,
    input_enabled: bool,
    /// Text being edited
    pub text: String,
    /// Last text sent to (or loaded from) the server, whatever the outcome
    shadow: String,
    pending_save: Option<PendingSave>,
    pub status: StatusLine,
}

impl DraftDialog {
    pub fn new(issue: IssueId, status_clear_after: Duration) -> Self {
        Self {
            issue,
            state: DialogState::Unloaded,
            visible: false,
            input_enabled: true,
            text: String::new(),
            shadow: String::new(),
            pending_save: None,
            status: StatusLine::new(status_clear_after),
        }
    }

    pub fn issue(&self) -> IssueId {
        self.issue
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Fetch the stored draft. Input stays disabled until it settles.
    pub fn load(&mut self) -> ApiRequest {
        self.state = DialogState::Loading;
        self.input_enabled = false;
        self.status.set_sticky(LOADING);
        ApiRequest::load_draft_message(self.issue)
    }

    /// Settle a load. A failure shows briefly, like any other status.
    pub fn load_complete(&mut self, result: Result<Reply, ClientError>, now: Instant) {
        match result.and_then(Reply::into_ok) {
            Ok(text) => {
                self.shadow = text.clone();
                self.text = text;
                self.status.clear();
            }
            Err(e) => {
                warn!(issue = self.issue, error = %e, "failed to load draft message");
                self.status.set(FAILED, now);
            }
        }
        self.input_enabled = true;
        self.state = DialogState::Idle;
    }

    /// Store the text unless it is empty, already stored, or already on its
    /// way to the server.
    pub fn save(&mut self) -> Option<ApiRequest> {
        self.save_inner(false)
    }

    fn save_inner(&mut self, announce: bool) -> Option<ApiRequest> {
        if self.text.is_empty() || self.text == self.shadow {
            return None;
        }
        if let Some(pending) = &mut self.pending_save {
            if pending.text == self.text {
                pending.announce |= announce;
                return None;
            }
        }
        debug!(issue = self.issue, len = self.text.len(), "saving draft message");
        self.pending_save = Some(PendingSave {
            text: self.text.clone(),
            announce,
        });
        self.state = DialogState::Saving;
        Some(ApiRequest::save_draft_message(self.issue, &self.text))
    }

    /// Settle a save. The raw outcome is handed back to the caller.
    ///
    /// The sent text becomes the shadow even when the save failed, so an
    /// unmodified text is never sent twice.
    pub fn save_complete(
        &mut self,
        result: Result<Reply, ClientError>,
        now: Instant,
    ) -> Result<Reply, ClientError> {
        let pending = self.pending_save.take();
        let announce = pending.as_ref().is_some_and(|p| p.announce);
        if let Some(pending) = pending {
            self.shadow = pending.text;
        }
        let ok = matches!(&result, Ok(reply) if reply.is_ok());
        if !ok {
            warn!(issue = self.issue, "failed to save draft message");
        }
        if announce {
            self.status.set(if ok { SAVED } else { FAILED }, now);
        }
        self.state = DialogState::Idle;
        result
    }

    /// Always issues a delete
    pub fn discard(&mut self) -> ApiRequest {
        self.state = DialogState::Discarding;
        ApiRequest::discard_draft_message(self.issue)
    }

    /// Settle a discard. The text is dropped whatever the outcome.
    pub fn discard_complete(&mut self, result: Result<Reply, ClientError>, now: Instant) {
        self.text.clear();
        self.shadow.clear();
        self.pending_save = None;
        match result.and_then(Reply::into_ok) {
            Ok(_) => self.status.set(DISCARDED, now),
            Err(e) => {
                warn!(issue = self.issue, error = %e, "failed to discard draft message");
                self.status.set(FAILED, now);
            }
        }
        self.state = DialogState::Idle;
    }

    /// Open the dialog; the first opening also loads the stored text
    pub fn show(&mut self) -> Option<ApiRequest> {
        self.visible = true;
        self.status.clear();
        (self.state == DialogState::Unloaded).then(|| self.load())
    }

    /// Close the dialog, optionally saving first
    pub fn hide(&mut self, save: bool) -> Option<ApiRequest> {
        self.visible = false;
        if save {
            self.save()
        } else {
            None
        }
    }

    /// Save button: like [`DraftDialog::save`] but reports the outcome
    pub fn dialog_save(&mut self) -> Option<ApiRequest> {
        self.save_inner(true)
    }

    /// Final save when the application exits
    pub fn unload(&mut self) -> Option<ApiRequest> {
        self.save()
    }

    pub fn insert_char(&mut self, c: char) {
        if self.input_enabled {
            self.text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.input_enabled {
            self.text.pop();
        }
    }
}
