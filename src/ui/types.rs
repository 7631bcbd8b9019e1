//! UI type definitions for the application state machine.

use crate::client::Reply;
use crate::error::ClientError;
use crate::inline::{FormId, SubmissionToken};
use crate::skipped::Expand;
use crate::types::{IssueDetail, IssueId, PatchRef, SearchResults};

/// Blocking overlay state
#[derive(Clone, PartialEq, Eq)]
pub enum LoadingState {
    Idle,
    Loading(String), // Message to display
    Success(String),
    Error(String),
}

/// A small text popup (user details); any key closes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub lines: Vec<String>,
}

/// Completion of a request spawned by the app, drained once per frame
#[derive(Debug)]
pub enum AppEvent {
    SearchLoaded(Result<SearchResults, ClientError>),
    IssueLoaded {
        issue: IssueId,
        /// File to open once the issue is known
        then_open: Option<PatchRef>,
        result: Result<IssueDetail, ClientError>,
    },
    PatchsetLoaded {
        issue: IssueId,
        patchset: u64,
        result: Result<Reply, ClientError>,
    },
    DiffLoaded {
        patch: PatchRef,
        result: Result<String, ClientError>,
    },
    WarningsLoaded {
        patch: PatchRef,
        result: Result<Reply, ClientError>,
    },
    InlineSubmitted {
        patch: PatchRef,
        form: FormId,
        token: SubmissionToken,
        result: Result<Reply, ClientError>,
    },
    SkippedLoaded {
        patch: PatchRef,
        skip_id: u32,
        expand: Expand,
        result: Result<Reply, ClientError>,
    },
    StarDone {
        issue: IssueId,
        requested: bool,
        result: Result<Reply, ClientError>,
    },
    CloseDone {
        issue: IssueId,
        result: Result<Reply, ClientError>,
    },
    UserPopup {
        user: String,
        result: Result<Reply, ClientError>,
    },
    DraftLoaded {
        issue: IssueId,
        result: Result<Reply, ClientError>,
    },
    DraftSaved {
        issue: IssueId,
        result: Result<Reply, ClientError>,
    },
    DraftDiscarded {
        issue: IssueId,
        result: Result<Reply, ClientError>,
    },
}
