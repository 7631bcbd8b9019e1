//! The application: screens, request plumbing and the event loop.

mod helpers;
mod render;
mod types;

pub use types::{AppEvent, LoadingState, Popup};

use std::future::Future;
use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::changelist::{Changelist, Entry};
use crate::client::{ApiRequest, Reply, ReviewClient};
use crate::config::Config;
use crate::cookies::CookieJar;
use crate::dashboard::{DashboardCursor, DashboardRow};
use crate::draft_message::DraftDialog;
use crate::error::ClientError;
use crate::fragment;
use crate::geometry::Viewport;
use crate::hooks::Respond;
use crate::inline::{self, CommentAction, FormId, FormKind, SubmissionToken};
use crate::keys::{self, ChangelistAction, Command, DashboardAction, DiffAction, Screen};
use crate::page::DiffPage;
use crate::parser::{build_table, parse_patch};
use crate::syntax::Highlighter;
use crate::types::{IssueId, PatchRef};

use helpers::{open_in_browser, restore_terminal, setup_terminal};

/// The user popup gives up quietly after this long
const USER_POPUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Header and footer lines around the scrolled body of every screen
const CHROME_HEIGHT: u16 = 2;

/// Spawns requests and routes their completions back to the app
#[derive(Clone)]
struct Requests {
    client: Arc<dyn ReviewClient>,
    tx: UnboundedSender<AppEvent>,
}

impl Requests {
    fn spawn<F, Fut>(&self, make: F)
    where
        F: FnOnce(Arc<dyn ReviewClient>) -> Fut + Send + 'static,
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = make(client).await;
            // The receiver only goes away when the app is shutting down
            let _ = tx.send(event);
        });
    }

    fn send<W>(&self, request: ApiRequest, wrap: W)
    where
        W: FnOnce(Result<Reply, ClientError>) -> AppEvent + Send + 'static,
    {
        self.spawn(move |client| async move { wrap(client.send(request).await) });
    }
}

pub struct App {
    config: Config,
    requests: Requests,
    events: UnboundedReceiver<AppEvent>,
    jar: CookieJar,
    highlighter: Highlighter,

    screen: Screen,
    loading: LoadingState,
    help_visible: bool,
    popup: Option<Popup>,
    should_quit: bool,
    /// Lines available to the scrolled body of a screen
    body_height: u32,

    // Dashboard
    dashboard: Vec<DashboardRow>,
    dashboard_cursor: DashboardCursor,
    dashboard_viewport: Viewport,

    // Changelist
    changelist: Option<Changelist>,
    changelist_cursor: DashboardCursor,
    changelist_viewport: Viewport,

    // Diff
    page: Option<DiffPage>,
    draft: Option<DraftDialog>,
}

impl App {
    pub fn new(config: Config, client: Arc<dyn ReviewClient>, jar: CookieJar) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let highlighter = Highlighter::new(&config.display);
        let dashboard_cursor = DashboardCursor::new(config.dashboard.cookie_name.clone());
        let changelist_cursor =
            DashboardCursor::new(config.dashboard.changelist_cookie_name.clone());
        Self {
            config,
            requests: Requests { client, tx },
            events,
            jar,
            highlighter,
            screen: Screen::Dashboard,
            loading: LoadingState::Idle,
            help_visible: false,
            popup: None,
            should_quit: false,
            body_height: 24,
            dashboard: Vec::new(),
            dashboard_cursor,
            dashboard_viewport: Viewport::new(24, 0),
            changelist: None,
            changelist_cursor,
            changelist_viewport: Viewport::new(24, 0),
            page: None,
            draft: None,
        }
    }

    /// Fetch the open issues and show the dashboard
    pub fn open_dashboard(&mut self) {
        self.screen = Screen::Dashboard;
        self.loading = LoadingState::Loading("Loading issues...".to_string());
        let owner = self.config.dashboard.owner.clone();
        let limit = self.config.dashboard.limit;
        self.requests.spawn(move |client| async move {
            AppEvent::SearchLoaded(client.search(&owner, limit).await)
        });
    }

    /// Fetch an issue and show its changelist, optionally going on to one
    /// of its files
    pub fn open_issue(&mut self, issue: IssueId, then_open: Option<PatchRef>) {
        self.loading = LoadingState::Loading(format!("Loading issue {}...", issue));
        self.requests.spawn(move |client| async move {
            let result = client.issue(issue).await;
            AppEvent::IssueLoaded {
                issue,
                then_open,
                result,
            }
        });
    }

    fn open_patch(&mut self, patch: PatchRef) {
        if let Some(cl) = self.changelist.as_mut() {
            // File navigation needs the sibling list of the patchset
            if cl.id() == patch.issue && cl.ensure_loaded(patch.patchset) {
                self.request_patchset(patch.issue, patch.patchset);
            }
        }
        let what = if patch.filename.is_empty() {
            format!("patch {}", patch.patch)
        } else {
            patch.filename.clone()
        };
        self.loading = LoadingState::Loading(format!("Loading {}...", what));
        self.requests.spawn(move |client| async move {
            let result = client.download(&patch).await;
            AppEvent::DiffLoaded { patch, result }
        });
    }

    fn request_patchset(&self, issue: IssueId, patchset: u64) {
        self.requests
            .send(ApiRequest::patchset(issue, patchset), move |result| {
                AppEvent::PatchsetLoaded {
                    issue,
                    patchset,
                    result,
                }
            });
    }

    fn submit_inline(
        &self,
        patch: PatchRef,
        form: FormId,
        token: SubmissionToken,
        request: ApiRequest,
    ) {
        let deadline = self.config.timeouts.submit();
        self.requests.spawn(move |client| async move {
            let result = inline::submit_with_timeout(client.as_ref(), request, deadline).await;
            AppEvent::InlineSubmitted {
                patch,
                form,
                token,
                result,
            }
        });
    }

    fn current_issue(&self) -> Option<IssueId> {
        match (&self.page, &self.changelist) {
            (Some(page), _) if self.screen == Screen::Diff => Some(page.patch.issue),
            (_, Some(cl)) => Some(cl.id()),
            (Some(page), None) => Some(page.patch.issue),
            (None, None) => None,
        }
    }

    fn publish_url(&self, issue: IssueId) -> String {
        format!("{}{}/publish", self.config.server.base_url, issue)
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            while let Ok(event) = self.events.try_recv() {
                self.handle_event(event);
            }
            self.tick(Instant::now());

            let size = terminal.size()?;
            self.set_body_height(size.height.saturating_sub(CHROME_HEIGHT) as u32);
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    /// Expire timed status messages
    fn tick(&mut self, now: Instant) {
        if let Some(dialog) = self.draft.as_mut() {
            dialog.status.tick(now);
        }
    }

    fn set_body_height(&mut self, height: u32) {
        if height == self.body_height {
            return;
        }
        self.body_height = height;
        self.dashboard_viewport
            .resize(height, self.dashboard.len() as u32);
        let entries = self.changelist.as_ref().map_or(0, |cl| cl.entries().len());
        self.changelist_viewport.resize(height, entries as u32);
        if let Some(page) = self.page.as_mut() {
            page.resize(height);
        }
    }

    /// Save the draft message on the way out
    pub async fn unload(&mut self) {
        let Some(dialog) = self.draft.as_mut() else {
            return;
        };
        if let Some(request) = dialog.unload() {
            info!(issue = dialog.issue(), "saving draft message before exit");
            let result = self.requests.client.send(request).await;
            if let Err(e) = dialog.save_complete(result, Instant::now()) {
                warn!(error = %e, "draft message lost");
            }
        }
    }

    // ---- completions ----------------------------------------------------

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SearchLoaded(result) => match result {
                Ok(results) => {
                    info!(count = results.results.len(), "dashboard loaded");
                    self.dashboard = results.results.into_iter().map(DashboardRow::new).collect();
                    self.refresh_dashboard_cursor();
                    self.loading = LoadingState::Idle;
                }
                Err(e) => {
                    warn!(error = %e, "dashboard search failed");
                    self.loading = LoadingState::Error(format!("Could not load issues: {}", e));
                }
            },
            AppEvent::IssueLoaded {
                issue,
                then_open,
                result,
            } => match result {
                Ok(detail) => {
                    info!(issue, patchsets = detail.patchsets.len(), "issue loaded");
                    self.changelist = Some(Changelist::new(detail));
                    self.refresh_changelist_cursor();
                    self.screen = Screen::Changelist;
                    self.loading = LoadingState::Idle;
                    if let Some(patch) = then_open {
                        self.open_patch(patch);
                    }
                }
                Err(e) => {
                    warn!(issue, error = %e, "issue load failed");
                    self.loading =
                        LoadingState::Error(format!("Could not load issue {}: {}", issue, e));
                }
            },
            AppEvent::PatchsetLoaded {
                issue,
                patchset,
                result,
            } => self.patchset_loaded(issue, patchset, result),
            AppEvent::DiffLoaded { patch, result } => self.diff_loaded(patch, result),
            AppEvent::WarningsLoaded { patch, result } => {
                let Some(page) = self.page.as_mut().filter(|p| p.patch == patch) else {
                    return;
                };
                match result {
                    Ok(reply) if reply.is_ok() => page.set_warnings(&reply.text),
                    Ok(reply) => debug!(status = reply.status, "no analysis warnings"),
                    Err(e) => debug!(error = %e, "analysis warnings unavailable"),
                }
            }
            AppEvent::InlineSubmitted {
                patch,
                form,
                token,
                result,
            } => {
                let Some(page) = self.page.as_mut().filter(|p| p.patch == patch) else {
                    debug!(form = %form, "submission finished after leaving the diff");
                    return;
                };
                if let Err(e) = page.complete_submit(&form, token, result) {
                    self.loading = LoadingState::Error(e.alert_text());
                }
            }
            AppEvent::SkippedLoaded {
                patch,
                skip_id,
                expand,
                result,
            } => {
                if let Some(page) = self.page.as_mut().filter(|p| p.patch == patch) {
                    page.complete_skipped(skip_id, expand, result);
                }
            }
            AppEvent::StarDone {
                issue,
                requested,
                result,
            } => {
                let Some(row) = self.dashboard.iter_mut().find(|r| r.issue.issue == issue) else {
                    return;
                };
                match result.and_then(Reply::into_ok) {
                    Ok(html) => row.apply_star_fragment(&html, requested),
                    Err(e) => {
                        warn!(issue, error = %e, "star request failed");
                        self.loading = LoadingState::Error(format!("Could not update the star: {}", e));
                    }
                }
            }
            AppEvent::CloseDone { issue, result } => {
                let Some(row) = self.dashboard.iter_mut().find(|r| r.issue.issue == issue) else {
                    return;
                };
                match result.and_then(Reply::into_ok) {
                    Ok(reason) => {
                        info!(issue, "issue closed");
                        row.apply_close(&reason);
                    }
                    Err(e) => {
                        warn!(issue, error = %e, "close request failed");
                        self.loading = LoadingState::Error(format!("Could not close issue {}: {}", issue, e));
                    }
                }
            }
            AppEvent::UserPopup { user, result } => match result.and_then(Reply::into_ok) {
                Ok(html) => {
                    self.popup = Some(Popup {
                        title: user,
                        lines: fragment::to_text_lines(&html),
                    })
                }
                Err(e) => debug!(user = %user, error = %e, "user popup unavailable"),
            },
            AppEvent::DraftLoaded { issue, result } => {
                if let Some(dialog) = self.draft.as_mut().filter(|d| d.issue() == issue) {
                    dialog.load_complete(result, Instant::now());
                }
            }
            AppEvent::DraftSaved { issue, result } => {
                if let Some(dialog) = self.draft.as_mut().filter(|d| d.issue() == issue) {
                    if let Err(e) = dialog.save_complete(result, Instant::now()) {
                        debug!(issue, error = %e, "draft message not saved");
                    }
                }
            }
            AppEvent::DraftDiscarded { issue, result } => {
                if let Some(dialog) = self.draft.as_mut().filter(|d| d.issue() == issue) {
                    dialog.discard_complete(result, Instant::now());
                }
            }
        }
    }

    fn patchset_loaded(&mut self, issue: IssueId, patchset: u64, result: Result<Reply, ClientError>) {
        let Some(cl) = self.changelist.as_mut().filter(|cl| cl.id() == issue) else {
            return;
        };
        match result {
            Ok(reply) if reply.is_ok() => cl.section_loaded(patchset, &reply.text),
            Ok(reply) => {
                warn!(issue, patchset, status = reply.status, "patchset section failed");
                cl.section_failed(patchset, reply.status);
            }
            Err(e) => {
                warn!(issue, patchset, error = %e, "patchset section failed");
                cl.section_failed(patchset, 0);
            }
        }
        // A diff opened straight from a URL learns its file name here
        if let Some(page) = self.page.as_mut() {
            if page.patch.filename.is_empty() {
                if let Some(name) = cl.filename_of(&page.patch) {
                    page.patch.filename = name.to_string();
                }
            }
        }
        self.refresh_changelist_cursor();
    }

    fn diff_loaded(&mut self, patch: PatchRef, result: Result<String, ClientError>) {
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!(patch = patch.patch, error = %e, "diff load failed");
                self.loading = LoadingState::Error(format!("Could not load the diff: {}", e));
                return;
            }
        };
        let hunks = parse_patch(&text);
        debug!(patch = patch.patch, hunks = hunks.len(), "diff loaded");
        let mut patch = patch;
        if patch.filename.is_empty() {
            if let Some(name) = self.changelist.as_ref().and_then(|cl| cl.filename_of(&patch)) {
                patch.filename = name.to_string();
            }
        }
        if self.config.diff.analysis_warnings && !patch.filename.is_empty() {
            let request = ApiRequest::warnings(
                patch.issue,
                &patch.filename,
                "base",
                &patch.patchset.to_string(),
            );
            let for_patch = patch.clone();
            self.requests.send(request, move |result| AppEvent::WarningsLoaded {
                patch: for_patch,
                result,
            });
        }
        self.page = Some(DiffPage::new(
            patch,
            build_table(&hunks),
            self.body_height,
            &self.config.diff,
        ));
        self.screen = Screen::Diff;
        self.loading = LoadingState::Idle;
    }

    fn refresh_dashboard_cursor(&mut self) {
        let n = self.dashboard.len() as u32;
        self.dashboard_viewport = Viewport::new(self.body_height, n);
        self.dashboard_cursor
            .initialize((0..n).collect(), &mut self.jar, &mut self.dashboard_viewport);
    }

    fn refresh_changelist_cursor(&mut self) {
        let n = self.changelist.as_ref().map_or(0, |cl| cl.entries().len()) as u32;
        self.changelist_viewport.resize(self.body_height, n);
        self.changelist_cursor
            .initialize((0..n).collect(), &mut self.jar, &mut self.changelist_viewport);
    }

    // ---- keys -----------------------------------------------------------

    fn in_input(&self) -> bool {
        if self.draft.as_ref().is_some_and(DraftDialog::is_visible) {
            return true;
        }
        self.screen == Screen::Diff
            && self
                .page
                .as_ref()
                .is_some_and(|p| p.forms.focused().is_some())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let name = keys::key_name(&key);

        // If loading, only allow quit
        if matches!(self.loading, LoadingState::Loading(_)) {
            if matches!(name.as_str(), "Q" | "Ctrl-C" | "Esc") {
                self.should_quit = true;
            }
            return;
        }

        // Clear error or success on any key
        if matches!(
            self.loading,
            LoadingState::Error(_) | LoadingState::Success(_)
        ) {
            self.loading = LoadingState::Idle;
            return;
        }

        if self.popup.take().is_some() {
            return;
        }

        let in_input = self.in_input();
        match keys::dispatch(self.screen, in_input, self.help_visible, &name) {
            Command::ToggleHelp => self.help_visible = !self.help_visible,
            Command::CloseHelp => self.help_visible = false,
            Command::SaveInput => self.save_input(),
            Command::CancelInput => self.cancel_input(),
            Command::DeleteInput => self.delete_input(),
            Command::Quit => self.should_quit = true,
            Command::Dashboard(action) => self.dashboard_action(action),
            Command::Changelist(action) => self.changelist_action(action),
            Command::Diff(action) => self.diff_action(action),
            Command::Unhandled if in_input => self.type_key(key),
            Command::Unhandled => {}
        }
    }

    fn type_key(&mut self, key: KeyEvent) {
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return;
        }
        // None is a backspace
        let typed = match key.code {
            KeyCode::Char(c) => Some(c),
            KeyCode::Enter => Some('\n'),
            KeyCode::Backspace => None,
            _ => return,
        };

        if let Some(dialog) = self.draft.as_mut().filter(|d| d.is_visible()) {
            match typed {
                Some(c) => dialog.insert_char(c),
                None => dialog.backspace(),
            }
            return;
        }
        if let Some(page) = self.page.as_mut() {
            if let Some(form) = page.forms.focused_mut() {
                match typed {
                    Some(c) => form.insert_char(c),
                    None => form.backspace(),
                }
                page.structure_changed();
            }
        }
    }

    fn save_input(&mut self) {
        if let Some(dialog) = self.draft.as_mut().filter(|d| d.is_visible()) {
            let issue = dialog.issue();
            if let Some(request) = dialog.dialog_save() {
                self.requests
                    .send(request, move |result| AppEvent::DraftSaved { issue, result });
            }
            return;
        }
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let Some(id) = page.forms.focused_id().cloned() else {
            return;
        };
        match page.begin_submit(&id) {
            Ok(Some((token, request))) => {
                let patch = page.patch.clone();
                self.submit_inline(patch, id, token, request);
            }
            Ok(None) => {}
            Err(e) => self.loading = LoadingState::Error(e.alert_text()),
        }
    }

    fn cancel_input(&mut self) {
        if let Some(dialog) = self.draft.as_mut().filter(|d| d.is_visible()) {
            let issue = dialog.issue();
            if let Some(request) = dialog.hide(true) {
                self.requests
                    .send(request, move |result| AppEvent::DraftSaved { issue, result });
            }
            return;
        }
        if let Some(page) = self.page.as_mut() {
            if let Some(id) = page.forms.focused_id().cloned() {
                page.cancel_form(&id);
            }
        }
    }

    fn delete_input(&mut self) {
        if let Some(dialog) = self.draft.as_mut().filter(|d| d.is_visible()) {
            let issue = dialog.issue();
            let request = dialog.discard();
            self.requests
                .send(request, move |result| AppEvent::DraftDiscarded { issue, result });
            return;
        }
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let Some(form) = page.forms.focused_mut() else {
            return;
        };
        let id = form.id.clone();
        if !matches!(form.kind, FormKind::Edit { .. }) {
            // Nothing stored yet: just empty the form
            form.text.clear();
            page.structure_changed();
            return;
        }
        match page.delete_comment(&id) {
            Ok(Some((token, request))) => {
                let patch = page.patch.clone();
                self.submit_inline(patch, id, token, request);
            }
            Ok(None) => {}
            Err(e) => self.loading = LoadingState::Error(e.alert_text()),
        }
    }

    fn dashboard_action(&mut self, action: DashboardAction) {
        let selected = self
            .dashboard_cursor
            .selected()
            .and_then(|i| self.dashboard.get(i));
        match action {
            DashboardAction::Next => self
                .dashboard_cursor
                .goto_next(&mut self.jar, &mut self.dashboard_viewport),
            DashboardAction::Prev => self
                .dashboard_cursor
                .goto_prev(&mut self.jar, &mut self.dashboard_viewport),
            DashboardAction::Open => {
                if let Some(issue) = selected.map(|r| r.issue.issue) {
                    self.open_issue(issue, None);
                }
            }
            DashboardAction::Close => {
                let Some(row) = selected.filter(|r| !r.is_closed()) else {
                    return;
                };
                let issue = row.issue.issue;
                let request = ApiRequest::close(issue, &self.config.server.xsrf_token);
                self.requests
                    .send(request, move |result| AppEvent::CloseDone { issue, result });
            }
            DashboardAction::ToggleStar => {
                let Some(row) = selected else {
                    return;
                };
                let issue = row.issue.issue;
                let requested = !row.starred;
                let request = ApiRequest::star(issue, requested, &self.config.server.xsrf_token);
                self.requests.send(request, move |result| AppEvent::StarDone {
                    issue,
                    requested,
                    result,
                });
            }
            DashboardAction::AuthorPopup => {
                let Some(row) = selected else {
                    return;
                };
                let user = if row.issue.owner_email.is_empty() {
                    row.issue.owner.clone()
                } else {
                    row.issue.owner_email.clone()
                };
                if user.is_empty() {
                    return;
                }
                let request = ApiRequest::user_popup(&user);
                self.requests.spawn(move |client| async move {
                    let result =
                        match tokio::time::timeout(USER_POPUP_TIMEOUT, client.send(request)).await {
                            Ok(result) => result,
                            Err(_) => Err(ClientError::Timeout(USER_POPUP_TIMEOUT)),
                        };
                    AppEvent::UserPopup { user, result }
                });
            }
        }
    }

    fn changelist_action(&mut self, action: ChangelistAction) {
        match action {
            ChangelistAction::Next => self
                .changelist_cursor
                .goto_next(&mut self.jar, &mut self.changelist_viewport),
            ChangelistAction::Prev => self
                .changelist_cursor
                .goto_prev(&mut self.jar, &mut self.changelist_viewport),
            ChangelistAction::Open => {
                let Some(cl) = self.changelist.as_mut() else {
                    return;
                };
                let Some(entry) = self
                    .changelist_cursor
                    .selected()
                    .and_then(|i| cl.entries().get(i).copied())
                else {
                    return;
                };
                match entry {
                    Entry::Patchset(section) => {
                        let issue = cl.id();
                        if let Some(patchset) = cl.toggle(section) {
                            self.request_patchset(issue, patchset);
                        }
                        self.refresh_changelist_cursor();
                    }
                    Entry::File { section, file } => {
                        if let Some(patch) = cl.file(section, file).map(|f| f.patch.clone()) {
                            self.open_patch(patch);
                        }
                    }
                }
            }
            ChangelistAction::Publish => {
                if let Some(issue) = self.current_issue() {
                    open_in_browser(&self.publish_url(issue));
                }
            }
            ChangelistAction::UpToDashboard => {
                self.screen = Screen::Dashboard;
                if self.dashboard.is_empty() {
                    self.open_dashboard();
                }
            }
        }
    }

    fn diff_action(&mut self, action: DiffAction) {
        match action {
            DiffAction::NextFile => self.goto_file(true, false),
            DiffAction::PrevFile => self.goto_file(false, false),
            DiffAction::NextFileWithComment => self.goto_file(true, true),
            DiffAction::PrevFileWithComment => self.goto_file(false, true),
            DiffAction::Publish => {
                if let Some(issue) = self.current_issue() {
                    open_in_browser(&self.publish_url(issue));
                }
            }
            DiffAction::DraftMessage => self.show_draft_dialog(),
            DiffAction::UpToChangelist => {
                if self.changelist.is_some() {
                    self.screen = Screen::Changelist;
                } else if let Some(issue) = self.page.as_ref().map(|p| p.patch.issue) {
                    self.open_issue(issue, None);
                }
            }
            _ => self.page_action(action),
        }
    }

    /// Actions that only touch the open diff page
    fn page_action(&mut self, action: DiffAction) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        match action {
            DiffAction::NextHook => page.hooks.goto_next(&page.table, &mut page.viewport, false),
            DiffAction::PrevHook => page.hooks.goto_prev(&page.table, &mut page.viewport, false),
            DiffAction::NextComment => page.hooks.goto_next(&page.table, &mut page.viewport, true),
            DiffAction::PrevComment => page.hooks.goto_prev(&page.table, &mut page.viewport, true),
            DiffAction::ToggleIntraline => page.toggle_intraline(),
            DiffAction::ToggleComments => page.toggle_comments(),
            DiffAction::ExpandComments => page.set_comments_collapsed(false),
            DiffAction::CollapseComments => page.set_comments_collapsed(true),
            DiffAction::Respond => {
                let opened = match page.hooks.respond(&page.table, &page.viewport) {
                    Respond::Reply(href) => match CommentAction::parse(&href) {
                        Some(action) => page.open_action(&action).map(|_| ()),
                        None => {
                            debug!(href = %href, "reply link not understood");
                            Ok(())
                        }
                    },
                    Respond::NewComment { side, line } => {
                        page.open_new_comment(side, line).map(|_| ())
                    }
                    Respond::Nothing => Ok(()),
                };
                if let Err(e) = opened {
                    self.loading = LoadingState::Error(e.alert_text());
                }
            }
            DiffAction::ExpandSkipped(expand) => {
                let Some(skip_id) = page.nearest_skip() else {
                    return;
                };
                if let Some(request) = page.expand_skipped(skip_id, expand) {
                    let patch = page.patch.clone();
                    self.requests.send(request, move |result| AppEvent::SkippedLoaded {
                        patch,
                        skip_id,
                        expand,
                        result,
                    });
                }
            }
            DiffAction::ScrollLines(n) => page.viewport.scroll_by(n as i64),
            DiffAction::ScrollPages(n) => {
                let step = page.viewport.height.max(1) as i64;
                page.viewport.scroll_by(n as i64 * step);
            }
            _ => {}
        }
    }

    /// Move to a sibling file; with none left, go up to the changelist
    fn goto_file(&mut self, forward: bool, with_comments: bool) {
        let Some(page) = self.page.as_ref() else {
            return;
        };
        let next = self
            .changelist
            .as_ref()
            .and_then(|cl| cl.neighbour(&page.patch, forward, with_comments));
        match next {
            Some(patch) => self.open_patch(patch),
            None if self.changelist.is_some() => self.screen = Screen::Changelist,
            None => {
                let issue = page.patch.issue;
                self.open_issue(issue, None);
            }
        }
    }

    fn show_draft_dialog(&mut self) {
        let Some(issue) = self.current_issue() else {
            return;
        };
        if self.draft.as_ref().is_some_and(|d| d.issue() != issue) {
            if let Some(mut old) = self.draft.take() {
                let old_issue = old.issue();
                if let Some(request) = old.unload() {
                    self.requests.send(request, move |result| AppEvent::DraftSaved {
                        issue: old_issue,
                        result,
                    });
                }
            }
        }
        let clear_after = self.config.timeouts.status_clear();
        let dialog = self
            .draft
            .get_or_insert_with(|| DraftDialog::new(issue, clear_after));
        if let Some(request) = dialog.show() {
            self.requests
                .send(request, move |result| AppEvent::DraftLoaded { issue, result });
        }
    }
}
