use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::config::{normalize_base_url, Config};
use crate::error::ClientError;
use crate::types::{IssueDetail, IssueId, PatchRef, SearchResults};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// One exchange with the review server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the server root, including any query string
    pub path: String,
    /// `application/x-www-form-urlencoded` body
    pub form: Option<String>,
    /// The caller bounds the wait itself (inline submission)
    pub untimed: bool,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            form: None,
            untimed: false,
        }
    }

    fn with_form(mut self, form: String) -> Self {
        self.form = Some(form);
        self
    }

    /// `GET /api/{issue}`
    pub fn issue(issue: IssueId) -> Self {
        Self::new(Method::Get, format!("api/{}", issue))
    }

    /// `GET /search?format=json`: open issues, optionally of one owner
    pub fn search(owner: &str, limit: u32) -> Self {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("format", "json");
        query.append_pair("closed", "False");
        query.append_pair("limit", &limit.to_string());
        if !owner.is_empty() {
            query.append_pair("owner", owner);
        }
        Self::new(Method::Get, format!("search?{}", query.finish()))
    }

    /// `GET /{issue}/patchset/{patchset}`, an HTML section
    pub fn patchset(issue: IssueId, patchset: u64) -> Self {
        Self::new(Method::Get, format!("{}/patchset/{}", issue, patchset))
    }

    /// Raw patch of one file
    pub fn download(patch: &PatchRef) -> Self {
        Self::new(
            Method::Get,
            format!(
                "download/issue{}_{}_{}.diff",
                patch.issue, patch.patchset, patch.patch
            ),
        )
    }

    /// `POST /inline_draft`; the wait is bounded by the submission deadline
    pub fn inline_draft(payload: String) -> Self {
        let mut req = Self::new(Method::Post, "inline_draft").with_form(payload);
        req.untimed = true;
        req
    }

    /// `GET /warnings/{cl}/{path}?a={a}&b={b}`
    pub fn warnings(cl: IssueId, path: &str, a: &str, b: &str) -> Self {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("a", a)
            .append_pair("b", b)
            .finish();
        Self::new(
            Method::Get,
            format!("warnings/{}/{}?{}", cl, path.trim_start_matches('/'), query),
        )
    }

    /// `GET /user_popup/{user_key}`
    pub fn user_popup(user_key: &str) -> Self {
        Self::new(Method::Get, format!("user_popup/{}", user_key))
    }

    /// `POST /{issue}/star` or `/unstar`
    pub fn star(issue: IssueId, star: bool, xsrf_token: &str) -> Self {
        let action = if star { "star" } else { "unstar" };
        Self::new(Method::Post, format!("{}/{}", issue, action)).with_form(xsrf_form(xsrf_token))
    }

    /// `POST /{issue}/close`
    pub fn close(issue: IssueId, xsrf_token: &str) -> Self {
        Self::new(Method::Post, format!("{}/close", issue)).with_form(xsrf_form(xsrf_token))
    }

    pub fn load_draft_message(issue: IssueId) -> Self {
        Self::new(Method::Get, format!("{}/draft_message", issue))
    }

    pub fn save_draft_message(issue: IssueId, text: &str) -> Self {
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("reviewmsg", text)
            .finish();
        Self::new(Method::Post, format!("{}/draft_message", issue)).with_form(form)
    }

    pub fn discard_draft_message(issue: IssueId) -> Self {
        Self::new(Method::Delete, format!("{}/draft_message", issue))
    }

    /// Rows hidden behind a skip marker.
    /// `where_` is `t` (expand before), `b` (expand after) or `a` (all).
    pub fn skipped_lines(
        patch: &PatchRef,
        before: u32,
        after: u32,
        where_: char,
        column_width: u32,
        context: Option<u32>,
    ) -> Self {
        let mut path = format!(
            "{}/diff_skipped_lines/{}/{}/{}/{}/{}/{}",
            patch.issue, patch.patchset, patch.patch, before, after, where_, column_width
        );
        if let Some(context) = context {
            path.push_str(&format!("?context={}", context));
        }
        Self::new(Method::Get, path)
    }
}

fn xsrf_form(token: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("xsrf_token", token)
        .finish()
}

/// A settled response; non-200 statuses are not errors at this level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    /// Reason phrase of the status line
    pub status_text: String,
    pub text: String,
}

impl Reply {
    #[cfg(test)]
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            text: text.into(),
        }
    }

    #[cfg(test)]
    pub fn with_status(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            text: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Turn a non-200 reply into an error
    pub fn into_ok(self) -> Result<String, ClientError> {
        if self.is_ok() {
            Ok(self.text)
        } else {
            Err(ClientError::Status {
                status: self.status,
                text: self.status_text,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let text = self.into_ok()?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Transport to the review server
#[async_trait]
pub trait ReviewClient: Send + Sync {
    /// Perform one exchange. Transport failures are errors; any HTTP status
    /// comes back as a [`Reply`].
    async fn send(&self, request: ApiRequest) -> Result<Reply, ClientError>;

    async fn issue(&self, issue: IssueId) -> Result<IssueDetail, ClientError> {
        self.send(ApiRequest::issue(issue)).await?.json()
    }

    async fn search(&self, owner: &str, limit: u32) -> Result<SearchResults, ClientError> {
        self.send(ApiRequest::search(owner, limit)).await?.json()
    }

    async fn download(&self, patch: &PatchRef) -> Result<String, ClientError> {
        self.send(ApiRequest::download(patch)).await?.into_ok()
    }
}

/// HTTP implementation of [`ReviewClient`]
pub struct ReqwestClient {
    base: Url,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl ReqwestClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let base = Url::parse(&normalize_base_url(&config.server.base_url))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.server.base_url, e)))?;

        let http = reqwest::Client::builder()
            .user_agent(config.server.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base,
            http,
            request_timeout: config.timeouts.request(),
        })
    }
}

#[async_trait]
impl ReviewClient for ReqwestClient {
    async fn send(&self, request: ApiRequest) -> Result<Reply, ClientError> {
        let url = self
            .base
            .join(&request.path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", request.path, e)))?;

        let mut builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Delete => self.http.delete(url),
        };
        if let Some(form) = request.form.clone() {
            builder = builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form);
        }
        if !request.untimed {
            builder = builder.timeout(self.request_timeout);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            warn!(method = request.method.as_str(), path = %request.path, error = %e, "request failed");
            if e.is_timeout() {
                ClientError::Timeout(self.request_timeout)
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read response: {}", e)))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if status.is_success() {
            debug!(method = request.method.as_str(), path = %request.path, status = status.as_u16(), elapsed_ms, "request done");
        } else {
            info!(method = request.method.as_str(), path = %request.path, status = status.as_u16(), elapsed_ms, "request returned error status");
        }

        Ok(Reply {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            text,
        })
    }
}

/// What the command line pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueLocation {
    /// Server root taken from a full URL
    pub base_url: Option<String>,
    pub issue: IssueId,
    /// Set when the URL named a single file diff
    pub patch: Option<PatchRef>,
}

/// Parse an issue id (`1234`) or an issue/diff URL
/// (`https://host/1234/`, `https://host/1234/diff/1/2`)
pub fn parse_issue_ref(input: &str) -> Result<IssueLocation, ClientError> {
    let input = input.trim();
    if let Ok(issue) = input.parse::<IssueId>() {
        return Ok(IssueLocation {
            base_url: None,
            issue,
            patch: None,
        });
    }

    let url = Url::parse(input).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", input, e)))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    // The issue id is the first all-digit segment; everything before it is
    // the server root.
    let pos = segments
        .iter()
        .position(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| {
            ClientError::InvalidUrl(format!(
                "{}: expected https://host/<issue>/ or https://host/<issue>/diff/<patchset>/<patch>",
                input
            ))
        })?;
    let issue: IssueId = segments[pos]
        .parse()
        .map_err(|_| ClientError::InvalidUrl(format!("{}: issue id too large", input)))?;

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path(&format!("{}/", segments[..pos].join("/")));

    Ok(IssueLocation {
        base_url: Some(normalize_base_url(base.as_str())),
        issue,
        patch: PatchRef::from_diff_href(url.path(), ""),
    })
}


#[cfg(test)]
mod tests {
    use super::fake::FakeClient;
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(ApiRequest::issue(42).path, "api/42");
        assert_eq!(ApiRequest::patchset(42, 3).path, "42/patchset/3");
        assert_eq!(ApiRequest::user_popup("bob").path, "user_popup/bob");
        assert_eq!(ApiRequest::close(42, "tok").form.as_deref(), Some("xsrf_token=tok"));
        let star = ApiRequest::star(42, false, "t k");
        assert_eq!(star.path, "42/unstar");
        assert_eq!(star.form.as_deref(), Some("xsrf_token=t+k"));
        assert_eq!(ApiRequest::discard_draft_message(42).method, Method::Delete);
    }

    #[test]
    fn test_search_and_warnings_queries() {
        assert_eq!(
            ApiRequest::search("", 50).path,
            "search?format=json&closed=False&limit=50"
        );
        assert_eq!(
            ApiRequest::warnings(9, "/src/a b.rs", "1", "2").path,
            "warnings/9/src/a b.rs?a=1&b=2"
        );
    }

    #[test]
    fn test_skipped_lines_url() {
        let patch = PatchRef {
            issue: 7,
            patchset: 1,
            patch: 2,
            filename: "x".to_string(),
        };
        let req = ApiRequest::skipped_lines(&patch, 10, 40, 't', 80, Some(10));
        assert_eq!(req.path, "7/diff_skipped_lines/1/2/10/40/t/80?context=10");
        let req = ApiRequest::skipped_lines(&patch, 10, 40, 'a', 80, None);
        assert_eq!(req.path, "7/diff_skipped_lines/1/2/10/40/a/80");
        assert_eq!(ApiRequest::download(&patch).path, "download/issue7_1_2.diff");
    }

    #[test]
    fn test_inline_draft_is_untimed_form_post() {
        let req = ApiRequest::inline_draft("text=hi&side=b".to_string());
        assert_eq!(req.method, Method::Post);
        assert!(req.untimed);
        assert_eq!(req.form.as_deref(), Some("text=hi&side=b"));
    }

    #[test]
    fn test_save_draft_message_encodes_text() {
        let req = ApiRequest::save_draft_message(5, "LGTM & thanks");
        assert_eq!(req.form.as_deref(), Some("reviewmsg=LGTM+%26+thanks"));
    }

    #[test]
    fn test_reply_into_ok_and_json() {
        assert_eq!(Reply::ok("x").into_ok().unwrap(), "x");
        let err = Reply::with_status(404, "Not Found").into_ok().unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        let bad = Reply::ok("{not json").json::<IssueDetail>().unwrap_err();
        assert!(matches!(bad, ClientError::Decode(_)));
    }

    #[test]
    fn test_parse_issue_ref_plain_id() {
        let loc = parse_issue_ref(" 1234 ").unwrap();
        assert_eq!(loc.issue, 1234);
        assert_eq!(loc.base_url, None);
    }

    #[test]
    fn test_parse_issue_ref_urls() {
        let loc = parse_issue_ref("https://review.example.org/1234/").unwrap();
        assert_eq!(loc.issue, 1234);
        assert_eq!(loc.base_url.as_deref(), Some("https://review.example.org/"));
        assert!(loc.patch.is_none());

        let loc = parse_issue_ref("https://review.example.org/rv/99/diff/3/4001?context=5").unwrap();
        assert_eq!(loc.issue, 99);
        assert_eq!(loc.base_url.as_deref(), Some("https://review.example.org/rv/"));
        let patch = loc.patch.unwrap();
        assert_eq!((patch.patchset, patch.patch), (3, 4001));
    }

    #[test]
    fn test_parse_issue_ref_rejects_garbage() {
        assert!(matches!(
            parse_issue_ref("https://review.example.org/dashboard"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(parse_issue_ref("not a url").is_err());
    }

    #[tokio::test]
    async fn test_fake_client_typed_helpers() {
        let client = FakeClient::new();
        client.push(Ok(Reply::ok(
            r#"{"issue": 5, "subject": "Fix", "patchsets": [1, 3]}"#,
        )));
        let detail = client.issue(5).await.unwrap();
        assert_eq!(detail.patchsets, vec![1, 3]);
        assert_eq!(client.sent()[0].path, "api/5");
    }
}
