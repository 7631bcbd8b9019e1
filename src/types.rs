use serde::{Deserialize, Deserializer};

/// Numeric id of an issue (changelist) on the review server
pub type IssueId = u64;

/// Which half of the side-by-side diff a line or comment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// Left column, the original file
    A,
    /// Right column, the revised file
    B,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::A => "a",
            Side::B => "b",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "a" => Some(Side::A),
            "b" => Some(Side::B),
            _ => None,
        }
    }

    /// The snapshot a comment on this side is stored against
    pub fn snapshot(&self) -> Snapshot {
        match self {
            Side::A => Snapshot::Old,
            Side::B => Snapshot::New,
        }
    }

    /// Prefix of the comment cell id for this side (`old-line-12`)
    pub fn cell_prefix(&self) -> &'static str {
        match self {
            Side::A => "old-line-",
            Side::B => "new-line-",
        }
    }
}

/// Old or new file snapshot of a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Snapshot {
    Old,
    New,
}

impl Snapshot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Snapshot::Old => "old",
            Snapshot::New => "new",
        }
    }
}

/// Type of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Add,
    Del,
}

/// A single line in a diff
#[derive(Debug, Clone)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    pub old_ln: Option<u32>,
    pub new_ln: Option<u32>,
}

/// A hunk in a diff (a contiguous block of changes)
#[derive(Debug, Clone)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub lines: Vec<DiffLine>,
}

/// A single patch (one file of a patchset)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRef {
    pub issue: IssueId,
    pub patchset: u64,
    pub patch: u64,
    pub filename: String,
}

impl PatchRef {
    /// Parse a diff link of the form `/<issue>/diff/<patchset>/<patch>`
    pub fn from_diff_href(href: &str, filename: &str) -> Option<Self> {
        let path = href.split(['?', '#']).next().unwrap_or(href);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let pos = segments.iter().position(|s| *s == "diff")?;
        if pos == 0 || segments.len() < pos + 3 {
            return None;
        }
        Some(Self {
            issue: segments[pos - 1].parse().ok()?,
            patchset: segments[pos + 1].parse().ok()?,
            patch: segments[pos + 2].parse().ok()?,
            filename: filename.trim().to_string(),
        })
    }
}

/// An issue as listed on the dashboard
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSummary {
    pub issue: IssueId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub reviewers: Vec<String>,
}

impl IssueSummary {
    /// Format the time since last modification (e.g., "2d", "3h", "5m")
    pub fn age(&self) -> String {
        let modified = chrono::NaiveDateTime::parse_from_str(&self.modified, "%Y-%m-%d %H:%M:%S%.f")
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let diff_secs = chrono::Utc::now().timestamp() - modified;

        if diff_secs < 3600 {
            format!("{}m", diff_secs / 60)
        } else if diff_secs < 86400 {
            format!("{}h", diff_secs / 3600)
        } else {
            format!("{}d", diff_secs / 86400)
        }
    }
}

/// Issue details from `/api/<issue>`
#[derive(Debug, Clone, Deserialize)]
pub struct IssueDetail {
    pub issue: IssueId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub patchsets: Vec<u64>,
}

/// Envelope of `/search?format=json`.
///
/// The server has shipped `results` both as a flat list and wrapped in a
/// one-element list, so both shapes are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    #[serde(default, deserialize_with = "flatten_results")]
    pub results: Vec<IssueSummary>,
}

fn flatten_results<'de, D>(deserializer: D) -> Result<Vec<IssueSummary>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        Flat(Vec<IssueSummary>),
        Nested(Vec<Vec<IssueSummary>>),
    }

    Ok(match Shape::deserialize(deserializer)? {
        Shape::Flat(v) => v,
        Shape::Nested(v) => v.into_iter().flatten().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_round_trip_and_snapshot() {
        assert_eq!(Side::parse("a"), Some(Side::A));
        assert_eq!(Side::parse("b"), Some(Side::B));
        assert_eq!(Side::parse("c"), None);
        assert_eq!(Side::A.snapshot(), Snapshot::Old);
        assert_eq!(Side::B.snapshot().as_str(), "new");
        assert_eq!(Side::B.cell_prefix(), "new-line-");
    }

    #[test]
    fn test_patch_ref_from_href() {
        let patch = PatchRef::from_diff_href("/1234/diff/5/6001", " src/lib.rs ").unwrap();
        assert_eq!(patch.issue, 1234);
        assert_eq!(patch.patchset, 5);
        assert_eq!(patch.patch, 6001);
        assert_eq!(patch.filename, "src/lib.rs");
    }

    #[test]
    fn test_patch_ref_with_query_and_prefix() {
        let patch =
            PatchRef::from_diff_href("https://review.example.org/77/diff/1/2?column_width=80", "a")
                .unwrap();
        assert_eq!((patch.issue, patch.patchset, patch.patch), (77, 1, 2));
    }

    #[test]
    fn test_patch_ref_rejects_other_links() {
        assert!(PatchRef::from_diff_href("/1234/patch/5/6", "x").is_none());
        assert!(PatchRef::from_diff_href("/diff/5/6", "x").is_none());
        assert!(PatchRef::from_diff_href("/12/diff/x/6", "x").is_none());
    }

    #[test]
    fn test_search_results_flat() {
        let json = r#"{"cursor": "abc", "results": [{"issue": 1, "subject": "Fix"}]}"#;
        let results: SearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].subject, "Fix");
    }

    #[test]
    fn test_search_results_nested() {
        let json = r#"{"cursor": null, "results": [[{"issue": 1}, {"issue": 2}]]}"#;
        let results: SearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[1].issue, 2);
    }

    #[test]
    fn test_age_of_unparseable_date_is_large() {
        let issue = IssueSummary {
            issue: 1,
            subject: String::new(),
            owner: String::new(),
            owner_email: String::new(),
            modified: "yesterday".to_string(),
            closed: false,
            reviewers: Vec::new(),
        };
        assert!(issue.age().ends_with('d'));
    }
}
