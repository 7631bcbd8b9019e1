use std::collections::HashMap;
use std::fmt;

use crate::types::{Side, Snapshot};

/// Identity of an inline comment form, used to stash its unsaved text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DraftKey {
    /// `new-<line>-<snapshot>`
    New { line: u32, snapshot: Snapshot },
    /// `edit-<cid>-<line>-<side>`
    Edit { cid: String, line: u32, side: Side },
    /// `reply-<cid>-<line>-<side>`
    Reply { cid: String, line: u32, side: Side },
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftKey::New { line, snapshot } => write!(f, "new-{}-{}", line, snapshot.as_str()),
            DraftKey::Edit { cid, line, side } => {
                write!(f, "edit-{}-{}-{}", cid, line, side.as_str())
            }
            DraftKey::Reply { cid, line, side } => {
                write!(f, "reply-{}-{}-{}", cid, line, side.as_str())
            }
        }
    }
}

/// Session-only scratch pad of unsaved inline comment text.
///
/// Nothing here is written to disk; the map is dropped with the diff view.
#[derive(Debug, Clone, Default)]
pub struct InlineDrafts {
    entries: HashMap<DraftKey, String>,
}

impl InlineDrafts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, key: DraftKey, text: impl Into<String>) {
        self.entries.insert(key, text.into());
    }

    pub fn clear(&mut self, key: &DraftKey) {
        self.entries.remove(key);
    }

    /// Stashed text for a form; empty text counts as nothing saved
    pub fn restore(&self, key: &DraftKey) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }

    /// Forget every draft tied to one comment line, as done when it is
    /// submitted.
    pub fn clear_for_submit(&mut self, cid: &str, line: u32, side: Side, snapshot: Snapshot) {
        self.clear(&DraftKey::New { line, snapshot });
        self.clear(&DraftKey::Edit {
            cid: cid.to_string(),
            line,
            side,
        });
        self.clear(&DraftKey::Reply {
            cid: cid.to_string(),
            line,
            side,
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = DraftKey::New {
            line: 12,
            snapshot: Snapshot::New,
        };
        assert_eq!(key.to_string(), "new-12-new");
        let key = DraftKey::Edit {
            cid: "z1f".to_string(),
            line: 4,
            side: Side::A,
        };
        assert_eq!(key.to_string(), "edit-z1f-4-a");
        let key = DraftKey::Reply {
            cid: "z1f".to_string(),
            line: 4,
            side: Side::B,
        };
        assert_eq!(key.to_string(), "reply-z1f-4-b");
    }

    #[test]
    fn test_save_restore_and_empty_text() {
        let mut drafts = InlineDrafts::new();
        let key = DraftKey::New {
            line: 3,
            snapshot: Snapshot::Old,
        };
        assert_eq!(drafts.restore(&key), None);
        drafts.save(key.clone(), "half a thought");
        assert_eq!(drafts.restore(&key), Some("half a thought"));
        drafts.save(key.clone(), "");
        assert_eq!(drafts.restore(&key), None);
    }

    #[test]
    fn test_clear_for_submit_drops_all_three_identities() {
        let mut drafts = InlineDrafts::new();
        drafts.save(
            DraftKey::New {
                line: 7,
                snapshot: Snapshot::New,
            },
            "a",
        );
        drafts.save(
            DraftKey::Edit {
                cid: "c1".to_string(),
                line: 7,
                side: Side::B,
            },
            "b",
        );
        drafts.save(
            DraftKey::Reply {
                cid: "c1".to_string(),
                line: 7,
                side: Side::B,
            },
            "c",
        );
        let other = DraftKey::Reply {
            cid: "c2".to_string(),
            line: 7,
            side: Side::B,
        };
        drafts.save(other.clone(), "d");

        drafts.clear_for_submit("c1", 7, Side::B, Snapshot::New);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts.restore(&other), Some("d"));
    }
}
