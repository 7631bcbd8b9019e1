//! The changelist (issue) page: patchset sections and their file lists.

use std::sync::OnceLock;

use regex::Regex;

use crate::fragment;
use crate::types::{IssueDetail, IssueId, PatchRef};

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tr\b.*?(?:</tr>|$)").expect("static regex"))
}

fn comments_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s+(comments?|drafts?)\b").expect("static regex"))
}

/// A file of a patchset as listed in its section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub patch: PatchRef,
    pub comments: u32,
    pub drafts: u32,
}

/// Files in a patchset section fragment, one per table row with a diff link
pub fn parse_patchset_files(html: &str) -> Vec<FileEntry> {
    let mut files: Vec<FileEntry> = Vec::new();
    for row in row_re().find_iter(html) {
        let row = row.as_str();
        let Some(patch) = fragment::links(row)
            .into_iter()
            .find_map(|l| PatchRef::from_diff_href(&l.href, &l.text))
        else {
            continue;
        };
        if files.iter().any(|f| f.patch == patch) {
            continue;
        }
        let text = fragment::to_text_lines(row).join(" ");
        let mut entry = FileEntry {
            patch,
            comments: 0,
            drafts: 0,
        };
        for caps in comments_re().captures_iter(&text) {
            let n: u32 = caps[1].parse().unwrap_or(0);
            if caps[2].to_ascii_lowercase().starts_with("draft") {
                entry.drafts += n;
            } else {
                entry.comments += n;
            }
        }
        files.push(entry);
    }
    files
}

/// State of one patchset section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Collapsed,
    Loading,
    Open(Vec<FileEntry>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PatchsetSection {
    pub patchset: u64,
    pub state: Section,
    /// Files survive collapsing so reopening needs no fetch
    loaded: Option<Vec<FileEntry>>,
}

/// A navigable line of the changelist page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Patchset(usize),
    File { section: usize, file: usize },
}

pub struct Changelist {
    pub issue: IssueDetail,
    pub sections: Vec<PatchsetSection>,
}

impl Changelist {
    pub fn new(issue: IssueDetail) -> Self {
        let sections = issue
            .patchsets
            .iter()
            .map(|&patchset| PatchsetSection {
                patchset,
                state: Section::Collapsed,
                loaded: None,
            })
            .collect();
        Self { issue, sections }
    }

    pub fn id(&self) -> IssueId {
        self.issue.issue
    }

    /// Flattened lines in display order
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries = Vec::new();
        for (i, section) in self.sections.iter().enumerate() {
            entries.push(Entry::Patchset(i));
            if let Section::Open(files) = &section.state {
                entries.extend((0..files.len()).map(|file| Entry::File { section: i, file }));
            }
        }
        entries
    }

    pub fn file(&self, section: usize, file: usize) -> Option<&FileEntry> {
        match &self.sections.get(section)?.state {
            Section::Open(files) => files.get(file),
            _ => None,
        }
    }

    /// Open or close a section. Returns the patchset to fetch when its
    /// files are not known yet.
    pub fn toggle(&mut self, section: usize) -> Option<u64> {
        let s = self.sections.get_mut(section)?;
        match &s.state {
            Section::Open(_) => {
                s.state = Section::Collapsed;
                None
            }
            Section::Loading => None,
            Section::Collapsed | Section::Failed(_) => match &s.loaded {
                Some(files) => {
                    s.state = Section::Open(files.clone());
                    None
                }
                None => {
                    s.state = Section::Loading;
                    Some(s.patchset)
                }
            },
        }
    }

    /// Start fetching a section's files without the user opening it.
    /// Returns false when they are known or already on their way.
    pub fn ensure_loaded(&mut self, patchset: u64) -> bool {
        let Some(s) = self.sections.iter_mut().find(|s| s.patchset == patchset) else {
            return false;
        };
        if s.loaded.is_some() || s.state == Section::Loading {
            return false;
        }
        s.state = Section::Loading;
        true
    }

    pub fn section_loaded(&mut self, patchset: u64, html: &str) {
        if let Some(s) = self.sections.iter_mut().find(|s| s.patchset == patchset) {
            let files = parse_patchset_files(html);
            s.loaded = Some(files.clone());
            s.state = Section::Open(files);
        }
    }

    pub fn section_failed(&mut self, patchset: u64, status: u16) {
        if let Some(s) = self.sections.iter_mut().find(|s| s.patchset == patchset) {
            s.state = Section::Failed(format!("Could not load the patchset ({}).", status));
        }
    }

    /// Files of the patchset `patch` belongs to
    fn siblings(&self, patch: &PatchRef) -> Option<&[FileEntry]> {
        let section = self.sections.iter().find(|s| s.patchset == patch.patchset)?;
        section.loaded.as_deref()
    }

    /// Name of a patch as listed in its section
    pub fn filename_of(&self, patch: &PatchRef) -> Option<&str> {
        self.siblings(patch)?
            .iter()
            .find(|f| f.patch.patch == patch.patch)
            .map(|f| f.patch.filename.as_str())
    }

    /// The file after (or before) `patch` in its patchset, optionally
    /// skipping files without comments
    pub fn neighbour(&self, patch: &PatchRef, forward: bool, with_comments: bool) -> Option<PatchRef> {
        let files = self.siblings(patch)?;
        let pos = files.iter().position(|f| f.patch.patch == patch.patch)?;
        let wanted = |f: &&FileEntry| !with_comments || f.comments + f.drafts > 0;
        let found = if forward {
            files[pos + 1..].iter().find(wanted)
        } else {
            files[..pos].iter().rev().find(wanted)
        };
        found.map(|f| f.patch.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = r#"
<table>
<tr><th>File</th><th>Comments</th></tr>
<tr>
  <td><a href="/12/diff/3/101">src/lib.rs</a></td>
  <td><b>2</b> comments, 1 draft</td>
</tr>
<tr>
  <td><a href="/12/diff/3/102">src/main.rs</a></td>
  <td></td>
</tr>
<tr>
  <td><a href="/12/diff/3/103">README</a></td>
  <td>1 comment</td>
</tr>
</table>"#;

    fn detail() -> IssueDetail {
        serde_json::from_str(r#"{"issue": 12, "subject": "Fix", "patchsets": [1, 3]}"#).unwrap()
    }

    #[test]
    fn test_parse_patchset_files() {
        let files = parse_patchset_files(SECTION);
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].patch.filename, "src/lib.rs");
        assert_eq!((files[0].comments, files[0].drafts), (2, 1));
        assert_eq!(files[1].comments + files[1].drafts, 0);
        assert_eq!(files[2].patch.patch, 103);
    }

    #[test]
    fn test_toggle_fetches_once() {
        let mut cl = Changelist::new(detail());
        assert_eq!(cl.entries(), vec![Entry::Patchset(0), Entry::Patchset(1)]);
        assert_eq!(cl.toggle(1), Some(3));
        assert_eq!(cl.toggle(1), None);
        cl.section_loaded(3, SECTION);
        assert_eq!(cl.entries().len(), 5);
        assert_eq!(cl.toggle(1), None);
        assert_eq!(cl.entries().len(), 2);
        // Reopened from what was loaded
        assert_eq!(cl.toggle(1), None);
        assert_eq!(cl.entries().len(), 5);
        assert_eq!(cl.file(1, 1).unwrap().patch.filename, "src/main.rs");
    }

    #[test]
    fn test_failed_section_can_retry() {
        let mut cl = Changelist::new(detail());
        cl.toggle(0);
        cl.section_failed(1, 404);
        assert_eq!(
            cl.sections[0].state,
            Section::Failed("Could not load the patchset (404).".to_string())
        );
        assert_eq!(cl.toggle(0), Some(1));
    }

    #[test]
    fn test_ensure_loaded_once() {
        let mut cl = Changelist::new(detail());
        assert!(cl.ensure_loaded(3));
        assert!(!cl.ensure_loaded(3));
        assert!(!cl.ensure_loaded(99));
        cl.section_loaded(3, SECTION);
        assert!(!cl.ensure_loaded(3));
        let patch = PatchRef::from_diff_href("/12/diff/3/102", "").unwrap();
        assert_eq!(cl.filename_of(&patch), Some("src/main.rs"));
    }

    #[test]
    fn test_neighbours() {
        let mut cl = Changelist::new(detail());
        cl.toggle(1);
        cl.section_loaded(3, SECTION);
        let first = cl.file(1, 0).unwrap().patch.clone();
        let next = cl.neighbour(&first, true, false).unwrap();
        assert_eq!(next.patch, 102);
        let next_commented = cl.neighbour(&first, true, true).unwrap();
        assert_eq!(next_commented.patch, 103);
        assert!(cl.neighbour(&first, false, false).is_none());
    }
}
