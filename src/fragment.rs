//! Server HTML fragments reduced to what a terminal can show: text lines,
//! links, and comment threads.

use std::sync::OnceLock;

use regex::Regex;

fn block_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(div|p|tr|li|h[1-6]|pre|table)>").expect("static regex")
    })
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").expect("static regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"))
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("static regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("static regex")
    })
}

fn comment_border_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<div\b[^>]*name\s*=\s*["']comment-border["'][^>]*>"#).expect("static regex")
    })
}

/// Decode the handful of entities the server templates emit
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse `name="value"` pairs out of the inside of a tag
pub fn attributes(tag_body: &str) -> Vec<(String, String)> {
    attr_re()
        .captures_iter(tag_body)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_ascii_lowercase(), decode_entities(value))
        })
        .collect()
}

/// Render an HTML fragment as plain text lines.
///
/// Block-level closing tags and `<br>` become line breaks; runs of blank
/// lines collapse to one; leading and trailing blank lines are dropped.
pub fn to_text_lines(html: &str) -> Vec<String> {
    let without_scripts = script_re().replace_all(html, "");
    let with_breaks = block_break_re().replace_all(&without_scripts, "\n");
    let stripped = tag_re().replace_all(&with_breaks, "");
    let text = decode_entities(&stripped);

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
            continue;
        }
        lines.push(line.to_string());
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// An anchor found in a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: Option<String>,
    pub href: String,
    pub text: String,
    /// Rendered with `display: none`
    pub hidden: bool,
}

/// All anchors with an `href`, in document order
pub fn links(html: &str) -> Vec<Link> {
    anchor_re()
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = attributes(&caps[1]);
            let get = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            };
            let href = get("href")?;
            let hidden = get("style")
                .map(|s| s.replace(' ', "").to_ascii_lowercase().contains("display:none"))
                .unwrap_or(false);
            Some(Link {
                name: get("name"),
                href,
                text: to_text_lines(&caps[2]).join(" "),
                hidden,
            })
        })
        .collect()
}

/// One comment inside a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadComment {
    pub lines: Vec<String>,
    /// Visible "reply" link of this comment, if any
    pub reply_href: Option<String>,
}

/// The comment thread rendered by the server for one line of one side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentThread {
    pub comments: Vec<ThreadComment>,
}

impl CommentThread {
    pub fn from_html(html: &str) -> Self {
        let starts: Vec<usize> = comment_border_re().find_iter(html).map(|m| m.start()).collect();
        let mut comments = Vec::with_capacity(starts.len());

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            let chunk = &html[start..end];
            let reply_href = links(chunk)
                .into_iter()
                .rev()
                .find(|l| l.name.as_deref() == Some("comment-reply") && !l.hidden)
                .map(|l| l.href);
            comments.push(ThreadComment {
                lines: to_text_lines(chunk),
                reply_href,
            });
        }

        Self { comments }
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Reply link of the last comment in the thread
    pub fn last_reply_href(&self) -> Option<&str> {
        self.comments.last().and_then(|c| c.reply_href.as_deref())
    }

    pub fn line_count(&self) -> usize {
        self.comments.iter().map(|c| c.lines.len().max(1)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD: &str = r#"
<div name="comment-border" class="comment-border">
  <b>alice</b> 2011/01/02<br>
  Please rename this &amp; add a test.
  <a name="comment-reply" href="/12/diff/1/2#reply-1">Reply</a>
</div>
<div name="comment-border" class="comment-border">
  <b>bob</b><br>Done &lt;ok&gt;
  <a name="comment-reply" href="/12/diff/1/2#reply-2" style="display: none">Reply</a>
  <a name="comment-edit" href="/12/diff/1/2#edit-2">Edit</a>
</div>"#;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(decode_entities("&#65;&#x42;&nbsp;"), "AB ");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_to_text_lines_breaks_and_collapses() {
        let html = "<div>one</div>\n\n\n<p>two<br/>three</p><script>x()</script>";
        assert_eq!(to_text_lines(html), vec!["one", "", "two", "three"]);
    }

    #[test]
    fn test_to_text_lines_blank_fragment() {
        assert!(to_text_lines(" ").is_empty());
        assert!(to_text_lines("").is_empty());
    }

    #[test]
    fn test_links_with_hidden_flag() {
        let found = links(THREAD);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].name.as_deref(), Some("comment-reply"));
        assert!(!found[0].hidden);
        assert!(found[1].hidden);
        assert_eq!(found[2].text, "Edit");
    }

    #[test]
    fn test_attributes_single_and_double_quotes() {
        let attrs = attributes(r#"id="pair-3" name='hook' class="a&amp;b""#);
        assert_eq!(
            attrs,
            vec![
                ("id".to_string(), "pair-3".to_string()),
                ("name".to_string(), "hook".to_string()),
                ("class".to_string(), "a&b".to_string()),
            ]
        );
    }

    #[test]
    fn test_comment_thread_split() {
        let thread = CommentThread::from_html(THREAD);
        assert_eq!(thread.comments.len(), 2);
        assert!(thread.comments[0].lines.iter().any(|l| l.contains("rename this & add")));
        assert_eq!(
            thread.comments[0].reply_href.as_deref(),
            Some("/12/diff/1/2#reply-1")
        );
        // The second comment's reply link is hidden
        assert_eq!(thread.comments[1].reply_href, None);
        assert_eq!(thread.last_reply_href(), None);
    }

    #[test]
    fn test_empty_thread() {
        let thread = CommentThread::from_html(" ");
        assert!(thread.is_empty());
        assert_eq!(thread.line_count(), 0);
    }
}
