use std::sync::OnceLock;

use regex::Regex;

use crate::table::{Cell, DiffTable, Row, SkipInfo};
use crate::types::{DiffLine, Hunk, LineKind, Side};

fn hunk_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static regex")
    })
}

/// Parse the hunks of a single-file patch.
///
/// Anything before the first `@@` header (`Index:`, `diff --git`, `---`,
/// `+++` lines) is ignored.
pub fn parse_patch(patch: &str) -> Vec<Hunk> {
    let lines: Vec<&str> = patch.lines().collect();
    let mut hunks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("@@ ") {
            if let Some((hunk, consumed)) = parse_hunk(&lines[i..]) {
                hunks.push(hunk);
                i += consumed;
                continue;
            }
        }
        i += 1;
    }

    hunks
}

fn parse_hunk(lines: &[&str]) -> Option<(Hunk, usize)> {
    if lines.is_empty() || !lines[0].starts_with("@@ ") {
        return None;
    }

    let header = lines[0];

    // @@ -old_start,old_count +new_start,new_count @@ optional context
    let caps = hunk_re().captures(header)?;

    let old_start: u32 = caps.get(1)?.as_str().parse().ok()?;
    let old_count: u32 = caps.get(2).map_or(1, |m| m.as_str().parse().unwrap_or(1));
    let new_start: u32 = caps.get(3)?.as_str().parse().ok()?;

    let mut diff_lines = Vec::new();
    let mut i = 1;
    let mut old_ln = old_start;
    let mut new_ln = new_start;

    while i < lines.len() {
        let line = lines[i];

        if line.starts_with("@@ ") || line.starts_with("Index: ") || line.starts_with("diff ") {
            break;
        }

        let (kind, old, new) = if line.starts_with('+') {
            let ln = new_ln;
            new_ln += 1;
            (LineKind::Add, None, Some(ln))
        } else if line.starts_with('-') {
            let ln = old_ln;
            old_ln += 1;
            (LineKind::Del, Some(ln), None)
        } else if line.starts_with(' ') || line.is_empty() {
            let o = old_ln;
            let n = new_ln;
            old_ln += 1;
            new_ln += 1;
            (LineKind::Context, Some(o), Some(n))
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
            i += 1;
            continue;
        } else {
            break;
        };

        let content = if line.is_empty() {
            String::new()
        } else {
            line[1..].to_string()
        };

        diff_lines.push(DiffLine {
            kind,
            content,
            old_ln: old,
            new_ln: new,
        });

        i += 1;
    }

    Some((
        Hunk {
            old_start,
            old_count,
            lines: diff_lines,
        },
        i,
    ))
}

/// Lay hunks out as a side-by-side table.
///
/// Every row is numbered `pair-N` in file order, counting the rows hidden
/// behind skip rows, so the numbers line up with what the server returns
/// when the skipped lines are fetched. The first row of each run of changes
/// is a hook.
pub fn build_table(hunks: &[Hunk]) -> DiffTable {
    let mut table = DiffTable::new();
    let mut pair: u32 = 0;
    let mut skip_id: u32 = 0;
    let mut next_old: u32 = 1;

    for hunk in hunks {
        // A pure insertion reports the old line it follows (0 for a new file)
        let hunk_first_old = if hunk.old_count == 0 {
            hunk.old_start + 1
        } else {
            hunk.old_start.max(1)
        };
        if hunk_first_old > next_old {
            let count = hunk_first_old - next_old;
            table.push(Row::skip(SkipInfo {
                skip_id,
                before: pair,
                after: pair + count - 1,
                count,
                loading: false,
                error: None,
            }));
            skip_id += 1;
            pair += count;
        }

        let mut i = 0;
        while i < hunk.lines.len() {
            let line = &hunk.lines[i];
            if line.kind == LineKind::Context {
                table.push(Row::code(
                    pair,
                    Cell::code(Side::A, line.old_ln, "oldequal", line.content.clone()),
                    Cell::code(Side::B, line.new_ln, "newequal", line.content.clone()),
                ));
                pair += 1;
                i += 1;
                continue;
            }

            let dels: Vec<&DiffLine> = hunk.lines[i..]
                .iter()
                .take_while(|l| l.kind == LineKind::Del)
                .collect();
            let adds: Vec<&DiffLine> = hunk.lines[i + dels.len()..]
                .iter()
                .take_while(|l| l.kind == LineKind::Add)
                .collect();
            let replace = !dels.is_empty() && !adds.is_empty();

            for k in 0..dels.len().max(adds.len()) {
                let old = match dels.get(k) {
                    Some(l) => {
                        let class = if replace { "oldreplace" } else { "olddelete" };
                        Cell::code(Side::A, l.old_ln, class, l.content.clone())
                    }
                    None => Cell::code(Side::A, None, "oldblank", ""),
                };
                let new = match adds.get(k) {
                    Some(l) => {
                        let class = if replace { "newreplace" } else { "newinsert" };
                        Cell::code(Side::B, l.new_ln, class, l.content.clone())
                    }
                    None => Cell::code(Side::B, None, "newblank", ""),
                };
                let mut row = Row::code(pair, old, new);
                row.hook = k == 0;
                table.push(row);
                pair += 1;
            }
            i += dels.len() + adds.len();
        }

        next_old = hunk_first_old + hunk.old_count;
    }

    table
}
