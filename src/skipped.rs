//! Expanding the unchanged lines hidden behind skip rows.

use tracing::{debug, warn};

use crate::client::{ApiRequest, Reply};
use crate::error::ClientError;
use crate::page::DiffPage;
use crate::table::{Cell, Row, RowId, RowKind};

/// Which part of a skipped range to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expand {
    /// The first `context` lines (`t`)
    Before,
    /// The last `context` lines (`b`)
    After,
    /// Everything (`a`)
    All,
}

impl Expand {
    pub fn code(self) -> char {
        match self {
            Expand::Before => 't',
            Expand::After => 'b',
            Expand::All => 'a',
        }
    }
}

/// One of the links offered on a skip row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipLink {
    pub label: String,
    pub expand: Expand,
}

/// Links for a skip row with `count` hidden lines. Partial expansion is
/// offered only when more than three times the context remains.
pub fn skip_links(count: u32, context: u32) -> Vec<SkipLink> {
    let all = SkipLink {
        label: "Expand all".to_string(),
        expand: Expand::All,
    };
    if count <= 3 * context {
        return vec![all];
    }
    vec![
        SkipLink {
            label: format!("Expand {} before", context),
            expand: Expand::Before,
        },
        all,
        SkipLink {
            label: format!("Expand {} after", context),
            expand: Expand::After,
        },
    ]
}

pub fn error_text(status: u16) -> String {
    format!("An error occurred [{}]. Please report.", status)
}

type Attrs = Vec<(String, String)>;
type CellData = (Attrs, Option<String>);
type RowData = (Attrs, Vec<CellData>);

/// Decode `[[rowAttrs, [[cellAttrs, text], ...]], ...]` into table rows
pub fn parse_rows(json: &str) -> Result<Vec<Row>, ClientError> {
    let data: Vec<RowData> =
        serde_json::from_str(json).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(data
        .into_iter()
        .map(|(attrs, cells)| {
            let cells = cells
                .into_iter()
                .map(|(cell_attrs, text)| Cell::from_attrs(&cell_attrs, text.as_deref()))
                .collect();
            Row::from_attrs(&attrs, cells)
        })
        .collect())
}

impl DiffPage {
    fn skip_row(&self, skip_id: u32) -> Option<RowId> {
        self.table.find_by_html_id(&format!("skip-{}", skip_id))
    }

    /// The skip row closest to the indicator (or the top of the window)
    pub fn nearest_skip(&self) -> Option<u32> {
        let anchor = self
            .hooks
            .indicator()
            .and_then(|id| self.table.row_top(id))
            .unwrap_or(self.viewport.scroll_top);
        let tops = self.table.layout();
        self.table
            .rows()
            .iter()
            .zip(tops)
            .filter_map(|(row, top)| row.skip_info().map(|info| (info.skip_id, top)))
            .min_by_key(|(_, top)| top.abs_diff(anchor))
            .map(|(skip_id, _)| skip_id)
    }

    /// Mark a skip row as loading and build its request. `None` if the row
    /// is gone or a fetch is already running.
    pub fn expand_skipped(&mut self, skip_id: u32, expand: Expand) -> Option<ApiRequest> {
        let row_id = self.skip_row(skip_id)?;
        let info = self.table.get_mut(row_id)?.skip_info_mut()?;
        if info.loading {
            return None;
        }
        info.loading = true;
        info.error = None;
        debug!(skip_id, before = info.before, after = info.after, where_ = %expand.code(), "expanding skipped lines");
        Some(ApiRequest::skipped_lines(
            &self.patch,
            info.before,
            info.after,
            expand.code(),
            self.column_width,
            Some(self.context),
        ))
    }

    /// Splice fetched rows around the skip row and shrink or drop it
    pub fn complete_skipped(
        &mut self,
        skip_id: u32,
        expand: Expand,
        result: Result<Reply, ClientError>,
    ) {
        let Some(skip) = self.skip_row(skip_id) else {
            return;
        };

        let rows = match result {
            Ok(reply) if reply.is_ok() => match parse_rows(&reply.text) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(skip_id, error = %e, "bad skipped lines response");
                    self.fail_skip(skip, reply.status);
                    return;
                }
            },
            Ok(reply) => {
                warn!(skip_id, status = reply.status, "skipped lines request failed");
                self.fail_skip(skip, reply.status);
                return;
            }
            Err(e) => {
                warn!(skip_id, error = %e, "skipped lines request failed");
                self.fail_skip(skip, 0);
                return;
            }
        };

        let fetched = rows.len() as u32;
        let mut last = skip;
        for row in rows {
            let inserted = match expand {
                Expand::Before | Expand::All => self.table.insert_before(skip, row),
                Expand::After => self.table.insert_after(last, row),
            };
            if let Some(id) = inserted {
                last = id;
            }
        }

        let lines = fetched / 2;
        let remove = match self.table.get_mut(skip).and_then(Row::skip_info_mut) {
            Some(info) => {
                let remaining = info.count as i64 - lines as i64;
                if remaining > 0 {
                    info.count = remaining as u32;
                    match expand {
                        Expand::After => info.after = info.after.saturating_sub(lines),
                        _ => info.before += lines,
                    }
                    info.loading = false;
                    false
                } else {
                    true
                }
            }
            None => false,
        };
        if remove {
            self.table.remove(skip);
        }

        self.structure_changed();
        self.hooks.reselect(&self.table, &mut self.viewport);
    }

    fn fail_skip(&mut self, skip: RowId, status: u16) {
        if let Some(row) = self.table.get_mut(skip) {
            if let RowKind::Skip(info) = &mut row.kind {
                info.loading = false;
                info.error = Some(error_text(status));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScrollDirection;
    use crate::hooks::HookPosition;
    use crate::page::tests::page;

    /// Server rows for pairs `from..to`: a code row and an empty comment
    /// row per line
    fn server_rows(from: u32, to: u32) -> String {
        let rows: Vec<String> = (from..to)
            .map(|pair| {
                let line = pair + 1;
                format!(
                    r#"[[["id","pair-{pair}"]],[[[["id","oldcode{line}"],["class","oldequal"]],"line {line}"],[[["id","newcode{line}"],["class","newequal"]],"line {line}"]]],
                       [[["class","inline-comments"]],[[[["id","old-line-{line}"]],null],[[["id","new-line-{line}"]],null]]]"#
                )
            })
            .collect();
        format!("[{}]", rows.join(","))
    }

    fn skip_info(page: &DiffPage) -> Option<crate::table::SkipInfo> {
        page.table.rows().iter().find_map(|r| r.skip_info().cloned())
    }

    #[test]
    fn test_links_depend_on_remaining_count() {
        let labels = |count| -> Vec<String> {
            skip_links(count, 10).into_iter().map(|l| l.label).collect()
        };
        assert_eq!(labels(30), vec!["Expand all"]);
        assert_eq!(
            labels(31),
            vec!["Expand 10 before", "Expand all", "Expand 10 after"]
        );
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(&server_rows(3, 5)).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].html_id.as_deref(), Some("pair-3"));
        assert_eq!(rows[0].cells[1].code_line(), Some((crate::types::Side::B, 4)));
        assert_eq!(rows[0].cells[0].text, "line 4");
        assert_eq!(rows[1].kind, RowKind::Comments);
        assert!(parse_rows("{").is_err());
    }

    #[test]
    fn test_expand_before_inserts_above_and_shrinks() {
        let mut page = page(40);
        let info = skip_info(&page).unwrap();
        assert_eq!((info.before, info.after, info.count), (0, 8, 9));

        let request = page.expand_skipped(0, Expand::Before).unwrap();
        assert_eq!(request.path, "1/diff_skipped_lines/2/3/0/8/t/80?context=10");
        // Already loading
        assert!(page.expand_skipped(0, Expand::Before).is_none());

        page.complete_skipped(0, Expand::Before, Ok(Reply::ok(server_rows(0, 3))));
        let info = skip_info(&page).unwrap();
        assert_eq!((info.before, info.after, info.count), (3, 8, 6));
        assert!(!info.loading);
        let ids: Vec<_> = page.table.rows().iter().take(7).map(|r| r.html_id.clone()).collect();
        assert_eq!(ids[0].as_deref(), Some("pair-0"));
        assert_eq!(ids[4].as_deref(), Some("pair-2"));
        assert_eq!(ids[6].as_deref(), Some("skip-0"));
    }

    #[test]
    fn test_expand_after_inserts_below_in_order() {
        let mut page = page(40);
        page.expand_skipped(0, Expand::After).unwrap();
        page.complete_skipped(0, Expand::After, Ok(Reply::ok(server_rows(6, 9))));
        let info = skip_info(&page).unwrap();
        assert_eq!((info.before, info.after, info.count), (0, 5, 6));
        let rows = page.table.rows();
        assert_eq!(rows[0].html_id.as_deref(), Some("skip-0"));
        assert_eq!(rows[1].html_id.as_deref(), Some("pair-6"));
        assert_eq!(rows[5].html_id.as_deref(), Some("pair-8"));
        assert_eq!(rows[7].html_id.as_deref(), Some("pair-9"));
    }

    #[test]
    fn test_expand_all_removes_skip_row() {
        let mut page = page(40);
        page.expand_skipped(0, Expand::All).unwrap();
        page.complete_skipped(0, Expand::All, Ok(Reply::ok(server_rows(0, 9))));
        assert!(skip_info(&page).is_none());
        assert_eq!(page.table.rows()[0].html_id.as_deref(), Some("pair-0"));
        assert!(page.nearest_skip().is_none());
    }

    #[test]
    fn test_error_status_shows_on_skip_row() {
        let mut page = page(40);
        page.expand_skipped(0, Expand::All).unwrap();
        page.complete_skipped(0, Expand::All, Ok(Reply::with_status(500, "Internal Server Error")));
        let info = skip_info(&page).unwrap();
        assert_eq!(info.error.as_deref(), Some("An error occurred [500]. Please report."));
        assert!(!info.loading);
        assert_eq!(info.count, 9);
    }

    #[test]
    fn test_selection_survives_splice() {
        let mut page = page(40);
        page.hooks.goto_position(
            HookPosition::Row(0),
            &page.table,
            &mut page.viewport,
            ScrollDirection::None,
        );
        let selected = page.hooks.current_row();
        page.expand_skipped(0, Expand::Before).unwrap();
        page.complete_skipped(0, Expand::Before, Ok(Reply::ok(server_rows(0, 3))));
        assert_eq!(page.hooks.current_row(), selected);
    }

    #[test]
    fn test_nearest_skip() {
        let page = page(40);
        assert_eq!(page.nearest_skip(), Some(0));
    }
}
