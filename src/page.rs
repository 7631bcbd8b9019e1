//! State of one open file diff: the table, its viewport and everything that
//! moves across it.

use crate::config::DiffSettings;
use crate::drafts::InlineDrafts;
use crate::fragment;
use crate::geometry::{ScrollDirection, Viewport};
use crate::hooks::HookNavigator;
use crate::inline::InlineForms;
use crate::table::DiffTable;
use crate::types::PatchRef;

/// Lines above the table that are not warnings (the file title)
const TITLE_HEIGHT: u32 = 1;

pub struct DiffPage {
    pub patch: PatchRef,
    pub table: DiffTable,
    pub viewport: Viewport,
    pub hooks: HookNavigator,
    pub drafts: InlineDrafts,
    pub forms: InlineForms,
    /// Static analysis output shown between the title and the table
    pub warnings: Vec<String>,
    pub intraline: bool,
    pub context: u32,
    pub column_width: u32,
}

impl DiffPage {
    pub fn new(patch: PatchRef, mut table: DiffTable, height: u32, settings: &DiffSettings) -> Self {
        table.header_height = TITLE_HEIGHT;
        let viewport = Viewport::new(height, table.height());
        let mut page = Self {
            patch,
            table,
            viewport,
            hooks: HookNavigator::new(),
            drafts: InlineDrafts::new(),
            forms: InlineForms::new(),
            warnings: Vec::new(),
            intraline: true,
            context: settings.context,
            column_width: settings.column_width,
        };
        page.structure_changed();
        page
    }

    /// Refresh row heights taken by open forms and rebuild the hook list
    pub fn structure_changed(&mut self) {
        self.forms.sync_heights(&mut self.table);
        self.viewport.resize(self.viewport.height, self.table.height());
        self.hooks.recompute(&self.table, &mut self.viewport);
    }

    pub fn resize(&mut self, height: u32) {
        self.viewport.resize(height, self.table.height());
    }

    /// Replace the analysis warnings with a server fragment
    pub fn set_warnings(&mut self, html: &str) {
        self.warnings = fragment::to_text_lines(html);
        self.table.header_height = TITLE_HEIGHT + self.warnings.len() as u32;
        self.structure_changed();
    }

    /// Show or hide every inline comment thread
    pub fn toggle_comments(&mut self) {
        let hidden = !self.table.comments_hidden();
        self.table.set_comments_hidden(hidden);
        self.structure_changed();
    }

    pub fn set_comments_collapsed(&mut self, collapsed: bool) {
        self.table.set_comments_collapsed(collapsed);
        self.structure_changed();
        self.hooks
            .goto_hook(&self.table, &mut self.viewport, ScrollDirection::None);
    }

    pub fn toggle_intraline(&mut self) {
        self.intraline = !self.intraline;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::{build_table, parse_patch};

    const PATCH: &str = "\
@@ -10,3 +10,3 @@
 a
-b
+B
 c
";

    pub fn page(height: u32) -> DiffPage {
        let patch = PatchRef {
            issue: 1,
            patchset: 2,
            patch: 3,
            filename: "lib.rs".to_string(),
        };
        DiffPage::new(
            patch,
            build_table(&parse_patch(PATCH)),
            height,
            &DiffSettings::default(),
        )
    }

    #[test]
    fn test_new_page_has_title_and_hooks() {
        let page = page(20);
        assert_eq!(page.table.table_top(), 1);
        assert_eq!(page.hooks.hooks().len(), 1);
        assert_eq!(page.viewport.doc_height, page.table.height());
    }

    #[test]
    fn test_warnings_push_table_down() {
        let mut page = page(20);
        page.set_warnings("<div>lint: unused</div><div>lint: shadowed</div>");
        assert_eq!(page.warnings.len(), 2);
        assert_eq!(page.table.table_top(), 3);
    }

    #[test]
    fn test_toggle_intraline() {
        let mut page = page(20);
        assert!(page.intraline);
        page.toggle_intraline();
        assert!(!page.intraline);
    }
}
