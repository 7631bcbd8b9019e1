//! Drawing every screen straight into the frame buffer.

use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::helpers::{centered_rect, fill_area, fit_spans, truncate_or_pad, wrap_text};
use super::{App, LoadingState, CHROME_HEIGHT};
use crate::changelist::{Entry, Section};
use crate::draft_message::DialogState;
use crate::geometry::Viewport;
use crate::inline::{FormKind, InlineForm};
use crate::keys::Screen;
use crate::page::DiffPage;
use crate::skipped::{skip_links, Expand};
use crate::table::{Cell, CellTone, Row, RowKind};
use crate::types::Side;

const HEADER_BG: Color = Color::Rgb(30, 30, 40);
const POPUP_BG: Color = Color::Rgb(30, 30, 40);
const SELECTED_BG: Color = Color::Rgb(50, 50, 70);

/// `{:>4} ` line numbers in front of each code cell
const GUTTER_WIDTH: usize = 5;

/// Column holding the hook indicator on the diff screen
const MARKER_WIDTH: u16 = 1;

/// Char ranges of `old` and `new` left over once their common prefix and
/// suffix are removed
fn changed_ranges(old: &str, new: &str) -> ((usize, usize), (usize, usize)) {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();
    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    (
        (prefix, old.len() - suffix),
        (prefix, new.len() - suffix),
    )
}

/// Screen line of a document line, if it is scrolled into `area`
fn screen_y(viewport: &Viewport, area: Rect, doc_y: u32) -> Option<u16> {
    let offset = doc_y.checked_sub(viewport.scroll_top)?;
    (offset < area.height as u32).then(|| area.y + offset as u16)
}

fn expand_key(expand: Expand) -> &'static str {
    match expand {
        Expand::Before => "T",
        Expand::After => "B",
        Expand::All => "x",
    }
}

impl App {
    pub(super) fn render(&self, frame: &mut ratatui::Frame) {
        match &self.loading {
            LoadingState::Loading(msg) => {
                self.render_loading(frame, msg);
                return;
            }
            LoadingState::Success(msg) => {
                self.render_alert(frame, " Success ", msg, Color::Green);
                return;
            }
            LoadingState::Error(msg) => {
                self.render_alert(frame, " Error ", msg, Color::Red);
                return;
            }
            LoadingState::Idle => {}
        }

        let area = frame.area();
        let body = Rect {
            x: area.x,
            y: area.y + 1,
            width: area.width,
            height: area.height.saturating_sub(CHROME_HEIGHT),
        };
        match self.screen {
            Screen::Dashboard => self.render_dashboard(frame.buffer_mut(), area, body),
            Screen::Changelist => self.render_changelist(frame.buffer_mut(), area, body),
            Screen::Diff => self.render_diff_screen(frame.buffer_mut(), area, body),
        }

        if self.draft.as_ref().is_some_and(|d| d.is_visible()) {
            self.render_draft_dialog(frame);
        }
        if let Some(popup) = &self.popup {
            self.render_popup(frame, &popup.title, &popup.lines);
        }
        if self.help_visible {
            self.render_help(frame);
        }
    }

    fn render_loading(&self, frame: &mut ratatui::Frame, message: &str) {
        let area = frame.area();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let text = Paragraph::new(message)
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Yellow));

        let popup_area = Rect {
            x: area.width / 4,
            y: (area.height / 2).saturating_sub(1),
            width: area.width / 2,
            height: 3.min(area.height),
        };

        frame.render_widget(text, popup_area);
    }

    fn render_alert(&self, frame: &mut ratatui::Frame, title: &str, message: &str, color: Color) {
        let area = frame.area();
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));

        let text = Paragraph::new(format!("{}\n\nPress any key to continue", message))
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color));

        let popup_area = Rect {
            x: area.width / 6,
            y: (area.height / 2).saturating_sub(2),
            width: area.width * 2 / 3,
            height: 5.min(area.height),
        };

        frame.render_widget(text, popup_area);
    }

    /// Title bar on the first line, key hints on the last
    fn render_chrome(&self, buf: &mut Buffer, area: Rect, title: &str, hints: &str) {
        if area.height == 0 {
            return;
        }
        let bar = Style::default().bg(HEADER_BG);
        fill_area(buf, Rect { height: 1, ..area }, HEADER_BG);
        let title_style = bar.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        buf.set_string(
            area.x,
            area.y,
            truncate_or_pad(title, area.width as usize),
            title_style,
        );

        if area.height > 1 {
            let y = area.y + area.height - 1;
            let hints = truncate_or_pad(hints, area.width as usize);
            buf.set_string(area.x, y, hints, Style::default().fg(Color::DarkGray));
        }
    }

    fn render_dashboard(&self, buf: &mut Buffer, area: Rect, body: Rect) {
        let title = match self.dashboard.len() {
            0 => " veld  no open issues".to_string(),
            n => format!(" veld  {} open issues", n),
        };
        self.render_chrome(
            buf,
            area,
            &title,
            " j/k:nav  o:open  *:star  #:close  a:author  ?:help  q:quit ",
        );

        let width = body.width as usize;
        let selected = self.dashboard_cursor.selected();
        for (i, row) in self.dashboard.iter().enumerate() {
            let Some(y) = screen_y(&self.dashboard_viewport, body, i as u32) else {
                continue;
            };
            let bg = if selected == Some(i) {
                SELECTED_BG
            } else {
                Color::Reset
            };
            let base = Style::default().bg(bg);
            let text_style = if row.is_closed() {
                base.fg(Color::DarkGray)
            } else {
                base.fg(Color::White)
            };

            let owner: String = row.issue.owner.chars().take(16).collect();
            let mut spans = vec![
                Span::styled(
                    if row.starred { " ★ " } else { "   " },
                    base.fg(Color::Yellow),
                ),
                Span::styled(format!("{:>7} ", row.issue.issue), base.fg(Color::Cyan)),
                Span::styled(format!("{:>4} ", row.issue.age()), base.fg(Color::DarkGray)),
                Span::styled(format!("{:<16} ", owner), base.fg(Color::Magenta)),
                Span::styled(row.title(), text_style),
            ];
            if !row.issue.reviewers.is_empty() {
                spans.push(Span::styled(
                    format!("  r={}", row.issue.reviewers.join(",")),
                    base.fg(Color::DarkGray),
                ));
            }
            buf.set_line(body.x, y, &Line::from(fit_spans(spans, width, base)), body.width);
        }
    }

    fn render_changelist(&self, buf: &mut Buffer, area: Rect, body: Rect) {
        let Some(cl) = &self.changelist else {
            self.render_chrome(buf, area, " veld", " u:dashboard  q:quit ");
            return;
        };
        let title = format!(
            " Issue {}: {}  ({}){}",
            cl.id(),
            cl.issue.subject,
            cl.issue.owner,
            if cl.issue.closed { "  [closed]" } else { "" }
        );
        self.render_chrome(
            buf,
            area,
            &title,
            " j/k:nav  o:open  m:publish  u:dashboard  ?:help  q:quit ",
        );

        let width = body.width as usize;
        let selected = self.changelist_cursor.selected();
        for (i, entry) in cl.entries().into_iter().enumerate() {
            let Some(y) = screen_y(&self.changelist_viewport, body, i as u32) else {
                continue;
            };
            let bg = if selected == Some(i) {
                SELECTED_BG
            } else {
                Color::Reset
            };
            let base = Style::default().bg(bg);

            let spans = match entry {
                Entry::Patchset(s) => {
                    let section = &cl.sections[s];
                    let (marker, note) = match &section.state {
                        Section::Open(_) => ("▾", Span::raw("")),
                        Section::Collapsed => ("▸", Span::raw("")),
                        Section::Loading => ("▸", Span::styled("  Loading...", base.fg(Color::Yellow))),
                        Section::Failed(msg) => ("▸", Span::styled(format!("  {}", msg), base.fg(Color::Red))),
                    };
                    vec![
                        Span::styled(
                            format!(" {} Patch set {}", marker, section.patchset),
                            base.fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        ),
                        note.patch_style(base),
                    ]
                }
                Entry::File { section, file } => {
                    let Some(f) = cl.file(section, file) else {
                        continue;
                    };
                    let mut spans = vec![Span::styled(
                        format!("     {}", f.patch.filename),
                        base.fg(Color::White),
                    )];
                    if f.comments > 0 {
                        spans.push(Span::styled(
                            format!("  {} comments", f.comments),
                            base.fg(Color::Yellow),
                        ));
                    }
                    if f.drafts > 0 {
                        spans.push(Span::styled(
                            format!("  {} drafts", f.drafts),
                            base.fg(Color::Magenta),
                        ));
                    }
                    spans
                }
            };
            buf.set_line(body.x, y, &Line::from(fit_spans(spans, width, base)), body.width);
        }
    }

    fn render_diff_screen(&self, buf: &mut Buffer, area: Rect, body: Rect) {
        let Some(page) = &self.page else {
            self.render_chrome(buf, area, " veld", " u:changelist  q:quit ");
            return;
        };
        let title = match &self.changelist {
            Some(cl) if cl.id() == page.patch.issue => {
                format!(" Issue {}: {}", cl.id(), cl.issue.subject)
            }
            _ => format!(" Issue {}", page.patch.issue),
        };
        let hints = if page.forms.focused().is_some() {
            " Ctrl-S:save  Esc:cancel  Ctrl-D:delete "
        } else {
            " n/p:hook  N/P:comment  Enter:reply  j/k:file  x:expand  M:message  u:up  ?:help "
        };
        self.render_chrome(buf, area, &title, hints);
        self.render_page(buf, body, page);
    }

    fn render_page(&self, buf: &mut Buffer, area: Rect, page: &DiffPage) {
        let vp = &page.viewport;
        let width = area.width as usize;

        if let Some(y) = screen_y(vp, area, 0) {
            let comments = page.table.comment_count();
            let mut spans = vec![Span::styled(
                format!(
                    " {}  (patch set {})",
                    if page.patch.filename.is_empty() {
                        format!("patch {}", page.patch.patch)
                    } else {
                        page.patch.filename.clone()
                    },
                    page.patch.patchset
                ),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )];
            if comments > 0 {
                spans.push(Span::styled(
                    format!("  {} comments", comments),
                    Style::default().fg(Color::Yellow),
                ));
            }
            if !page.intraline {
                spans.push(Span::styled("  intraline off", Style::default().fg(Color::DarkGray)));
            }
            buf.set_line(area.x, y, &Line::from(fit_spans(spans, width, Style::default())), area.width);
        }
        for (i, warning) in page.warnings.iter().enumerate() {
            if let Some(y) = screen_y(vp, area, 1 + i as u32) {
                let text = truncate_or_pad(&format!(" ! {}", warning), width);
                buf.set_string(area.x, y, text, Style::default().fg(Color::LightRed));
            }
        }

        let indicator = page.hooks.indicator();
        let tops = page.table.layout();
        for (row, &top) in page.table.rows().iter().zip(&tops) {
            let height = row.height();
            if height == 0 || top + height <= vp.scroll_top || top >= vp.scroll_top + area.height as u32 {
                continue;
            }
            let marked = indicator == Some(row.id());
            for k in 0..height {
                if let Some(y) = screen_y(vp, area, top + k) {
                    self.render_marker(buf, area.x, y, marked && k == 0, marked);
                }
            }
            let content = Rect {
                x: area.x + MARKER_WIDTH,
                width: area.width.saturating_sub(MARKER_WIDTH),
                ..area
            };
            match &row.kind {
                RowKind::Code => {
                    if let Some(y) = screen_y(vp, area, top) {
                        self.render_code_row(buf, content, y, page, row);
                    }
                }
                RowKind::Skip(info) => {
                    if let Some(y) = screen_y(vp, area, top) {
                        let base = Style::default().bg(HEADER_BG);
                        let mut spans = vec![Span::styled(
                            format!(" ⋯ {} lines skipped ", info.count),
                            base.fg(Color::Cyan).add_modifier(Modifier::DIM),
                        )];
                        if info.loading {
                            spans.push(Span::styled(" Loading...", base.fg(Color::Yellow)));
                        } else if let Some(error) = &info.error {
                            spans.push(Span::styled(format!(" {}", error), base.fg(Color::Red)));
                        } else {
                            for link in skip_links(info.count, page.context) {
                                spans.push(Span::styled(
                                    format!(" [{}] {} ", expand_key(link.expand), link.label),
                                    base.fg(Color::Yellow),
                                ));
                            }
                        }
                        let line = Line::from(fit_spans(spans, content.width as usize, base));
                        buf.set_line(content.x, y, &line, content.width);
                    }
                }
                RowKind::Comments => self.render_comment_row(buf, content, top, page, row),
            }
        }
    }

    fn render_marker(&self, buf: &mut Buffer, x: u16, y: u16, arrow: bool, marked: bool) {
        let style = if marked {
            Style::default()
                .bg(self.config.colors.indicator_bg.to_color())
                .fg(self.config.colors.accent.to_color())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        buf.set_string(x, y, if arrow { "▶" } else { " " }, style);
    }

    fn tone_bg(&self, tone: CellTone) -> Color {
        let colors = &self.config.colors;
        match tone {
            CellTone::Added => colors.add_bg.to_color(),
            CellTone::Removed => colors.del_bg.to_color(),
            CellTone::Context => colors.context_bg.to_color(),
            CellTone::Blank => Color::Reset,
        }
    }

    /// Left and right halves of a row, each capped to the column width
    fn halves(&self, area: Rect, page: &DiffPage) -> [Rect; 2] {
        let cap = (page.column_width as usize + GUTTER_WIDTH).min(u16::MAX as usize) as u16;
        let half = (area.width / 2).min(cap);
        [
            Rect { width: half, ..area },
            Rect {
                x: area.x + area.width / 2,
                width: half.min(area.width - area.width / 2),
                ..area
            },
        ]
    }

    fn render_code_row(&self, buf: &mut Buffer, area: Rect, y: u16, page: &DiffPage, row: &Row) {
        let halves = self.halves(area, page);
        let emphasis = match (row.cells.first(), row.cells.get(1)) {
            (Some(old), Some(new))
                if page.intraline
                    && old.tone() == CellTone::Removed
                    && new.tone() == CellTone::Added =>
            {
                let (a, b) = changed_ranges(&old.text, &new.text);
                [Some(a), Some(b)]
            }
            _ => [None, None],
        };
        for (i, half) in halves.iter().enumerate() {
            let cell = row.cells.get(i);
            self.render_code_cell(buf, *half, y, cell, &page.patch.filename, emphasis[i]);
        }
    }

    fn render_code_cell(
        &self,
        buf: &mut Buffer,
        area: Rect,
        y: u16,
        cell: Option<&Cell>,
        filename: &str,
        emphasis: Option<(usize, usize)>,
    ) {
        let width = area.width as usize;
        let Some(cell) = cell else {
            buf.set_string(area.x, y, " ".repeat(width), Style::default());
            return;
        };
        let bg = self.tone_bg(cell.tone());
        let gutter = match cell.code_line() {
            Some((_, ln)) => format!("{:>4} ", ln),
            None => " ".repeat(GUTTER_WIDTH),
        };
        let mut spans = vec![Span::styled(gutter, Style::default().fg(Color::DarkGray).bg(bg))];
        let text = cell.text.replace('\t', "    ");
        spans.extend(self.highlighter.highlight_cell(&text, filename, bg));
        let line = Line::from(fit_spans(spans, width, Style::default().bg(bg)));
        buf.set_line(area.x, y, &line, area.width);

        if let Some((start, end)) = emphasis {
            // Tab expansion shifts columns, so only plain lines get emphasis
            if !cell.text.contains('\t') && end > start {
                let x = area.x as usize + GUTTER_WIDTH + start;
                let right = (area.x as usize + width).min(area.x as usize + GUTTER_WIDTH + end);
                if x < right {
                    let rect = Rect::new(x as u16, y, (right - x) as u16, 1);
                    buf.set_style(
                        rect,
                        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    );
                }
            }
        }
    }

    fn render_comment_row(&self, buf: &mut Buffer, area: Rect, top: u32, page: &DiffPage, row: &Row) {
        let vp = &page.viewport;
        let halves = self.halves(area, page);
        let comment_bg = Color::Rgb(35, 35, 28);

        let mut thread_height = 0;
        for (i, half) in halves.iter().enumerate() {
            let Some(cell) = row.cells.get(i) else {
                continue;
            };
            let mut lines: Vec<(String, Style)> = Vec::new();
            for comment in &cell.thread.comments {
                let mut comment_lines = comment.lines.iter();
                let first = comment_lines.next().cloned().unwrap_or_default();
                lines.push((first, Style::default().fg(Color::Yellow).bg(comment_bg)));
                if !row.collapsed {
                    lines.extend(
                        comment_lines.map(|l| (l.clone(), Style::default().fg(Color::White).bg(comment_bg))),
                    );
                }
            }
            thread_height = thread_height.max(lines.len() as u32);
            for (k, (text, style)) in lines.iter().enumerate() {
                if let Some(y) = screen_y(vp, area, top + k as u32) {
                    let text = truncate_or_pad(&format!(" {}", text), half.width as usize);
                    buf.set_string(half.x, y, text, *style);
                }
            }
        }

        let mut offset = top + thread_height;
        for form in page.forms.in_row(row.id()) {
            let half = match form.id.side {
                Side::A => halves[0],
                Side::B => halves[1],
            };
            let focused = page.forms.focused_id() == Some(&form.id);
            self.render_form(buf, half, vp, area, offset, form, focused);
            offset += form.height();
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_form(
        &self,
        buf: &mut Buffer,
        half: Rect,
        vp: &Viewport,
        area: Rect,
        top: u32,
        form: &InlineForm,
        focused: bool,
    ) {
        let width = half.width as usize;
        let accent = self.config.colors.accent.to_color();
        let form_bg = Color::Rgb(25, 25, 35);

        let kind = match form.kind {
            FormKind::New => "New comment",
            FormKind::Edit { .. } => "Edit draft",
            FormKind::Reply => "Reply",
        };
        let mut header = format!(" {} on line {}", kind, form.id.line);
        if form.is_submitting() {
            header.push_str("  submitting…");
        }
        let header_style = if focused {
            Style::default().fg(Color::White).bg(accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray).bg(form_bg)
        };
        if let Some(y) = screen_y(vp, area, top) {
            buf.set_string(half.x, y, truncate_or_pad(&header, width), header_style);
        }

        let text_style = if form.is_enabled() {
            Style::default().fg(Color::White).bg(form_bg)
        } else {
            Style::default().fg(Color::DarkGray).bg(form_bg)
        };
        let lines: Vec<&str> = form.text.split('\n').collect();
        let last = lines.len() - 1;
        for (k, text) in lines.iter().enumerate() {
            let Some(y) = screen_y(vp, area, top + 1 + k as u32) else {
                continue;
            };
            let mut text = format!(" {}", text.replace('\t', "    "));
            if focused && k == last {
                text.push('█');
            }
            buf.set_string(half.x, y, truncate_or_pad(&text, width), text_style);
        }

        if let Some(y) = screen_y(vp, area, top + 1 + lines.len() as u32) {
            let hint = match form.kind {
                FormKind::Edit { .. } => " Ctrl-S:save  Esc:cancel  Ctrl-D:delete",
                _ => " Ctrl-S:save  Esc:cancel  Ctrl-D:clear",
            };
            buf.set_string(
                half.x,
                y,
                truncate_or_pad(hint, width),
                Style::default().fg(Color::DarkGray).bg(form_bg),
            );
        }
    }

    fn render_draft_dialog(&self, frame: &mut ratatui::Frame) {
        let Some(dialog) = &self.draft else {
            return;
        };
        let area = centered_rect(frame.area(), 72, 18);
        frame.render_widget(Clear, area);

        let block = Block::default()
            .title(format!(" Draft message for issue {} ", dialog.issue()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .style(Style::default().bg(POPUP_BG));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height < 3 {
            return;
        }

        let buf = frame.buffer_mut();
        let width = inner.width as usize;
        let text_height = inner.height as usize - 2;
        let text_style = Style::default().fg(Color::White).bg(POPUP_BG);

        if dialog.state() == DialogState::Loading {
            buf.set_string(inner.x, inner.y, "Loading...", text_style.fg(Color::Yellow));
        } else {
            let mut text = dialog.text.clone();
            if dialog.input_enabled() {
                text.push('█');
            }
            let lines = wrap_text(&text, width);
            // Keep the end of the text, where typing happens, in view
            let skip = lines.len().saturating_sub(text_height);
            for (k, line) in lines.iter().skip(skip).enumerate() {
                buf.set_string(inner.x, inner.y + k as u16, line, text_style);
            }
        }

        let status_y = inner.y + inner.height - 2;
        if let Some(status) = dialog.status.text() {
            buf.set_string(
                inner.x,
                status_y,
                truncate_or_pad(status, width),
                Style::default().fg(Color::Yellow).bg(POPUP_BG),
            );
        }
        buf.set_string(
            inner.x,
            status_y + 1,
            truncate_or_pad("Ctrl-S:save  Esc:close  Ctrl-D:discard", width),
            Style::default().fg(Color::DarkGray).bg(POPUP_BG),
        );
    }

    fn render_popup(&self, frame: &mut ratatui::Frame, title: &str, lines: &[String]) {
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = (longest.max(title.chars().count()) + 4).min(u16::MAX as usize) as u16;
        let area = centered_rect(frame.area(), width, lines.len() as u16 + 2);
        frame.render_widget(Clear, area);

        let text: Vec<Line> = lines.iter().map(|l| Line::from(l.as_str())).collect();
        let popup = Paragraph::new(text)
            .block(
                Block::default()
                    .title(format!(" {} ", title))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Magenta)),
            )
            .style(Style::default().fg(Color::White).bg(POPUP_BG));
        frame.render_widget(popup, area);
    }

    fn render_help(&self, frame: &mut ratatui::Frame) {
        let commands: &[(&str, &str)] = match self.screen {
            Screen::Dashboard => &[
                ("j / ↓", "Next issue"),
                ("k / ↑", "Previous issue"),
                ("o / Enter", "Open issue"),
                ("*", "Star or unstar"),
                ("#", "Close issue"),
                ("a", "Show author"),
                ("q", "Quit"),
                ("?", "Show this help"),
            ],
            Screen::Changelist => &[
                ("j / ↓", "Next line"),
                ("k / ↑", "Previous line"),
                ("o / Enter", "Open patch set or file"),
                ("m", "Publish comments in browser"),
                ("u", "Back to dashboard"),
                ("q", "Quit"),
                ("?", "Show this help"),
            ],
            Screen::Diff => &[
                ("n / p", "Next / previous hook"),
                ("N / P", "Next / previous comment"),
                ("j / k", "Next / previous file"),
                ("J / K", "Next / previous file with comments"),
                ("Enter", "Reply, edit or comment here"),
                ("x", "Expand skipped lines"),
                ("T / B", "Expand skipped lines before / after"),
                ("s", "Show or hide comments"),
                ("e / c", "Expand / collapse comments"),
                ("i", "Toggle intraline diff"),
                ("↑ ↓ PgUp PgDn", "Scroll"),
                ("m", "Publish comments in browser"),
                ("M", "Edit the draft message"),
                ("u", "Back to changelist"),
                ("Ctrl-S / Esc", "Save / cancel a form"),
                ("q", "Quit"),
                ("?", "Show this help"),
            ],
        };

        let area = centered_rect(frame.area(), 60, commands.len() as u16 + 2);
        frame.render_widget(Clear, area);
        let block = Block::default()
            .title(" Keyboard Shortcuts (Esc to close) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .style(Style::default().bg(POPUP_BG));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let buf = frame.buffer_mut();
        let key_style = Style::default()
            .fg(Color::Yellow)
            .bg(POPUP_BG)
            .add_modifier(Modifier::BOLD);
        let desc_style = Style::default().fg(Color::White).bg(POPUP_BG);

        for (i, (key, desc)) in commands.iter().enumerate() {
            if i as u16 >= inner.height {
                break;
            }
            let y = inner.y + i as u16;
            buf.set_string(inner.x, y, format!("{:>14}  ", key), key_style);
            let available = (inner.width as usize).saturating_sub(16);
            let desc: String = desc.chars().take(available).collect();
            buf.set_string(inner.x + 16, y, desc, desc_style);
        }
    }
}
