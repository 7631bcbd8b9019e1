//! Key naming and per-screen key dispatch.
//!
//! Key presses are first turned into names such as `N`, `Shift-N`, `Ctrl-S`
//! or `Shift-3`, then looked up for the active screen. Names follow US
//! keyboard layout: `#` is `Shift-3`, `?` is `Shift-/`.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, ModifierKeyCode};

use crate::skipped::Expand;

/// Name of a key combination
pub fn key_name(event: &KeyEvent) -> String {
    let mut ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let mut alt = event.modifiers.contains(KeyModifiers::ALT);
    let mut shift = event.modifiers.contains(KeyModifiers::SHIFT);
    let mut meta = event.modifiers.intersects(KeyModifiers::META | KeyModifiers::SUPER);

    let symbol = match event.code {
        KeyCode::Char(c) => {
            let (base, shifted) = base_symbol(c);
            shift |= shifted;
            base
        }
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Backspace => "<8>".to_string(),
        KeyCode::Tab => "<9>".to_string(),
        KeyCode::BackTab => {
            shift = true;
            "<9>".to_string()
        }
        KeyCode::PageUp => "<33>".to_string(),
        KeyCode::PageDown => "<34>".to_string(),
        KeyCode::End => "<35>".to_string(),
        KeyCode::Home => "<36>".to_string(),
        KeyCode::Left => "<37>".to_string(),
        KeyCode::Up => "<38>".to_string(),
        KeyCode::Right => "<39>".to_string(),
        KeyCode::Down => "<40>".to_string(),
        KeyCode::Delete => "<46>".to_string(),
        KeyCode::F(n) => format!("<{}>", 111 + n as u32),
        KeyCode::Modifier(m) => {
            // A bare modifier press names just the modifiers held
            match m {
                ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => ctrl = true,
                ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => alt = true,
                ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => shift = true,
                ModifierKeyCode::LeftMeta
                | ModifierKeyCode::RightMeta
                | ModifierKeyCode::LeftSuper
                | ModifierKeyCode::RightSuper => meta = true,
                _ => {}
            }
            let prefix = prefix(ctrl, alt, shift, meta);
            return prefix.trim_end_matches('-').to_string();
        }
        _ => "<0>".to_string(),
    };

    format!("{}{}", prefix(ctrl, alt, shift, meta), symbol)
}

fn prefix(ctrl: bool, alt: bool, shift: bool, meta: bool) -> String {
    let mut name = String::new();
    if ctrl {
        name.push_str("Ctrl-");
    }
    if alt {
        name.push_str("Alt-");
    }
    if shift {
        name.push_str("Shift-");
    }
    if meta {
        name.push_str("Meta-");
    }
    name
}

/// The key cap a character is typed on, and whether Shift is needed for it
fn base_symbol(c: char) -> (String, bool) {
    if c.is_ascii_alphabetic() {
        return (c.to_ascii_uppercase().to_string(), c.is_ascii_uppercase());
    }
    if c.is_ascii_digit() || matches!(c, ',' | '.' | '/') {
        return (c.to_string(), false);
    }
    let shifted = match c {
        '!' => Some('1'),
        '@' => Some('2'),
        '#' => Some('3'),
        '$' => Some('4'),
        '%' => Some('5'),
        '^' => Some('6'),
        '&' => Some('7'),
        '*' => Some('8'),
        '(' => Some('9'),
        ')' => Some('0'),
        '<' => Some(','),
        '>' => Some('.'),
        '?' => Some('/'),
        _ => None,
    };
    match shifted {
        Some(base) => (base.to_string(), true),
        None => (format!("<{}>", c as u32), false),
    }
}

/// Which screen owns the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Changelist,
    Diff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardAction {
    Next,
    Prev,
    Open,
    Close,
    ToggleStar,
    AuthorPopup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangelistAction {
    Next,
    Prev,
    Open,
    Publish,
    UpToDashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffAction {
    NextHook,
    PrevHook,
    NextComment,
    PrevComment,
    NextFile,
    PrevFile,
    NextFileWithComment,
    PrevFileWithComment,
    Publish,
    DraftMessage,
    UpToChangelist,
    ToggleIntraline,
    ToggleComments,
    ExpandComments,
    CollapseComments,
    Respond,
    ExpandSkipped(Expand),
    ScrollLines(i32),
    ScrollPages(i32),
}

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleHelp,
    CloseHelp,
    /// `Ctrl-S` in a text input
    SaveInput,
    /// `Esc` in a text input
    CancelInput,
    /// `Ctrl-D` in a text input: discard the stored draft
    DeleteInput,
    Dashboard(DashboardAction),
    Changelist(ChangelistAction),
    Diff(DiffAction),
    Quit,
    /// Not a shortcut; text inputs take it as typing
    Unhandled,
}

/// Route a named key.
///
/// Inside a text input only the save, cancel and delete shortcuts are taken. `Esc`
/// closes the help but never opens it.
pub fn dispatch(screen: Screen, in_input: bool, help_visible: bool, key: &str) -> Command {
    if in_input {
        return match key {
            "Ctrl-S" => Command::SaveInput,
            "Esc" => Command::CancelInput,
            "Ctrl-D" => Command::DeleteInput,
            _ => Command::Unhandled,
        };
    }
    match key {
        "Shift-/" => return Command::ToggleHelp,
        "Esc" if help_visible => return Command::CloseHelp,
        "Esc" => return Command::Unhandled,
        "Q" | "Ctrl-C" => return Command::Quit,
        _ => {}
    }
    match screen {
        Screen::Dashboard => dashboard_key(key).map(Command::Dashboard),
        Screen::Changelist => changelist_key(key).map(Command::Changelist),
        Screen::Diff => diff_key(key).map(Command::Diff),
    }
    .unwrap_or(Command::Unhandled)
}

fn dashboard_key(key: &str) -> Option<DashboardAction> {
    Some(match key {
        "J" | "<40>" => DashboardAction::Next,
        "K" | "<38>" => DashboardAction::Prev,
        "O" | "Enter" => DashboardAction::Open,
        "Shift-3" => DashboardAction::Close,
        "Shift-8" => DashboardAction::ToggleStar,
        "A" => DashboardAction::AuthorPopup,
        _ => return None,
    })
}

fn changelist_key(key: &str) -> Option<ChangelistAction> {
    Some(match key {
        "J" | "<40>" => ChangelistAction::Next,
        "K" | "<38>" => ChangelistAction::Prev,
        "O" | "Enter" => ChangelistAction::Open,
        "M" => ChangelistAction::Publish,
        "U" => ChangelistAction::UpToDashboard,
        _ => return None,
    })
}

fn diff_key(key: &str) -> Option<DiffAction> {
    Some(match key {
        "N" => DiffAction::NextHook,
        "P" => DiffAction::PrevHook,
        "Shift-N" => DiffAction::NextComment,
        "Shift-P" => DiffAction::PrevComment,
        "J" => DiffAction::NextFile,
        "K" => DiffAction::PrevFile,
        "Shift-J" => DiffAction::NextFileWithComment,
        "Shift-K" => DiffAction::PrevFileWithComment,
        "M" => DiffAction::Publish,
        "Shift-M" => DiffAction::DraftMessage,
        "U" => DiffAction::UpToChangelist,
        "I" => DiffAction::ToggleIntraline,
        "S" => DiffAction::ToggleComments,
        "E" => DiffAction::ExpandComments,
        "C" => DiffAction::CollapseComments,
        "Enter" => DiffAction::Respond,
        "X" => DiffAction::ExpandSkipped(Expand::All),
        "Shift-T" => DiffAction::ExpandSkipped(Expand::Before),
        "Shift-B" => DiffAction::ExpandSkipped(Expand::After),
        "<40>" => DiffAction::ScrollLines(1),
        "<38>" => DiffAction::ScrollLines(-1),
        "<34>" | "Ctrl-D" => DiffAction::ScrollPages(1),
        "<33>" | "Ctrl-U" => DiffAction::ScrollPages(-1),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn name(c: char) -> String {
        key_name(&key(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(name('n'), "N");
        assert_eq!(name('N'), "Shift-N");
        assert_eq!(key_name(&key(KeyCode::Char('N'), KeyModifiers::SHIFT)), "Shift-N");
        assert_eq!(name('7'), "7");
    }

    #[test]
    fn test_shifted_symbols_name_their_key_cap() {
        assert_eq!(name('#'), "Shift-3");
        assert_eq!(name('*'), "Shift-8");
        assert_eq!(name('?'), "Shift-/");
        assert_eq!(name('<'), "Shift-,");
        assert_eq!(name('/'), "/");
        assert_eq!(name('['), "<91>");
    }

    #[test]
    fn test_modifier_order() {
        let all = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT | KeyModifiers::META;
        assert_eq!(key_name(&key(KeyCode::Char('s'), all)), "Ctrl-Alt-Shift-Meta-S");
        assert_eq!(key_name(&key(KeyCode::Char('s'), KeyModifiers::CONTROL)), "Ctrl-S");
        assert_eq!(key_name(&key(KeyCode::Esc, KeyModifiers::NONE)), "Esc");
        assert_eq!(key_name(&key(KeyCode::Enter, KeyModifiers::ALT)), "Alt-Enter");
        assert_eq!(key_name(&key(KeyCode::Down, KeyModifiers::NONE)), "<40>");
    }

    #[test]
    fn test_bare_modifier_has_no_trailing_dash() {
        let event = key(KeyCode::Modifier(ModifierKeyCode::LeftShift), KeyModifiers::NONE);
        assert_eq!(key_name(&event), "Shift");
        let event = key(KeyCode::Modifier(ModifierKeyCode::LeftAlt), KeyModifiers::CONTROL);
        assert_eq!(key_name(&event), "Ctrl-Alt");
    }

    #[test]
    fn test_help_toggle_and_escape() {
        assert_eq!(dispatch(Screen::Diff, false, false, "Shift-/"), Command::ToggleHelp);
        assert_eq!(dispatch(Screen::Diff, false, true, "Shift-/"), Command::ToggleHelp);
        assert_eq!(dispatch(Screen::Diff, false, true, "Esc"), Command::CloseHelp);
        // Esc never opens the help
        assert_eq!(dispatch(Screen::Diff, false, false, "Esc"), Command::Unhandled);
    }

    #[test]
    fn test_text_input_only_takes_editing_shortcuts() {
        assert_eq!(dispatch(Screen::Diff, true, false, "Ctrl-S"), Command::SaveInput);
        assert_eq!(dispatch(Screen::Diff, true, false, "Esc"), Command::CancelInput);
        assert_eq!(dispatch(Screen::Diff, true, false, "Ctrl-D"), Command::DeleteInput);
        assert_eq!(dispatch(Screen::Diff, true, false, "N"), Command::Unhandled);
        assert_eq!(dispatch(Screen::Diff, true, false, "Shift-/"), Command::Unhandled);
    }

    #[test]
    fn test_per_screen_bindings() {
        assert_eq!(
            dispatch(Screen::Dashboard, false, false, "Shift-3"),
            Command::Dashboard(DashboardAction::Close)
        );
        assert_eq!(
            dispatch(Screen::Dashboard, false, false, "Shift-8"),
            Command::Dashboard(DashboardAction::ToggleStar)
        );
        assert_eq!(
            dispatch(Screen::Changelist, false, false, "Enter"),
            Command::Changelist(ChangelistAction::Open)
        );
        assert_eq!(
            dispatch(Screen::Diff, false, false, "Shift-N"),
            Command::Diff(DiffAction::NextComment)
        );
        assert_eq!(
            dispatch(Screen::Diff, false, false, "X"),
            Command::Diff(DiffAction::ExpandSkipped(Expand::All))
        );
        assert_eq!(dispatch(Screen::Dashboard, false, false, "N"), Command::Unhandled);
    }
}
