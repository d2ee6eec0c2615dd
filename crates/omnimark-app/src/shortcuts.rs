//! Keyboard shortcut registry and documentation.

use omnimark_core::{Modifiers, ToolKind};

/// Action triggered by a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectTool(ToolKind),
    ZoomIn,
    ZoomOut,
    FitToWindow,
    Undo,
    Redo,
    ToggleRuler,
    CopyToClipboard,
    SaveStrokeLog,
    ClearAnnotations,
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub description: &'static str,
    pub command: Command,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        ctrl: bool,
        shift: bool,
        description: &'static str,
        command: Command,
    ) -> Self {
        Self {
            key,
            ctrl,
            shift,
            description,
            command,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+S").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }

    fn matches(&self, key: &str, modifiers: Modifiers) -> bool {
        self.key.eq_ignore_ascii_case(key)
            && self.ctrl == modifiers.command()
            && self.shift == modifiers.shift
    }
}

const SHORTCUTS: &[Shortcut] = &[
    Shortcut::new("P", false, false, "Pen", Command::SelectTool(ToolKind::Pen)),
    Shortcut::new("H", false, false, "Highlighter", Command::SelectTool(ToolKind::Highlighter)),
    Shortcut::new("A", false, false, "Area highlight", Command::SelectTool(ToolKind::Area)),
    Shortcut::new("R", false, false, "Toggle ruler", Command::ToggleRuler),
    Shortcut::new("=", true, false, "Zoom in", Command::ZoomIn),
    Shortcut::new("-", true, false, "Zoom out", Command::ZoomOut),
    Shortcut::new("0", true, false, "Fit to window", Command::FitToWindow),
    Shortcut::new("Z", true, false, "Undo", Command::Undo),
    Shortcut::new("Z", true, true, "Redo", Command::Redo),
    Shortcut::new("Y", true, false, "Redo", Command::Redo),
    Shortcut::new("C", true, false, "Copy annotated image", Command::CopyToClipboard),
    Shortcut::new("S", true, false, "Save stroke log", Command::SaveStrokeLog),
    Shortcut::new("Delete", true, true, "Clear all annotations", Command::ClearAnnotations),
];

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> &'static [Shortcut] {
        SHORTCUTS
    }

    /// Resolve a key press. `key` is the key's label, e.g. `"z"` or `"Delete"`.
    pub fn lookup(key: &str, modifiers: Modifiers) -> Option<Command> {
        // Shifted "=" arrives as "+" on most layouts.
        let (key, modifiers) = match key {
            "+" if modifiers.command() => ("=", Modifiers { shift: false, ..modifiers }),
            _ => (key, modifiers),
        };
        if modifiers.alt {
            return None;
        }
        SHORTCUTS
            .iter()
            .find(|s| s.matches(key, modifiers))
            .map(|s| s.command)
    }

    /// Print all shortcuts to console.
    pub fn print_all() {
        println!("\n=== Keyboard Shortcuts ===");
        for shortcut in Self::all() {
            println!("  {:20} {}", shortcut.format(), shortcut.description);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_keys() {
        assert_eq!(
            ShortcutRegistry::lookup("h", Modifiers::NONE),
            Some(Command::SelectTool(ToolKind::Highlighter))
        );
        assert_eq!(
            ShortcutRegistry::lookup("P", Modifiers::NONE),
            Some(Command::SelectTool(ToolKind::Pen))
        );
        // Ctrl+A is not a tool switch.
        assert_eq!(ShortcutRegistry::lookup("a", Modifiers::NONE.with_ctrl()), None);
    }

    #[test]
    fn test_undo_redo_keys() {
        let ctrl = Modifiers::NONE.with_ctrl();
        assert_eq!(ShortcutRegistry::lookup("z", ctrl), Some(Command::Undo));
        assert_eq!(ShortcutRegistry::lookup("z", ctrl.with_shift()), Some(Command::Redo));
        assert_eq!(ShortcutRegistry::lookup("y", ctrl), Some(Command::Redo));
        let cmd = Modifiers {
            meta: true,
            ..Modifiers::NONE
        };
        assert_eq!(ShortcutRegistry::lookup("z", cmd), Some(Command::Undo));
    }

    #[test]
    fn test_zoom_keys() {
        let ctrl = Modifiers::NONE.with_ctrl();
        assert_eq!(ShortcutRegistry::lookup("=", ctrl), Some(Command::ZoomIn));
        assert_eq!(ShortcutRegistry::lookup("+", ctrl.with_shift()), Some(Command::ZoomIn));
        assert_eq!(ShortcutRegistry::lookup("-", ctrl), Some(Command::ZoomOut));
        assert_eq!(ShortcutRegistry::lookup("0", ctrl), Some(Command::FitToWindow));
    }

    #[test]
    fn test_clear_needs_both_modifiers() {
        let ctrl = Modifiers::NONE.with_ctrl();
        assert_eq!(ShortcutRegistry::lookup("Delete", ctrl), None);
        assert_eq!(
            ShortcutRegistry::lookup("delete", ctrl.with_shift()),
            Some(Command::ClearAnnotations)
        );
    }

    #[test]
    fn test_alt_combinations_ignored() {
        assert_eq!(ShortcutRegistry::lookup("r", Modifiers::NONE.with_alt()), None);
    }

    #[test]
    fn test_format() {
        let redo = ShortcutRegistry::all()
            .iter()
            .find(|s| s.command == Command::Redo && s.shift)
            .unwrap();
        assert_eq!(redo.format(), "Ctrl+Shift+Z");
    }
}
