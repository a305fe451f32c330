//! Hand-rendered diagnostic frames.
//!
//! Grounded in the original `minisolc` compiler's `LOG_ERROR`/`LOG_WARNING`
//! macros (`common/Defs.h`), which print in-band ANSI escapes (`RED`,
//! `YELLOW`, `RESET`) with no TTY detection — this module follows the same
//! convention rather than reaching for a terminal-color crate, since "color
//! sequences are in-band in the output strings" is an explicit requirement
//! and "terminal color setup" is named out of scope.

use std::fmt::Write as _;

use crate::line::Span;

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic: a span to point at, plus a long and a short message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub long_message: String,
    pub short_label: String,
    pub location: Span,
}

impl Diagnostic {
    pub fn error(location: Span, long_message: impl Into<String>, short_label: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            long_message: long_message.into(),
            short_label: short_label.into(),
            location,
        }
    }

    pub fn warning(location: Span, long_message: impl Into<String>, short_label: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            long_message: long_message.into(),
            short_label: short_label.into(),
            location,
        }
    }

    /// Render the full frame: header, source excerpt, caret, short label,
    /// and the unwound `included_from` chain.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let (color, banner) = match self.severity {
            Severity::Error => (RED, "ERROR"),
            Severity::Warning => (YELLOW, "WARNING"),
        };

        let _ = writeln!(out, "{BOLD}{color}{banner}:{RESET} {}", self.long_message);

        let line = &self.location.line;
        let start = self.location.start_column as usize;
        let end = self.location.end_column as usize;
        let text = line.text.trim_end_matches(['\n', '\r']);
        let gutter = format!("{}", line.line_number);
        let pad = " ".repeat(gutter.len());

        let _ = writeln!(out, "{pad} {CYAN}-->{RESET} {}:{}", line.file.display(), line.line_number);
        let _ = writeln!(out, "{pad} {CYAN}|{RESET}");
        let before = text.get(..start.min(text.len())).unwrap_or("");
        let span_text = text.get(start.min(text.len())..end.min(text.len())).unwrap_or("");
        let after = text.get(end.min(text.len())..).unwrap_or("");
        let _ = writeln!(out, "{gutter} {CYAN}|{RESET} {before}{color}{span_text}{RESET}{after}");

        let caret_pad = " ".repeat(before.chars().count());
        let caret = "^".repeat(span_text.chars().count().max(1));
        let _ = writeln!(out, "{pad} {CYAN}|{RESET} {caret_pad}{color}{caret} {}{RESET}", self.short_label);

        for ancestor in line.include_chain().skip(1) {
            let _ = writeln!(
                out,
                "{pad} {CYAN}={RESET} included from {}:{}",
                ancestor.file.display(),
                ancestor.line_number
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Line;

    #[test]
    fn render_includes_header_and_caret() {
        let line = Line::new("int x = true;\n".into(), "a.sol".into(), 3, None);
        let span = Span::new(line, 8, 12);
        let diag = Diagnostic::error(span, "type mismatch", "expected int, found bool");
        let rendered = diag.render();
        assert!(rendered.contains("ERROR:"));
        assert!(rendered.contains("type mismatch"));
        assert!(rendered.contains("true"));
        assert!(rendered.contains("^^^^"));
        assert!(rendered.contains("a.sol:3"));
    }

    #[test]
    fn render_unwinds_include_chain() {
        let root = Line::new("#include \"b.sol\"\n".into(), "a.sol".into(), 1, None);
        let inner = Line::new("return x;\n".into(), "b.sol".into(), 1, Some(root));
        let span = Span::new(inner, 7, 8);
        let diag = Diagnostic::error(span, "unbound identifier", "`x` is not defined");
        let rendered = diag.render();
        assert!(rendered.contains("included from a.sol:1"));
    }
}
