use std::fmt;

use crate::diag::Diagnostic;

/// Which pipeline stage raised a [`CompileError`]. Kept distinct from
/// [`crate::diag::Severity`], which describes how loud the message is, not
/// where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preprocess,
    Lex,
    Parse,
    TypeCheck,
    Codegen,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preprocess => "preprocess",
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::TypeCheck => "typecheck",
            Stage::Codegen => "codegen",
        };
        f.write_str(name)
    }
}

/// A fatal error from one pipeline stage, carrying the rendered diagnostic
/// that should be shown to the user.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub stage: Stage,
    pub diagnostic: Diagnostic,
}

impl CompileError {
    pub fn new(stage: Stage, diagnostic: Diagnostic) -> Self {
        CompileError { stage, diagnostic }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic.render())
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{Line, Span};

    #[test]
    fn display_renders_the_diagnostic() {
        let line = Line::new("int x = 1\n".into(), "a.sol".into(), 1, None);
        let span = Span::new(line, 9, 10);
        let diag = Diagnostic::error(span, "missing semicolon", "expected `;`");
        let err = CompileError::new(Stage::Parse, diag);
        assert!(err.to_string().contains("missing semicolon"));
    }
}
