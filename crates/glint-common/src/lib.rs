pub mod diag;
pub mod error;
pub mod line;
pub mod token;
pub mod types;

pub use diag::{Diagnostic, Severity};
pub use error::{CompileError, Result, Stage};
pub use line::{CharStream, Cursor, Line, Span};
pub use token::{keyword_from_str, TokenInfo, TokenKind};
pub use types::Type;
