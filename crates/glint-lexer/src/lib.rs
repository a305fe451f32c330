//! Preprocessor and single-pass tokenizer for the glint compiler.
//!
//! Grounded in `original_source/src/lexer/TokenStream.cpp`'s character
//! dispatch, with maximal munch expressed through [`Cursor::peek_nth`]
//! lookahead rather than manual iterator arithmetic.

pub mod preprocess;

use std::rc::Rc;

use glint_common::error::{CompileError, Result, Stage};
use glint_common::{keyword_from_str, CharStream, Cursor, Diagnostic, Line, Span, TokenInfo, TokenKind};

pub use preprocess::Preprocessor;

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(stream: &'a CharStream) -> Self {
        Lexer { cursor: stream.cursor() }
    }

    /// Tokenize the whole stream, stopping at the first lex error.
    pub fn tokenize(stream: &'a CharStream) -> Result<Vec<TokenInfo>> {
        let mut lexer = Lexer::new(stream);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let eos = tok.kind == TokenKind::Eos;
            tokens.push(tok);
            if eos {
                break;
            }
        }
        Ok(tokens)
    }

    fn current_line(&self) -> Option<Rc<Line>> {
        self.cursor.current_line().cloned()
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.cursor.peek() {
                Some(c) if c.is_whitespace() => {
                    self.cursor.advance();
                }
                Some('/') if self.cursor.peek_nth(1) == Some('/') => {
                    self.cursor.advance();
                    self.cursor.advance();
                    while !matches!(self.cursor.peek(), None | Some('\n')) {
                        self.cursor.advance();
                    }
                }
                Some('/') if self.cursor.peek_nth(1) == Some('*') => {
                    self.skip_block_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let line = self.current_line();
        let start_col = self.cursor.column();
        self.cursor.advance(); // '/'
        self.cursor.advance(); // '*'
        loop {
            match self.cursor.peek() {
                None => {
                    let line = line.expect("block comment must start inside a line");
                    let span = Span::new(line, start_col, self.cursor.column());
                    return Err(self.lex_error(span, "unterminated block comment", "expected `*/`"));
                }
                Some('*') if self.cursor.peek_nth(1) == Some('/') => {
                    self.cursor.advance();
                    self.cursor.advance();
                    return Ok(());
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    fn lex_error(&self, span: Span, message: impl Into<String>, label: impl Into<String>) -> CompileError {
        CompileError::new(Stage::Lex, Diagnostic::error(span, message, label))
    }

    fn make(&self, kind: TokenKind, line: Rc<Line>, start: u32) -> TokenInfo {
        let end = self.cursor.column();
        let lexeme = Span::new(line.clone(), start, end).text().to_string();
        TokenInfo::new(kind, lexeme, Span::new(line, start, end))
    }

    pub fn next_token(&mut self) -> Result<TokenInfo> {
        self.skip_trivia()?;

        let Some(line) = self.current_line() else {
            return Ok(TokenInfo::new(TokenKind::Eos, String::new(), eos_span()));
        };
        let start = self.cursor.column();

        let Some(c) = self.cursor.peek() else {
            return Ok(TokenInfo::new(TokenKind::Eos, String::new(), eos_span()));
        };

        match c {
            '(' => self.single(TokenKind::LParen, line, start),
            ')' => self.single(TokenKind::RParen, line, start),
            '[' => self.single(TokenKind::LBracket, line, start),
            ']' => self.single(TokenKind::RBracket, line, start),
            '{' => self.single(TokenKind::LBrace, line, start),
            '}' => self.single(TokenKind::RBrace, line, start),
            ';' => self.single(TokenKind::Semicolon, line, start),
            ':' => self.single(TokenKind::Colon, line, start),
            ',' => self.single(TokenKind::Comma, line, start),
            '.' => self.single(TokenKind::Dot, line, start),
            '?' => self.single(TokenKind::Question, line, start),
            '~' => self.single(TokenKind::BitNot, line, start),

            '=' => self.lex_run(line, start, &[("==", TokenKind::Eq), ("=>", TokenKind::FatArrow)], TokenKind::Assign),
            '!' => self.lex_run(line, start, &[("!=", TokenKind::NotEq)], TokenKind::Not),
            '+' => self.lex_run(line, start, &[("+=", TokenKind::AssignAdd), ("++", TokenKind::Inc)], TokenKind::Add),
            '-' => self.lex_run(line, start, &[("-=", TokenKind::AssignSub), ("--", TokenKind::Dec), ("->", TokenKind::Arrow)], TokenKind::Sub),
            '*' => self.lex_run(line, start, &[("*=", TokenKind::AssignMul), ("**", TokenKind::Exp)], TokenKind::Mul),
            '/' => self.lex_run(line, start, &[("/=", TokenKind::AssignDiv)], TokenKind::Div),
            '%' => self.lex_run(line, start, &[("%=", TokenKind::AssignMod)], TokenKind::Mod),
            '&' => self.lex_run(line, start, &[("&&", TokenKind::And), ("&=", TokenKind::AssignBitAnd)], TokenKind::BitAnd),
            '|' => self.lex_run(line, start, &[("||", TokenKind::Or), ("|=", TokenKind::AssignBitOr)], TokenKind::BitOr),
            '^' => self.lex_run(line, start, &[("^=", TokenKind::AssignBitXor)], TokenKind::BitXor),

            '>' => self.lex_shift(line, start, '>', TokenKind::Gt, TokenKind::GtEq, TokenKind::Sar, TokenKind::AssignSar, TokenKind::Shr, TokenKind::AssignShr),
            '<' => self.lex_shift(line, start, '<', TokenKind::Lt, TokenKind::LtEq, TokenKind::Shl, TokenKind::AssignShl, TokenKind::Shl, TokenKind::AssignShl),

            '"' => self.lex_string(line, start),

            c if c.is_ascii_digit() => Ok(self.lex_number(line, start)),
            c if is_ident_start(c) => Ok(self.lex_ident(line, start)),

            _ => {
                self.cursor.advance();
                Ok(self.make(TokenKind::Illegal, line, start))
            }
        }
    }

    /// Consume the current char, then greedily try each `(lexeme, kind)` run
    /// (longest-first by construction order); falls back to `single_kind`.
    fn lex_run(
        &mut self,
        line: Rc<Line>,
        start: u32,
        runs: &[(&str, TokenKind)],
        single_kind: TokenKind,
    ) -> Result<TokenInfo> {
        self.cursor.advance();
        for (text, kind) in runs {
            let extra = &text[1..];
            if self.matches_ahead(extra) {
                for _ in extra.chars() {
                    self.cursor.advance();
                }
                return Ok(self.make(*kind, line, start));
            }
        }
        Ok(self.make(single_kind, line, start))
    }

    fn matches_ahead(&self, rest: &str) -> bool {
        rest.chars().enumerate().all(|(i, c)| self.cursor.peek_nth(i) == Some(c))
    }

    #[allow(clippy::too_many_arguments)]
    fn lex_shift(
        &mut self,
        line: Rc<Line>,
        start: u32,
        ch: char,
        plain: TokenKind,
        eq: TokenKind,
        shift2: TokenKind,
        shift2_eq: TokenKind,
        shift3: TokenKind,
        shift3_eq: TokenKind,
    ) -> Result<TokenInfo> {
        self.cursor.advance();
        if self.cursor.peek() == Some(ch) {
            self.cursor.advance();
            if self.cursor.peek() == Some(ch) {
                self.cursor.advance();
                if self.cursor.peek() == Some('=') {
                    self.cursor.advance();
                    return Ok(self.make(shift3_eq, line, start));
                }
                return Ok(self.make(shift3, line, start));
            }
            if self.cursor.peek() == Some('=') {
                self.cursor.advance();
                return Ok(self.make(shift2_eq, line, start));
            }
            return Ok(self.make(shift2, line, start));
        }
        if self.cursor.peek() == Some('=') {
            self.cursor.advance();
            return Ok(self.make(eq, line, start));
        }
        Ok(self.make(plain, line, start))
    }

    fn single(&mut self, kind: TokenKind, line: Rc<Line>, start: u32) -> Result<TokenInfo> {
        self.cursor.advance();
        Ok(self.make(kind, line, start))
    }

    fn lex_ident(&mut self, line: Rc<Line>, start: u32) -> TokenInfo {
        while matches!(self.cursor.peek(), Some(c) if is_ident_continue(c)) {
            self.cursor.advance();
        }
        let end = self.cursor.column();
        let lexeme = Span::new(line.clone(), start, end).text().to_string();
        let kind = keyword_from_str(&lexeme).unwrap_or(TokenKind::Ident);
        TokenInfo::new(kind, lexeme, Span::new(line, start, end))
    }

    fn lex_number(&mut self, line: Rc<Line>, start: u32) -> TokenInfo {
        let mut is_float = false;
        if self.cursor.peek() == Some('0') && matches!(self.cursor.peek_nth(1), Some('x') | Some('X')) {
            self.cursor.advance();
            self.cursor.advance();
            while matches!(self.cursor.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.cursor.advance();
            }
        } else {
            while matches!(self.cursor.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                if self.cursor.peek() == Some('.') {
                    is_float = true;
                }
                self.cursor.advance();
            }
        }
        let end = self.cursor.column();
        let lexeme = Span::new(line.clone(), start, end).text().to_string();
        let kind = if is_float { TokenKind::DoubleNumber } else { TokenKind::IntNumber };
        let span = Span::new(line, start, end);
        if is_float {
            if lexeme.parse::<f64>().is_err() {
                tracing::warn!("malformed numeric literal `{lexeme}`");
            }
        } else {
            let (digits, radix) = match lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
                Some(rest) => (rest, 16),
                None => (lexeme.as_str(), 10),
            };
            if i64::from_str_radix(digits, radix).is_err() {
                tracing::warn!("malformed numeric literal `{lexeme}`");
            }
        }
        TokenInfo::new(kind, lexeme, span)
    }

    fn lex_string(&mut self, line: Rc<Line>, start: u32) -> Result<TokenInfo> {
        self.cursor.advance(); // opening quote
        loop {
            match self.cursor.peek() {
                Some('"') => {
                    self.cursor.advance();
                    return Ok(self.make(TokenKind::StringLiteral, line, start));
                }
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                None | Some('\n') => {
                    let span = Span::new(line, start, self.cursor.column());
                    return Err(self.lex_error(span, "unterminated string literal", "expected closing `\"`"));
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn eos_span() -> Span {
    Span::new(Line::new(String::new(), std::path::PathBuf::new(), 1, None), 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tokens_for(src: &str) -> Vec<TokenInfo> {
        let line = Line::new(format!("{src}\n"), PathBuf::from("t.sol"), 1, None);
        let stream = CharStream::new(vec![line]);
        Lexer::tokenize(&stream).unwrap()
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokens_for(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn maximal_munch_on_shift_operators() {
        assert_eq!(
            kinds(">>>= >>> >>= >> >= >"),
            vec![
                TokenKind::AssignShr,
                TokenKind::Shr,
                TokenKind::AssignSar,
                TokenKind::Sar,
                TokenKind::GtEq,
                TokenKind::Gt,
                TokenKind::Eos,
            ]
        );
        assert_eq!(
            kinds("<<= << <= <"),
            vec![TokenKind::AssignShl, TokenKind::Shl, TokenKind::LtEq, TokenKind::Lt, TokenKind::Eos]
        );
    }

    #[test]
    fn identifiers_and_keywords() {
        assert_eq!(kinds("function foo"), vec![TokenKind::Function, TokenKind::Ident, TokenKind::Eos]);
        assert_eq!(kinds("int256 uint8"), vec![TokenKind::IntM, TokenKind::UIntM, TokenKind::Eos]);
    }

    #[test]
    fn numbers_classify_by_dot() {
        assert_eq!(kinds("42 3.14"), vec![TokenKind::IntNumber, TokenKind::DoubleNumber, TokenKind::Eos]);
    }

    #[test]
    fn line_comment_is_skipped() {
        assert_eq!(kinds("1 // comment\n2"), vec![TokenKind::IntNumber, TokenKind::IntNumber, TokenKind::Eos]);
    }

    #[test]
    fn block_comment_spans_newline() {
        let line1 = Line::new("1 /* a\n".into(), PathBuf::from("t.sol"), 1, None);
        let line2 = Line::new("b */ 2\n".into(), PathBuf::from("t.sol"), 2, None);
        let stream = CharStream::new(vec![line1, line2]);
        let kinds: Vec<_> = Lexer::tokenize(&stream).unwrap().into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::IntNumber, TokenKind::IntNumber, TokenKind::Eos]);
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let line = Line::new("\"abc\n".into(), PathBuf::from("t.sol"), 1, None);
        let stream = CharStream::new(vec![line]);
        assert!(Lexer::tokenize(&stream).is_err());
    }

    #[test]
    fn string_literal_keeps_quotes_in_lexeme() {
        let toks = tokens_for("\"hi\\n\"");
        assert_eq!(toks[0].kind, TokenKind::StringLiteral);
        assert_eq!(toks[0].lexeme, "\"hi\\n\"");
    }

    #[test]
    fn postfix_and_prefix_inc_share_a_token_kind() {
        assert_eq!(
            kinds("x++ ++x"),
            vec![TokenKind::Ident, TokenKind::Inc, TokenKind::Inc, TokenKind::Ident, TokenKind::Eos]
        );
    }
}
