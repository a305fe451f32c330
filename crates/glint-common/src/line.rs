use std::path::PathBuf;
use std::rc::Rc;

/// A single source line produced by the preprocessor.
///
/// Lines are created once, by the preprocessor, and then shared read-only by
/// every later stage — the lexer, parser, type analyzer, and diagnostics
/// renderer all hold `Rc<Line>` references into the same preprocessor output,
/// never copies. `text` always includes the trailing newline.
///
/// `included_from` forms a singly-linked chain back through whatever
/// `#include` directives pulled this line in, bottoming out at `None` for a
/// line that appeared directly in the root file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub file: PathBuf,
    pub line_number: u32,
    pub included_from: Option<Rc<Line>>,
}

impl Line {
    pub fn new(text: String, file: PathBuf, line_number: u32, included_from: Option<Rc<Line>>) -> Rc<Line> {
        debug_assert!(line_number >= 1, "line numbers are 1-based");
        Rc::new(Line {
            text,
            file,
            line_number,
            included_from,
        })
    }

    /// Walk the `included_from` chain, yielding this line first and then each
    /// enclosing `#include` site out to the root file.
    pub fn include_chain(&self) -> IncludeChain<'_> {
        IncludeChain { current: Some(self) }
    }
}

pub struct IncludeChain<'a> {
    current: Option<&'a Line>,
}

impl<'a> Iterator for IncludeChain<'a> {
    type Item = &'a Line;

    fn next(&mut self) -> Option<&'a Line> {
        let line = self.current?;
        self.current = line.included_from.as_deref();
        Some(line)
    }
}

/// Byte-offset span into a single `Line`'s text. Columns are 0-based byte
/// offsets, not char offsets — matching the lexer's byte-level cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub line: Rc<Line>,
    pub start_column: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(line: Rc<Line>, start_column: u32, end_column: u32) -> Self {
        debug_assert!(start_column <= end_column);
        Span {
            line,
            start_column,
            end_column,
        }
    }

    pub fn len(&self) -> u32 {
        self.end_column - self.start_column
    }

    pub fn is_empty(&self) -> bool {
        self.start_column == self.end_column
    }

    /// The slice of `line.text` this span covers.
    pub fn text(&self) -> &str {
        &self.line.text[self.start_column as usize..self.end_column as usize]
    }
}

/// The preprocessor's output: an ordered sequence of origin-tagged lines,
/// shared read-only by every later stage.
#[derive(Debug, Clone, Default)]
pub struct CharStream {
    lines: Vec<Rc<Line>>,
}

impl CharStream {
    pub fn new(lines: Vec<Rc<Line>>) -> Self {
        CharStream { lines }
    }

    pub fn lines(&self) -> &[Rc<Line>] {
        &self.lines
    }

    /// A forward-iterating cursor over individual characters, reporting the
    /// enclosing `Line` and column at every position.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.lines)
    }
}

/// Character-level cursor over a `CharStream`. At every position it can
/// report which `Line` and which byte column it is sitting at, which is how
/// the lexer attaches accurate spans to tokens across line boundaries
/// produced by macro expansion and include splicing.
#[derive(Clone)]
pub struct Cursor<'a> {
    lines: &'a [Rc<Line>],
    line_idx: usize,
    col: u32,
    chars: std::str::CharIndices<'a>,
}

impl<'a> Cursor<'a> {
    fn new(lines: &'a [Rc<Line>]) -> Self {
        let chars = lines.first().map(|l| l.text.char_indices()).unwrap_or("".char_indices());
        Cursor {
            lines,
            line_idx: 0,
            col: 0,
            chars,
        }
    }

    fn advance_to_next_line(&mut self) -> bool {
        self.line_idx += 1;
        self.col = 0;
        match self.lines.get(self.line_idx) {
            Some(l) => {
                self.chars = l.text.char_indices();
                true
            }
            None => false,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.line_idx >= self.lines.len()
    }

    /// The `Line` the cursor currently sits within, or `None` at end of stream.
    pub fn current_line(&self) -> Option<&'a Rc<Line>> {
        self.lines.get(self.line_idx)
    }

    /// Current 0-based byte column within `current_line`.
    pub fn column(&self) -> u32 {
        self.col
    }

    /// Look at the current character without consuming it. Transparently
    /// looks past the end of the current `Line` into the next one, since a
    /// lookahead that stopped at a line boundary would make maximal-munch
    /// dispatch see a spurious end of input mid-token.
    pub fn peek(&self) -> Option<char> {
        if let Some((_, c)) = self.chars.clone().next() {
            return Some(c);
        }
        let next = (self.line_idx + 1).min(self.lines.len());
        self.lines[next..].iter().find_map(|l| l.text.chars().next())
    }

    pub fn advance(&mut self) -> Option<char> {
        loop {
            if let Some((byte_off, c)) = self.chars.next() {
                self.col = byte_off as u32 + c.len_utf8() as u32;
                // If that was the line's last character, cross into the next
                // line right away, so `current_line`/`column` always describe
                // the position `peek` reports rather than lagging a line
                // behind it.
                if self.chars.clone().next().is_none() {
                    self.advance_to_next_line();
                }
                return Some(c);
            }
            if !self.advance_to_next_line() {
                return None;
            }
        }
    }

    /// Look `n` characters ahead without consuming. `peek_nth(0)` is
    /// equivalent to [`Cursor::peek`].
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        let mut lookahead = self.clone();
        for _ in 0..n {
            lookahead.advance()?;
        }
        lookahead.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_chain_walks_to_root() {
        let root = Line::new("#define N 5\n".into(), "a.sol".into(), 1, None);
        let include_site = Line::new("#include \"b.sol\"\n".into(), "a.sol".into(), 2, None);
        let included = Line::new("function f() {}\n".into(), "b.sol".into(), 1, Some(include_site.clone()));

        let chain: Vec<_> = included.include_chain().map(|l| l.file.clone()).collect();
        assert_eq!(chain, vec![PathBuf::from("b.sol"), PathBuf::from("a.sol")]);
        let _ = root;
    }

    #[test]
    fn cursor_crosses_line_boundary() {
        let l1 = Line::new("ab\n".into(), "x.sol".into(), 1, None);
        let l2 = Line::new("cd\n".into(), "x.sol".into(), 2, None);
        let stream = CharStream::new(vec![l1, l2]);
        let mut cur = stream.cursor();
        assert_eq!(cur.advance(), Some('a'));
        assert_eq!(cur.advance(), Some('b'));
        assert_eq!(cur.advance(), Some('\n'));
        // Consuming a line's last character crosses into the next line right
        // away, so `current_line`/`column` always describe the position of
        // the next unconsumed character -- the same position `peek` reports.
        assert_eq!(cur.current_line().unwrap().line_number, 2);
        assert_eq!(cur.column(), 0);
        assert_eq!(cur.advance(), Some('c'));
        assert_eq!(cur.current_line().unwrap().line_number, 2);
        assert_eq!(cur.column(), 1);
    }

    #[test]
    fn peek_nth_looks_past_line_boundary() {
        let l1 = Line::new("a\n".into(), "x.sol".into(), 1, None);
        let l2 = Line::new("bc\n".into(), "x.sol".into(), 2, None);
        let stream = CharStream::new(vec![l1, l2]);
        let cur = stream.cursor();
        assert_eq!(cur.peek_nth(0), Some('a'));
        assert_eq!(cur.peek_nth(1), Some('\n'));
        assert_eq!(cur.peek_nth(2), Some('b'));
        assert_eq!(cur.peek_nth(3), Some('c'));
    }

    #[test]
    fn span_text_slices_line() {
        let line = Line::new("int x = 1;\n".into(), "x.sol".into(), 1, None);
        let span = Span::new(line, 0, 3);
        assert_eq!(span.text(), "int");
    }
}
