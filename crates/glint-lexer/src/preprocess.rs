//! Textual include/define preprocessor, run before tokenization.
//!
//! Grounded in `original_source/src/preprocess/Preprocess.cpp`: single-pass
//! `#include`/`#define` handling with no macro functions, no conditionals,
//! and substitution limited to plain textual replacement.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use glint_common::error::{CompileError, Result, Stage};
use glint_common::{CharStream, Diagnostic, Line, Span};
use rustc_hash::FxHashMap;

const DEFAULT_MAX_INCLUDE_DEPTH: u32 = 64;

pub struct Preprocessor {
    defines: FxHashMap<String, String>,
    max_include_depth: u32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor {
            defines: FxHashMap::default(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Preprocessor::default()
    }

    pub fn with_max_include_depth(max_include_depth: u32) -> Self {
        Preprocessor {
            max_include_depth,
            ..Preprocessor::default()
        }
    }

    pub fn preprocess(&mut self, root: &Path) -> Result<CharStream> {
        let mut lines = Vec::new();
        self.process_file(root, None, 0, &mut lines)?;
        Ok(CharStream::new(lines))
    }

    fn process_file(
        &mut self,
        path: &Path,
        included_from: Option<Rc<Line>>,
        depth: u32,
        out: &mut Vec<Rc<Line>>,
    ) -> Result<()> {
        if depth > self.max_include_depth {
            let site = included_from.expect("depth overflow only reachable via an include site");
            let span = Span::new(site, 0, 0);
            return Err(CompileError::new(
                Stage::Preprocess,
                Diagnostic::error(
                    span,
                    format!("include depth exceeded {} while opening {}", self.max_include_depth, path.display()),
                    "include cycle or excessive nesting",
                ),
            ));
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::warn!("could not open file {}", path.display());
                return Ok(());
            }
        };

        let display_path = relative_to_cwd(path);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        for (idx, raw_line) in content.lines().enumerate() {
            let line_number = idx as u32 + 1;
            let trimmed = raw_line.trim_start();

            if trimmed.starts_with("#include") {
                let this_line = Line::new(format!("{raw_line}\n"), display_path.clone(), line_number, included_from.clone());
                self.process_include(trimmed, &dir, this_line, depth, out)?;
            } else if trimmed.starts_with("#define") {
                self.process_define(trimmed);
            } else {
                let mut text = self.substitute_defines(raw_line);
                text.push('\n');
                out.push(Line::new(text, display_path.clone(), line_number, included_from.clone()));
            }
        }

        Ok(())
    }

    fn process_include(
        &mut self,
        trimmed: &str,
        dir: &Path,
        include_line: Rc<Line>,
        depth: u32,
        out: &mut Vec<Rc<Line>>,
    ) -> Result<()> {
        let Some(left) = trimmed.find('"') else {
            tracing::warn!("invalid include directive: {trimmed}");
            return Ok(());
        };
        let Some(right) = trimmed.rfind('"').filter(|r| *r > left) else {
            tracing::warn!("invalid include directive: {trimmed}");
            return Ok(());
        };
        let filename = &trimmed[left + 1..right];
        let included_path = dir.join(filename);
        self.process_file(&included_path, Some(include_line), depth + 1, out)
    }

    /// Substitute every registered `#define` into `line` in a single
    /// left-to-right scan over the *original* text. At each position we
    /// pick whichever key matches (longest key first, so one key being a
    /// prefix of another is not ambiguous) and copy its value verbatim into
    /// the output without re-scanning that value for further matches --
    /// `#define A B` / `#define B C` must not turn an `A` into `C`.
    fn substitute_defines(&self, line: &str) -> String {
        if self.defines.is_empty() {
            return line.to_string();
        }
        let mut keys: Vec<&str> = self.defines.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut out = String::with_capacity(line.len());
        let mut pos = 0;
        while pos < line.len() {
            let rest = &line[pos..];
            match keys.iter().find(|key| rest.starts_with(**key)) {
                Some(key) => {
                    out.push_str(&self.defines[*key]);
                    pos += key.len();
                }
                None => {
                    let ch = rest.chars().next().expect("pos < line.len() guarantees a char remains");
                    out.push(ch);
                    pos += ch.len_utf8();
                }
            }
        }
        out
    }

    fn process_define(&mut self, trimmed: &str) {
        let mut parts = trimmed.split_whitespace();
        let keyword = parts.next();
        let key = parts.next();
        let value = parts.next();
        match (keyword, key, value) {
            (Some("#define"), Some(key), Some(value)) => {
                self.defines.insert(key.to_string(), value.to_string());
            }
            _ => tracing::warn!("invalid #define format: {trimmed}"),
        }
    }
}

fn relative_to_cwd(path: &Path) -> PathBuf {
    let Ok(cwd) = std::env::current_dir() else {
        return path.to_path_buf();
    };
    path.strip_prefix(&cwd).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defines_are_substituted_textually() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_file(dir.path(), "a.sol", "#define N 5\nint x = N;\n");
        let mut pp = Preprocessor::new();
        let stream = pp.preprocess(&root).unwrap();
        assert_eq!(stream.lines().len(), 1);
        assert_eq!(stream.lines()[0].text, "int x = 5;\n");
    }

    #[test]
    fn redefinition_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_file(dir.path(), "a.sol", "#define N 5\n#define N 9\nint x = N;\n");
        let mut pp = Preprocessor::new();
        let stream = pp.preprocess(&root).unwrap();
        assert_eq!(stream.lines()[0].text, "int x = 9;\n");
    }

    #[test]
    fn a_substitution_is_not_rescanned_for_other_defines() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_file(dir.path(), "a.sol", "#define A B\n#define B C\nint x = A;\n");
        let mut pp = Preprocessor::new();
        let stream = pp.preprocess(&root).unwrap();
        assert_eq!(stream.lines()[0].text, "int x = B;\n");
    }

    #[test]
    fn include_splices_lines_with_site_as_included_from() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.sol", "int y = 1;\n");
        let root = write_file(dir.path(), "a.sol", "#include \"b.sol\"\nint z = 2;\n");
        let mut pp = Preprocessor::new();
        let stream = pp.preprocess(&root).unwrap();
        assert_eq!(stream.lines().len(), 2);
        assert_eq!(stream.lines()[0].text, "int y = 1;\n");
        let included_from = stream.lines()[0].included_from.as_ref().unwrap();
        assert_eq!(included_from.line_number, 1);
        assert_eq!(stream.lines()[1].text, "int z = 2;\n");
    }

    #[test]
    fn missing_include_is_a_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_file(dir.path(), "a.sol", "#include \"missing.sol\"\nint z = 2;\n");
        let mut pp = Preprocessor::new();
        let stream = pp.preprocess(&root).unwrap();
        assert_eq!(stream.lines().len(), 1);
        assert_eq!(stream.lines()[0].text, "int z = 2;\n");
    }

    #[test]
    fn include_cycle_hits_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.sol", "#include \"a.sol\"\n");
        let root = dir.path().join("a.sol");
        let mut pp = Preprocessor::with_max_include_depth(8);
        let err = pp.preprocess(&root).unwrap_err();
        assert!(err.to_string().contains("include depth exceeded"));
    }
}
