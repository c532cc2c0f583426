//! Host editor collaborators.
//!
//! The tree engine never touches the filesystem or an editor directly. It sees
//! documents through these small value types:
//! - `TextBuffer` - Full text of one document with line lookups
//! - `Scanner` - Resumable case-insensitive forward search over a buffer
//! - `EditorContext` - The active document and cursor line
//! - `Workspace` - Root directory, path relativization, document loading

use crate::{Error, Result};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// Full text of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text of a 1-based line without its terminator, or `None` past the end.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.text
            .split('\n')
            .nth(index)
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
    }

    /// 1-based line containing byte `offset`, clamped to the buffer.
    pub fn line_for_offset(&self, offset: usize) -> u32 {
        let mut end = offset.min(self.text.len());
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        let newlines = self.text[..end].bytes().filter(|b| *b == b'\n').count();
        u32::try_from(newlines + 1).unwrap_or(u32::MAX)
    }

    /// A scanner positioned at the start of the buffer.
    pub fn scanner(&self) -> Scanner<'_> {
        Scanner::new(&self.text)
    }

    /// Number of non-overlapping case-insensitive occurrences of `needle`.
    pub fn count_occurrences(&self, needle: &str) -> Result<usize> {
        self.scanner().count(needle)
    }
}

/// A search hit: byte range of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

/// Forward literal search with a resumable location.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    haystack: &'a str,
    location: usize,
    case_insensitive: bool,
    /// Last compiled needle, reused while the needle stays the same
    pattern: Option<(String, Regex)>,
}

impl<'a> Scanner<'a> {
    pub fn new(haystack: &'a str) -> Self {
        Self {
            haystack,
            location: 0,
            case_insensitive: true,
            pattern: None,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self.pattern = None;
        self
    }

    pub fn location(&self) -> usize {
        self.location
    }

    pub fn set_location(&mut self, location: usize) {
        self.location = location.min(self.haystack.len());
    }

    /// Find the next occurrence of `needle` at or after the current location.
    ///
    /// On a hit the location moves to the start of the match.
    pub fn scan_to(&mut self, needle: &str) -> Result<Option<Match>> {
        if needle.is_empty() {
            return Ok(None);
        }
        let re = self.compiled(needle)?;

        let mut from = self.location.min(self.haystack.len());
        while !self.haystack.is_char_boundary(from) {
            from += 1;
        }
        Ok(re.find_at(self.haystack, from).map(|m| {
            self.location = m.start();
            Match {
                start: m.start(),
                end: m.end(),
            }
        }))
    }

    /// Regex for `needle`, compiled once per distinct needle.
    fn compiled(&mut self, needle: &str) -> Result<Regex> {
        if let Some((cached, re)) = &self.pattern {
            if cached == needle {
                return Ok(re.clone());
            }
        }
        let re = RegexBuilder::new(&regex::escape(needle))
            .case_insensitive(self.case_insensitive)
            .build()
            .map_err(|e| Error::Validation(format!("Cannot search for {:?}: {}", needle, e)))?;
        self.pattern = Some((needle.to_string(), re.clone()));
        Ok(re)
    }

    /// Count non-overlapping occurrences from the current location.
    pub fn count(&mut self, needle: &str) -> Result<usize> {
        let mut n = 0;
        while let Some(m) = self.scan_to(needle)? {
            n += 1;
            self.set_location(m.end.max(m.start + 1));
        }
        Ok(n)
    }
}

/// What the editor is looking at when the user bookmarks a line.
#[derive(Debug, Clone, Default)]
pub struct EditorContext {
    /// Workspace-relative path of the active document
    pub path: Option<String>,
    pub buffer: TextBuffer,
    /// 1-based cursor line
    pub cursor_line: u32,
}

impl EditorContext {
    pub fn new(path: impl Into<String>, buffer: TextBuffer, cursor_line: u32) -> Self {
        Self {
            path: Some(path.into()),
            buffer,
            cursor_line,
        }
    }

    /// Text of the cursor line, if it exists.
    pub fn current_line(&self) -> Option<&str> {
        self.buffer.line_text(self.cursor_line)
    }
}

/// The project root that waypoint paths are relative to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Workspace-relative, `/`-separated form of `path`.
    ///
    /// Relative inputs are taken as already relative to the root. Returns
    /// `None` for absolute paths outside the workspace.
    pub fn relativize(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            abs.strip_prefix(&self.root).ok()?.to_path_buf()
        } else {
            path.to_path_buf()
        };
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Absolute path of a workspace-relative path.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).is_file()
    }

    /// Read a document into a buffer.
    pub fn open_document(&self, rel: &str) -> Result<TextBuffer> {
        let path = self.resolve(rel);
        if !path.exists() {
            return Err(Error::NotFound(format!("Document {}", rel)));
        }
        Ok(TextBuffer::new(fs::read_to_string(&path)?))
    }

    /// Editor context for `rel` with the cursor on `line`.
    pub fn editor_context(&self, rel: &str, line: u32) -> Result<EditorContext> {
        Ok(EditorContext::new(rel, self.open_document(rel)?, line))
    }
}
