//! Cursor-based scanning primitives.
//!
//! [`Scanner`] advances through a source string against [`Pattern`]
//! matchers. Two scanners cooperate during compilation: the main scanner
//! splits on tag boundaries, a helper scanner splits the text between
//! tags on `{{ }}` delimiter boundaries.
//!
//! # Invariants
//!
//! - `next_before` leaves the cursor at the start of the match (or at the
//!   end of input when nothing matches).
//! - `next_after` only consumes a match anchored at the cursor; an
//!   unanchored match consumes nothing.
//! - All match offsets fall on UTF-8 boundaries; the matched syntax is
//!   pure ASCII.

use memchr::{memchr, memmem};

/// Byte span of a pattern hit within a haystack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub start: usize,
    pub end: usize,
}

/// Leftmost-match search over a string slice.
pub trait Pattern {
    fn find(&self, haystack: &str) -> Option<Hit>;
}

/// `<tag` or `</tag`: `<`, optional `/`, then a name starting with a
/// letter or dash and continuing with word characters or dashes.
pub struct OpeningTag;

/// `>` or `/>`.
pub struct ClosingTag;

/// `{{` or `{{{`, plus any trailing whitespace.
pub struct OpeningDelimiter;

/// `}}` or `}}}`, plus any leading whitespace.
pub struct ClosingDelimiter;

fn is_tag_name_start(byte: u8) -> bool {
    byte == b'-' || byte.is_ascii_alphabetic()
}

fn is_tag_name_part(byte: u8) -> bool {
    byte == b'-' || byte == b'_' || byte.is_ascii_alphanumeric()
}

impl Pattern for OpeningTag {
    fn find(&self, haystack: &str) -> Option<Hit> {
        let bytes = haystack.as_bytes();
        let mut from = 0;
        while let Some(offset) = memchr(b'<', &bytes[from..]) {
            let start = from + offset;
            let mut cursor = start + 1;
            if bytes.get(cursor) == Some(&b'/') {
                cursor += 1;
            }
            if bytes.get(cursor).copied().is_some_and(is_tag_name_start) {
                cursor += 1;
                while bytes.get(cursor).copied().is_some_and(is_tag_name_part) {
                    cursor += 1;
                }
                return Some(Hit { start, end: cursor });
            }
            from = start + 1;
        }
        None
    }
}

impl Pattern for ClosingTag {
    fn find(&self, haystack: &str) -> Option<Hit> {
        let bytes = haystack.as_bytes();
        let index = memchr(b'>', bytes)?;
        let start = if index > 0 && bytes[index - 1] == b'/' {
            index - 1
        } else {
            index
        };
        Some(Hit {
            start,
            end: index + 1,
        })
    }
}

impl Pattern for OpeningDelimiter {
    fn find(&self, haystack: &str) -> Option<Hit> {
        let bytes = haystack.as_bytes();
        let index = memmem::find(bytes, b"{{")?;
        let mut end = index + 2;
        if bytes.get(end) == Some(&b'{') {
            end += 1;
        }
        for ch in haystack[end..].chars() {
            if !ch.is_whitespace() {
                break;
            }
            end += ch.len_utf8();
        }
        Some(Hit { start: index, end })
    }
}

impl Pattern for ClosingDelimiter {
    fn find(&self, haystack: &str) -> Option<Hit> {
        let bytes = haystack.as_bytes();
        let index = memmem::find(bytes, b"}}")?;
        let mut start = index;
        for ch in haystack[..index].chars().rev() {
            if !ch.is_whitespace() {
                break;
            }
            start -= ch.len_utf8();
        }
        let mut end = index + 2;
        if bytes.get(end) == Some(&b'}') {
            end += 1;
        }
        Some(Hit { start, end })
    }
}

/// Forward-only cursor over a source string.
#[derive(Debug)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Scanner<'a> {
        Scanner { src, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.src.len()
    }

    fn tail(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Byte at `offset` from the cursor, if any.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    pub fn forward(&mut self, amount: usize) {
        self.pos = (self.pos + amount).min(self.src.len());
    }

    /// Everything before the next pattern hit; the cursor stops at the
    /// hit. When the pattern never matches, the rest of the input is
    /// consumed and returned.
    pub fn next_before(&mut self, pattern: &dyn Pattern) -> &'a str {
        let tail = self.tail();
        match pattern.find(tail) {
            Some(hit) => {
                self.pos += hit.start;
                &tail[..hit.start]
            }
            None => {
                self.pos = self.src.len();
                tail
            }
        }
    }

    /// The pattern hit itself, consumed, when it sits exactly at the
    /// cursor. Anything else consumes nothing and returns `""`.
    pub fn next_after(&mut self, pattern: &dyn Pattern) -> &'a str {
        let tail = self.tail();
        match pattern.find(tail) {
            Some(hit) if hit.start == 0 => {
                self.pos += hit.end;
                &tail[..hit.end]
            }
            _ => "",
        }
    }
}
