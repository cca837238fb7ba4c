//! Pattern matching against accumulated pty output.

use regex::bytes::Regex;

/// Something that can be searched for in child output.
///
/// Regexes are the usual choice; plain strings match literally.
pub trait Pattern: Send + Sync {
    /// Returns the byte offset where the first match ends, or None if no match.
    fn find_match(&self, data: &[u8]) -> Option<usize>;

    fn is_match(&self, data: &[u8]) -> bool {
        self.find_match(data).is_some()
    }
}

impl Pattern for Regex {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        self.find(data).map(|m| m.end())
    }

    fn is_match(&self, data: &[u8]) -> bool {
        Regex::is_match(self, data)
    }
}

impl Pattern for str {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        memchr::memmem::find(data, self.as_bytes()).map(|start| start + self.len())
    }
}

impl Pattern for String {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        self.as_str().find_match(data)
    }
}

impl<T: Pattern + ?Sized> Pattern for &T {
    fn find_match(&self, data: &[u8]) -> Option<usize> {
        (**self).find_match(data)
    }

    fn is_match(&self, data: &[u8]) -> bool {
        (**self).is_match(data)
    }
}

/// Index of the first pattern, by position in `patterns`, that matches
/// anywhere in `data`.
///
/// Priority is positional: a later pattern never wins because its match
/// starts earlier in the buffer.
pub(crate) fn first_match<P: Pattern>(patterns: &[P], data: &[u8]) -> Option<usize> {
    patterns.iter().position(|p| p.is_match(data))
}
