//! Per-destination key rewriting.

use std::borrow::Cow;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use regex::bytes::{Regex, RegexBuilder};

/// A downstream endpoint together with its key rewrite rule.
#[derive(Clone)]
pub struct Destination {
    address: String,
    pattern: Regex,
    replacement: Vec<u8>,
}

impl Destination {
    /// Compile a destination from its parts.
    ///
    /// `\w`, `\d`, `\s`, their negations and `\b` match ASCII only; other
    /// classes and literals stay Unicode aware.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(
        address: impl Into<String>,
        pattern: &str,
        replacement: impl Into<Vec<u8>>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            address: address.into(),
            pattern: RegexBuilder::new(&ascii_perl_classes(pattern)).build()?,
            replacement: replacement.into(),
        })
    }

    /// The `host:port` this destination forwards to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Rewrite a metric key.
    ///
    /// Every non-overlapping match of the pattern is replaced by the expanded
    /// template; `$1` and `${name}` refer to capture groups. A key with no
    /// match is returned borrowed and unchanged.
    #[must_use]
    pub fn rewrite_key<'k>(&self, key: &'k [u8]) -> Cow<'k, [u8]> {
        self.pattern.replace_all(key, self.replacement.as_slice())
    }
}

/// Rewrite Perl classes to ASCII POSIX classes and `\b`/`\B` to ASCII word
/// boundaries. Escapes and bracket nesting are tracked so literal
/// backslashes and class contents stay intact.
fn ascii_perl_classes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(e) => match (posix_class(e), class_depth) {
                    (Some(class), 0) => {
                        out.push('[');
                        out.push_str(class);
                        out.push(']');
                    },
                    (Some(class), _) => out.push_str(class),
                    (None, 0) if matches!(e, 'b' | 'B') => {
                        out.push_str("(?-u:\\");
                        out.push(e);
                        out.push(')');
                    },
                    (None, _) => {
                        out.push('\\');
                        out.push(e);
                    },
                },
                None => out.push('\\'),
            },
            '[' => {
                class_depth += 1;
                out.push('[');
                push_class_prefix(&mut chars, &mut out);
            },
            ']' if class_depth > 0 => {
                class_depth -= 1;
                out.push(']');
            },
            _ => out.push(c),
        }
    }

    out
}

/// A `]` right after `[` or `[^` is a literal, not the end of the class.
fn push_class_prefix(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    if let Some(&'^') = chars.peek() {
        chars.next();
        out.push('^');
    }
    if let Some(&']') = chars.peek() {
        chars.next();
        out.push(']');
    }
}

fn posix_class(escape: char) -> Option<&'static str> {
    match escape {
        'w' => Some("[:word:]"),
        'W' => Some("[:^word:]"),
        'd' => Some("[:digit:]"),
        'D' => Some("[:^digit:]"),
        's' => Some("[:space:]"),
        'S' => Some("[:^space:]"),
        _ => None,
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("address", &self.address)
            .field("pattern", &self.pattern.as_str())
            .field("replacement", &String::from_utf8_lossy(&self.replacement))
            .finish()
    }
}
