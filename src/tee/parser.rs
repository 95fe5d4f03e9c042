//! Statsd line parsing.
//!
//! A datagram carries zero or more newline separated lines of the form
//! `key:body`. The key is everything up to the first colon and must not be
//! empty; the body is the rest of the line and is opaque to the tee.

use std::slice::Split;

/// One `key:body` unit borrowed from a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Metric key, without the separating colon.
    pub key: &'a [u8],

    /// Everything after the first colon, possibly empty.
    pub body: &'a [u8],
}

impl<'a> Record<'a> {
    /// Parse a single line. Returns `None` if the line has no colon or
    /// starts with one.
    #[must_use]
    pub fn parse_line(line: &'a [u8]) -> Option<Self> {
        let colon = line.iter().position(|&b| b == b':')?;
        if colon == 0 {
            return None;
        }

        Some(Self {
            key: &line[..colon],
            body: &line[colon + 1..],
        })
    }
}

fn is_newline(b: &u8) -> bool {
    *b == b'\n'
}

/// Iterator over the records of one datagram, in input order.
///
/// Empty lines are skipped. Malformed lines are skipped and counted.
#[derive(Debug)]
pub struct Records<'a> {
    lines: Split<'a, u8, fn(&u8) -> bool>,
    malformed: usize,
}

impl Records<'_> {
    /// Non-empty lines skipped so far because they were malformed.
    #[must_use]
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        for line in self.lines.by_ref() {
            if line.is_empty() {
                continue;
            }
            match Record::parse_line(line) {
                Some(record) => return Some(record),
                None => self.malformed += 1,
            }
        }
        None
    }
}

/// Iterate over the records in a raw datagram.
#[must_use]
pub fn parse_records(data: &[u8]) -> Records<'_> {
    Records {
        lines: data.split(is_newline as fn(&u8) -> bool),
        malformed: 0,
    }
}
