//! Flat hex program listings
//!
//! The course toolchain emits programs as text listings, one 32-bit
//! instruction word in hexadecimal per line. A `#` starts a comment,
//! blank lines are ignored, and a line of the form `@ADDR` moves the
//! load origin. Words load at consecutive addresses from the origin,
//! which starts at the text base 0x00400000.

use std::fs;
use std::io;

use itertools::Itertools;
use thiserror::Error;

use crate::cpu::memory::Memory;

/// Load origin used when a listing has no `@ADDR` directive
pub const TEXT_BASE: u64 = 0x0040_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexFileError {
    #[error("error parsing '{entry}' on line {line}")]
    ParseFailed { line: usize, entry: String },
    #[error("hex file I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for HexFileError {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// If the line ends in a comment, remove it. If the result contains
/// any non-whitespace characters, return it trimmed. (Covers empty
/// lines and comment-only lines.)
fn get_non_comment(line: &str) -> Option<&str> {
    let without_comment = &line[0..line.find('#').unwrap_or(line.len())];
    let trimmed = without_comment.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

enum Entry {
    Origin(u64),
    Word(u32),
}

fn parse_hex(entry: &str) -> Option<u64> {
    let digits = entry.strip_prefix("0x").unwrap_or(entry);
    u64::from_str_radix(digits, 16).ok()
}

fn parse_entry(line: usize, entry: &str) -> Result<Entry, HexFileError> {
    let parse_failed = || HexFileError::ParseFailed {
        line,
        entry: entry.to_string(),
    };
    if let Some(origin) = entry.strip_prefix('@') {
        let origin = parse_hex(origin).ok_or_else(parse_failed)?;
        Ok(Entry::Origin(origin))
    } else {
        let word = parse_hex(entry)
            .and_then(|word| u32::try_from(word).ok())
            .ok_or_else(parse_failed)?;
        Ok(Entry::Word(word))
    }
}

/// Parse a listing into (address, word) pairs
pub fn parse_listing(text: &str) -> Result<Vec<(u64, u32)>, HexFileError> {
    let entries: Vec<Entry> = text
        .lines()
        .enumerate()
        .filter_map(|(n, line)| get_non_comment(line).map(|entry| (n + 1, entry)))
        .map(|(n, entry)| parse_entry(n, entry))
        .try_collect()?;

    let mut words = Vec::new();
    let mut addr = TEXT_BASE;
    for entry in entries {
        match entry {
            Entry::Origin(origin) => addr = origin,
            Entry::Word(word) => {
                words.push((addr, word));
                addr = addr.wrapping_add(4);
            }
        }
    }
    Ok(words)
}

/// Read a listing from disk and load it into memory. Returns the
/// address of the first word, for use as the starting pc.
pub fn load_hex_file(memory: &mut Memory, path: &str) -> Result<u64, HexFileError> {
    let text = fs::read_to_string(path)?;
    let words = parse_listing(&text)?;
    let start = words.first().map_or(TEXT_BASE, |(addr, _)| *addr);
    for (addr, word) in words {
        memory.write32(addr, word);
    }
    Ok(start)
}
