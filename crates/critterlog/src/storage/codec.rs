//! Line codec for the sighting file.
//!
//! Each record is one JSON object on one line. Decoding is lenient: a line
//! that is blank or does not hold a sighting yields `None`, and callers skip
//! it rather than failing the whole read.

use crate::error::Result;
use crate::sighting::Sighting;

/// Encode a sighting as a single line of JSON, without the trailing newline.
///
/// `serde_json` escapes control characters inside strings, so the output
/// never contains a literal newline.
///
/// # Errors
///
/// Returns an error if serialization fails (non-finite coordinates).
pub fn encode(sighting: &Sighting) -> Result<String> {
    Ok(serde_json::to_string(sighting)?)
}

/// Decode one line into a sighting.
///
/// Returns `None` for blank lines and for anything that is not a JSON object
/// carrying at least `lat` and `lng`. A missing `category` decodes as
/// `other`.
#[must_use]
pub fn decode(line: &str) -> Option<Sighting> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// Split raw file contents into its non-blank lines.
///
/// `\n`, `\r\n` and bare `\r` all end a line. Each line is checked for
/// UTF-8 on its own, so one damaged line comes back as `None` without
/// affecting its neighbours.
pub fn split_lines(content: &[u8]) -> impl Iterator<Item = Option<&str>> {
    content
        .split(|b| *b == b'\n' || *b == b'\r')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| std::str::from_utf8(line).ok())
}
