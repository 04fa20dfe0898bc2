//! Index line codec.
//!
//! # Responsibility
//! - Normalize one raw index line into an entry (or nothing).
//! - Serialize a header plus entries into the persisted line format.
//!
//! # Invariants
//! - `parse_line` is pure and total; it never fails.
//! - Everything from the first `#` onward is a comment. Escapes are not
//!   recognized.
//! - Every ASCII whitespace character is deleted, including internal ones
//!   (`" com . acme . Foo "` -> `"com.acme.Foo"`). Kept for compatibility
//!   with existing index files; entries with meaningful internal spaces are
//!   not representable.

use crate::index::model::{Bucket, Entry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, BufRead, Write};

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#.*").expect("valid comment regex"));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\n\x0B\x0C\r]+").expect("valid whitespace regex"));

/// Parses one raw line into an entry.
///
/// Returns `None` for blank, whitespace-only and comment-only lines.
pub fn parse_line(raw: &str) -> Option<Entry> {
    let without_comment = COMMENT_RE.replace(raw, "");
    let normalized = WHITESPACE_RE.replace_all(&without_comment, "");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.into_owned())
    }
}

/// Decodes every line from `reader` and unions the entries into `bucket`.
///
/// Returns how many lines yielded an entry (duplicates included).
///
/// # Errors
/// - Returns read errors from the underlying reader, including invalid
///   UTF-8. Entries decoded before the failure are already in `bucket`.
pub fn read_entries(reader: impl BufRead, bucket: &mut Bucket) -> io::Result<usize> {
    let mut yielded = 0;
    for line in reader.lines() {
        if let Some(entry) = parse_line(&line?) {
            bucket.insert(entry);
            yielded += 1;
        }
    }
    Ok(yielded)
}

/// Decodes a whole in-memory index file.
pub fn parse_file(text: &str) -> Bucket {
    text.lines().filter_map(parse_line).collect()
}

/// Serializes `header` followed by one line per entry, in iteration order.
pub fn serialize_file<'a>(header: &str, entries: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    std::iter::once(header.to_string())
        .chain(entries.into_iter().map(str::to_string))
        .collect()
}

/// Writes the serialized form of `header` + `entries` to `writer`.
///
/// Every line, including the last, is newline-terminated.
pub fn write_file<'a>(
    writer: &mut impl Write,
    header: &str,
    entries: impl IntoIterator<Item = &'a str>,
) -> io::Result<()> {
    for line in serialize_file(header, entries) {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::{parse_file, parse_line, read_entries, serialize_file, write_file};
    use crate::index::model::Bucket;
    use std::io::Cursor;

    #[test]
    fn strips_trailing_comment() {
        assert_eq!(
            parse_line("com.acme.Foo # note").as_deref(),
            Some("com.acme.Foo")
        );
    }

    #[test]
    fn deletes_internal_whitespace() {
        assert_eq!(
            parse_line(" com . acme . Foo ").as_deref(),
            Some("com.acme.Foo")
        );
        assert_eq!(parse_line("\tcom.acme\x0B.Bar\r").as_deref(), Some("com.acme.Bar"));
    }

    #[test]
    fn blank_and_comment_only_lines_yield_nothing() {
        for raw in ["", "   ", "# just a comment", "  # indented comment", "\t\r"] {
            assert_eq!(parse_line(raw), None, "line {raw:?} should yield nothing");
        }
    }

    #[test]
    fn escaped_hash_still_starts_comment() {
        assert_eq!(parse_line(r"com.acme.Foo\#Inner").as_deref(), Some(r"com.acme.Foo\"));
    }

    #[test]
    fn keeps_non_ascii_whitespace() {
        assert_eq!(
            parse_line("com.acme.\u{00A0}Foo").as_deref(),
            Some("com.acme.\u{00A0}Foo")
        );
    }

    #[test]
    fn serialize_emits_header_first() {
        let lines = serialize_file("# Generated by test", ["a.A", "b.B"]);
        assert_eq!(lines, vec!["# Generated by test", "a.A", "b.B"]);
    }

    #[test]
    fn written_file_round_trips_to_same_set() {
        let entries: Bucket = ["com.acme.Foo", "com.acme.Bar", "org.other.Baz"]
            .iter()
            .map(|value| value.to_string())
            .collect();
        let mut buffer = Vec::new();
        write_file(&mut buffer, "# header", entries.iter().map(String::as_str))
            .expect("write to vec");

        let text = String::from_utf8(buffer).expect("utf8 output");
        assert!(text.ends_with('\n'));
        assert_eq!(parse_file(&text), entries);
    }

    #[test]
    fn read_entries_merges_duplicates_into_bucket() {
        let mut bucket = Bucket::new();
        let yielded = read_entries(Cursor::new("a.A\na.A # again\n\nb.B\n"), &mut bucket)
            .expect("read from cursor");
        assert_eq!(yielded, 3);
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn read_entries_reports_invalid_utf8() {
        let mut bucket = Bucket::new();
        let err = read_entries(Cursor::new(vec![0x61, 0xff, 0x0a]), &mut bucket)
            .expect_err("invalid utf8 must fail");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
