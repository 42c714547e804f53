//! The wheel `RECORD` manifest.
//!
//! A record is one line per shipped file:
//!
//! ```text
//! xspectrampoline/LibXSPEC_v6_35_1/lib/libXS.so,sha256=<digest>,10
//! xspectrampoline-0.1.0.dist-info/RECORD,,
//! ```
//!
//! The manifest's own entry carries neither hash nor size. Paths containing a
//! comma or a double quote are written CSV-style, wrapped in quotes with
//! embedded quotes doubled.

use std::fmt;

use crate::hash::RecordHash;

/// Errors raised while parsing a `RECORD` file.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordParseError {
    /// A line did not split into path, hash and size.
    #[error("line {line}: expected 3 comma-separated fields, got {found}")]
    FieldCount {
        /// 1-based line number.
        line: usize,
        /// Number of fields actually present.
        found: usize,
    },

    /// The path column was empty.
    #[error("line {line}: empty path")]
    EmptyPath {
        /// 1-based line number.
        line: usize,
    },

    /// A quoted path never closed its quote.
    #[error("line {line}: unterminated quoted path")]
    UnterminatedQuote {
        /// 1-based line number.
        line: usize,
    },

    /// The hash column was not `<algorithm>=<digest>`.
    #[error("invalid hash '{0}': expected <algorithm>=<digest>")]
    InvalidHash(String),

    /// The size column was not a decimal integer.
    #[error("line {line}: invalid size '{value}'")]
    InvalidSize {
        /// 1-based line number.
        line: usize,
        /// The offending text.
        value: String,
    },
}

/// One line of a `RECORD` manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Archive-relative path, always `/`-separated.
    pub path: String,
    /// Content hash; absent only for the manifest's own entry.
    pub hash: Option<RecordHash>,
    /// File size in bytes; absent only for the manifest's own entry.
    pub size: Option<u64>,
}

impl RecordEntry {
    /// Create a fully populated entry.
    pub fn new(path: impl Into<String>, hash: RecordHash, size: u64) -> Self {
        Self {
            path: path.into(),
            hash: Some(hash),
            size: Some(size),
        }
    }

    /// Create an entry with no hash and no size, as used for `RECORD` itself.
    pub fn unhashed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: None,
            size: None,
        }
    }

    /// Parse a single manifest line.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordParseError`] describing the first malformed column.
    pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
        parse_numbered(line, 1)
    }
}

impl fmt::Display for RecordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.contains([',', '"', '\n']) {
            write!(f, "\"{}\"", self.path.replace('"', "\"\""))?;
        } else {
            f.write_str(&self.path)?;
        }
        f.write_str(",")?;
        if let Some(hash) = &self.hash {
            write!(f, "{hash}")?;
        }
        f.write_str(",")?;
        if let Some(size) = self.size {
            write!(f, "{size}")?;
        }
        Ok(())
    }
}

fn parse_numbered(line: &str, number: usize) -> Result<RecordEntry, RecordParseError> {
    let line = line.trim_end_matches(['\r', '\n']);

    let (path, hash, size) = if let Some(quoted) = line.strip_prefix('"') {
        let (path, consumed) = unquote(quoted, number)?;
        let rest = &quoted[consumed..];
        let columns: Vec<&str> = rest.split(',').collect();
        match columns.as_slice() {
            ["", hash, size] => (path, *hash, *size),
            _ => {
                return Err(RecordParseError::FieldCount {
                    line: number,
                    found: columns.len(),
                });
            }
        }
    } else {
        // Lax tools leave commas in paths unquoted, so the two trailing
        // columns are split off from the right.
        let mut parts = line.rsplitn(3, ',');
        let (Some(size), Some(hash), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(RecordParseError::FieldCount {
                line: number,
                found: line.split(',').count(),
            });
        };
        (path.to_string(), hash, size)
    };

    if path.is_empty() {
        return Err(RecordParseError::EmptyPath { line: number });
    }

    let hash = if hash.is_empty() {
        None
    } else {
        Some(hash.parse::<RecordHash>()?)
    };
    let size = if size.is_empty() {
        None
    } else {
        Some(
            size.parse::<u64>()
                .map_err(|_| RecordParseError::InvalidSize {
                    line: number,
                    value: size.to_string(),
                })?,
        )
    };

    Ok(RecordEntry { path, hash, size })
}

/// Read a quoted path body (after the opening quote).
///
/// Returns the unescaped path and the byte offset just past the closing quote.
fn unquote(body: &str, number: usize) -> Result<(String, usize), RecordParseError> {
    let mut path = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '"' {
            path.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            path.push('"');
            continue;
        }
        return Ok((path, idx + 1));
    }
    Err(RecordParseError::UnterminatedQuote { line: number })
}

/// An ordered `RECORD` manifest.
///
/// Order is preserved for reproducible output but carries no meaning;
/// consumers look entries up by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<RecordEntry>,
}

impl Record {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whole manifest. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordParseError`] encountered.
    pub fn parse(text: &str) -> Result<Self, RecordParseError> {
        let entries = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| parse_numbered(line, idx + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// All entries in manifest order.
    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    /// Consume the manifest, yielding its entries.
    pub fn into_entries(self) -> Vec<RecordEntry> {
        self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one entry.
    pub fn push(&mut self, entry: RecordEntry) {
        self.entries.push(entry);
    }

    /// Keep only the entries matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&RecordEntry) -> bool) {
        self.entries.retain(keep);
    }

    /// First entry for `path`, if any.
    pub fn get(&self, path: &str) -> Option<&RecordEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Number of entries for `path`.
    pub fn count(&self, path: &str) -> usize {
        self.entries.iter().filter(|e| e.path == path).count()
    }

    /// Iterate over entries in manifest order.
    pub fn iter(&self) -> std::slice::Iter<'_, RecordEntry> {
        self.entries.iter()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

impl Extend<RecordEntry> for Record {
    fn extend<T: IntoIterator<Item = RecordEntry>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}

impl FromIterator<RecordEntry> for Record {
    fn from_iter<T: IntoIterator<Item = RecordEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a RecordEntry;
    type IntoIter = std::slice::Iter<'a, RecordEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
xspectrampoline/__init__.py,sha256=Zm9vYmFy,381
xspectrampoline-0.1.0.dist-info/WHEEL,sha256=YmFyYmF6,91
xspectrampoline-0.1.0.dist-info/RECORD,,";

    #[test]
    fn test_parse_sample_record() {
        let record = Record::parse(SAMPLE).unwrap();
        assert_eq!(record.len(), 3);

        let init = record.get("xspectrampoline/__init__.py").unwrap();
        assert_eq!(init.hash.as_ref().unwrap().digest(), "Zm9vYmFy");
        assert_eq!(init.size, Some(381));

        let own = record.get("xspectrampoline-0.1.0.dist-info/RECORD").unwrap();
        assert_eq!(own, &RecordEntry::unhashed("xspectrampoline-0.1.0.dist-info/RECORD"));
    }

    #[test]
    fn test_display_is_newline_joined_without_trailer() {
        let record = Record::parse(SAMPLE).unwrap();
        assert_eq!(record.to_string(), SAMPLE);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let record = Record::parse("\na,sha256=eA,1\n\n").unwrap();
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_quoted_path_with_comma() {
        let entry = RecordEntry::new("data/a,b \"c\".txt", RecordHash::new("sha256", "eA"), 4);
        let line = entry.to_string();
        assert_eq!(line, "\"data/a,b \"\"c\"\".txt\",sha256=eA,4");
        assert_eq!(RecordEntry::parse_line(&line).unwrap(), entry);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RecordEntry::parse_line("only-a-path"),
            Err(RecordParseError::FieldCount { line: 1, found: 1 })
        );
        assert_eq!(
            RecordEntry::parse_line(",sha256=eA,1"),
            Err(RecordParseError::EmptyPath { line: 1 })
        );
        assert!(matches!(
            RecordEntry::parse_line("a,sha256=eA,ten"),
            Err(RecordParseError::InvalidSize { .. })
        ));
        assert!(matches!(
            RecordEntry::parse_line("a,md5,1"),
            Err(RecordParseError::InvalidHash(_))
        ));
        assert_eq!(
            RecordEntry::parse_line("\"unterminated,sha256=eA,1"),
            Err(RecordParseError::UnterminatedQuote { line: 1 })
        );
    }

    #[test]
    fn test_error_reports_line_number() {
        let err = Record::parse("a,sha256=eA,1\nb,sha256=eA,x").unwrap_err();
        assert_eq!(
            err,
            RecordParseError::InvalidSize {
                line: 2,
                value: "x".to_string()
            }
        );
    }

    #[test]
    fn test_count_and_retain() {
        let mut record = Record::parse(SAMPLE).unwrap();
        record.push(RecordEntry::unhashed("xspectrampoline-0.1.0.dist-info/RECORD"));
        assert_eq!(record.count("xspectrampoline-0.1.0.dist-info/RECORD"), 2);

        record.retain(|e| !e.path.ends_with("/RECORD"));
        assert_eq!(record.count("xspectrampoline-0.1.0.dist-info/RECORD"), 0);
        assert_eq!(record.len(), 2);
    }
}
