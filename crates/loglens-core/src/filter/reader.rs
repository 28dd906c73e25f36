//! Bounded file reads shared by both search paths

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use super::{FileError, FileErrorKind, MatchRecord};

/// Bytes inspected for a NUL when classifying binary files
const BINARY_PROBE_BYTES: usize = 8 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Drop a UTF-8 byte-order mark from the first line of a file
///
/// ripgrep sniffs and removes the mark before matching; both paths must see
/// the same first line.
pub(super) fn strip_bom(line_number: u64, raw: &[u8]) -> &[u8] {
    if line_number == 1 {
        raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
    } else {
        raw
    }
}

/// Check a file is readable text before searching it
pub(super) fn probe(path: &Path) -> Result<(), FileError> {
    let mut file = File::open(path).map_err(|e| FileError::from_io(path, &e))?;
    let mut head = Vec::with_capacity(BINARY_PROBE_BYTES);
    file.by_ref()
        .take(BINARY_PROBE_BYTES as u64)
        .read_to_end(&mut head)
        .map_err(|e| FileError::from_io(path, &e))?;

    if head.contains(&0) {
        return Err(FileError {
            path: path.to_path_buf(),
            kind: FileErrorKind::Binary,
            message: "binary content".to_string(),
        });
    }
    Ok(())
}

/// Read the matched lines and up to `context_after` following lines each
///
/// Reads stop at the last line any match needs or at end of file, whichever
/// comes first. `lines` must be ascending.
pub(super) fn capture(
    path: &Path,
    lines: &[u64],
    context_after: usize,
) -> io::Result<Vec<MatchRecord>> {
    let Some(&last_match) = lines.last() else {
        return Ok(Vec::new());
    };
    let last_needed = last_match.saturating_add(context_after as u64);

    let mut needed = lines.iter().peekable();
    let mut window_end = 0u64;
    let mut kept: HashMap<u64, String> = HashMap::new();

    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();
    let mut line_number = 0u64;

    while line_number < last_needed {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;

        while let Some(&&m) = needed.peek() {
            if m > line_number {
                break;
            }
            window_end = window_end.max(m.saturating_add(context_after as u64));
            needed.next();
        }
        if line_number <= window_end {
            kept.insert(line_number, decode_line(strip_bom(line_number, &buf)));
        }
    }

    let records = lines
        .iter()
        .filter_map(|&m| {
            let line = kept.get(&m)?.clone();
            let context = (m + 1..=m.saturating_add(context_after as u64))
                .map_while(|n| kept.get(&n).cloned())
                .collect();
            Some(MatchRecord {
                path: path.to_path_buf(),
                line_number: m,
                line,
                context,
            })
        })
        .collect();

    Ok(records)
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::write_file;
    use tempfile::TempDir;

    #[test]
    fn test_capture_stops_at_eof() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", "1\n2\n3\n4\n");

        let records = capture(&path, &[2, 4], 3).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, "2");
        assert_eq!(records[0].context, vec!["3", "4"]);
        assert_eq!(records[1].line, "4");
        assert!(records[1].context.is_empty());
    }

    #[test]
    fn test_capture_strips_crlf() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "win.log", "hit\r\nnext\r\n");

        let records = capture(&path, &[1], 1).unwrap();
        assert_eq!(records[0].line, "hit");
        assert_eq!(records[0].context, vec!["next"]);
    }

    #[test]
    fn test_capture_ignores_lines_past_eof() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.log", "only\n");

        // A stale line number (file shrank between search and capture)
        let records = capture(&path, &[1, 9], 0).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_capture_drops_bom_on_first_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bom.log");
        std::fs::write(&path, b"\xEF\xBB\xBFfirst\n\xEF\xBB\xBFsecond\n").unwrap();

        let records = capture(&path, &[1], 1).unwrap();
        assert_eq!(records[0].line, "first");
        // Only a leading mark is dropped
        assert_eq!(records[0].context, vec!["\u{feff}second"]);
    }

    #[test]
    fn test_probe_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"abc\0def").unwrap();

        let err = probe(&path).unwrap_err();
        assert_eq!(err.kind, FileErrorKind::Binary);
    }
}
