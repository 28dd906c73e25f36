//! Direct (in-process) line searcher

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::reader::strip_bom;
use super::{CompiledFilter, LineSearcher, SearchFailure};

/// Lines scanned between checks of the cancellation signal
const CANCEL_CHECK_LINES: u64 = 4096;

/// Sequential scan with the compiled pattern
///
/// Lines are split on `\n` only and matched as raw bytes, the same line model
/// ripgrep uses without `--crlf`, so both paths agree on which lines match.
/// A leading UTF-8 byte-order mark is not part of line 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSearcher;

impl LineSearcher for DirectSearcher {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn matching_lines(
        &self,
        path: &Path,
        filter: &CompiledFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<u64>, SearchFailure> {
        let file = File::open(path).map_err(SearchFailure::Io)?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_number = 0u64;
        let mut lines = Vec::new();

        loop {
            if line_number % CANCEL_CHECK_LINES == 0 && cancel.is_cancelled() {
                return Err(SearchFailure::Cancelled);
            }
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(SearchFailure::Io)?;
            if read == 0 {
                break;
            }
            line_number += 1;
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            if filter.regex().is_match(strip_bom(line_number, &buf)) {
                lines.push(line_number);
            }
        }

        Ok(lines)
    }
}
