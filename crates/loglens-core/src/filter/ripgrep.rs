//! External line searcher backed by ripgrep

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CompiledFilter, LineSearcher, SearchFailure};

/// Interval between exit checks of a running search process
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Runs the search utility once per file and parses its line numbers
#[derive(Debug, Clone)]
pub struct ExternalSearcher {
    binary: PathBuf,
}

impl ExternalSearcher {
    /// Use an explicit binary path without probing
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve a binary name on PATH; `None` when it is not installed
    pub fn locate(binary: &str) -> Option<Self> {
        which::which(binary).ok().map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, path: &Path, filter: &CompiledFilter) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--no-config",
            "--line-number",
            "--with-filename",
            "--null",
            "--no-heading",
            "--color",
            "never",
            "--text",
        ]);
        cmd.arg(if filter.spec().case_sensitive {
            "--case-sensitive"
        } else {
            "--ignore-case"
        });
        cmd.arg("--regexp")
            .arg(filter.pattern())
            .arg("--")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run to completion, or kill the process once `cancel` fires
    fn run(
        &self,
        path: &Path,
        filter: &CompiledFilter,
        cancel: &CancellationToken,
    ) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), SearchFailure> {
        let mut child = self
            .command(path, filter)
            .spawn()
            .map_err(|e| SearchFailure::Tool(format!("failed to run {}: {}", self.binary.display(), e)))?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes drain on their own threads so a full pipe never stalls the wait
        thread::scope(|scope| {
            let out = scope.spawn(move || drain(stdout));
            let err = scope.spawn(move || drain(stderr));
            let status = wait_or_kill(&mut child, cancel);
            let out = out.join().unwrap_or_default();
            let err = err.join().unwrap_or_default();
            status.map(|status| (status, out, err))
        })
    }
}

fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "Failed to read search output");
        }
    }
    buf
}

fn wait_or_kill(child: &mut Child, cancel: &CancellationToken) -> Result<ExitStatus, SearchFailure> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SearchFailure::Tool(format!("failed to wait for search process: {e}")));
            }
        }
        if cancel.is_cancelled() {
            debug!(pid = child.id(), "Killing cancelled search process");
            let _ = child.kill();
            let _ = child.wait();
            return Err(SearchFailure::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl LineSearcher for ExternalSearcher {
    fn name(&self) -> &'static str {
        "ripgrep"
    }

    fn matching_lines(
        &self,
        path: &Path,
        filter: &CompiledFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<u64>, SearchFailure> {
        let (status, stdout, stderr) = self.run(path, filter, cancel)?;

        match status.code() {
            Some(0) => parse_output(&stdout).map_err(SearchFailure::Tool),
            // No matches
            Some(1) => Ok(Vec::new()),
            code => {
                let stderr = String::from_utf8_lossy(&stderr);
                debug!(path = %path.display(), ?code, stderr = %stderr.trim(), "Search tool failed");
                Err(SearchFailure::Tool(format!(
                    "{} exited with {}: {}",
                    self.binary.display(),
                    code.map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    stderr.trim()
                )))
            }
        }
    }
}

/// Parse `path\0line:text` records into sorted, unique line numbers
fn parse_output(stdout: &[u8]) -> Result<Vec<u64>, String> {
    let mut lines = Vec::new();

    for record in stdout.split(|b| *b == b'\n') {
        if record.is_empty() {
            continue;
        }
        let nul = record
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| "unparseable search output: missing path terminator".to_string())?;
        let rest = &record[nul + 1..];
        let rest = rest.strip_prefix(b":").unwrap_or(rest);
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || rest.get(digits) != Some(&b':') {
            return Err("unparseable search output: missing line number".to_string());
        }
        let number = std::str::from_utf8(&rest[..digits])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| "unparseable search output: bad line number".to_string())?;
        lines.push(number);
    }

    lines.sort_unstable();
    lines.dedup();
    Ok(lines)
}
