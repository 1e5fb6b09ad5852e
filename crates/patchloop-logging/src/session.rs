use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        source: Option<PathBuf>,
        artifact_sha256: String,
        artifact_lines: usize,
        scanner_model: String,
        patcher_model: String,
        max_iterations: usize,
    },
    Scan {
        scan: usize,
        iteration: usize,
        clean: bool,
        findings: Option<String>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
    Patch {
        iteration: usize,
        artifact: String,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        status: String,
        iterations: usize,
        scanner_calls: usize,
        patcher_calls: usize,
        error: Option<String>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Settings recorded on the first line of a session file
#[derive(Debug, Clone)]
pub struct SessionStartInfo<'a> {
    pub source: Option<&'a Path>,
    pub scanner_model: &'a str,
    pub patcher_model: &'a str,
    pub max_iterations: usize,
}

/// Writes session data as JSONL to a file in ~/.local/share/patchloop/sessions/.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionWriter {
    /// Create a writer in the default sessions directory. The file name is the
    /// current UTC timestamp plus a short hash of the input artifact.
    pub fn new(artifact: &str) -> io::Result<Self> {
        Self::new_in(&Self::sessions_dir()?, artifact)
    }

    /// Create a writer in an explicit directory
    pub fn new_in(sessions_dir: &Path, artifact: &str) -> io::Result<Self> {
        fs::create_dir_all(sessions_dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
        let hash = artifact_hash(artifact);
        let filename = format!("{}_{}.jsonl", timestamp_str, &hash[..6]);
        let path = sessions_dir.join(filename);

        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Returns the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, artifact: &str, info: &SessionStartInfo<'_>) {
        let line = SessionLine::SessionStart {
            timestamp: Utc::now(),
            source: info.source.map(Path::to_path_buf),
            artifact_sha256: artifact_hash(artifact),
            artifact_lines: artifact.lines().count(),
            scanner_model: info.scanner_model.to_string(),
            patcher_model: info.patcher_model.to_string(),
            max_iterations: info.max_iterations,
        };
        self.write_line(&line);
    }

    pub fn write_scan(
        &self,
        scan: usize,
        iteration: usize,
        findings: Option<&str>,
        duration_secs: f64,
    ) {
        let line = SessionLine::Scan {
            scan,
            iteration,
            clean: findings.is_none(),
            findings: findings.map(String::from),
            duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    pub fn write_patch(&self, iteration: usize, artifact: &str, duration_secs: f64) {
        let line = SessionLine::Patch {
            iteration,
            artifact: artifact.to_string(),
            duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    pub fn write_end(
        &self,
        status: &str,
        iterations: usize,
        scanner_calls: usize,
        patcher_calls: usize,
        error: Option<&str>,
        duration_secs: f64,
    ) {
        let line = SessionLine::SessionEnd {
            status: status.to_string(),
            iterations,
            scanner_calls,
            patcher_calls,
            error: error.map(String::from),
            duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    fn write_line(&self, line: &SessionLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("patchloop").join("sessions"))
    }
}

fn artifact_hash(artifact: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artifact.as_bytes());
    hex::encode(hasher.finalize())
}
