//! Audit sinks: hand a finished [`WebsiteAudit`] to storage.
//!
//! [`JsonlSink`] is append-only JSONL with rotation:
//! - one audit per line
//! - rotate when the file exceeds `MAX_LOG_SIZE` (100MB)
//! - rotated files named `.1`, `.2`, etc. (max 5 rotations)

use super::WebsiteAudit;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum log size before rotation (100 MB).
const MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rotated files to keep.
const MAX_ROTATIONS: u32 = 5;

/// Destination for finished audits. The engine never reads them back.
pub trait AuditSink: Send {
    fn save(&mut self, audit: &WebsiteAudit) -> Result<()>;
}

/// Append-only JSONL sink with automatic rotation.
pub struct JsonlSink {
    file: File,
    path: PathBuf,
    max_size: u64,
    max_rotations: u32,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
}

impl JsonlSink {
    /// Open or create the audit file.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_limits(path, MAX_LOG_SIZE, MAX_ROTATIONS)
    }

    /// Open with explicit rotation limits.
    pub fn with_limits(path: &Path, max_size: u64, max_rotations: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit file: {}", path.display()))?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            max_size,
            max_rotations: max_rotations.max(1),
            current_size,
        })
    }

    /// `~/.leadlens/audits.jsonl`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".leadlens")
            .join("audits.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotate: audits.jsonl → audits.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, self.max_rotations);
        if oldest.exists() {
            std::fs::remove_file(&oldest)
                .with_context(|| format!("failed to drop {}", oldest.display()))?;
        }
        for i in (1..self.max_rotations).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                std::fs::rename(&from, rotation_path(&self.path, i + 1))?;
            }
        }
        std::fs::rename(&self.path, rotation_path(&self.path, 1))?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("failed to reopen audit file after rotation")?;
        self.current_size = 0;
        debug!("rotated {}", self.path.display());
        Ok(())
    }
}

impl AuditSink for JsonlSink {
    fn save(&mut self, audit: &WebsiteAudit) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }
        let json = serde_json::to_string(audit)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }
}

/// Path for a rotated file: `audits.jsonl.1`, `audits.jsonl.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audits.jsonl")
    );
    base.with_file_name(name)
}
