//! Finds the newest report run on disk and stitches its developer stats
//! files into one markdown document.
//!
//! Layout consumed: `<root>/<run-directory>/developer_stats_*.md`. The run
//! directory with the latest modification time wins. Nothing here is fatal:
//! every failure path either skips a file or reports the document as absent.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use regex::Regex;
use tracing::{debug, info, warn};

const REPORT_FILE_PATTERN: &str = r"^developer_stats_.*\.md$";

/// One report run directory directly under the reports root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDirectory {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// A single report file, labeled by its base name (without extension).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSection {
    pub name: String,
    pub content: String,
}

/// Combined content of every readable report file in the newest run.
///
/// Never empty: a run with no readable files yields no document at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub source: PathBuf,
    pub sections: Vec<ReportSection>,
}

impl ReportDocument {
    /// Markdown rendering: `## <name>` heading, blank line, body, with
    /// sections separated by a blank line.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("## {}\n\n{}\n", s.name, s.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct ReportLocator {
    root: PathBuf,
    pattern: Regex,
}

impl ReportLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: Regex::new(REPORT_FILE_PATTERN).expect("report file pattern is valid"),
        }
    }

    /// The run directory with the greatest modification time.
    ///
    /// Candidates are sorted by path first; when several share the latest
    /// time, the last of them in that order is chosen.
    pub fn latest_dir(&self) -> Option<ReportDirectory> {
        if !self.root.is_dir() {
            debug!(root = %self.root.display(), "Reports root missing");
            return None;
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), "Cannot list reports root: {e}");
                return None;
            }
        };

        let mut dirs: Vec<ReportDirectory> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let meta = fs::metadata(&path).ok()?;
                if !meta.is_dir() {
                    return None;
                }
                let modified = meta.modified().ok()?;
                Some(ReportDirectory { path, modified })
            })
            .collect();
        dirs.sort_by(|a, b| a.path.cmp(&b.path));

        dirs.into_iter().max_by_key(|d| d.modified)
    }

    /// Regular files inside `dir` matching `developer_stats_*.md`, by name.
    pub fn report_files(&self, dir: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), "Cannot list report directory: {e}");
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| self.pattern.is_match(n))
            })
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        files
    }

    /// Locate the newest run and read its report files.
    ///
    /// Unreadable files are logged and skipped. Returns `None` when there is
    /// no run directory, no matching file, or no file could be read.
    pub fn locate(&self) -> Option<ReportDocument> {
        let latest = self.latest_dir()?;
        info!(
            dir = %latest.path.display(),
            modified = %DateTime::<Local>::from(latest.modified).format("%Y-%m-%d %H:%M:%S"),
            "Latest report directory"
        );

        let files = self.report_files(&latest.path);
        if files.is_empty() {
            warn!(dir = %latest.path.display(), "No developer stats files in latest report");
            return None;
        }

        let mut sections = Vec::with_capacity(files.len());
        for file in &files {
            match fs::read_to_string(file) {
                Ok(content) => {
                    let name = file
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    sections.push(ReportSection { name, content });
                }
                Err(e) => warn!(file = %file.display(), "Failed to read report file: {e}"),
            }
        }

        if sections.is_empty() {
            return None;
        }

        info!(
            sections = sections.len(),
            skipped = files.len() - sections.len(),
            "Report document assembled"
        );
        Some(ReportDocument {
            source: latest.path,
            sections,
        })
    }
}
