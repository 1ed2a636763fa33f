//! Flat-file persistence: problem history, multi-part progress, and generated problem files.
//!
//! Layout under the install directory:
//!   problems/<difficulty>/<slug>_<timestamp>.md
//!   history-progress/problem_history.json     (JSON array of entries)
//!   history-progress/multipart_progress.json  (JSON object, `{}` when idle)
//!
//! Every mutation is flushed immediately. Errors are returned to the caller, which logs
//! them and keeps going with the in-memory state.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::domain::{Difficulty, ProblemEntry, Progress};
use crate::error::ForgeError;

pub const PROBLEMS_DIR: &str = "problems";
pub const HISTORY_PROGRESS_DIR: &str = "history-progress";
pub const HISTORY_FILE: &str = "problem_history.json";
pub const PROGRESS_FILE: &str = "multipart_progress.json";
pub const BAD_SUFFIX: &str = ".bad";

/// Create `path` (and parents) if absent. Returns true when something was created.
pub fn ensure_directory(path: &Path) -> Result<bool, ForgeError> {
    if path.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(path).map_err(|e| ForgeError::io(path, e))?;
    info!(target: "store", path = %path.display(), "Created directory");
    Ok(true)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ForgeError> {
    let data = serde_json::to_string_pretty(value)?;
    std::fs::write(path, data).map_err(|e| ForgeError::io(path, e))
}

pub struct Store {
    home: PathBuf,
    pub history: Vec<ProblemEntry>,
    pub progress: Option<Progress>,
}

impl Store {
    /// Create directories and load both documents. Failures are logged and leave
    /// the corresponding state empty so the session can still run.
    #[instrument(level = "info", skip_all, fields(home = %home.as_ref().display()))]
    pub fn open(home: impl AsRef<Path>) -> Self {
        let mut store = Self {
            home: home.as_ref().to_path_buf(),
            history: Vec::new(),
            progress: None,
        };

        for dir in [store.problems_root(), store.home.join(HISTORY_PROGRESS_DIR)] {
            if let Err(e) = ensure_directory(&dir) {
                error!(target: "store", error = %e, "Could not create directory");
            }
        }

        match store.load_history() {
            Ok(history) => store.history = history,
            Err(e) => {
                error!(target: "store", error = %e, "Error loading history; starting empty");
                if matches!(e, ForgeError::Serialization(_)) {
                    set_aside(&store.history_path());
                }
            }
        }
        match store.load_progress() {
            Ok(progress) => store.progress = progress,
            Err(e) => {
                error!(target: "store", error = %e, "Error loading progress; starting empty");
                if matches!(e, ForgeError::Serialization(_)) {
                    set_aside(&store.progress_path());
                }
            }
        }

        info!(
            target: "store",
            history = store.history.len(),
            in_progress = store.progress.is_some(),
            "Store ready"
        );
        store
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn problems_root(&self) -> PathBuf {
        self.home.join(PROBLEMS_DIR)
    }

    pub fn history_path(&self) -> PathBuf {
        self.home.join(HISTORY_PROGRESS_DIR).join(HISTORY_FILE)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.home.join(HISTORY_PROGRESS_DIR).join(PROGRESS_FILE)
    }

    /// Read the history file, creating it as `[]` on first run.
    pub fn load_history(&self) -> Result<Vec<ProblemEntry>, ForgeError> {
        let path = self.history_path();
        if !path.exists() {
            write_json(&path, &Vec::<ProblemEntry>::new())?;
            info!(target: "store", path = %path.display(), "Created history file");
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path).map_err(|e| ForgeError::io(&path, e))?;
        let history: Vec<ProblemEntry> = serde_json::from_str(&data)?;
        info!(target: "store", path = %path.display(), entries = history.len(), "Loaded history");
        Ok(history)
    }

    pub fn save_history(&self) -> Result<(), ForgeError> {
        write_json(&self.history_path(), &self.history)
    }

    /// Read the progress file, creating it as `{}` on first run. `{}` means no problem in flight.
    pub fn load_progress(&self) -> Result<Option<Progress>, ForgeError> {
        let path = self.progress_path();
        if !path.exists() {
            write_json(&path, &serde_json::json!({}))?;
            info!(target: "store", path = %path.display(), "Created progress file");
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).map_err(|e| ForgeError::io(&path, e))?;
        let value: serde_json::Value = serde_json::from_str(&data)?;
        let is_empty = match &value {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if is_empty {
            return Ok(None);
        }
        let progress: Progress = serde_json::from_value(value)?;
        info!(target: "store", path = %path.display(), current_part = progress.current_part, "Loaded progress");
        Ok(Some(progress))
    }

    pub fn save_progress(&self) -> Result<(), ForgeError> {
        match &self.progress {
            Some(p) => write_json(&self.progress_path(), p),
            None => write_json(&self.progress_path(), &serde_json::json!({})),
        }
    }

    /// Replace the in-flight record wholesale and flush it.
    pub fn set_progress(&mut self, progress: Progress) -> Result<(), ForgeError> {
        self.progress = Some(progress);
        self.save_progress()
    }

    pub fn clear_progress(&mut self) -> Result<(), ForgeError> {
        self.progress = None;
        self.save_progress()
    }

    /// In-memory append, then a full save. The entry stays in memory if the save fails.
    pub fn append_to_history(&mut self, entry: ProblemEntry) -> Result<(), ForgeError> {
        self.history.push(entry);
        self.save_history()
    }

    pub fn count_for(&self, difficulty: Difficulty) -> usize {
        self.history.iter().filter(|e| e.difficulty == difficulty).count()
    }

    /// Write problem text to `problems/<difficulty>/<filename>`.
    ///
    /// An existing file is never overwritten: `name_2.md`, `name_3.md`, … are tried
    /// instead. Returns the path actually written.
    pub fn save_problem_to_file(
        &self,
        text: &str,
        difficulty: Difficulty,
        filename: &str,
    ) -> Result<PathBuf, ForgeError> {
        let dir = self.problems_root().join(difficulty.dir_name());
        ensure_directory(&dir)?;

        let path = free_path(&dir, filename);
        if path.file_name().and_then(|n| n.to_str()) != Some(filename) {
            warn!(target: "store", wanted = %filename, path = %path.display(), "Filename taken; using a suffixed name");
        }
        std::fs::write(&path, text).map_err(|e| ForgeError::io(&path, e))?;
        info!(target: "store", path = %path.display(), bytes = text.len(), "Problem saved to file");
        Ok(path)
    }
}

/// Move an unreadable document to `<name>.bad` so the next save cannot overwrite it.
fn set_aside(path: &Path) {
    let mut bad = path.as_os_str().to_owned();
    bad.push(BAD_SUFFIX);
    let bad = PathBuf::from(bad);
    match std::fs::rename(path, &bad) {
        Ok(()) => warn!(target: "store", from = %path.display(), to = %bad.display(), "Set aside unreadable file"),
        Err(e) => error!(target: "store", path = %path.display(), error = %e, "Could not set aside unreadable file"),
    }
}

fn free_path(dir: &Path, filename: &str) -> PathBuf {
    let first = dir.join(filename);
    if !first.exists() {
        return first;
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (filename, String::new()),
    };
    (2u32..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
