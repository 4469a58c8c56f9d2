use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ColloquyError;

use super::memory::MemoryState;

const FILE_VERSION: u32 = 1;

/// Storage abstraction for persisted memory-augmented participants.
pub trait MemoryStore: Send + Sync {
    fn load(&self, agent_name: &str) -> Result<Option<MemoryState>, ColloquyError>;
    fn save(&self, state: &MemoryState) -> Result<(), ColloquyError>;
    fn clear(&self, agent_name: &str) -> Result<(), ColloquyError>;
    /// Names of all stored participants, sorted.
    fn list(&self) -> Result<Vec<String>, ColloquyError>;
}

/// File-backed memory store: one JSON file per participant.
///
/// # Example
/// ```no_run
/// use colloquy::agent::{FileMemoryStore, MemoryStore};
///
/// let store = FileMemoryStore::new_default();
/// if let Some(state) = store.load("MemGPT_coder")? {
///     println!("{} archived messages", state.archival.len());
/// }
/// # Ok::<(), colloquy::error::ColloquyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    base_dir: PathBuf,
}

impl FileMemoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn new_default() -> Self {
        Self::new(crate::config::default_memory_dir())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the state file for `agent_name`.
    pub fn state_path(&self, agent_name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", file_stem(agent_name)))
    }

    fn ensure_parent(path: &Path) -> Result<(), ColloquyError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl MemoryStore for FileMemoryStore {
    fn load(&self, agent_name: &str) -> Result<Option<MemoryState>, ColloquyError> {
        let path = self.state_path(agent_name);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: MemoryFile = serde_json::from_str(&raw)?;
        if file.version != FILE_VERSION {
            return Err(ColloquyError::Memory(format!(
                "{}: unsupported version {}",
                path.display(),
                file.version
            )));
        }
        Ok(Some(file.state))
    }

    fn save(&self, state: &MemoryState) -> Result<(), ColloquyError> {
        let path = self.state_path(&state.agent_name);
        Self::ensure_parent(&path)?;
        let file = MemoryFile {
            version: FILE_VERSION,
            state: state.clone(),
            saved_at: Utc::now(),
        };
        let serialized = serde_json::to_string_pretty(&file)?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self, agent_name: &str) -> Result<(), ColloquyError> {
        let path = self.state_path(agent_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, ColloquyError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(raw) = fs::read_to_string(&path) else {
                warn!(path = %path.display(), "skipping unreadable memory file");
                continue;
            };
            if let Ok(file) = serde_json::from_str::<MemoryFile>(&raw) {
                names.push(file.state.agent_name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryFile {
    version: u32,
    state: MemoryState,
    saved_at: DateTime<Utc>,
}

/// Encode an agent name into a file stem, one stem per distinct name.
///
/// Lowercase ASCII letters, digits and `-` pass through. An uppercase letter
/// becomes `_` plus its lowercase form, `_` becomes `__`, and every other
/// byte becomes `~` plus two hex digits. Stems never differ only by case.
fn file_stem(agent_name: &str) -> String {
    if agent_name.is_empty() {
        return "~".to_string();
    }
    let mut out = String::with_capacity(agent_name.len());
    for byte in agent_name.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' => out.push(byte as char),
            b'A'..=b'Z' => {
                out.push('_');
                out.push(byte.to_ascii_lowercase() as char);
            }
            b'_' => out.push_str("__"),
            other => out.push_str(&format!("~{other:02x}")),
        }
    }
    out
}
