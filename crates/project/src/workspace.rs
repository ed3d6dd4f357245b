use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::memento::{Memento, MementoError};
use crate::util::write_atomic;

const MEMENTO_FILE_PREFIX: &str = "workspace_";
const MEMENTO_FILE_SUFFIX: &str = ".memento.json";

/// Stable identifier for workspaces.
/// 工作區的穩定代號。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name form of the id. Every byte outside `[A-Za-z0-9.-]` becomes
    /// `%XX`, so distinct ids never share a file.
    /// 轉為檔名；`[A-Za-z0-9.-]` 以外的位元組一律編碼為 `%XX`。
    fn file_stem(&self) -> String {
        let mut encoded = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
                encoded.push(byte as char);
            } else {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
        encoded
    }

    /// Reverses [`WorkspaceId::file_stem`]; `None` for names it never produces.
    fn from_file_stem(stem: &str) -> Option<Self> {
        let mut bytes = Vec::with_capacity(stem.len());
        let mut rest = stem.as_bytes();
        while let Some((&byte, tail)) = rest.split_first() {
            if byte == b'%' {
                let hex = tail.get(..2)?;
                let hex = std::str::from_utf8(hex).ok()?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
                rest = &tail[2..];
            } else if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
                bytes.push(byte);
                rest = tail;
            } else {
                return None;
            }
        }
        let id = String::from_utf8(bytes).ok().map(Self)?;
        // Only the canonical spelling counts, so `%2f` and `%2F` cannot both claim an id.
        (id.file_stem() == stem).then_some(id)
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory holding one memento file per workspace.
/// 每個工作區各自擁有一個狀態檔案的目錄。
#[derive(Debug, Clone)]
pub struct MementoStore {
    root: PathBuf,
}

impl MementoStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn memento_path(&self, id: &WorkspaceId) -> PathBuf {
        self.root
            .join(format!("{MEMENTO_FILE_PREFIX}{}{MEMENTO_FILE_SUFFIX}", id.file_stem()))
    }

    /// Opens the memento scoped to `id`; a workspace without a file starts empty.
    /// 開啟指定工作區的狀態儲存；若檔案不存在則為空。
    pub fn for_workspace(&self, id: &WorkspaceId) -> Result<FileMemento, MementoError> {
        FileMemento::open(self.memento_path(id))
    }

    /// Lists workspaces that have a memento file on disk.
    pub fn list(&self) -> Result<Vec<WorkspaceId>, MementoError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MementoError::Io(err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = name
                .strip_prefix(MEMENTO_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(MEMENTO_FILE_SUFFIX))
                .and_then(WorkspaceId::from_file_stem)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct MementoFile {
    values: BTreeMap<String, Value>,
}

/// Memento persisted as a single JSON object, rewritten atomically on update.
/// 以單一 JSON 物件保存的狀態，每次更新以原子寫入覆寫。
#[derive(Debug)]
pub struct FileMemento {
    path: PathBuf,
    state: Mutex<MementoFile>,
}

impl FileMemento {
    /// Loads the file at `path`. A missing file yields an empty memento.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MementoError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => MementoFile::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == ErrorKind::NotFound => MementoFile::default(),
            Err(err) => return Err(MementoError::Io(err)),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, MementoFile>, MementoError> {
        self.state
            .lock()
            .map_err(|_| MementoError::Unavailable(self.path.display().to_string()))
    }

    fn persist(&self, state: &MementoFile) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json)
    }
}

impl Memento for FileMemento {
    fn get(&self, key: &str) -> Option<Value> {
        self.state().ok()?.values.get(key).cloned()
    }

    /// Memory only changes once the new contents are on disk, so a failed write
    /// leaves both sides at the previous value and a retry writes again.
    fn update(&self, key: &str, value: Option<Value>) -> Result<(), MementoError> {
        let mut state = self.state()?;
        if state.values.get(key) == value.as_ref() {
            return Ok(());
        }

        let mut next = MementoFile {
            values: state.values.clone(),
        };
        match value {
            Some(value) => {
                next.values.insert(key.to_string(), value);
            }
            None => {
                next.values.remove(key);
            }
        }
        self.persist(&next)?;
        *state = next;
        debug!(path = %self.path.display(), key, "memento persisted");
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.state()
            .map(|state| state.values.keys().cloned().collect())
            .unwrap_or_default()
    }
}
