use crate::{
    error::{ModError, ModResult},
    ident::ModKey,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, warn};

pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledFile {
    /// Relative to the game directory, `/`-separated.
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    pub namespace: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub installed_files: Vec<InstalledFile>,
}

impl InstalledMod {
    pub fn key(&self) -> ModResult<ModKey> {
        ModKey::new(&self.namespace, &self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub game_directory: Option<PathBuf>,
    /// Keys are validated on load; one malformed key rejects the file.
    #[serde(default)]
    pub installed_mods: BTreeMap<ModKey, InstalledMod>,
    #[serde(default)]
    pub blacklisted_mods: Vec<ModKey>,
}

/// Owns the on-disk `AppState`. Every mutator writes the whole state before
/// the in-memory copy changes.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: AppState,
}

impl StateStore {
    /// Loads `path`, falling back to an empty state when the file is missing
    /// or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match read_state(&path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(path = ?path, "no state file, starting empty");
                AppState::default()
            }
            Err(err) => {
                warn!(path = ?path, error = %err, "state file unreadable, starting empty");
                AppState::default()
            }
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &AppState {
        &self.state
    }

    pub fn game_directory(&self) -> Option<&Path> {
        self.state.game_directory.as_deref()
    }

    pub fn installed_mod(&self, key: &ModKey) -> Option<&InstalledMod> {
        self.state.installed_mods.get(key)
    }

    pub fn is_installed(&self, key: &ModKey) -> bool {
        self.state.installed_mods.contains_key(key)
    }

    pub fn installed_mods(&self) -> Vec<InstalledMod> {
        self.state.installed_mods.values().cloned().collect()
    }

    pub fn is_blacklisted(&self, key: &ModKey) -> bool {
        self.state.blacklisted_mods.contains(key)
    }

    pub fn blacklisted(&self) -> Vec<ModKey> {
        self.state.blacklisted_mods.clone()
    }

    pub fn set_game_directory(&mut self, path: Option<PathBuf>) -> ModResult<()> {
        if self.state.game_directory == path {
            return Ok(());
        }
        self.commit(|state| state.game_directory = path)
    }

    /// Inserts or replaces the record for the mod's key.
    pub fn record_installed_mod(&mut self, installed: InstalledMod) -> ModResult<()> {
        let key = installed.key()?;
        self.commit(|state| {
            state.installed_mods.insert(key, installed);
        })
    }

    pub fn remove_installed_mod(&mut self, key: &ModKey) -> ModResult<Option<InstalledMod>> {
        let Some(existing) = self.state.installed_mods.get(key).cloned() else {
            return Ok(None);
        };
        self.commit(|state| {
            state.installed_mods.remove(key);
        })?;
        Ok(Some(existing))
    }

    pub fn add_to_blacklist(&mut self, key: &ModKey) -> ModResult<()> {
        if self.is_blacklisted(key) {
            return Ok(());
        }
        let key = key.clone();
        self.commit(|state| state.blacklisted_mods.push(key))
    }

    pub fn remove_from_blacklist(&mut self, key: &ModKey) -> ModResult<()> {
        if !self.is_blacklisted(key) {
            return Ok(());
        }
        self.commit(|state| state.blacklisted_mods.retain(|entry| entry != key))
    }

    fn commit(&mut self, change: impl FnOnce(&mut AppState)) -> ModResult<()> {
        let mut next = self.state.clone();
        change(&mut next);
        write_state(&self.path, &next).map_err(|source| ModError::Persistence {
            path: self.path.clone(),
            source,
        })?;
        self.state = next;
        Ok(())
    }
}

fn read_state(path: &Path) -> io::Result<Option<AppState>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let state = serde_json::from_str(&raw).map_err(io::Error::from)?;
    Ok(Some(state))
}

fn write_state(path: &Path, state: &AppState) -> io::Result<()> {
    let raw = serde_json::to_string_pretty(state).map_err(io::Error::from)?;
    write_atomic_text(path, &raw)
}

fn write_atomic_text(path: &Path, contents: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "state path has no parent"))?;
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "state path has no file name"))?;
    let mut temp_name = OsString::from(file_name);
    temp_name.push(".tmp");
    let mut temp_path = parent.join(temp_name);
    if temp_path.exists() {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut temp_name = OsString::from(file_name);
        temp_name.push(format!(".{stamp}.tmp"));
        temp_path = parent.join(temp_name);
    }
    if let Err(err) = write_synced(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    Ok(())
}

/// Writes and flushes to disk, so the rename never exposes a short file.
fn write_synced(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

fn default_author() -> String {
    "Unknown".to_string()
}
