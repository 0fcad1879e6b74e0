/*
[INPUT]:  Ally codes entered by anonymous users and the current selection
[OUTPUT]: Persisted ally-code list and selected ally code
[POS]:    Storage layer - local ally codes for users without an account
[UPDATE]: When file naming or the stored record shape changes
*/

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::error;

use crate::types::StoredAllyCode;

const ALLY_CODES_FILE: &str = "ally_codes.json";
const SELECTED_ALLY_CODE_FILE: &str = "selected_ally_code";

/// File-backed ally-code list for anonymous users.
///
/// Read-modify-write updates are serialized within the process.
#[derive(Debug)]
pub struct AllyCodeStorage {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl AllyCodeStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Stored ally codes in insertion order.
    ///
    /// Unreadable or corrupt data is logged and treated as empty.
    pub fn list(&self) -> Vec<StoredAllyCode> {
        match self.read_codes() {
            Ok(codes) => codes,
            Err(e) => {
                error!(error = %e, "failed to read ally codes from storage");
                Vec::new()
            }
        }
    }

    /// Append a code unless one with the same `ally_code` already exists
    pub fn save(&self, ally_code: StoredAllyCode) -> io::Result<()> {
        let _guard = self.lock();
        let mut codes = self.read_codes()?;
        if codes.iter().any(|c| c.ally_code == ally_code.ally_code) {
            return Ok(());
        }
        codes.push(ally_code);
        self.write_codes(&codes)
    }

    pub fn remove(&self, ally_code: &str) -> io::Result<()> {
        let _guard = self.lock();
        let mut codes = self.read_codes()?;
        codes.retain(|c| c.ally_code != ally_code);
        self.write_codes(&codes)
    }

    /// Stamp `last_used_at` with the current time
    pub fn touch(&self, ally_code: &str) -> io::Result<()> {
        let _guard = self.lock();
        let mut codes = self.read_codes()?;
        let now = Utc::now();
        for code in codes.iter_mut().filter(|c| c.ally_code == ally_code) {
            code.last_used_at = Some(now);
        }
        self.write_codes(&codes)
    }

    pub fn selected(&self) -> Option<String> {
        fs::read_to_string(self.dir.join(SELECTED_ALLY_CODE_FILE))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Persist the selection; `None` removes it
    pub fn set_selected(&self, ally_code: Option<&str>) -> io::Result<()> {
        let path = self.dir.join(SELECTED_ALLY_CODE_FILE);
        match ally_code {
            Some(code) => {
                fs::create_dir_all(&self.dir)?;
                fs::write(path, code)
            }
            None => remove_if_exists(&path),
        }
    }

    /// Forget every stored code and the selection
    pub fn clear(&self) -> io::Result<()> {
        let _guard = self.lock();
        remove_if_exists(&self.dir.join(ALLY_CODES_FILE))?;
        remove_if_exists(&self.dir.join(SELECTED_ALLY_CODE_FILE))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_codes(&self) -> io::Result<Vec<StoredAllyCode>> {
        let content = match fs::read_to_string(self.dir.join(ALLY_CODES_FILE)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write_codes(&self, codes: &[StoredAllyCode]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let encoded = serde_json::to_string_pretty(codes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.dir.join(ALLY_CODES_FILE), encoded)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
