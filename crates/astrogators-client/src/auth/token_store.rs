/*
[INPUT]:  Access/refresh token strings from login and refresh responses
[OUTPUT]: Token retrieval, replacement and clearing
[POS]:    Auth layer - token persistence behind a single accessor trait
[UPDATE]: When adding storage backends or changing the on-disk format
*/

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

const TOKENS_FILE: &str = "tokens.json";

/// Holder of the access and refresh tokens.
///
/// Every method is safe to call before any token was stored.
pub trait TokenStore: fmt::Debug + Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: &str);
    fn set_refresh_token(&self, token: &str);
    fn remove_access_token(&self);
    fn remove_refresh_token(&self);

    fn set_tokens(&self, access: &str, refresh: &str) {
        self.set_access_token(access);
        self.set_refresh_token(refresh);
    }

    fn clear_tokens(&self) {
        self.remove_access_token();
        self.remove_refresh_token();
    }

    /// True iff an access token is present
    fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut StoredTokens)) {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    fn read(&self) -> StoredTokens {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token
    }

    fn set_access_token(&self, token: &str) {
        self.update(|tokens| tokens.access_token = Some(token.to_string()));
    }

    fn set_refresh_token(&self, token: &str) {
        self.update(|tokens| tokens.refresh_token = Some(token.to_string()));
    }

    fn remove_access_token(&self) {
        self.update(|tokens| tokens.access_token = None);
    }

    fn remove_refresh_token(&self) {
        self.update(|tokens| tokens.refresh_token = None);
    }

    fn set_tokens(&self, access: &str, refresh: &str) {
        self.update(|tokens| {
            tokens.access_token = Some(access.to_string());
            tokens.refresh_token = Some(refresh.to_string());
        });
    }

    fn clear_tokens(&self) {
        self.update(|tokens| *tokens = StoredTokens::default());
    }
}

/// Token store persisted as JSON inside a data directory.
///
/// The in-memory copy is authoritative for the running process; write
/// failures are logged and do not surface to callers. Pair updates are
/// written in one step, so the file never holds half of a pair.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    tokens: RwLock<StoredTokens>,
}

impl FileTokenStore {
    /// Open (or lazily create) `tokens.json` under `dir`.
    ///
    /// A missing file means "no tokens". An unreadable or corrupt file is
    /// reported so the caller can decide whether to start fresh.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let path = dir.as_ref().join(TOKENS_FILE);
        let tokens = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoredTokens::default(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut StoredTokens)) {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
        if let Err(e) = self.persist(&guard) {
            warn!(path = %self.path.display(), error = %e, "failed to persist tokens");
        }
    }

    fn read(&self) -> StoredTokens {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist(&self, tokens: &StoredTokens) -> io::Result<()> {
        if tokens == &StoredTokens::default() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string(tokens)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, encoded)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token
    }

    fn set_access_token(&self, token: &str) {
        self.update(|tokens| tokens.access_token = Some(token.to_string()));
    }

    fn set_refresh_token(&self, token: &str) {
        self.update(|tokens| tokens.refresh_token = Some(token.to_string()));
    }

    fn remove_access_token(&self) {
        self.update(|tokens| tokens.access_token = None);
    }

    fn remove_refresh_token(&self) {
        self.update(|tokens| tokens.refresh_token = None);
    }

    fn set_tokens(&self, access: &str, refresh: &str) {
        self.update(|tokens| {
            tokens.access_token = Some(access.to_string());
            tokens.refresh_token = Some(refresh.to_string());
        });
    }

    fn clear_tokens(&self) {
        self.update(|tokens| *tokens = StoredTokens::default());
    }
}
