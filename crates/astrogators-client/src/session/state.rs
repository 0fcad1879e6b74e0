/*
[INPUT]:  Results of session operations
[OUTPUT]: Snapshot of identity, feature and ally-code state
[POS]:    Session layer - observable state owned by the session
[UPDATE]: When the session exposes new state
*/

use crate::types::{AllyCode, AllyCodeMigrationPrompt, StoredAllyCode, User};

/// Ally codes in the mode matching the current identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllyCodeList {
    /// Owned by the signed-in account
    Remote(Vec<AllyCode>),
    /// Remembered on this machine for an anonymous user
    Local(Vec<StoredAllyCode>),
}

impl Default for AllyCodeList {
    fn default() -> Self {
        AllyCodeList::Local(Vec::new())
    }
}

impl AllyCodeList {
    pub fn len(&self) -> usize {
        match self {
            AllyCodeList::Remote(codes) => codes.len(),
            AllyCodeList::Local(codes) => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw ally codes in display order
    pub fn codes(&self) -> Vec<&str> {
        match self {
            AllyCodeList::Remote(codes) => codes.iter().map(|c| c.ally_code.as_str()).collect(),
            AllyCodeList::Local(codes) => codes.iter().map(|c| c.ally_code.as_str()).collect(),
        }
    }

    pub fn contains(&self, ally_code: &str) -> bool {
        self.codes().contains(&ally_code)
    }

    /// Database id of a remote ally code
    pub fn remote_id(&self, ally_code: &str) -> Option<i64> {
        match self {
            AllyCodeList::Remote(codes) => codes
                .iter()
                .find(|c| c.ally_code == ally_code)
                .map(|c| c.id),
            AllyCodeList::Local(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_loading: bool,
    pub auth_enabled: bool,
    pub is_loading_features: bool,
    pub ally_codes: AllyCodeList,
    pub selected_ally_code: Option<String>,
    pub is_loading_ally_codes: bool,
    pub migration_prompt: AllyCodeMigrationPrompt,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
            auth_enabled: true,
            is_loading_features: true,
            ally_codes: AllyCodeList::default(),
            selected_ally_code: None,
            is_loading_ally_codes: false,
            migration_prompt: AllyCodeMigrationPrompt::default(),
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}
