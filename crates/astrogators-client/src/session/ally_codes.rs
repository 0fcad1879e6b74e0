/*
[INPUT]:  Ally codes entered or selected by the user
[OUTPUT]: Ally-code list, selection and migration prompt updates
[POS]:    Session layer - dual-mode ally-code management
[UPDATE]: When ally-code flows or storage rules change
*/

// Authenticated users keep ally codes on the server; anonymous users keep
// them in `AllyCodeStorage`. Public operations take `ally_code_ops` so that
// concurrent mutations see each other's results; the `*_unlocked` helpers
// assume the caller holds it.

use chrono::Utc;
use tracing::{debug, warn};

use super::{AllyCodeList, Session};
use crate::http::{ApiError, Result};
use crate::types::{AllyCodeMigrationPrompt, AllyCodeRef, StoredAllyCode, is_valid_ally_code};

impl Session {
    /// Reload ally codes for the current identity and restore the persisted
    /// selection. Failures leave an empty list.
    pub async fn fetch_ally_codes(&self) {
        let _ops = self.ally_code_ops.lock().await;
        self.load_ally_codes_unlocked().await;
    }

    /// Add a nine-digit ally code. The first code added is auto-selected.
    pub async fn add_ally_code(&self, ally_code: &str) -> Result<()> {
        let _ops = self.ally_code_ops.lock().await;
        self.add_ally_code_unlocked(ally_code).await
    }

    /// Remove an ally code.
    ///
    /// Authenticated sessions address codes by id, anonymous sessions by
    /// code; a handle of the other kind is ignored.
    pub async fn remove_ally_code(&self, target: impl Into<AllyCodeRef>) -> Result<()> {
        let _ops = self.ally_code_ops.lock().await;
        match (self.has_user(), target.into()) {
            (true, AllyCodeRef::Id(id)) => {
                self.client.delete_ally_code(id).await?;
                self.update(|state| {
                    if let AllyCodeList::Remote(codes) = &mut state.ally_codes {
                        codes.retain(|c| c.id != id);
                    }
                });
            }
            (false, AllyCodeRef::Code(code)) => {
                self.ally_storage.remove(&code)?;
                self.reload_local_codes();
                if self.read().selected_ally_code.as_deref() == Some(code.as_str()) {
                    self.select_ally_code_unlocked(None).await;
                }
            }
            (_, target) => debug!(?target, "ally code handle does not match session mode"),
        }
        Ok(())
    }

    /// Select (or clear) the active ally code and mark it as used
    pub async fn select_ally_code(&self, ally_code: Option<&str>) {
        let _ops = self.ally_code_ops.lock().await;
        self.select_ally_code_unlocked(ally_code).await;
    }

    /// Stamp an ally code as just used
    pub async fn update_ally_code_last_used(&self, target: impl Into<AllyCodeRef>) -> Result<()> {
        let _ops = self.ally_code_ops.lock().await;
        self.update_last_used_unlocked(target.into()).await
    }

    pub fn dismiss_migration_prompt(&self) {
        self.update(|state| state.migration_prompt = AllyCodeMigrationPrompt::default());
    }

    /// Copy locally stored codes into the signed-in account, then forget them
    /// locally. Codes the server rejects are skipped.
    pub async fn migrate_local_ally_codes(&self) -> Result<()> {
        let _ops = self.ally_code_ops.lock().await;
        if !self.has_user() {
            return Ok(());
        }

        for code in self.ally_storage.list() {
            if let Err(e) = self.add_ally_code_unlocked(&code.ally_code).await {
                warn!(ally_code = %code.ally_code, error = %e, "failed to migrate ally code");
            }
        }

        self.ally_storage.clear()?;
        self.dismiss_migration_prompt();
        Ok(())
    }

    async fn load_ally_codes_unlocked(&self) {
        self.update(|state| state.is_loading_ally_codes = true);

        let loaded = if self.has_user() {
            self.client.list_ally_codes().await.map(|response| {
                let local_codes: Vec<String> = self
                    .ally_storage
                    .list()
                    .into_iter()
                    .map(|c| c.ally_code)
                    .collect();
                (AllyCodeList::Remote(response.ally_codes), local_codes)
            })
        } else {
            Ok((AllyCodeList::Local(self.ally_storage.list()), Vec::new()))
        };

        match loaded {
            Ok((codes, local_codes)) => {
                let selected = self.ally_storage.selected();
                self.update(|state| {
                    state.ally_codes = codes;
                    state.selected_ally_code = selected;
                    if !local_codes.is_empty() {
                        state.migration_prompt = AllyCodeMigrationPrompt {
                            show: true,
                            local_storage_codes: local_codes,
                        };
                    }
                    state.is_loading_ally_codes = false;
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch ally codes");
                let empty = if self.has_user() {
                    AllyCodeList::Remote(Vec::new())
                } else {
                    AllyCodeList::default()
                };
                self.update(|state| {
                    state.ally_codes = empty;
                    state.is_loading_ally_codes = false;
                });
            }
        }
    }

    async fn add_ally_code_unlocked(&self, ally_code: &str) -> Result<()> {
        if !is_valid_ally_code(ally_code) {
            return Err(ApiError::Validation(
                "Ally code must be exactly 9 digits".to_string(),
            ));
        }

        let was_empty = self.read().ally_codes.is_empty();

        if self.has_user() {
            let created = self.client.create_ally_code(ally_code).await?;
            self.update(|state| match &mut state.ally_codes {
                AllyCodeList::Remote(codes) => codes.insert(0, created),
                other => *other = AllyCodeList::Remote(vec![created]),
            });
        } else {
            let player = self.client.player_data(ally_code).await?;
            if player.is_null() {
                return Err(ApiError::Validation(
                    "Invalid ally code - player not found".to_string(),
                ));
            }

            let player_name = player
                .pointer("/data/name")
                .and_then(|name| name.as_str())
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            self.ally_storage.save(StoredAllyCode {
                ally_code: ally_code.to_string(),
                player_name,
                last_used_at: Some(Utc::now()),
            })?;
            self.reload_local_codes();
        }

        if was_empty {
            self.select_ally_code_unlocked(Some(ally_code)).await;
        }
        Ok(())
    }

    async fn select_ally_code_unlocked(&self, ally_code: Option<&str>) {
        self.update(|state| state.selected_ally_code = ally_code.map(str::to_string));
        if let Err(e) = self.ally_storage.set_selected(ally_code) {
            warn!(error = %e, "failed to persist selected ally code");
        }

        let Some(code) = ally_code else {
            return;
        };

        let target = if self.has_user() {
            match self.read().ally_codes.remote_id(code) {
                Some(id) => AllyCodeRef::Id(id),
                None => return,
            }
        } else {
            AllyCodeRef::Code(code.to_string())
        };

        if let Err(e) = self.update_last_used_unlocked(target).await {
            warn!(ally_code = code, error = %e, "failed to mark ally code as used");
        }
    }

    async fn update_last_used_unlocked(&self, target: AllyCodeRef) -> Result<()> {
        match (self.has_user(), target) {
            (true, AllyCodeRef::Id(id)) => {
                self.client.touch_ally_code(id).await?;
                self.load_ally_codes_unlocked().await;
            }
            (false, AllyCodeRef::Code(code)) => {
                self.ally_storage.touch(&code)?;
                self.reload_local_codes();
            }
            (_, target) => debug!(?target, "ally code handle does not match session mode"),
        }
        Ok(())
    }

    fn reload_local_codes(&self) {
        let codes = self.ally_storage.list();
        self.update(|state| state.ally_codes = AllyCodeList::Local(codes));
    }

    fn has_user(&self) -> bool {
        self.read().user.is_some()
    }
}
