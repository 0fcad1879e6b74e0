/*
[INPUT]:  API client configuration, token store and local ally-code storage
[OUTPUT]: Signed-in user, feature flags and ally-code selection state
[POS]:    Session layer - orchestrates auth flows on top of the HTTP client
[UPDATE]: When auth flows or session state transitions change
*/

mod ally_codes;
pub mod state;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::{error, info, warn};

use crate::auth::TokenStore;
use crate::http::{ApiClient, ApiClientConfig, Result};
use crate::storage::AllyCodeStorage;
use crate::types::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, RegisterResponse,
    ResendVerificationRequest, ResetPasswordRequest, User,
};

pub use state::{AllyCodeList, SessionState};

/// Authentication and ally-code session
#[derive(Debug)]
pub struct Session {
    client: ApiClient,
    tokens: Arc<dyn TokenStore>,
    ally_storage: AllyCodeStorage,
    state: Arc<RwLock<SessionState>>,
    ally_code_ops: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a session and its API client.
    ///
    /// A failed token refresh drops the signed-in user before any
    /// `on_unauthorized` handler already present in `config` runs.
    pub fn new(
        config: ApiClientConfig,
        tokens: Arc<dyn TokenStore>,
        ally_storage: AllyCodeStorage,
    ) -> Result<Self> {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let config = with_session_reset(config, Arc::downgrade(&state));
        let client = ApiClient::new(config, tokens.clone())?;

        Ok(Self {
            client,
            tokens,
            ally_storage,
            state,
            ally_code_ops: tokio::sync::Mutex::new(()),
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn ally_storage(&self) -> &AllyCodeStorage {
        &self.ally_storage
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.read().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Load feature flags, the current user and the matching ally codes
    pub async fn initialize(&self) {
        self.fetch_features().await;
        self.fetch_user().await;
        self.fetch_ally_codes().await;
    }

    /// Fetch feature flags; auth stays enabled if the lookup fails
    pub async fn fetch_features(&self) -> bool {
        let auth_enabled = match self.client.features().await {
            Ok(features) => features.auth_enabled,
            Err(e) => {
                warn!(error = %e, "failed to fetch features; keeping auth enabled");
                true
            }
        };

        self.update(|state| {
            state.auth_enabled = auth_enabled;
            state.is_loading_features = false;
        });
        auth_enabled
    }

    /// Load the user behind the stored access token.
    ///
    /// Without an access token no request is made. A failed lookup clears the
    /// stored tokens.
    pub async fn fetch_user(&self) -> Option<User> {
        if !self.tokens.is_authenticated() {
            self.update(|state| {
                state.user = None;
                state.is_loading = false;
            });
            return None;
        }

        let user = match self.client.current_user().await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "failed to fetch user");
                self.tokens.clear_tokens();
                None
            }
        };

        self.update(|state| {
            state.user = user.clone();
            state.is_loading = false;
        });
        user
    }

    /// Re-read the current user; reloads ally codes if the identity changed
    pub async fn refresh_user(&self) -> Option<User> {
        let before = self.user().map(|user| user.id);
        let user = self.fetch_user().await;
        if before != user.as_ref().map(|user| user.id.clone()) {
            self.fetch_ally_codes().await;
        }
        user
    }

    /// Sign in, persist the token pair and switch to the account's ally codes
    pub async fn login(&self, credentials: &LoginRequest) -> Result<User> {
        let user = match self.sign_in(credentials).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "login failed");
                return Err(e);
            }
        };

        info!(user_id = %user.id, "logged in");
        self.update(|state| {
            state.user = Some(user.clone());
            state.is_loading = false;
        });
        self.fetch_ally_codes().await;
        Ok(user)
    }

    async fn sign_in(&self, credentials: &LoginRequest) -> Result<User> {
        let response = self.client.login(credentials).await?;
        self.tokens
            .set_tokens(&response.access_token, &response.refresh_token);
        self.client.current_user().await
    }

    /// Create an account. Email verification is required before login.
    pub async fn register(&self, data: &RegisterRequest) -> Result<RegisterResponse> {
        self.client.register(data).await.inspect_err(|e| {
            error!(error = %e, "registration failed");
        })
    }

    /// Drop credentials and fall back to the locally stored ally codes
    pub fn logout(&self) {
        self.tokens.clear_tokens();
        let local_codes = self.ally_storage.list();
        let selected = self.ally_storage.selected();

        self.update(|state| {
            state.user = None;
            state.ally_codes = AllyCodeList::Local(local_codes);
            state.selected_ally_code = selected;
            state.migration_prompt = Default::default();
        });
        info!("logged out");
    }

    pub async fn forgot_password(&self, data: &ForgotPasswordRequest) -> Result<String> {
        self.client
            .forgot_password(data)
            .await
            .map(|response| response.message)
            .inspect_err(|e| error!(error = %e, "forgot password failed"))
    }

    pub async fn reset_password(&self, data: &ResetPasswordRequest) -> Result<String> {
        self.client
            .reset_password(data)
            .await
            .map(|response| response.message)
            .inspect_err(|e| error!(error = %e, "reset password failed"))
    }

    pub async fn resend_verification(&self, data: &ResendVerificationRequest) -> Result<String> {
        self.client
            .resend_verification(data)
            .await
            .map(|response| response.message)
            .inspect_err(|e| error!(error = %e, "resend verification failed"))
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

/// Chain a state reset in front of the caller's unauthorized handler
fn with_session_reset(
    config: ApiClientConfig,
    state: std::sync::Weak<RwLock<SessionState>>,
) -> ApiClientConfig {
    let upstream = config.on_unauthorized.clone();
    config.with_on_unauthorized(move || {
        if let Some(state) = state.upgrade() {
            let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
            guard.user = None;
            if matches!(guard.ally_codes, AllyCodeList::Remote(_)) {
                guard.ally_codes = AllyCodeList::default();
            }
            guard.migration_prompt = Default::default();
        }
        if let Some(upstream) = &upstream {
            upstream();
        }
    })
}
