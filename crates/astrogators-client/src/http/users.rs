/*
[INPUT]:  Bearer-authenticated user requests and ally-code identifiers
[OUTPUT]: Current user, feature flags, ally codes and player lookups
[POS]:    HTTP layer - user data endpoints
[UPDATE]: When adding new user endpoints or changing paths
*/

// ### User Endpoints

use crate::http::{ApiClient, Result};
use crate::types::{
    AllyCode, AllyCodeCreate, AllyCodeListResponse, EmptyResponse, FeatureFlags, User,
};

impl ApiClient {
    /// GET /api/v1/users/me
    pub async fn current_user(&self) -> Result<User> {
        self.get("/api/v1/users/me").await
    }

    /// GET /api/v1/config/features
    pub async fn features(&self) -> Result<FeatureFlags> {
        self.get("/api/v1/config/features").await
    }

    /// GET /api/v1/users/me/ally-codes
    pub async fn list_ally_codes(&self) -> Result<AllyCodeListResponse> {
        self.get("/api/v1/users/me/ally-codes").await
    }

    /// POST /api/v1/users/me/ally-codes
    ///
    /// The backend validates the code against the game before storing it.
    pub async fn create_ally_code(&self, ally_code: &str) -> Result<AllyCode> {
        let body = AllyCodeCreate {
            ally_code: ally_code.to_string(),
        };
        self.post("/api/v1/users/me/ally-codes", Some(&body)).await
    }

    /// DELETE /api/v1/users/me/ally-codes/{id}
    pub async fn delete_ally_code(&self, id: i64) -> Result<EmptyResponse> {
        let endpoint = format!("/api/v1/users/me/ally-codes/{id}");
        self.delete(&endpoint).await
    }

    /// Mark an ally code as just used
    ///
    /// PUT /api/v1/users/me/ally-codes/{id}/use
    pub async fn touch_ally_code(&self, id: i64) -> Result<serde_json::Value> {
        let endpoint = format!("/api/v1/users/me/ally-codes/{id}/use");
        self.put(&endpoint, Some(&EmptyResponse {})).await
    }

    /// Public player lookup; `null` when the ally code is unknown
    ///
    /// GET /api/v1/player-data/player/{ally_code}
    pub async fn player_data(&self, ally_code: &str) -> Result<serde_json::Value> {
        let endpoint = format!("/api/v1/player-data/player/{ally_code}");
        self.get(&endpoint).await
    }
}
