/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public astrogators client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod session;
pub mod storage;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{FileTokenStore, MemoryTokenStore, TokenClaims, TokenStore};

// Re-export commonly used types from http
pub use http::{
    ApiClient,
    ApiClientConfig,
    ApiError,
    NormalizedError,
    RefreshError,
    Result,
    UnauthorizedHandler,
    api_client,
    initialize_api_client,
};

pub use session::{AllyCodeList, Session, SessionState};
pub use storage::AllyCodeStorage;

// Re-export all types
pub use types::*;
