/*
[INPUT]:  Client configuration, token store and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod auth;
pub mod client;
pub mod error;
pub mod users;

pub use error::{ApiError, NormalizedError, RefreshError, Result};

pub use client::{
    ApiClient, ApiClientConfig, UnauthorizedHandler, api_client, initialize_api_client,
};
