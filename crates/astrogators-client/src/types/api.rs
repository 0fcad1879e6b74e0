/*
[INPUT]:  Acknowledgement and feature-flag response bodies
[OUTPUT]: Small response types shared across endpoints
[POS]:    Data layer - common response structures
[UPDATE]: When the backend changes its envelope conventions
*/

use serde::{Deserialize, Serialize};

/// Body returned by the auth endpoints that only acknowledge an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Accepts any JSON object, including the empty object produced for 204.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Server-side feature switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub auth_enabled: bool,
}
