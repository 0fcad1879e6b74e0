/*
[INPUT]:  Credentials, registration data and password-reset tokens
[OUTPUT]: Login tokens and acknowledgement messages
[POS]:    HTTP layer - auth endpoints (no bearer token required)
[UPDATE]: When adding new auth endpoints or changing their payloads
*/

use crate::http::{ApiClient, Result};
use crate::types::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, ResendVerificationRequest, ResetPasswordRequest, VerifyEmailRequest,
};

impl ApiClient {
    /// Exchange credentials for a token pair
    ///
    /// POST /api/v1/auth/login
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse> {
        self.post("/api/v1/auth/login", Some(credentials)).await
    }

    /// POST /api/v1/auth/register
    pub async fn register(&self, data: &RegisterRequest) -> Result<RegisterResponse> {
        self.post("/api/v1/auth/register", Some(data)).await
    }

    /// POST /api/v1/auth/forgot-password
    pub async fn forgot_password(&self, data: &ForgotPasswordRequest) -> Result<MessageResponse> {
        self.post("/api/v1/auth/forgot-password", Some(data)).await
    }

    /// POST /api/v1/auth/reset-password
    pub async fn reset_password(&self, data: &ResetPasswordRequest) -> Result<MessageResponse> {
        self.post("/api/v1/auth/reset-password", Some(data)).await
    }

    /// POST /api/v1/auth/resend-verification
    pub async fn resend_verification(
        &self,
        data: &ResendVerificationRequest,
    ) -> Result<MessageResponse> {
        self.post("/api/v1/auth/resend-verification", Some(data)).await
    }

    /// POST /api/v1/auth/verify-email
    pub async fn verify_email(&self, data: &VerifyEmailRequest) -> Result<MessageResponse> {
        self.post("/api/v1/auth/verify-email", Some(data)).await
    }
}
