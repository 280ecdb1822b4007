//! Account Service
//!
//! Registration, login and profile maintenance on top of an
//! [`IdentityProvider`]. Login issues a bearer token through the
//! [`TokenService`]; the profile operations act on the caller's identity.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::error::{ApiError, ApiResult};
use crate::identity_provider::{AccountError, IdentityProvider, UserAccount};
use crate::types::{ChangeNameRequest, ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest};
use tasktrack_core::Identity;

pub const USER_NAME_MIN_LEN: usize = 5;
pub const USER_NAME_MAX_LEN: usize = 100;

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::DuplicateUserName(name) => ApiError::entity_already_exists("User", name),
            AccountError::UnknownUser(id) => ApiError::entity_not_found("User", id),
            AccountError::WrongPassword => ApiError::unauthorized("Current password is not correct"),
            AccountError::Provider(reason) => {
                tracing::error!(reason = %reason, "Identity provider failure");
                ApiError::service_unavailable("Identity provider unavailable")
            }
        }
    }
}

fn validate_user_name(field: &str, user_name: &str) -> ApiResult<()> {
    let user_name = user_name.trim();
    if user_name.is_empty() {
        return Err(ApiError::missing_field(field));
    }
    let len = user_name.chars().count();
    if !(USER_NAME_MIN_LEN..=USER_NAME_MAX_LEN).contains(&len) {
        return Err(ApiError::invalid_range(
            &format!("{} length", field),
            USER_NAME_MIN_LEN as i64,
            USER_NAME_MAX_LEN as i64,
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::missing_field("email"));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace) => Ok(()),
        _ => Err(ApiError::invalid_format("email", "an email address")),
    }
}

fn validate_password(field: &str, password: &str) -> ApiResult<()> {
    if password.is_empty() {
        return Err(ApiError::missing_field(field));
    }
    Ok(())
}

fn validate_registration(request: &RegisterRequest) -> ApiResult<()> {
    validate_user_name("user_name", &request.user_name)?;
    validate_email(&request.email)?;
    validate_password("password", &request.password)
}

#[derive(Clone)]
pub struct AccountService {
    provider: Arc<dyn IdentityProvider>,
    tokens: Arc<TokenService>,
}

impl AccountService {
    pub fn new(provider: Arc<dyn IdentityProvider>, tokens: Arc<TokenService>) -> Self {
        Self { provider, tokens }
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<UserAccount> {
        validate_registration(request)?;

        let account = self
            .provider
            .register(&request.user_name, &request.email, &request.password)
            .await?;

        tracing::info!(user_id = %account.id, user_name = %account.user_name, "User registered");
        Ok(account)
    }

    /// Verify credentials and issue a token. Unknown users and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
        if request.user_name.trim().is_empty() {
            return Err(ApiError::missing_field("user_name"));
        }
        if request.password.is_empty() {
            return Err(ApiError::missing_field("password"));
        }

        let Some(account) = self.provider.verify(&request.user_name, &request.password).await? else {
            tracing::warn!(user_name = %request.user_name, "Login failed");
            return Err(ApiError::unauthorized("Invalid user name or password"));
        };

        let token = self.tokens.issue(&account.id, &account.user_name, &account.email)?;

        tracing::info!(user_id = %account.id, "User logged in");
        Ok(LoginResponse {
            token,
            user_id: account.id.into_inner(),
            user_name: account.user_name,
            email: account.email,
        })
    }
}

impl AccountService {
    /// The caller's own account.
    pub async fn profile(&self, identity: &Identity) -> ApiResult<UserAccount> {
        self.provider
            .find_by_id(identity)
            .await?
            .ok_or_else(|| ApiError::entity_not_found("User", identity))
    }

    pub async fn change_name(&self, identity: &Identity, request: &ChangeNameRequest) -> ApiResult<UserAccount> {
        validate_user_name("name", &request.name)?;

        let account = self.provider.set_user_name(identity, &request.name).await?;
        tracing::info!(user_id = %identity, user_name = %account.user_name, "User renamed");
        Ok(account)
    }

    pub async fn change_email(&self, identity: &Identity, email: &str) -> ApiResult<UserAccount> {
        validate_email(email)?;

        let account = self.provider.set_email(identity, email).await?;
        tracing::info!(user_id = %identity, "User email changed");
        Ok(account)
    }

    /// Tokens issued before the change stay valid until they expire.
    pub async fn change_password(&self, identity: &Identity, request: &ChangePasswordRequest) -> ApiResult<()> {
        validate_password("old_password", &request.old_password)?;
        validate_password("new_password", &request.new_password)?;

        match self
            .provider
            .change_password(identity, &request.old_password, &request.new_password)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = %identity, "User password changed");
                Ok(())
            }
            Err(AccountError::WrongPassword) => {
                tracing::warn!(user_id = %identity, "Password change with wrong current password");
                Err(AccountError::WrongPassword.into())
            }
            Err(other) => Err(other.into()),
        }
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
