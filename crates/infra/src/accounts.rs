//! Account registration and login.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use smis_auth::{
    AuthError, Hs256TokenIssuer, IssuedToken, NewUser, Registration, User, hash_password,
    verify_password,
};
use smis_core::DomainError;

use crate::store::{StoreError, UserStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("{0}")]
    Rejected(String),

    #[error("username already exists")]
    DuplicateUsername,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DomainError> for AccountError {
    fn from(value: DomainError) -> Self {
        AccountError::Rejected(value.to_string())
    }
}

/// Successful login: the token and the account it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: IssuedToken,
    pub user: User,
}

#[derive(Clone)]
pub struct AccountService<U> {
    users: U,
    issuer: Hs256TokenIssuer,
}

impl<U: UserStore> AccountService<U> {
    pub fn new(users: U, issuer: Hs256TokenIssuer) -> Self {
        Self { users, issuer }
    }

    #[instrument(skip(self, registration), fields(username = %registration.username.trim()), err)]
    pub async fn register(&self, registration: Registration) -> Result<User, AccountError> {
        registration.validate()?;

        // Argon2 is deliberately slow; keep it off the async workers.
        let password = registration.password;
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;

        let user = self
            .users
            .insert_user(NewUser::new(&registration.username, hash, Utc::now()))
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AccountError::DuplicateUsername,
                other => AccountError::Store(other),
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AccountError> {
        let user = self
            .users
            .find_user_by_username(username.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        let candidate = password.to_string();
        let hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;
        if !verified {
            return Err(AccountError::InvalidCredentials);
        }

        let token = self.issuer.issue(&user, Utc::now())?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session { token, user })
    }
}
