//! HS256 token issuance and validation.
//!
//! Time checks are performed by `validate_claims` on the typed timestamps, so
//! the registered `exp`/`nbf` claims are not used.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::{JwtClaims, validate_claims};
use crate::error::AuthError;
use crate::user::User;

/// Validates a bearer token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError>;
}

/// A freshly minted token plus the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: JwtClaims,
}

/// Signs tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct Hs256TokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl Hs256TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let claims = JwtClaims {
            sub: user.id,
            username: user.username.clone(),
            issued_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| AuthError::TokenCreation("expiry out of range".to_string()))?,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }
}

/// Verifies HS256 signatures with the same shared secret.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::TokenValidationError;
    use crate::user::NewUser;

    fn user() -> User {
        NewUser::new("storekeeper", "hash".to_string(), Utc::now()).into_user()
    }

    #[test]
    fn issued_token_validates_with_same_secret() {
        let issuer = Hs256TokenIssuer::new(b"secret", Duration::minutes(60));
        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let now = Utc::now();

        let issued = issuer.issue(&user(), now).unwrap();
        let claims = validator.validate(&issued.token, now).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.username, "storekeeper");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = Hs256TokenIssuer::new(b"secret", Duration::minutes(60));
        let validator = Hs256JwtValidator::new(b"other".to_vec());
        let now = Utc::now();

        let issued = issuer.issue(&user(), now).unwrap();
        assert!(matches!(
            validator.validate(&issued.token, now),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error() {
        let issuer = Hs256TokenIssuer::new(b"secret", Duration::days(365 * 1_000_000));
        assert!(matches!(
            issuer.issue(&user(), Utc::now()),
            Err(AuthError::TokenCreation(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = Hs256TokenIssuer::new(b"secret", Duration::minutes(60));
        let validator = Hs256JwtValidator::new(b"secret".to_vec());
        let issued_at = Utc::now() - Duration::hours(2);

        let issued = issuer.issue(&user(), issued_at).unwrap();
        assert_eq!(
            validator.validate(&issued.token, Utc::now()),
            Err(AuthError::Claims(TokenValidationError::Expired))
        );
    }
}
