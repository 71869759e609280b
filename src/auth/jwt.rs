use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{CredentialSnapshot, ResetClaims, SessionClaims};
use crate::{config::JwtConfig, error::TokenError, state::AppState};

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Signs and verifies session and reset tokens.
///
/// Built once at startup from [`JwtConfig`]; immutable afterwards and cheap
/// to clone into handlers.
#[derive(Clone)]
pub struct JwtKeys {
    keys: Option<SigningKeys>,
    pub issuer: String,
    pub audience: String,
    pub reset_audience: String,
    pub session_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let keys = cfg.secret.as_deref().map(|secret| SigningKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        });
        Self {
            keys,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            reset_audience: cfg.reset_audience.clone(),
            session_ttl: Duration::minutes(cfg.ttl_minutes),
            reset_ttl: Duration::minutes(cfg.reset_ttl_minutes),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.keys.is_some()
    }

    fn signing(&self) -> Result<&SigningKeys, TokenError> {
        self.keys.as_ref().ok_or(TokenError::Configuration)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let keys = self.signing()?;
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(TokenError::Encoding)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, audience: &str) -> Result<T, TokenError> {
        let keys = self.signing()?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = 0;
        let data = decode::<T>(token, &keys.decoding, &validation).map_err(classify)?;
        Ok(data.claims)
    }

    pub fn sign_session(&self, user_id: Uuid, ttl: Duration) -> Result<String, TokenError> {
        self.sign_session_at(user_id, ttl, OffsetDateTime::now_utc())
    }

    pub(crate) fn sign_session_at(
        &self,
        user_id: Uuid,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: user_id,
            iat: now.unix_timestamp(),
            nbf: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = self.sign(&claims)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    /// Returns the subject user ID of a valid session token.
    pub fn verify_session(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims: SessionClaims = self.verify(token, &self.audience)?;
        debug!(user_id = %claims.sub, "session token verified");
        Ok(claims.sub)
    }

    pub fn sign_reset(
        &self,
        snapshot: &CredentialSnapshot,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.sign_reset_at(snapshot, ttl, OffsetDateTime::now_utc())
    }

    pub(crate) fn sign_reset_at(
        &self,
        snapshot: &CredentialSnapshot,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = ResetClaims {
            auth: snapshot.clone(),
            sub: snapshot.email.clone(),
            iat: now.unix_timestamp(),
            nbf: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.reset_audience.clone(),
        };
        let token = self.sign(&claims)?;
        debug!(credential_id = %snapshot.id, "reset token signed");
        Ok(token)
    }

    pub fn verify_reset(&self, token: &str) -> Result<ResetClaims, TokenError> {
        self.verify(token, &self.reset_audience)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        _ => TokenError::Malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::AccessLevel;

    fn make_keys(secret: Option<&str>) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.map(Into::into),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            reset_audience: "test-reset".into(),
            ttl_minutes: 5,
            reset_ttl_minutes: 60,
        })
    }

    fn snapshot() -> CredentialSnapshot {
        let now = OffsetDateTime::now_utc();
        CredentialSnapshot {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            password: "digest".into(),
            email: "a@x.com".into(),
            level: AccessLevel::User,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn sign_and_verify_session_token() {
        let keys = make_keys(Some("dev-secret"));
        let user_id = Uuid::new_v4();
        let token = keys
            .sign_session(user_id, Duration::minutes(5))
            .expect("sign session");
        assert_eq!(keys.verify_session(&token).expect("verify"), user_id);
    }

    #[test]
    fn expired_session_token_is_rejected() {
        let keys = make_keys(Some("dev-secret"));
        let issued = OffsetDateTime::now_utc() - Duration::hours(2);
        let token = keys
            .sign_session_at(Uuid::new_v4(), Duration::hours(1), issued)
            .expect("sign");
        assert!(matches!(
            keys.verify_session(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn future_session_token_is_not_yet_valid() {
        let keys = make_keys(Some("dev-secret"));
        let issued = OffsetDateTime::now_utc() + Duration::hours(1);
        let token = keys
            .sign_session_at(Uuid::new_v4(), Duration::hours(1), issued)
            .expect("sign");
        assert!(matches!(
            keys.verify_session(&token),
            Err(TokenError::NotYetValid)
        ));
    }

    #[test]
    fn foreign_key_yields_signature_invalid() {
        let ours = make_keys(Some("our-secret"));
        let theirs = make_keys(Some("their-secret"));
        let token = theirs
            .sign_session(Uuid::new_v4(), Duration::minutes(5))
            .expect("sign");
        assert!(matches!(
            ours.verify_session(&token),
            Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = make_keys(Some("dev-secret"));
        assert!(matches!(
            keys.verify_session("not-a-token"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            keys.verify_session("a.b.c"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let keys = make_keys(None);
        assert!(!keys.is_configured());
        assert!(matches!(
            keys.sign_session(Uuid::new_v4(), Duration::minutes(5)),
            Err(TokenError::Configuration)
        ));
        assert!(matches!(
            keys.verify_session("a.b.c"),
            Err(TokenError::Configuration)
        ));
    }

    #[test]
    fn reset_token_carries_snapshot() {
        let keys = make_keys(Some("dev-secret"));
        let snap = snapshot();
        let token = keys.sign_reset(&snap, Duration::hours(24)).expect("sign");
        let claims = keys.verify_reset(&token).expect("verify");
        assert_eq!(claims.sub, snap.email);
        assert_eq!(claims.auth.id, snap.id);
        assert_eq!(claims.auth.password, "digest");
    }

    #[test]
    fn reset_and_session_tokens_are_not_interchangeable() {
        let keys = make_keys(Some("dev-secret"));
        let reset = keys.sign_reset(&snapshot(), Duration::hours(1)).expect("sign");
        assert!(matches!(
            keys.verify_session(&reset),
            Err(TokenError::Malformed(_))
        ));
        let session = keys
            .sign_session(Uuid::new_v4(), Duration::hours(1))
            .expect("sign");
        assert!(keys.verify_reset(&session).is_err());
    }
}
