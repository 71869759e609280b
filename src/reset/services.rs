use std::{collections::BTreeMap, sync::Arc};

use axum::extract::FromRef;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::CredentialSnapshot,
        jwt::JwtKeys,
        repo_types::Credential,
    },
    config::SmtpConfig,
    db::Conn,
    error::{AppError, AppResult},
    mailer::{render_template, Mail, DEFAULT_RESET_TEMPLATE},
    reset::{repo::ResetTokenStore, repo_types::ResetToken},
    state::AppState,
};

/// Issues, validates and consumes password-reset tokens.
///
/// Lifecycle of a record: created with `used = false`, optionally validated
/// any number of times, then consumed, which flips `used` to true for good.
///
/// `validate` and `consume` share no lock. Two requests may both see
/// `used = false` and both consume the same token, applying two resets.
/// [`ResetTokens::consume_exclusive`] closes that gap with a conditional
/// update and is opt-in.
#[derive(Clone)]
pub struct ResetTokens {
    store: Arc<dyn ResetTokenStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for ResetTokens {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.reset_tokens.clone(), state.keys.clone())
    }
}

impl ResetTokens {
    pub fn new(store: Arc<dyn ResetTokenStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Signs a snapshot of `credential` and records it as an unused token.
    pub async fn generate(&self, conn: Conn<'_>, credential: &Credential) -> AppResult<ResetToken> {
        let snapshot = CredentialSnapshot::from(credential);
        let signed = self.keys.sign_reset(&snapshot, self.keys.reset_ttl)?;
        let record = self.store.insert(conn, &signed).await?;
        info!(token_id = %record.id, credential_id = %credential.id, "reset token issued");
        Ok(record)
    }

    /// True while the token exists and has not been consumed. Read-only.
    pub async fn validate(&self, id: Uuid, token: &str) -> AppResult<bool> {
        let used = self.store.used_flag(id, token).await?;
        debug!(token_id = %id, used, "reset token validated");
        Ok(!used)
    }

    /// Marks the token used (unconditionally) and returns the credential
    /// snapshot it was issued for. The flag is written before decoding, so a
    /// caller that commits on a [`AppError::Token`] failure burns the token.
    pub async fn consume(&self, conn: Conn<'_>, id: Uuid, token: &str) -> AppResult<CredentialSnapshot> {
        self.store.mark_used(conn, id).await?;
        self.decode(id, token)
    }

    /// Like [`Self::consume`] but fails with [`AppError::AlreadyUsed`] unless
    /// this call is the one that flipped `used` from false to true.
    pub async fn consume_exclusive(
        &self,
        conn: Conn<'_>,
        id: Uuid,
        token: &str,
    ) -> AppResult<CredentialSnapshot> {
        if !self.store.mark_used_if_unused(conn, id).await? {
            warn!(token_id = %id, "reset token consumed twice");
            return Err(AppError::AlreadyUsed);
        }
        self.decode(id, token)
    }

    fn decode(&self, id: Uuid, token: &str) -> AppResult<CredentialSnapshot> {
        let claims = self.keys.verify_reset(token)?;
        info!(token_id = %id, credential_id = %claims.auth.id, "reset token consumed");
        Ok(claims.auth)
    }
}

/// Reset e-mail for `token`, rendered from the configured template file or
/// the built-in one.
pub async fn build_reset_mail(
    smtp: &SmtpConfig,
    credential: &Credential,
    token: &ResetToken,
) -> AppResult<Mail> {
    let sender = smtp
        .sender
        .clone()
        .ok_or_else(|| AppError::Configuration("SMTP_SENDER_ADDR is not set".into()))?;
    let template = match &smtp.template_path {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Configuration(format!("load template {}: {e}", path.display()))
        })?,
        None => DEFAULT_RESET_TEMPLATE.to_string(),
    };
    let vars = BTreeMap::from([
        ("RESET_TOKEN_ID", token.id.to_string()),
        ("TOKEN", token.token.clone()),
        ("USERNAME", credential.username.clone()),
    ]);
    Ok(Mail {
        channel: "email".into(),
        from: sender,
        to: credential.email.clone(),
        subject: "Reset Password".into(),
        content_type: "text/html".into(),
        body: render_template(&template, &vars),
    })
}
