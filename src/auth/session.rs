use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::claims::{Claims, Identity};
use crate::config::SessionConfig;
use crate::state::AppState;

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl From<&SessionConfig> for JwtKeys {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.session)
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: i64, sid: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            sid,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, %sid, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Who the current request belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    Authenticated(Identity),
}

impl Session {
    pub fn current_identity(&self) -> Option<&Identity> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(identity) => Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

/// Issues, resolves and revokes session tokens. A token is only honoured
/// while its `sid` row exists in `sessions`.
pub struct SessionManager<'a> {
    db: &'a SqlitePool,
    keys: JwtKeys,
}

impl<'a> SessionManager<'a> {
    pub fn new(db: &'a SqlitePool, keys: JwtKeys) -> Self {
        Self { db, keys }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(&state.db, JwtKeys::from_ref(state))
    }

    /// Bind a fresh session to `identity`. `previous` (the token the request
    /// came with, if any) is revoked first.
    pub async fn login(&self, identity: &Identity, previous: Option<&str>) -> anyhow::Result<String> {
        if let Some(token) = previous {
            self.logout(token).await?;
        }
        let sid = Uuid::new_v4();
        sqlx::query("INSERT INTO sessions (id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(sid.to_string())
            .bind(identity.id)
            .bind(OffsetDateTime::now_utc())
            .execute(self.db)
            .await
            .context("insert session")?;
        info!(user_id = identity.id, username = %identity.username, "session started");
        self.keys.sign(identity.id, sid)
    }

    /// Revoke the session behind `token`. Unreadable tokens are ignored.
    pub async fn logout(&self, token: &str) -> anyhow::Result<()> {
        let Ok(claims) = self.keys.verify(token) else {
            return Ok(());
        };
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(claims.sid.to_string())
            .execute(self.db)
            .await
            .context("delete session")?;
        info!(user_id = claims.sub, "session ended");
        Ok(())
    }

    /// Resolve `token` to a session; anything invalid, expired or revoked is
    /// `Anonymous`.
    pub async fn resolve(&self, token: Option<&str>) -> anyhow::Result<Session> {
        let Some(token) = token else {
            return Ok(Session::Anonymous);
        };
        let Ok(claims) = self.keys.verify(token) else {
            debug!("invalid or expired session token");
            return Ok(Session::Anonymous);
        };
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            SELECT u.id, u.username
              FROM sessions s
              JOIN "user" u ON u.id = s.user_id
             WHERE s.id = ? AND s.user_id = ?
            "#,
        )
        .bind(claims.sid.to_string())
        .bind(claims.sub)
        .fetch_optional(self.db)
        .await
        .context("look up session")?;

        Ok(match row {
            Some((id, username)) => Session::Authenticated(Identity { id, username }),
            None => {
                debug!(user_id = claims.sub, "revoked session token");
                Session::Anonymous
            }
        })
    }
}
