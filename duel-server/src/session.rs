use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use duel_types::{MatchId, PlayerId, PlayerRole, SessionIdentity};

const MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub mid: MatchId,    // Match
    pub pid: PlayerId,   // Player
    pub rol: PlayerRole, // Seat
    pub iat: i64,        // Issued at
    pub exp: i64,        // Expiry
    pub jti: String,     // Token id
}

/// Mints and verifies the HS256 tokens that bind a client to one seat in
/// one match. The signing secret is only ever held here.
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: chrono::Duration,
}

impl SessionService {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: chrono::Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    pub fn issue(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        role: PlayerRole,
    ) -> Result<String, SessionError> {
        self.issue_at(match_id, player_id, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        match_id: MatchId,
        player_id: PlayerId,
        role: PlayerRole,
        issued_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims {
            mid: match_id,
            pid: player_id,
            rol: role,
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign session token: {:?}", e);
            SessionError::Signing
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionIdentity, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => {
                    tracing::debug!("Rejected session token: {:?}", e);
                    SessionError::InvalidToken
                }
            })?;

        let claims = token_data.claims;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(SessionError::InvalidToken)?;

        Ok(SessionIdentity {
            match_id: claims.mid,
            player_id: claims.pid,
            role: claims.rol,
            expires_at,
        })
    }

    /// Accepts either a bare token or an `Authorization: Bearer ...` value.
    pub fn verify_header(&self, header: &str) -> Result<SessionIdentity, SessionError> {
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        self.verify(token)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session token expired")]
    Expired,
    #[error("Failed to sign session token")]
    Signing,
}
