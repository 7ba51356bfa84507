//! Signed, kind-discriminated claims tokens.
//!
//! Every token is an HS256 JWT carrying `iat`, `exp`, a `kind` discriminator
//! and the claims that kind requires. Decoding is two-step: after signature
//! and expiry are verified only `kind` is read, then the claim shape for that
//! kind is parsed. Unknown kinds fail closed.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::TokenError;

/// Placeholder written to logs in place of any credential value.
pub const REDACTED: &str = "******";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    UserSession,
    UserToken,
    AgentToken,
    RegistrySession,
    RunToken,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::UserSession => "user_session",
            Kind::UserToken => "user_token",
            Kind::AgentToken => "agent_token",
            Kind::RegistrySession => "registry_session",
            Kind::RunToken => "run_token",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "user_session" => Some(Kind::UserSession),
            "user_token" => Some(Kind::UserToken),
            "agent_token" => Some(Kind::AgentToken),
            "registry_session" => Some(Kind::RegistrySession),
            "run_token" => Some(Kind::RunToken),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claims {
    UserSession { username: String },
    UserToken { token_id: String },
    AgentToken { token_id: String, organization: String },
    RegistrySession { organization: String },
    RunToken { run_id: String, organization: String },
}

impl Claims {
    pub fn kind(&self) -> Kind {
        match self {
            Claims::UserSession { .. } => Kind::UserSession,
            Claims::UserToken { .. } => Kind::UserToken,
            Claims::AgentToken { .. } => Kind::AgentToken,
            Claims::RegistrySession { .. } => Kind::RegistrySession,
            Claims::RunToken { .. } => Kind::RunToken,
        }
    }

    fn subject(&self) -> Option<&str> {
        match self {
            Claims::UserSession { username } => Some(username),
            Claims::UserToken { token_id } | Claims::AgentToken { token_id, .. } => Some(token_id),
            Claims::RunToken { run_id, .. } => Some(run_id),
            Claims::RegistrySession { .. } => None,
        }
    }

    fn organization(&self) -> Option<&str> {
        match self {
            Claims::AgentToken { organization, .. }
            | Claims::RegistrySession { organization }
            | Claims::RunToken { organization, .. } => Some(organization),
            Claims::UserSession { .. } | Claims::UserToken { .. } => None,
        }
    }
}

/// A verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub claims: Claims,
    pub issued_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl Token {
    pub fn kind(&self) -> Kind {
        self.claims.kind()
    }
}

#[derive(Deserialize)]
struct Discriminator {
    kind: String,
}

#[derive(Deserialize)]
struct Registered {
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct SubjectClaims {
    sub: String,
}

#[derive(Deserialize)]
struct OrganizationClaims {
    organization: String,
}

#[derive(Deserialize)]
struct SubjectOrganizationClaims {
    sub: String,
    organization: String,
}

#[derive(Serialize)]
struct WireClaims<'a> {
    kind: &'static str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<&'a str>,
}

/// Signs and verifies tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
        }
    }

    pub fn encode(&self, claims: &Claims, expiry: DateTime<Utc>) -> Result<String, TokenError> {
        let wire = WireClaims {
            kind: claims.kind().as_str(),
            iat: Utc::now().timestamp(),
            exp: expiry.timestamp(),
            sub: claims.subject(),
            organization: claims.organization(),
        };

        encode(&Header::new(Algorithm::HS256), &wire, &self.encoding_key)
            .map_err(TokenError::Encode)
    }

    pub fn decode(&self, token: &str) -> Result<Token, TokenError> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(token = REDACTED, error = %e, "Token verification failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                    _ => TokenError::Malformed,
                }
            })?;
        let raw = Value::Object(data.claims);

        let Discriminator { kind } = parse_claims(&raw)?;
        let kind = Kind::parse(&kind).ok_or(TokenError::UnknownKind(kind))?;

        let claims = match kind {
            Kind::UserSession => {
                let c: SubjectClaims = parse_claims(&raw)?;
                Claims::UserSession { username: c.sub }
            }
            Kind::UserToken => {
                let c: SubjectClaims = parse_claims(&raw)?;
                Claims::UserToken { token_id: c.sub }
            }
            Kind::AgentToken => {
                let c: SubjectOrganizationClaims = parse_claims(&raw)?;
                Claims::AgentToken {
                    token_id: c.sub,
                    organization: c.organization,
                }
            }
            Kind::RegistrySession => {
                let c: OrganizationClaims = parse_claims(&raw)?;
                Claims::RegistrySession {
                    organization: c.organization,
                }
            }
            Kind::RunToken => {
                let c: SubjectOrganizationClaims = parse_claims(&raw)?;
                Claims::RunToken {
                    run_id: c.sub,
                    organization: c.organization,
                }
            }
        };

        let registered: Registered = parse_claims(&raw)?;
        Ok(Token {
            claims,
            issued_at: timestamp(registered.iat)?,
            expiry: timestamp(registered.exp)?,
        })
    }
}

fn parse_claims<T: DeserializeOwned>(raw: &Value) -> Result<T, TokenError> {
    T::deserialize(raw).map_err(|_| TokenError::Malformed)
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&SecretString::new(secret.to_string()))
    }

    fn sign_raw(secret: &str, claims: &Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_round_trip_preserves_kind_and_claims() {
        let codec = codec(SECRET);
        let expiry = Utc::now() + Duration::hours(1);
        let cases = [
            Claims::UserSession { username: "alice".into() },
            Claims::UserToken { token_id: "ut-1".into() },
            Claims::AgentToken { token_id: "at-1".into(), organization: "acme".into() },
            Claims::RegistrySession { organization: "acme".into() },
            Claims::RunToken { run_id: "run-1".into(), organization: "acme".into() },
        ];

        for claims in cases {
            let token = codec.decode(&codec.encode(&claims, expiry).unwrap()).unwrap();
            assert_eq!(token.claims, claims);
            assert_eq!(token.expiry.timestamp(), expiry.timestamp());
            assert_eq!(token.expiry.timestamp_subsec_nanos(), 0);
        }
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let token = codec("another-secret-another-secret-xx")
            .encode(
                &Claims::RegistrySession { organization: "acme".into() },
                Utc::now() + Duration::hours(1),
            )
            .unwrap();
        assert!(matches!(codec(SECRET).decode(&token), Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec(SECRET);
        let claims = Claims::UserToken { token_id: "ut-1".into() };

        let expired = codec.encode(&claims, Utc::now() - Duration::seconds(1)).unwrap();
        assert!(matches!(codec.decode(&expired), Err(TokenError::Expired)));

        let valid = codec.encode(&claims, Utc::now() + Duration::hours(1)).unwrap();
        assert!(codec.decode(&valid).is_ok());
    }

    #[test]
    fn test_unknown_kind_fails_closed() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = sign_raw(
            SECRET,
            &serde_json::json!({"kind": "superuser", "iat": exp - 60, "exp": exp, "sub": "x"}),
        );
        match codec(SECRET).decode(&token) {
            Err(TokenError::UnknownKind(kind)) => assert_eq!(kind, "superuser"),
            other => panic!("expected unknown kind, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_claims_are_malformed() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let codec = codec(SECRET);

        let no_org = sign_raw(
            SECRET,
            &serde_json::json!({"kind": "registry_session", "iat": exp - 60, "exp": exp}),
        );
        assert!(matches!(codec.decode(&no_org), Err(TokenError::Malformed)));

        let no_kind = sign_raw(SECRET, &serde_json::json!({"iat": exp - 60, "exp": exp}));
        assert!(matches!(codec.decode(&no_kind), Err(TokenError::Malformed)));

        let no_exp = sign_raw(
            SECRET,
            &serde_json::json!({"kind": "user_token", "iat": exp - 60, "sub": "ut-1"}),
        );
        assert!(matches!(codec.decode(&no_exp), Err(TokenError::Malformed)));

        assert!(matches!(codec.decode("not-a-token"), Err(TokenError::Malformed)));
    }
}
