//! Token issuing and validation.
//!
//! # Responsibilities
//! - Issue HS256 tokens for the login endpoint
//! - Validate bearer tokens: kid lookup, signature, issuer, audience, expiry
//!
//! # Design Decisions
//! - Validation keys come from the startup key set; the gateway's own
//!   signing secret sits in that set under `signing_kid`, so self-issued
//!   and provider-issued tokens travel the same path.
//! - The verification algorithm is taken from the token header. Key and
//!   algorithm family still have to agree, so an HS256 token pointing at a
//!   provider's RSA kid fails verification instead of downgrading it.
//! - Rejections carry distinct messages. Operators debugging a 401 need to
//!   know whether the token is expired, mis-addressed, or forged.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, get_current_timestamp, Algorithm, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

use super::keys::KeySet;

/// Claims carried by gateway-issued tokens and expected on inbound ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    /// Optional on inbound tokens (RFC 7519); issued tokens always set it.
    #[serde(default)]
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Claims {
    /// Display identity: the provider's username claim when present,
    /// otherwise the subject.
    pub fn identity(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or(&self.sub)
    }
}

/// Why a bearer token was rejected. Every variant maps to 401; the
/// messages are deliberately distinct.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("token header is not readable")]
    BadTokenHeader,

    #[error("token has no key id")]
    MissingKid,

    #[error("token signed with unknown key id {0}")]
    UnknownKid(String),

    #[error("token has expired")]
    Expired,

    #[error("token issuer is not accepted")]
    BadIssuer,

    #[error("token audience is not accepted")]
    BadAudience,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token is not valid")]
    Invalid,
}

/// Issues login tokens and validates every inbound bearer token.
pub struct TokenAuthority {
    issuer: String,
    audience: String,
    signing_kid: String,
    ttl_secs: u64,
    encoding_key: EncodingKey,
    keys: KeySet,
}

impl TokenAuthority {
    /// Wrap the fetched key set, registering the gateway's own signing
    /// secret so tokens it issues validate like any other.
    pub fn new(config: &AuthConfig, mut keys: KeySet) -> Self {
        keys.insert_local_secret(&config.signing_kid, config.token_secret.as_bytes());

        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            signing_kid: config.signing_kid.clone(),
            ttl_secs: config.token_ttl_secs,
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            keys,
        }
    }

    /// Issue an HS256 token for a successfully authenticated login.
    pub fn issue(&self, username: &str, roles: Vec<String>) -> Result<String, jsonwebtoken::errors::Error> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: username.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: now + self.ttl_secs,
            iat: now,
            preferred_username: Some(username.to_string()),
            roles,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.signing_kid.clone());
        encode(&header, &claims, &self.encoding_key)
    }

    /// Validate a bearer token and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::BadTokenHeader)?;
        let kid = header.kid.ok_or(AuthError::MissingKid)?;
        let key = self.keys.get(&kid).ok_or_else(|| AuthError::UnknownKid(kid.clone()))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let data = decode::<Claims>(token, key, &validation).map_err(|error| match error.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidIssuer => AuthError::BadIssuer,
            ErrorKind::InvalidAudience => AuthError::BadAudience,
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            _ => AuthError::Invalid,
        })?;

        Ok(data.claims)
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwks_url: "http://127.0.0.1:1/certs".to_string(),
            issuer: "http://idp.test/realms/items".to_string(),
            audience: "item-gateway".to_string(),
            token_secret: "unit-test-secret".to_string(),
            signing_kid: "gateway-local".to_string(),
            token_ttl_secs: 600,
            login_username: "admin".to_string(),
            login_password: "secret".to_string(),
        }
    }

    fn empty_key_set() -> KeySet {
        let document = serde_json::from_value(json!({ "keys": [] })).unwrap();
        KeySet::from_jwks(&document).unwrap()
    }

    fn authority() -> TokenAuthority {
        TokenAuthority::new(&test_config(), empty_key_set())
    }

    fn encode_with(config: &AuthConfig, secret: &str, claims: &Claims) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(config.signing_kid.clone());
        encode(&header, claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn valid_claims(config: &AuthConfig) -> Claims {
        let now = get_current_timestamp();
        Claims {
            sub: "admin".to_string(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: now + 600,
            iat: now,
            preferred_username: Some("admin".to_string()),
            roles: vec!["admin".to_string()],
        }
    }

    #[test]
    fn issued_tokens_validate() {
        let authority = authority();
        let token = authority.issue("admin", vec!["admin".to_string()]).unwrap();

        let claims = authority.validate(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.identity(), "admin");
        assert_eq!(claims.aud, "item-gateway");
        assert_eq!(claims.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn token_without_iat_validates() {
        // iat is optional in RFC 7519; providers are free to omit it.
        let authority = authority();
        let config = test_config();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(config.signing_kid.clone());
        let token = encode(
            &header,
            &json!({
                "sub": "provider-user",
                "iss": config.issuer,
                "aud": config.audience,
                "exp": get_current_timestamp() + 600,
            }),
            &EncodingKey::from_secret(config.token_secret.as_bytes()),
        )
        .unwrap();

        let claims = authority.validate(&token).unwrap();
        assert_eq!(claims.identity(), "provider-user");
    }

    #[test]
    fn unknown_kid_is_rejected() {
        let authority = authority();
        let mut config = test_config();
        config.signing_kid = "somebody-else".to_string();
        let token = encode_with(&config, &config.token_secret, &valid_claims(&config));

        assert_eq!(
            authority.validate(&token),
            Err(AuthError::UnknownKid("somebody-else".to_string()))
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let authority = authority();
        let config = test_config();
        let mut claims = valid_claims(&config);
        claims.iat = get_current_timestamp() - 7300;
        claims.exp = get_current_timestamp() - 7200;
        let token = encode_with(&config, &config.token_secret, &claims);

        assert_eq!(authority.validate(&token), Err(AuthError::Expired));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let authority = authority();
        let config = test_config();
        let mut claims = valid_claims(&config);
        claims.iss = "http://somewhere.else/realms/items".to_string();
        let token = encode_with(&config, &config.token_secret, &claims);

        assert_eq!(authority.validate(&token), Err(AuthError::BadIssuer));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let authority = authority();
        let config = test_config();
        let mut claims = valid_claims(&config);
        claims.aud = "another-service".to_string();
        let token = encode_with(&config, &config.token_secret, &claims);

        assert_eq!(authority.validate(&token), Err(AuthError::BadAudience));
    }

    #[test]
    fn forged_signature_is_rejected() {
        let authority = authority();
        let config = test_config();
        let token = encode_with(&config, "not-the-real-secret", &valid_claims(&config));

        assert_eq!(authority.validate(&token), Err(AuthError::BadSignature));
    }

    #[test]
    fn hmac_token_cannot_borrow_an_rsa_kid() {
        // An HS256 token naming a provider RSA kid must not verify against
        // the RSA key material.
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        let modulus = URL_SAFE_NO_PAD.encode([0x42u8; 256]);
        let document = serde_json::from_value(json!({
            "keys": [{
                "kty": "RSA",
                "kid": "provider-rsa",
                "n": modulus,
                "e": "AQAB"
            }],
        }))
        .unwrap();
        let keys = KeySet::from_jwks(&document).unwrap();
        let authority = TokenAuthority::new(&test_config(), keys);

        let config = test_config();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("provider-rsa".to_string());
        let token = encode(
            &header,
            &valid_claims(&config),
            &EncodingKey::from_secret(config.token_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(authority.validate(&token), Err(AuthError::Invalid));
    }
}
