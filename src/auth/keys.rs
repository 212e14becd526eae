//! Verification key set.
//!
//! # Responsibilities
//! - Fetch the identity provider's JWKS document once at startup
//! - Index decoding keys by `kid` for validator lookups
//! - Register the gateway's own signing secret alongside provider keys
//!
//! # Design Decisions
//! - The fetch happens exactly once, before the listener binds. A gateway
//!   that cannot verify tokens accepts nothing but rejects everything, so
//!   failing startup is the honest outcome.
//! - Keys are immutable after startup. Rotation means restart.

use std::collections::HashMap;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;

/// Why the key set could not be assembled.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    #[error("JWKS fetch from {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("JWKS document from {url} is not valid: {source}")]
    Parse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("JWKS key {kid} is unusable: {source}")]
    Key {
        kid: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

/// Decoding keys indexed by key id.
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    /// Fetch and parse the provider's JWKS document. Called once at startup;
    /// any failure here is fatal to the process.
    pub async fn fetch(url: &str) -> Result<Self, KeySetError> {
        tracing::info!(%url, "fetching identity provider key set");

        let response = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| KeySetError::Fetch { url: url.to_string(), source })?;

        let document: JwkSet = response
            .json()
            .await
            .map_err(|source| KeySetError::Parse { url: url.to_string(), source })?;

        Self::from_jwks(&document)
    }

    /// Index a parsed JWKS document by `kid`. Entries without a key id
    /// cannot be matched against token headers and are skipped.
    pub fn from_jwks(document: &JwkSet) -> Result<Self, KeySetError> {
        let mut keys = HashMap::new();

        for jwk in &document.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                tracing::warn!("skipping JWKS entry without a key id");
                continue;
            };

            let key = DecodingKey::from_jwk(jwk)
                .map_err(|source| KeySetError::Key { kid: kid.clone(), source })?;
            keys.insert(kid, key);
        }

        tracing::info!(count = keys.len(), "provider key set loaded");
        Ok(Self { keys })
    }

    /// Register the gateway's own HS256 secret under `kid`, so self-issued
    /// tokens resolve through the same lookup as provider-issued ones.
    pub fn insert_local_secret(&mut self, kid: &str, secret: &[u8]) {
        self.keys.insert(kid.to_string(), DecodingKey::from_secret(secret));
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    fn oct_jwk(kid: &str, secret: &[u8]) -> serde_json::Value {
        json!({
            "kty": "oct",
            "kid": kid,
            "k": URL_SAFE_NO_PAD.encode(secret),
        })
    }

    #[test]
    fn indexes_keys_by_kid() {
        let document: JwkSet = serde_json::from_value(json!({
            "keys": [oct_jwk("provider-1", b"alpha"), oct_jwk("provider-2", b"beta")],
        }))
        .unwrap();

        let keys = KeySet::from_jwks(&document).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.get("provider-1").is_some());
        assert!(keys.get("provider-2").is_some());
        assert!(keys.get("provider-3").is_none());
    }

    #[test]
    fn entries_without_kid_are_skipped() {
        let document: JwkSet = serde_json::from_value(json!({
            "keys": [
                {"kty": "oct", "k": URL_SAFE_NO_PAD.encode(b"anonymous")},
                oct_jwk("named", b"secret"),
            ],
        }))
        .unwrap();

        let keys = KeySet::from_jwks(&document).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.get("named").is_some());
    }

    #[test]
    fn local_secret_joins_the_set() {
        let document: JwkSet = serde_json::from_value(json!({
            "keys": [oct_jwk("provider-1", b"alpha")],
        }))
        .unwrap();

        let mut keys = KeySet::from_jwks(&document).unwrap();
        keys.insert_local_secret("gateway-local", b"local-secret");

        assert_eq!(keys.len(), 2);
        assert!(keys.get("gateway-local").is_some());
    }
}
