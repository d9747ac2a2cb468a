//! Token minting shared by unit tests.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

use crate::auth::SigningKeys;

pub const TEST_SECRET: &[u8] = b"quickdemo-test-signing-key-for-hs256-00000";
pub const TEST_KID: &str = "test-key";
pub const TEST_ISSUER: &str = "https://login.quickdemo.test/";
pub const TEST_AUDIENCE: &str = "quickdemo-api";

pub fn static_keys() -> SigningKeys {
    let keys: JwkSet = serde_json::from_value(json!({"keys": [{
        "kty": "oct",
        "kid": TEST_KID,
        "alg": "HS256",
        "k": URL_SAFE_NO_PAD.encode(TEST_SECRET),
    }]}))
    .expect("static jwk set");
    SigningKeys {
        issuer: Some(TEST_ISSUER.to_string()),
        keys,
    }
}

/// Signs `claims` with the test key. `iss`, `aud` and a one hour `exp` are
/// filled in unless present.
pub fn mint(claims: Value) -> String {
    let mut claims: Map<String, Value> = serde_json::from_value(claims).expect("claims object");
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs();
    claims.entry("iss").or_insert_with(|| json!(TEST_ISSUER));
    claims.entry("aud").or_insert_with(|| json!(TEST_AUDIENCE));
    claims.entry("exp").or_insert_with(|| json!(now + 3600));

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).expect("sign token")
}
