//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::Parser;
use http_body_util::BodyExt;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use quickdemo_core::{
    DomainError, InMemoryPostalCodeLogic, LogicError, MemoryLogSink, PostalCode, PostalCodeInfo,
    PostalCodeLogic,
};
use quickdemo_server::auth::{
    JwtValidator, RemoteAuthority, SigningKeySource, SigningKeys, StaticKeySource, TokenValidator,
};
use quickdemo_server::{build_pipeline, AppConfig, AppState, Problem};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"quickdemo-test-signing-key-for-hs256-00000";
pub const KID: &str = "test-key";
pub const AUTHORITY: &str = "https://login.quickdemo.test/";
pub const AUDIENCE: &str = "quickdemo-api";

/// How the scripted provider answers.
#[derive(Debug, Clone)]
pub enum Behavior {
    Fixtures,
    Fail(&'static str),
    Reject(&'static str),
    Panic,
    Sleep(Duration),
}

/// Provider that counts calls and answers per [`Behavior`].
pub struct ScriptedLogic {
    behavior: Behavior,
    fixtures: InMemoryPostalCodeLogic,
    calls: AtomicUsize,
}

impl ScriptedLogic {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            fixtures: InMemoryPostalCodeLogic::with_fixtures(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostalCodeLogic for ScriptedLogic {
    async fn lookup(&self, code: &PostalCode) -> Result<Option<PostalCodeInfo>, LogicError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Fixtures => self.fixtures.lookup(code).await,
            Behavior::Fail(msg) => Err(LogicError::Internal(anyhow::anyhow!(*msg))),
            Behavior::Reject(msg) => Err(DomainError::Validation((*msg).to_string()).into()),
            Behavior::Panic => panic!("provider exploded"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(*d).await;
                self.fixtures.lookup(code).await
            }
        }
    }
}

pub fn config(extra: &[&str]) -> AppConfig {
    let mut args = vec![
        "quickdemo-server",
        "--authority",
        AUTHORITY,
        "--audience",
        AUDIENCE,
        "--environment",
        "development",
    ];
    args.extend_from_slice(extra);
    AppConfig::try_parse_from(args).expect("valid test configuration")
}

pub fn static_validator() -> Arc<dyn TokenValidator> {
    let keys: JwkSet = serde_json::from_value(json!({"keys": [{
        "kty": "oct",
        "kid": KID,
        "alg": "HS256",
        "k": URL_SAFE_NO_PAD.encode(SECRET),
    }]}))
    .unwrap();
    let source: Arc<dyn SigningKeySource> = Arc::new(StaticKeySource::new(SigningKeys {
        issuer: Some(AUTHORITY.to_string()),
        keys,
    }));
    Arc::new(JwtValidator::new(source, AUDIENCE).with_algorithms(vec![Algorithm::HS256]))
}

/// Validator whose authority cannot be reached.
pub fn unreachable_validator() -> Arc<dyn TokenValidator> {
    let source: Arc<dyn SigningKeySource> = Arc::new(
        RemoteAuthority::new(
            "http://127.0.0.1:9/.well-known/openid-configuration",
            Duration::from_secs(600),
        )
        .unwrap(),
    );
    Arc::new(JwtValidator::new(source, AUDIENCE))
}

pub struct TestApp {
    pub router: Router,
    pub logic: Arc<ScriptedLogic>,
    pub sink: Arc<MemoryLogSink>,
}

impl TestApp {
    pub fn new(extra: &[&str], behavior: Behavior) -> Self {
        Self::with_validator(extra, behavior, static_validator())
    }

    pub fn with_validator(
        extra: &[&str],
        behavior: Behavior,
        tokens: Arc<dyn TokenValidator>,
    ) -> Self {
        let logic = ScriptedLogic::new(behavior);
        let sink = Arc::new(MemoryLogSink::new());
        let state = AppState::new(config(extra), logic.clone(), tokens, sink.clone());
        Self {
            router: build_pipeline(state),
            logic,
            sink,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

pub fn mint(claims: Value) -> String {
    let mut claims: Map<String, Value> = serde_json::from_value(claims).unwrap();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    claims.entry("iss").or_insert_with(|| json!(AUTHORITY));
    claims.entry("aud").or_insert_with(|| json!(AUDIENCE));
    claims.entry("exp").or_insert_with(|| json!(now + 3600));
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

/// Well-formed RS256 token that no key can verify. Gets past header parsing
/// so the validator has to consult its key source.
pub fn unsigned_rs256_token(kid: &str) -> String {
    let header = json!({"alg": "RS256", "typ": "JWT", "kid": kid});
    let claims = json!({"sub": "user-1", "aud": AUDIENCE, "iss": AUTHORITY});
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature"),
    )
}

pub fn get(uri: &str) -> Request<Body> {
    with_peer(Request::get(uri).body(Body::empty()).unwrap(), "192.0.2.10:50000")
}

pub fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    let req = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    with_peer(req, "192.0.2.10:50000")
}

pub fn with_peer(mut req: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn problem(response: Response<Body>) -> Problem {
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
