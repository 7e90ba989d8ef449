//! Common test utilities: a canned identity provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use keyshed::{ClientConfig, IdentityProvider, OidcError, TokenRecord, TokenResponse};

/// A provider call recorded with the arguments the client passed.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    PasswordGrant { username: String, password: String },
    RefreshGrant { refresh_token: String },
    ExchangeToken { subject_token: String, audience: String },
    Userinfo { access_token: String },
}

/// Identity provider double serving canned responses in order.
///
/// Every method pops from its own queue; an exhausted queue produces an
/// endpoint error, which doubles as failure injection: a mock with no
/// refresh responses makes every refresh grant fail.
#[derive(Default)]
pub struct MockProvider {
    password_responses: Mutex<VecDeque<TokenResponse>>,
    refresh_responses: Mutex<VecDeque<TokenResponse>>,
    userinfo_responses: Mutex<VecDeque<Value>>,
    exchange_responses: Mutex<VecDeque<Value>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password_response(self, response: TokenResponse) -> Self {
        self.password_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_refresh_response(self, response: TokenResponse) -> Self {
        self.refresh_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_userinfo_response(self, response: Value) -> Self {
        self.userinfo_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_exchange_response(self, response: Value) -> Self {
        self.exchange_responses.lock().unwrap().push_back(response);
        self
    }

    /// All calls made to this provider, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Total number of calls made to this provider.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_tokens(
        queue: &Mutex<VecDeque<TokenResponse>>,
        endpoint: &str,
    ) -> Result<TokenResponse, OidcError> {
        queue.lock().unwrap().pop_front().ok_or_else(|| exhausted(endpoint))
    }

    fn next_document(
        queue: &Mutex<VecDeque<Value>>,
        endpoint: &str,
    ) -> Result<Value, OidcError> {
        queue.lock().unwrap().pop_front().ok_or_else(|| exhausted(endpoint))
    }
}

fn exhausted(endpoint: &str) -> OidcError {
    OidcError::Endpoint {
        status: 500,
        body: format!("mock: no canned {endpoint} response"),
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, OidcError> {
        self.record(ProviderCall::PasswordGrant {
            username: username.to_string(),
            password: password.to_string(),
        });
        Self::next_tokens(&self.password_responses, "password grant")
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, OidcError> {
        self.record(ProviderCall::RefreshGrant {
            refresh_token: refresh_token.to_string(),
        });
        Self::next_tokens(&self.refresh_responses, "refresh grant")
    }

    async fn exchange_token(
        &self,
        subject_token: &str,
        audience: &str,
    ) -> Result<Value, OidcError> {
        self.record(ProviderCall::ExchangeToken {
            subject_token: subject_token.to_string(),
            audience: audience.to_string(),
        });
        Self::next_document(&self.exchange_responses, "exchange")
    }

    async fn userinfo(&self, access_token: &str) -> Result<Value, OidcError> {
        self.record(ProviderCall::Userinfo {
            access_token: access_token.to_string(),
        });
        Self::next_document(&self.userinfo_responses, "userinfo")
    }
}

/// Shorthand for a full token-endpoint response.
pub fn token_response(
    access: &str,
    refresh: &str,
    expires_in: i64,
    refresh_expires_in: i64,
) -> TokenResponse {
    TokenResponse {
        access_token: Some(access.to_string()),
        refresh_token: Some(refresh.to_string()),
        expires_in: Some(expires_in),
        refresh_expires_in: Some(refresh_expires_in),
    }
}

/// A config pointing at the realm the mock provider serves.
pub fn test_config() -> ClientConfig {
    ClientConfig::new("https://sso.example.com", "orders", "orders-cli", "client-secret")
}

/// Current Unix time in whole seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A record issued `age` seconds ago with the given lifespans.
pub fn record_issued(
    age: i64,
    access_lifespan: Option<i64>,
    refresh_lifespan: Option<i64>,
) -> TokenRecord {
    TokenRecord {
        server_url: "https://sso.example.com".to_string(),
        realm_name: "orders".to_string(),
        token_timestamp: now() - age,
        access_token: "at-0".to_string(),
        access_token_lifespan: access_lifespan,
        refresh_token: Some("rt-0".to_string()),
        refresh_token_lifespan: refresh_lifespan,
    }
}
