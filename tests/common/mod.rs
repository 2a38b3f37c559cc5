#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use family_notes_api::auth::{CredentialError, CredentialVerifier};
use family_notes_api::clock::SystemClock;
use family_notes_api::config::AppConfig;
use family_notes_api::database::models::User;
use family_notes_api::database::MemoryStore;
use family_notes_api::router::app;
use family_notes_api::state::AppState;
use family_notes_api::storage::LocalBlobStore;

pub const MAX_UPLOAD_BYTES: usize = 1024;

/// Plain-text credentials so tests skip Argon2's cost
pub struct PlainCredentials;

impl CredentialVerifier for PlainCredentials {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        Ok(format!("plain:{}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        Ok(hash == format!("plain:{}", password))
    }
}

/// A user inserted straight into the store, with a bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

/// In-process application over a fresh `MemoryStore`
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let uploads = tempfile::tempdir()?;

        let mut config = AppConfig::development();
        config.security.jwt_secret = "integration-test-secret".to_string();
        config.uploads.max_bytes = MAX_UPLOAD_BYTES;

        let state = AppState::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalBlobStore::new(uploads.path())),
            Arc::new(PlainCredentials),
            Arc::new(SystemClock),
            &config,
        )?;

        Ok(Self {
            router: app(state.clone()),
            state,
            _uploads: uploads,
        })
    }

    pub async fn user(&self, username: &str) -> Result<TestUser> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: format!("plain:{}-password", username),
            avatar_color: "#60A5FA".to_string(),
            created_at: now,
            updated_at: now,
        };
        self.state.store.insert_user(&user).await?;
        let token = self.state.tokens.issue(user.id, &user.username)?;

        Ok(TestUser {
            id: user.id,
            username: user.username,
            token,
        })
    }

    /// Sends a request and returns the status with the parsed JSON body.
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.dispatch(request).await
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))?;
        self.dispatch(request).await
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, uri, Some(&user.token), None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str, user: &TestUser) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, uri, Some(&user.token), None).await
    }

    pub async fn patch(&self, uri: &str, user: &TestUser, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PATCH, uri, Some(&user.token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &TestUser, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::PUT, uri, Some(&user.token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> Result<(StatusCode, Value)> {
        self.send(Method::DELETE, uri, Some(&user.token), None).await
    }

    /// GET returning the raw body and headers, for non-JSON responses.
    pub async fn download(&self, uri: &str, user: &TestUser) -> Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
            .body(Body::empty())?;
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, bytes.to_vec()))
    }

    async fn dispatch(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, body))
    }
}

/// `data` of a success envelope
pub fn data(body: &Value) -> &Value {
    &body["data"]
}

/// Ids of every object in `data`
pub fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

pub fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().unwrap_or_default().to_string()
}
