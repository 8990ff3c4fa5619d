//! HTTP client for the hosted backend's REST and auth endpoints.
//!
//! Row-level authorization is enforced server-side, so every query here is
//! a plain collection read scoped by the bearer token.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::models::{Club, Membership, NewTeam, ProfileUpdate, Team, UserProfile};
use crate::remote::RemoteSource;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// PostgREST endpoint for relational reads and writes
const REST_PATH: &str = "/rest/v1";

/// GoTrue endpoint for sign-in and sign-out
const AUTH_PATH: &str = "/auth/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow mobile networks while failing fast enough to fall back to the cache.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Accept header asking PostgREST for exactly one object instead of an array.
/// The server answers 406 when zero (or several) rows match.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

impl TokenResponse {
    /// `fallback_email` covers auth users without an email on record.
    fn into_session(self, fallback_email: &str) -> SessionData {
        SessionData {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
        }
    }
}

/// Client for the hosted backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(ApiError::NotConfigured("supabase_url").into());
        }
        if anon_key.trim().is_empty() {
            return Err(ApiError::NotConfigured("supabase_anon_key").into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
            token: None,
        })
    }

    /// Create a new client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            anon_key: self.anon_key.clone(),
            token: Some(token),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PATH, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, AUTH_PATH, path)
    }

    /// `apikey` identifies the project; the bearer is the user's session
    /// token, or the anon key when signed out.
    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header::HeaderValue::from_str(&self.anon_key)?);
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    /// Any other status is returned to the caller unchecked.
    async fn send(&self, url: &str, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", url))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited.into());
            }
            warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.rest_url(table);
        let response = self.send(&url, || self.client.get(&url).query(query)).await?;
        let response = Self::check_response(response).await?;

        let rows: Vec<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} rows", table))?;
        debug!(table = table, count = rows.len(), "Fetched rows");
        Ok(rows)
    }

    async fn get_single<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.rest_url(table);
        let response = self
            .send(&url, || {
                self.client
                    .get(&url)
                    .query(query)
                    .header(header::ACCEPT, SINGLE_OBJECT)
            })
            .await?;

        if response.status() == StatusCode::NOT_ACCEPTABLE {
            return Ok(None);
        }
        let response = Self::check_response(response).await?;

        let row = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} row", table))?;
        Ok(Some(row))
    }

    /// Write with `method` and return the single row the server stored.
    async fn write_single<T, B>(
        &self,
        method: reqwest::Method,
        table: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.rest_url(table);
        let response = self
            .send(&url, || {
                self.client
                    .request(method.clone(), &url)
                    .query(query)
                    .header("Prefer", "return=representation")
                    .header(header::ACCEPT, SINGLE_OBJECT)
                    .json(body)
            })
            .await?;
        let response = Self::check_response(response).await?;

        let row = response
            .json()
            .await
            .with_context(|| format!("Failed to parse written {} row", table))?;
        debug!(table = table, method = %method, "Wrote row");
        Ok(row)
    }

    // ===== Authentication =====

    /// Email a one-time sign-in code / magic link.
    pub async fn send_magic_link(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let url = self.auth_url("otp");
        let body = json!({ "email": email, "create_user": true });
        let response = self
            .send(&url, || {
                let request = self.client.post(&url).json(&body);
                match redirect_to {
                    Some(redirect) => request.query(&[("redirect_to", redirect)]),
                    None => request,
                }
            })
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Exchange the emailed code for a session.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<SessionData> {
        let url = self.auth_url("verify");
        let body = json!({ "type": "email", "email": email, "token": code });
        let token = self.request_token(&url, &body).await?;
        Ok(token.into_session(email))
    }

    /// Trade the refresh token of `current` for a fresh session.
    pub async fn refresh_session(&self, current: &SessionData) -> Result<SessionData> {
        let url = format!("{}?grant_type=refresh_token", self.auth_url("token"));
        let body = json!({ "refresh_token": current.refresh_token });
        let token = self.request_token(&url, &body).await?;
        debug!(user_id = %token.user.id, expires_in = token.expires_in, "Session refreshed");
        Ok(token.into_session(&current.email))
    }

    async fn request_token(&self, url: &str, body: &serde_json::Value) -> Result<TokenResponse> {
        let response = self.send(url, || self.client.post(url).json(body)).await?;
        let response = Self::check_response(response).await?;

        response
            .json()
            .await
            .context("Failed to parse auth response")
    }

    /// Revoke the current session server-side.
    pub async fn sign_out(&self) -> Result<()> {
        if self.token.is_none() {
            return Ok(());
        }
        let url = self.auth_url("logout");
        let response = self.send(&url, || self.client.post(&url)).await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RemoteSource for SupabaseClient {
    async fn fetch_clubs(&self) -> Result<Vec<Club>> {
        self.get_rows(
            "clubs",
            &[("select", "*".to_string()), ("order", "created_at.desc".to_string())],
        )
        .await
    }

    async fn fetch_teams(&self, club_id: &str) -> Result<Vec<Team>> {
        self.get_rows(
            "teams",
            &[
                ("select", "*".to_string()),
                ("club_id", eq(club_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn fetch_memberships(&self, user_id: &str) -> Result<Vec<Membership>> {
        self.get_rows(
            "memberships",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn fetch_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.get_single("users", &[("select", "*".to_string()), ("id", eq(user_id))])
            .await
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<UserProfile> {
        self.write_single(reqwest::Method::PATCH, "users", &[("id", eq(user_id))], update)
            .await
    }

    async fn create_club(&self, name: &str, created_by: &str) -> Result<Club> {
        let body = json!({ "name": name, "created_by": created_by });
        self.write_single(reqwest::Method::POST, "clubs", &[], &body).await
    }

    async fn team_name_taken(&self, club_id: &str, season: &str, name: &str) -> Result<bool> {
        let rows: Vec<serde_json::Value> = self
            .get_rows(
                "teams",
                &[
                    ("select", "id".to_string()),
                    ("club_id", eq(club_id)),
                    ("season", eq(season)),
                    ("name", format!("ilike.{}", name)),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn create_team(&self, team: &NewTeam) -> Result<Team> {
        self.write_single(reqwest::Method::POST, "teams", &[], team).await
    }
}
