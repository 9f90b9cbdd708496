// ABOUTME: ControlClient: one method per Control API route over reqwest.
// ABOUTME: Requests are awaited one at a time and bounded by the client timeout.

use crate::error::{ClientError, Result};
use helmsman_core::{
    AuthStatus, BotArgs, ErrorBody, LoginRequest, LoginResponse, LogsResponse, ModeInfo,
    ProcessHandle, RunMode, StartRequest, StopAck, StopRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default server the CLI talks to.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed client for the Control API.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ControlClient {
    pub fn new(server: &str) -> Result<Self> {
        Self::with_timeouts(server, REQUEST_TIMEOUT, CONNECT_TIMEOUT)
    }

    pub fn with_timeouts(server: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(server.trim())?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{} is not an http(s) URL",
                server
            )));
        }
        // Url::join drops the last path segment unless it ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ClientError::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn server(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Control API response");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::InvalidResponse(e.to_string()));
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(ClientError::from_body(status.as_u16(), body)),
            Err(_) => Err(ClientError::Api {
                status: status.as_u16(),
                message: if text.is_empty() {
                    status.to_string()
                } else {
                    text
                },
            }),
        }
    }

    /// Log in and keep the issued token for later calls.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .send(self.http.post(self.url("login")?).json(&body))
            .await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    /// Revoke the current token. Succeeds even if it was already invalid.
    pub async fn logout(&mut self) -> Result<()> {
        let _: serde_json::Value = self.send(self.http.post(self.url("logout")?)).await?;
        self.token = None;
        Ok(())
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        let status: AuthStatus = self
            .send(self.http.get(self.url("is-authenticated")?))
            .await?;
        Ok(status.authenticated)
    }

    pub async fn start(&self, mode: RunMode, args: &BotArgs) -> Result<ProcessHandle> {
        let body = StartRequest {
            mode,
            args: args.clone(),
        };
        self.send(self.http.post(self.url("bot/start")?).json(&body))
            .await
    }

    pub async fn stop(&self, mode: RunMode, graceful: bool) -> Result<StopAck> {
        let body = StopRequest { mode, graceful };
        self.send(self.http.post(self.url("bot/stop")?).json(&body))
            .await
    }

    pub async fn restart(&self, mode: RunMode, args: &BotArgs) -> Result<ProcessHandle> {
        let body = StartRequest {
            mode,
            args: args.clone(),
        };
        self.send(self.http.post(self.url("bot/restart")?).json(&body))
            .await
    }

    /// Snapshot for one mode, `None` if it was never launched.
    pub async fn status(&self, mode: RunMode) -> Result<Option<ProcessHandle>> {
        let mut url = self.url("bot/status")?;
        url.query_pairs_mut().append_pair("mode", mode.as_str());
        let handles: Vec<ProcessHandle> = self.send(self.http.get(url)).await?;
        Ok(handles.into_iter().find(|h| h.mode == mode))
    }

    pub async fn status_all(&self) -> Result<Vec<ProcessHandle>> {
        self.send(self.http.get(self.url("bot/status")?)).await
    }

    pub async fn logs(&self, mode: RunMode, lines: Option<usize>) -> Result<Vec<String>> {
        let mut url = self.url("bot/logs")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("mode", mode.as_str());
            if let Some(lines) = lines {
                query.append_pair("lines", &lines.to_string());
            }
        }
        let response: LogsResponse = self.send(self.http.get(url)).await?;
        Ok(response.lines)
    }

    pub async fn modes(&self) -> Result<Vec<ModeInfo>> {
        self.send(self.http.get(self.url("modes")?)).await
    }
}
