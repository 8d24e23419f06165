//! HTTP client for the configuration API.
//!
//! One blocking reqwest client serves both roles: the `Backend` the command
//! tree dispatches through, and the `RegistryClient` the completion engine
//! queries for live namespace/resource names. Completion lookups carry a
//! shorter per-request timeout so a slow API cannot stall the prompt.

use std::time::Duration;

use edgesh_tree::registry;
use edgesh_tree::{Backend, BackendError};

use crate::config::ShellConfig;

/// Network-backed name registries consumed by dynamic completion.
pub trait RegistryClient: Send + Sync {
    fn list_namespaces(&self) -> Result<Vec<String>, BackendError>;
    fn list_resource_names(
        &self,
        resource: &str,
        namespace: &str,
    ) -> Result<Vec<String>, BackendError>;
}

pub struct HttpApi {
    base: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
    completion_timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &ShellConfig) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(HttpApi {
            base: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            client,
            completion_timeout: config.completion_timeout,
        })
    }

    fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, BackendError> {
        if self.base.is_empty() {
            return Err(BackendError::NotConfigured);
        }
        let url = format!("{}{}", self.base, path);
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| BackendError::Transport(format!("bad method: {method}")))?;
        let mut req = self.client.request(method, &url);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }
        if text.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&text).map_err(|e| BackendError::Transport(e.to_string()))
    }
}

impl Backend for HttpApi {
    fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, BackendError> {
        self.send(method, path, body, None)
    }
}

fn item_names(body: &serde_json::Value) -> Vec<String> {
    let Some(items) = body.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            item.pointer("/metadata/name")
                .or_else(|| item.get("name"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .collect()
}

impl RegistryClient for HttpApi {
    fn list_namespaces(&self) -> Result<Vec<String>, BackendError> {
        let body = self.send(
            "GET",
            "/api/config/namespaces",
            None,
            Some(self.completion_timeout),
        )?;
        Ok(item_names(&body))
    }

    fn list_resource_names(
        &self,
        resource: &str,
        namespace: &str,
    ) -> Result<Vec<String>, BackendError> {
        let domain = registry::resolve_domain(resource).ok_or_else(|| {
            BackendError::Transport(format!("unknown resource type: {resource}"))
        })?;
        let path = if domain.namespaced {
            format!("/api/config/namespaces/{namespace}/{}", domain.plural)
        } else {
            format!("/api/config/{}", domain.plural)
        };
        let body = self.send("GET", &path, None, Some(self.completion_timeout))?;
        Ok(item_names(&body))
    }
}

/// Derives the tenant from the endpoint host: the first DNS label of
/// `https://acme.console.example.com` is `acme`. Empty when unknown.
pub fn extract_tenant(api_url: &str) -> String {
    let stripped = api_url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = stripped.split(['/', ':']).next().unwrap_or("");
    match host.split('.').next() {
        Some(label) if !label.is_empty() && host.contains('.') => label.to_string(),
        _ => String::new(),
    }
}
