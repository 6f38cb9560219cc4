//! Fixtures shared by the unit tests.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use reqwest::Client;
use url::Url;

use crate::auth::TokenEndpoint;
use crate::credentials::{ClientConfig, TokenRecord};
use crate::todo::{Limits, TasksService};
use crate::transport::AuthorizedClient;

pub const SCOPE: &str = "https://www.googleapis.com/auth/tasks.readonly";

/// Client config whose endpoints live on `server_url`.
pub fn client_config(server_url: &str) -> ClientConfig {
    ClientConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_endpoint_url: format!("{server_url}/auth"),
        token_endpoint_url: format!("{server_url}/token"),
        redirect_target: "http://localhost".to_string(),
        requested_scope: SCOPE.to_string(),
    }
}

pub fn fresh_token(access_token: &str) -> TokenRecord {
    TokenRecord {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expiry: Some(Utc::now() + Duration::hours(1)),
    }
}

pub fn expired_token(access_token: &str, refresh_token: Option<&str>) -> TokenRecord {
    TokenRecord {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expiry: Some(Utc::now() - Duration::hours(1)),
    }
}

pub fn transport(
    server_url: &str,
    token: TokenRecord,
    token_path: impl Into<PathBuf>,
) -> AuthorizedClient {
    let http = Client::new();
    let endpoint = TokenEndpoint::new(http.clone(), client_config(server_url));
    AuthorizedClient::new(http, endpoint, token, token_path)
}

/// Service talking to a mock API rooted at `server_url`, signed in with a fresh token.
pub fn service(server_url: &str, dir: &Path, limits: Limits) -> TasksService {
    let transport = transport(server_url, fresh_token("access"), dir.join("token.json"));
    let base = Url::parse(server_url).unwrap();
    TasksService::new(transport, base, limits).unwrap()
}
