use std::path::PathBuf;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::auth::TokenEndpoint;
use crate::credentials::{save_token, TokenRecord};
use crate::error::{Error, Result};

/// HTTP client that signs every request with the cached bearer token and
/// renews the token through the refresh grant once it has expired.
pub struct AuthorizedClient {
    http: Client,
    endpoint: TokenEndpoint,
    token: TokenRecord,
    token_path: PathBuf,
}

impl AuthorizedClient {
    pub fn new(
        http: Client,
        endpoint: TokenEndpoint,
        token: TokenRecord,
        token_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            endpoint,
            token,
            token_path: token_path.into(),
        }
    }

    /// A refreshed record is persisted before it is used.
    async fn access_token(&mut self) -> Result<String> {
        if self.token.is_expired() {
            let Some(refresh_token) = self.token.refresh_token.clone() else {
                return Err(Error::Authorization(format!(
                    "access token expired and no refresh token is cached; delete {} and authorize again",
                    self.token_path.display()
                )));
            };
            info!("access token expired");
            let refreshed = self.endpoint.refresh(&refresh_token).await?;
            save_token(&self.token_path, &refreshed)?;
            self.token = refreshed;
        }
        Ok(self.token.access_token.clone())
    }

    pub async fn get_json<T: DeserializeOwned>(&mut self, url: Url) -> Result<T> {
        let access_token = self.access_token().await?;
        debug!(%url, "GET");

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http { status, body });
        }
        Ok(response.json().await?)
    }
}
