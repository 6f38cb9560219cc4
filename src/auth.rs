use std::io::{self, BufRead, BufReader, Stdin};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::credentials::{load_token, save_token, ClientConfig, TokenRecord};
use crate::error::{Error, Result};

/// Source of the authorization code once the operator has been sent to the consent page.
pub trait CodeReceiver {
    /// Redirect target registered for this way of receiving the code.
    fn redirect_uri(&self, config: &ClientConfig) -> String;

    async fn receive_code(&mut self, consent_url: &Url, state: &str) -> Result<String>;
}

/// Query parameters the provider appends to the redirect target.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct RedirectQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl RedirectQuery {
    fn from_url(url: &Url) -> Self {
        let mut query = RedirectQuery::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => query.code = Some(value.into_owned()),
                "state" => query.state = Some(value.into_owned()),
                "error" => query.error = Some(value.into_owned()),
                _ => {}
            }
        }
        query
    }

    /// A missing `state` is tolerated, a different one is not.
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::Authorization(format!("consent was not granted: {error}")));
        }
        if self.state.as_deref().is_some_and(|state| state != expected_state) {
            return Err(Error::Authorization(
                "state in redirect does not match the consent request".to_string(),
            ));
        }
        self.code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::Authorization("redirect carried no authorization code".to_string()))
    }
}

/// Prints the consent URL and reads the code the operator pastes back.
pub struct ConsoleReceiver<R> {
    input: Arc<Mutex<R>>,
}

impl ConsoleReceiver<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> ConsoleReceiver<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Arc::new(Mutex::new(input)),
        }
    }

    /// The read happens on a detached thread. A wait abandoned by a timeout
    /// leaves that thread behind and does not hold up runtime shutdown.
    async fn read_line(&self) -> io::Result<String> {
        let input = Arc::clone(&self.input);
        let (tx, rx) = oneshot::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            let read = match input.lock() {
                Ok(mut input) => input.read_line(&mut line).map(|_| line),
                Err(_) => Err(io::Error::new(io::ErrorKind::Other, "console input is poisoned")),
            };
            tx.send(read).ok();
        });
        rx.await.unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "console reader stopped without a line",
            ))
        })
    }
}

impl<R: BufRead + Send + 'static> CodeReceiver for ConsoleReceiver<R> {
    fn redirect_uri(&self, config: &ClientConfig) -> String {
        config.redirect_target.clone()
    }

    async fn receive_code(&mut self, consent_url: &Url, state: &str) -> Result<String> {
        println!(
            "Open the following link in your browser and enter the authorization code:\n{consent_url}"
        );
        let line = self.read_line().await.map_err(Error::Console)?;
        parse_pasted_code(&line, state)
    }
}

/// Accepts either the bare code or the whole redirect URL copied from the address bar.
fn parse_pasted_code(line: &str, state: &str) -> Result<String> {
    let input = line.trim();
    if input.is_empty() {
        return Err(Error::Authorization("no authorization code entered".to_string()));
    }
    match Url::parse(input) {
        Ok(url) => RedirectQuery::from_url(&url).into_code(state),
        Err(_) => Ok(input.to_string()),
    }
}

pub fn new_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Consent page URL requesting offline access, so the exchange also yields a refresh token.
pub fn consent_url(config: &ClientConfig, redirect_uri: &str, state: &str) -> Result<Url> {
    Url::parse_with_params(
        &config.auth_endpoint_url,
        &[
            ("access_type", "offline"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", config.requested_scope.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| {
        Error::Authorization(format!(
            "invalid authorization endpoint {}: {e}",
            config.auth_endpoint_url
        ))
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

fn bearer() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    fn into_record(self, previous_refresh_token: Option<String>) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expiry: self
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }
}

/// Client for the provider's token endpoint.
#[derive(Clone)]
pub struct TokenEndpoint {
    http: Client,
    config: ClientConfig,
}

impl TokenEndpoint {
    pub fn new(http: Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenRecord> {
        info!("exchanging authorization code for a token");
        let response = self
            .request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;
        Ok(response.into_record(None))
    }

    /// The provider may omit the refresh token on renewal; the old one stays valid then.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
        info!("refreshing access token");
        let response = self
            .request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        Ok(response.into_record(Some(refresh_token.to_string())))
    }

    async fn request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(&self.config.token_endpoint_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Authorization(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authorization(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::Authorization(format!("malformed token response: {e}")))
    }
}

/// Interactive consent: consent URL, authorization code, code exchange.
pub struct AuthorizationFlow {
    endpoint: TokenEndpoint,
    timeout: Option<Duration>,
}

impl AuthorizationFlow {
    pub fn new(endpoint: TokenEndpoint, timeout: Option<Duration>) -> Self {
        Self { endpoint, timeout }
    }

    /// Returns the cached token when it is still usable, otherwise runs the
    /// consent flow once and caches its result.
    pub async fn obtain_token<R: CodeReceiver>(
        &self,
        token_path: &Path,
        receiver: &mut R,
    ) -> Result<TokenRecord> {
        match load_token(token_path) {
            Ok(token) if token.is_renewable() || !token.is_expired() => {
                debug!(path = %token_path.display(), "using cached token");
                return Ok(token);
            }
            Ok(_) => warn!(
                path = %token_path.display(),
                "cached token expired and cannot be refreshed, requesting consent again"
            ),
            Err(err) => info!(%err, "no usable cached token, requesting consent"),
        }

        let token = self.authorize(receiver).await?;
        save_token(token_path, &token)?;
        Ok(token)
    }

    pub async fn authorize<R: CodeReceiver>(&self, receiver: &mut R) -> Result<TokenRecord> {
        let config = self.endpoint.config();
        let state = new_state();
        let redirect_uri = receiver.redirect_uri(config);
        let url = consent_url(config, &redirect_uri, &state)?;

        let code = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, receiver.receive_code(&url, &state))
                .await
                .map_err(|_| {
                    Error::Authorization(format!(
                        "no authorization code received within {}s",
                        limit.as_secs()
                    ))
                })??,
            None => receiver.receive_code(&url, &state).await?,
        };

        self.endpoint.exchange_code(&code, &redirect_uri).await
    }
}
