//! Loopback receiver: a one-shot local HTTP listener that captures the
//! authorization code from the browser redirect instead of asking the
//! operator to paste it.

use tokio::sync::{mpsc, oneshot};
use tracing::info;
use url::Url;
use warp::{Filter, Rejection, Reply};

use crate::auth::{CodeReceiver, RedirectQuery};
use crate::credentials::ClientConfig;
use crate::error::{Error, Result};

const SUCCESS_PAGE: &str =
    "<html><body><h3>Successfully logged in!</h3><p>You can close your browser.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h3>Authorization failed.</h3><p>Return to the terminal for details.</p></body></html>";

pub struct LoopbackReceiver {
    port: u16,
}

impl LoopbackReceiver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl CodeReceiver for LoopbackReceiver {
    fn redirect_uri(&self, _config: &ClientConfig) -> String {
        format!("http://127.0.0.1:{}/redirect", self.port)
    }

    async fn receive_code(&mut self, consent_url: &Url, state: &str) -> Result<String> {
        let (query_tx, mut query_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let (addr, server) = warp::serve(redirect_routes(query_tx))
            .try_bind_with_graceful_shutdown(([127, 0, 0, 1], self.port), async move {
                stop_rx.await.ok();
            })
            .map_err(|e| {
                Error::Authorization(format!(
                    "cannot listen for the redirect on port {}: {e}",
                    self.port
                ))
            })?;
        tokio::spawn(server);

        info!(%addr, "waiting for authorization redirect");
        println!("Open the following link in your browser to authorize access:\n{consent_url}");

        let query = query_rx.recv().await.ok_or_else(|| {
            Error::Authorization("redirect listener stopped before a code arrived".to_string())
        })?;
        stop_tx.send(()).ok();

        if query.state.as_deref() != Some(state) {
            return Err(Error::Authorization(
                "state in redirect does not match the consent request".to_string(),
            ));
        }
        query.into_code(state)
    }
}

/// `GET /redirect?code=..&state=..` forwards the query to the waiting receiver.
fn redirect_routes(
    queries: mpsc::Sender<RedirectQuery>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let sender = warp::any().map(move || queries.clone());

    warp::get()
        .and(warp::path("redirect"))
        .and(warp::path::end())
        .and(warp::query::<RedirectQuery>())
        .and(sender)
        .and_then(handle_redirect)
}

async fn handle_redirect(
    query: RedirectQuery,
    queries: mpsc::Sender<RedirectQuery>,
) -> std::result::Result<impl Reply, Rejection> {
    let page = if query.code.is_some() && query.error.is_none() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    queries.send(query).await.map_err(|_| warp::reject())?;
    Ok(warp::reply::html(page))
}
