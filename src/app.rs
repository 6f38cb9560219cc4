use std::io::{self, Write};

use reqwest::Client;
use tracing::{error, info};

use crate::auth::{AuthorizationFlow, ConsoleReceiver, TokenEndpoint};
use crate::credentials::load_client_config;
use crate::error::{Error, Result};
use crate::presenter::Presenter;
use crate::redirect::LoopbackReceiver;
use crate::settings::Settings;
use crate::todo::TasksService;
use crate::transport::AuthorizedClient;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub lists: usize,
    pub failed_lists: usize,
}

/// Builds the client context from `settings`, signs in and prints every list.
pub async fn run(settings: &Settings) -> Result<()> {
    let config = load_client_config(&settings.credentials, &settings.scope)?;
    let http = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let endpoint = TokenEndpoint::new(http.clone(), config);
    let flow = AuthorizationFlow::new(endpoint.clone(), settings.auth_timeout());
    let token = match settings.listen_port {
        Some(port) => {
            flow.obtain_token(&settings.token_file, &mut LoopbackReceiver::new(port))
                .await?
        }
        None => {
            flow.obtain_token(&settings.token_file, &mut ConsoleReceiver::stdin())
                .await?
        }
    };

    let transport = AuthorizedClient::new(http, endpoint, token, &settings.token_file);
    let mut service = TasksService::new(transport, settings.api_base_url.clone(), settings.limits())?;
    println!("Google Tasks client ready.");

    let mut presenter = Presenter::new(io::stdout());
    let summary = show_task_lists(&mut service, &mut presenter).await?;
    info!(
        lists = summary.lists,
        failed_lists = summary.failed_lists,
        "listing finished"
    );
    Ok(())
}

/// A failure to list the task lists ends the run; a failure to fetch one
/// list's tasks is logged and the remaining lists are still shown.
pub async fn show_task_lists<W: Write>(
    service: &mut TasksService,
    presenter: &mut Presenter<W>,
) -> Result<Summary> {
    let lists = service.list_task_lists().await?;
    if lists.is_empty() {
        presenter.no_lists().map_err(Error::Output)?;
        return Ok(Summary::default());
    }

    presenter.heading().map_err(Error::Output)?;
    let mut summary = Summary {
        lists: lists.len(),
        failed_lists: 0,
    };
    for list in &lists {
        presenter.list_header(list).map_err(Error::Output)?;
        match service.list_tasks(&list.id).await {
            Ok(tasks) => presenter.tasks(&tasks).map_err(Error::Output)?,
            Err(err) if err.is_recoverable() => {
                error!(list = %list.title, id = %list.id, %err, "unable to retrieve tasks for list");
                summary.failed_lists += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(summary)
}
