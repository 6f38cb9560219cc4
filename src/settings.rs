use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::todo::{Limits, DEFAULT_API_BASE};

pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/tasks.readonly";

/// List your Google Tasks from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Client secret file downloaded from the Google Cloud console
    #[arg(long, env = "TASKS_CREDENTIALS_FILE", default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Where the OAuth token is cached between runs
    #[arg(long, env = "TASKS_TOKEN_FILE", default_value = "token.json")]
    pub token_file: PathBuf,

    /// OAuth scope requested during consent
    #[arg(long, default_value = READONLY_SCOPE)]
    pub scope: String,

    #[arg(long, env = "TASKS_API_BASE_URL", default_value = DEFAULT_API_BASE)]
    pub api_base_url: Url,

    /// Maximum number of task lists to show
    #[arg(long, default_value_t = 10)]
    pub max_lists: u32,

    /// Maximum number of tasks to show per list
    #[arg(long, default_value_t = 20)]
    pub max_tasks: u32,

    /// Receive the authorization code on http://localhost:<PORT>/redirect instead of pasting it
    #[arg(long, value_name = "PORT")]
    pub listen_port: Option<u16>,

    /// Give up waiting for the authorization code after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub auth_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable
    #[arg(long)]
    pub json_logs: bool,
}

impl Settings {
    pub fn limits(&self) -> Limits {
        Limits {
            max_lists: self.max_lists,
            max_tasks: self.max_tasks,
        }
    }

    pub fn auth_timeout(&self) -> Option<Duration> {
        self.auth_timeout.map(Duration::from_secs)
    }
}
