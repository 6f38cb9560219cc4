use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::AuthorizedClient;

pub const DEFAULT_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1/";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskList {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "needsAction")]
    NeedsAction,
    #[serde(rename = "completed")]
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: DeserializeOwned"))]
struct Page<T> {
    #[serde(default)]
    items: Vec<T>,
    next_page_token: Option<String>,
}

/// Upper bounds on how much a single run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_lists: u32,
    pub max_tasks: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_lists: 10,
            max_tasks: 20,
        }
    }
}

/// Read-only client for the task API.
pub struct TasksService {
    transport: AuthorizedClient,
    base_url: Url,
    limits: Limits,
}

impl TasksService {
    pub fn new(transport: AuthorizedClient, base_url: Url, limits: Limits) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidApiUrl(base_url.to_string()));
        }
        Ok(Self {
            transport,
            base_url,
            limits,
        })
    }

    pub async fn list_task_lists(&mut self) -> Result<Vec<TaskList>> {
        let url = self.endpoint(&["users", "@me", "lists"]);
        self.collect(url, self.limits.max_lists).await
    }

    pub async fn list_tasks(&mut self, task_list_id: &str) -> Result<Vec<Task>> {
        let url = self.endpoint(&["lists", task_list_id, "tasks"]);
        self.collect(url, self.limits.max_tasks).await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Follows `nextPageToken` until `limit` items are collected or the pages run out.
    /// A page that adds nothing or hands back the token it was fetched with ends paging.
    async fn collect<T: DeserializeOwned>(&mut self, url: Url, limit: u32) -> Result<Vec<T>> {
        let limit = limit as usize;
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        while items.len() < limit {
            let remaining = limit - items.len();
            let mut page_url = url.clone();
            {
                let mut query = page_url.query_pairs_mut();
                query.append_pair("maxResults", &remaining.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: Page<T> = self.transport.get_json(page_url).await?;
            if page.items.is_empty() {
                break;
            }
            items.extend(page.items.into_iter().take(remaining));

            match page.next_page_token {
                Some(token) if !token.is_empty() && page_token.as_ref() != Some(&token) => {
                    page_token = Some(token)
                }
                _ => break,
            }
        }
        Ok(items)
    }
}
