use crate::error::TwitterError;
use crate::twitter::{ApiRequest, Transport, Tweet, USER_TIMELINE_PATH};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Result of asking for one page of the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Newest first, as the provider returned them
    Posts(Vec<Tweet>),
    RateLimited { reset_at: DateTime<Utc> },
    ParseFailed(String),
}

/// Requests pages of a user's timeline. Every call sends the identical
/// query: with the newest tweets deleted, the next call sees the next window.
/// Only a page of nothing but kept tweets moves the `max_id` cursor.
#[derive(Debug, Clone)]
pub struct TimelineFetcher {
    screen_name: String,
    page_size: u32,
    max_id: Option<u64>,
}

impl TimelineFetcher {
    pub fn new(screen_name: impl Into<String>, page_size: u32) -> Self {
        Self {
            screen_name: screen_name.into(),
            page_size,
            max_id: None,
        }
    }

    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn max_id(&self) -> Option<u64> {
        self.max_id
    }

    /// Restrict later pages to tweets older than `id`. The cursor never
    /// moves back toward newer tweets.
    pub fn advance_below(&mut self, id: u64) {
        let next = id.saturating_sub(1);
        self.max_id = Some(self.max_id.map_or(next, |current| current.min(next)));
    }

    pub fn request(&self) -> ApiRequest {
        let mut params = vec![
            ("count".to_string(), self.page_size.to_string()),
            ("screen_name".to_string(), self.screen_name.clone()),
        ];
        if let Some(max_id) = self.max_id {
            params.push(("max_id".to_string(), max_id.to_string()));
        }
        ApiRequest::get(USER_TIMELINE_PATH, params)
    }

    /// Fetch one page. Throttling, error statuses and unparseable bodies
    /// come back as outcomes; a request that never got an answer is an error.
    pub async fn fetch(&self, transport: &impl Transport) -> Result<FetchOutcome, TwitterError> {
        match transport.send(&self.request()).await {
            Ok(response) => Ok(parse_page(&response.body)),
            Err(TwitterError::RateLimited { reset_at }) => {
                Ok(FetchOutcome::RateLimited { reset_at })
            }
            Err(TwitterError::Api { status, message }) => Ok(FetchOutcome::ParseFailed(format!(
                "HTTP {status}: {message}"
            ))),
            Err(e) => Err(e),
        }
    }
}

pub fn parse_page(body: &str) -> FetchOutcome {
    match serde_json::from_str::<Vec<Tweet>>(body) {
        Ok(tweets) => {
            debug!("Parsed timeline page with {} tweets", tweets.len());
            FetchOutcome::Posts(tweets)
        }
        Err(e) => FetchOutcome::ParseFailed(e.to_string()),
    }
}
