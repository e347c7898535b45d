use crate::error::{SweepError, TwitterError};
use crate::output::PresentationSink;
use crate::sweep::rate_limit::{Pause, RateLimiter};
use crate::sweep::stats::SweepStats;
use crate::twitter::{ApiRequest, Transport, Tweet};
use tracing::{debug, error, warn};

/// Destroys tweets one at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct Deleter;

impl Deleter {
    pub fn request_for(tweet: &Tweet) -> ApiRequest {
        ApiRequest::post(
            format!("/1.1/statuses/destroy/{}.json", tweet.id),
            vec![("id".to_string(), tweet.id.to_string())],
        )
    }

    /// Delete `tweet`, count it, and report it. A throttled delete is waited
    /// out and re-sent. A 404 means the tweet is already gone and is neither
    /// counted nor reported; any other failure aborts the run.
    pub async fn delete<T, P, S>(
        &self,
        transport: &T,
        limiter: &mut RateLimiter<P>,
        tweet: &Tweet,
        stats: &mut SweepStats,
        sink: &mut S,
    ) -> Result<(), SweepError>
    where
        T: Transport,
        P: Pause,
        S: PresentationSink,
    {
        let request = Self::request_for(tweet);

        loop {
            match transport.send(&request).await {
                Ok(_) => {
                    limiter.reset();
                    break;
                }
                Err(TwitterError::RateLimited { reset_at }) => {
                    limiter.wait_out(reset_at).await?;
                }
                Err(TwitterError::Api { status: 404, .. }) => {
                    limiter.reset();
                    warn!("Tweet {} is already gone", tweet.id_str);
                    return Ok(());
                }
                Err(e) => {
                    error!("Could not delete tweet {}: {}", tweet.id_str, e);
                    return Err(SweepError::Twitter(e));
                }
            }
        }

        stats.record_deleted();
        sink.deleted(&tweet.id_str);
        debug!("Deleted tweet {}", tweet.id_str);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::rate_limit::RetryPolicy;
    use crate::twitter::ApiResponse;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Scripted {
        replies: Mutex<VecDeque<Result<ApiResponse, TwitterError>>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ApiResponse, TwitterError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TwitterError> {
            self.sent.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::ok("{}")))
        }
    }

    struct NoPause;

    impl Pause for NoPause {
        async fn pause(&self, _duration: Duration) {}
    }

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl PresentationSink for Lines {
        fn deleted(&mut self, id: &str) {
            self.0.push(format!("[Deleted] {id}"));
        }
        fn skipped(&mut self, id: &str) {
            self.0.push(format!("[Skipped] {id}"));
        }
        fn summary(&mut self, stats: &SweepStats) {
            self.0.push(stats.summary_line());
        }
    }

    #[test]
    fn test_request_is_keyed_by_numeric_id() {
        let request = Deleter::request_for(&Tweet::new(1234567890123456789));
        assert_eq!(request.path, "/1.1/statuses/destroy/1234567890123456789.json");
        assert_eq!(request.param("id"), Some("1234567890123456789"));
        assert_eq!(request.method.as_str(), "POST");
    }

    #[tokio::test]
    async fn test_successful_delete_counts_and_reports() {
        let transport = Scripted::new(vec![]);
        let mut limiter = RateLimiter::with_pause(RetryPolicy::default(), NoPause);
        let mut stats = SweepStats::default();
        let mut sink = Lines::default();

        Deleter
            .delete(&transport, &mut limiter, &Tweet::new(7), &mut stats, &mut sink)
            .await
            .unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(sink.0, vec!["[Deleted] 7"]);
    }

    #[tokio::test]
    async fn test_throttled_delete_is_resent() {
        let transport = Scripted::new(vec![Err(TwitterError::RateLimited {
            reset_at: Utc::now(),
        })]);
        let mut limiter = RateLimiter::with_pause(RetryPolicy::default(), NoPause);
        let mut stats = SweepStats::default();
        let mut sink = Lines::default();

        Deleter
            .delete(&transport, &mut limiter, &Tweet::new(7), &mut stats, &mut sink)
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(stats.deleted, 1);
        assert_eq!(limiter.total_waits(), 1);
    }

    #[tokio::test]
    async fn test_already_gone_tweet_is_not_counted() {
        let transport = Scripted::new(vec![Err(TwitterError::Api {
            status: 404,
            message: "No status found with that ID.".to_string(),
        })]);
        let mut limiter = RateLimiter::with_pause(RetryPolicy::default(), NoPause);
        let mut stats = SweepStats::default();
        let mut sink = Lines::default();

        Deleter
            .delete(&transport, &mut limiter, &Tweet::new(7), &mut stats, &mut sink)
            .await
            .unwrap();

        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert_eq!(stats.deleted, 0);
        assert!(sink.0.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_is_fatal_and_uncounted() {
        let transport = Scripted::new(vec![Err(TwitterError::Api {
            status: 403,
            message: "You may not delete another user's status.".to_string(),
        })]);
        let mut limiter = RateLimiter::with_pause(RetryPolicy::default(), NoPause);
        let mut stats = SweepStats::default();
        let mut sink = Lines::default();

        let result = Deleter
            .delete(&transport, &mut limiter, &Tweet::new(7), &mut stats, &mut sink)
            .await;

        assert!(matches!(
            result,
            Err(SweepError::Twitter(TwitterError::Api { status: 403, .. }))
        ));
        assert_eq!(stats.deleted, 0);
        assert!(sink.0.is_empty());
    }
}
