use crate::config::Config;
use crate::error::{SweepError, TwitterError};
use crate::output::{ConsoleSink, PresentationSink};
use crate::sweep::boundary::BoundaryDetector;
use crate::sweep::deleter::Deleter;
use crate::sweep::fetcher::{FetchOutcome, TimelineFetcher};
use crate::sweep::protect::ProtectSet;
use crate::sweep::rate_limit::{Pause, RateLimiter, RetryPolicy, TokioPause};
use crate::sweep::stats::SweepStats;
use crate::twitter::{verify_credentials, Transport, Tweet, User};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Tunables for one run
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub page_size: u32,
    pub retry: RetryPolicy,
    /// Consecutive unparseable pages tolerated before giving up
    pub max_parse_failures: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            page_size: crate::config::MAX_PAGE_SIZE,
            retry: RetryPolicy::default(),
            max_parse_failures: 3,
        }
    }
}

impl SweepSettings {
    pub fn from_config(config: &Config) -> Self {
        let sweep = config.sweep();
        Self {
            page_size: sweep.page_size,
            retry: RetryPolicy::from_config(sweep),
            max_parse_failures: sweep.max_parse_failures,
        }
    }
}

#[derive(Debug)]
pub enum RunState {
    Fetching,
    RateLimited { reset_at: DateTime<Utc> },
    Processing(Vec<Tweet>),
    Done,
    Fatal(SweepError),
}

/// Mutable state of a run, threaded through every step
#[derive(Debug, Default)]
pub struct RunContext {
    pub stats: SweepStats,
    pub boundary: BoundaryDetector,
    pub pages: u32,
    pub parse_failures: u32,
    /// Protected ids already reported, so a protected tweet that stays at
    /// the top of the timeline is counted once
    pub seen_protected: HashSet<String>,
}

/// Drives fetch, filter and delete across pages until the timeline is exhausted
pub struct Orchestrator<T, P = TokioPause, S = ConsoleSink> {
    transport: T,
    fetcher: TimelineFetcher,
    protect: ProtectSet,
    limiter: RateLimiter<P>,
    deleter: Deleter,
    sink: S,
    max_parse_failures: u32,
}

impl<T, P, S> Orchestrator<T, P, S>
where
    T: Transport,
    P: Pause,
    S: PresentationSink,
{
    pub fn new(
        transport: T,
        screen_name: impl Into<String>,
        protect: ProtectSet,
        settings: SweepSettings,
        pause: P,
        sink: S,
    ) -> Self {
        Self {
            transport,
            fetcher: TimelineFetcher::new(screen_name, settings.page_size),
            protect,
            limiter: RateLimiter::with_pause(settings.retry, pause),
            deleter: Deleter,
            sink,
            max_parse_failures: settings.max_parse_failures,
        }
    }

    /// Verify the credentials and set up a run for the account they belong to
    pub async fn connect(
        transport: T,
        protect: ProtectSet,
        settings: SweepSettings,
        pause: P,
        sink: S,
    ) -> Result<Self, SweepError> {
        let mut orchestrator = Self::new(transport, String::new(), protect, settings, pause, sink);
        let user = orchestrator.authenticate().await?;
        info!("Authenticated as @{}", user.screen_name);
        let page_size = orchestrator.fetcher.page_size();
        orchestrator.fetcher = TimelineFetcher::new(user.screen_name, page_size);
        Ok(orchestrator)
    }

    pub fn screen_name(&self) -> &str {
        self.fetcher.screen_name()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run to completion. Returns the final tallies, which have also been
    /// handed to the sink.
    pub async fn run(&mut self) -> Result<SweepStats, SweepError> {
        let mut ctx = RunContext::default();
        let mut state = RunState::Fetching;

        info!(
            "Sweeping timeline of @{} ({} protected ids)",
            self.fetcher.screen_name(),
            self.protect.len()
        );

        loop {
            state = match state {
                RunState::Fetching => self.fetch_page(&mut ctx).await,
                RunState::RateLimited { reset_at } => match self.limiter.wait_out(reset_at).await {
                    Ok(_) => RunState::Fetching,
                    Err(e) => RunState::Fatal(e),
                },
                RunState::Processing(page) => self.process_page(&mut ctx, page).await,
                RunState::Done => break,
                RunState::Fatal(e) => {
                    error!(
                        "Sweep aborted after {} deleted and {} protected: {}",
                        ctx.stats.deleted, ctx.stats.skipped, e
                    );
                    return Err(e);
                }
            };
        }

        info!(
            "Timeline exhausted after {} pages ({} rate limit waits, {:?} waited)",
            ctx.pages,
            self.limiter.total_waits(),
            self.limiter.total_waited()
        );
        debug!("Last handled tweet: {:?}", ctx.boundary.last_id());
        self.sink.summary(&ctx.stats);
        Ok(ctx.stats)
    }

    async fn authenticate(&mut self) -> Result<User, SweepError> {
        loop {
            match verify_credentials(&self.transport).await {
                Ok(user) if user.screen_name.trim().is_empty() => {
                    return Err(SweepError::CredentialVerification(
                        "account has no screen name".to_string(),
                    ));
                }
                Ok(user) => {
                    self.limiter.reset();
                    return Ok(user);
                }
                Err(TwitterError::RateLimited { reset_at }) => {
                    self.limiter.wait_out(reset_at).await?;
                }
                Err(e) => return Err(SweepError::CredentialVerification(e.to_string())),
            }
        }
    }

    async fn fetch_page(&mut self, ctx: &mut RunContext) -> RunState {
        let outcome = match self.fetcher.fetch(&self.transport).await {
            Ok(outcome) => outcome,
            Err(e) => return RunState::Fatal(e.into()),
        };

        match outcome {
            FetchOutcome::Posts(page) => {
                self.limiter.reset();
                ctx.parse_failures = 0;
                ctx.pages += 1;
                debug!("Page {} holds {} tweets", ctx.pages, page.len());
                RunState::Processing(page)
            }
            FetchOutcome::RateLimited { reset_at } => RunState::RateLimited { reset_at },
            FetchOutcome::ParseFailed(cause) => {
                ctx.parse_failures += 1;
                warn!("Problem parsing response: {}", cause);
                if ctx.parse_failures >= self.max_parse_failures {
                    return RunState::Fatal(SweepError::ParseFailuresExceeded {
                        attempts: ctx.parse_failures,
                        cause,
                    });
                }
                let waited = self.limiter.cool_down().await;
                debug!("Re-fetching after {:?}", waited);
                RunState::Fetching
            }
        }
    }

    async fn process_page(&mut self, ctx: &mut RunContext, page: Vec<Tweet>) -> RunState {
        if page.is_empty() {
            return RunState::Done;
        }

        let handled_before = ctx.stats.observed();

        for tweet in &page {
            if !ctx.boundary.observe(tweet) {
                info!("Tweet {} seen again, nothing older is left", tweet.id_str);
                break;
            }

            if self.protect.is_protected(&tweet.id_str) {
                if ctx.seen_protected.insert(tweet.id_str.clone()) {
                    ctx.stats.record_skipped();
                    self.sink.skipped(&tweet.id_str);
                }
                continue;
            }

            if let Err(e) = self
                .deleter
                .delete(
                    &self.transport,
                    &mut self.limiter,
                    tweet,
                    &mut ctx.stats,
                    &mut self.sink,
                )
                .await
            {
                return RunState::Fatal(e);
            }
        }

        if ctx.boundary.reached() {
            return RunState::Done;
        }

        // Only already-reported protected tweets came back: step past them
        // or the identical query would return this page forever.
        if ctx.stats.observed() == handled_before {
            if let Some(oldest) = page.iter().map(|t| t.id).min() {
                debug!("No progress on page {}, paging below {}", ctx.pages, oldest);
                self.fetcher.advance_below(oldest);
            }
        }

        RunState::Fetching
    }
}
