use crate::config::ConfigError;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Twitter API error: {0}")]
    Twitter(#[from] TwitterError),

    #[error("Credential verification failed: {0}")]
    CredentialVerification(String),

    #[error("Rate limit retry budget exhausted after {attempts} waits ({waited_secs}s waited)")]
    RetryBudgetExhausted { attempts: u32, waited_secs: u64 },

    #[error("Giving up after {attempts} unparseable timeline responses: {cause}")]
    ParseFailuresExceeded { attempts: u32, cause: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Error, Debug)]
pub enum TwitterError {
    #[error("Could not send request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not build request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Could not sign request: {0}")]
    OAuth(String),

    #[error("Rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl TwitterError {
    /// True when the request never reached the wire
    pub fn is_request_build(&self) -> bool {
        matches!(self, TwitterError::Url(_) | TwitterError::OAuth(_))
    }
}

/// Classification of errors for the top-level handler
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Only throttling is recovered from in place; everything else ends the run.
    pub fn is_recoverable(error: &SweepError) -> bool {
        matches!(
            error,
            SweepError::Twitter(TwitterError::RateLimited { .. })
        )
    }

    /// Everything that reaches the top-level handler ends the run
    pub fn should_abort(error: &SweepError) -> bool {
        !Self::is_recoverable(error)
    }

    /// Errors that abort the run before any timeline request is sent
    pub fn is_pre_run(error: &SweepError) -> bool {
        matches!(
            error,
            SweepError::Config(_) | SweepError::CredentialVerification(_)
        )
    }

    /// Short operator hint logged next to a fatal error
    pub fn hint(error: &SweepError) -> Option<&'static str> {
        match error {
            SweepError::Config(_) => {
                Some("Please check your configuration file and environment variables")
            }
            SweepError::CredentialVerification(_) => {
                Some("Check that the API key and access token belong to the same app")
            }
            SweepError::Twitter(TwitterError::Api { status: 401, .. }) => {
                Some("The access token was rejected; regenerate it and try again")
            }
            SweepError::RetryBudgetExhausted { .. } => {
                Some("Raise sweep.max_rate_limit_attempts or unset it to wait indefinitely")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_error_display() {
        let config_error = ConfigError::MissingRequired("APIKey".to_string());
        let error = SweepError::Config(config_error);
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("APIKey"));

        let budget = SweepError::RetryBudgetExhausted {
            attempts: 3,
            waited_secs: 30,
        };
        assert!(budget.to_string().contains("3 waits"));
        assert!(budget.to_string().contains("30s"));
    }

    #[test]
    fn test_twitter_error_variants() {
        let api_error = TwitterError::Api {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(api_error.to_string().contains("403"));
        assert!(!api_error.is_request_build());

        let reset_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let rate_limited = TwitterError::RateLimited { reset_at };
        assert!(rate_limited.to_string().contains("2023-11-14"));
        assert!(!rate_limited.is_request_build());

        let url_error = url::Url::parse("not a url").unwrap_err();
        assert!(TwitterError::from(url_error).is_request_build());
        assert!(TwitterError::OAuth("bad key".to_string()).is_request_build());
    }

    #[test]
    fn test_error_recovery_is_recoverable() {
        let rate_limited = SweepError::Twitter(TwitterError::RateLimited {
            reset_at: Utc::now(),
        });
        assert!(ErrorRecovery::is_recoverable(&rate_limited));

        let api_error = SweepError::Twitter(TwitterError::Api {
            status: 500,
            message: "oops".to_string(),
        });
        assert!(!ErrorRecovery::is_recoverable(&api_error));

        let parse = SweepError::ParseFailuresExceeded {
            attempts: 3,
            cause: "eof".to_string(),
        };
        assert!(!ErrorRecovery::is_recoverable(&parse));
        assert!(ErrorRecovery::should_abort(&parse));
        assert!(!ErrorRecovery::should_abort(&rate_limited));
    }

    #[test]
    fn test_error_recovery_pre_run() {
        let config_error = SweepError::Config(ConfigError::InvalidValue("x".to_string()));
        assert!(ErrorRecovery::is_pre_run(&config_error));
        assert!(ErrorRecovery::hint(&config_error).is_some());

        let verify = SweepError::CredentialVerification("401".to_string());
        assert!(ErrorRecovery::is_pre_run(&verify));

        let budget = SweepError::RetryBudgetExhausted {
            attempts: 1,
            waited_secs: 10,
        };
        assert!(!ErrorRecovery::is_pre_run(&budget));
    }

    #[test]
    fn test_error_conversion_from_std_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(matches!(
            SweepError::from(ConfigError::from(io_error)),
            SweepError::Config(ConfigError::Io(_))
        ));

        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let twitter_error = TwitterError::from(json_error);
        assert!(matches!(
            SweepError::from(twitter_error),
            SweepError::Twitter(TwitterError::Json(_))
        ));
    }
}
