pub mod config;
pub mod error;
pub mod oauth;
pub mod output;
pub mod sweep;
pub mod twitter;
