//! Per-tweet console lines and the closing tally.

use crate::sweep::stats::SweepStats;
use colored::*;

/// Receives one notification per handled tweet plus the final tally
pub trait PresentationSink {
    fn deleted(&mut self, id: &str);
    fn skipped(&mut self, id: &str);
    fn summary(&mut self, stats: &SweepStats);
}

/// Writes to stdout, optionally colored
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    color_enabled: bool,
}

impl ConsoleSink {
    pub fn new(color_enabled: bool) -> Self {
        if !color_enabled {
            colored::control::set_override(false);
        }
        Self { color_enabled }
    }

    pub fn deleted_line(&self, id: &str) -> String {
        format!("{} {id}", self.colorize("[Deleted]", Color::Cyan))
    }

    pub fn skipped_line(&self, id: &str) -> String {
        format!("{} {id}", self.colorize("[Skipped]", Color::Yellow))
    }

    pub fn summary_line(&self, stats: &SweepStats) -> String {
        self.colorize(&stats.summary_line(), Color::Red)
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.color_enabled {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }
}

impl PresentationSink for ConsoleSink {
    fn deleted(&mut self, id: &str) {
        println!("{}", self.deleted_line(id));
    }

    fn skipped(&mut self, id: &str) {
        println!("{}", self.skipped_line(id));
    }

    fn summary(&mut self, stats: &SweepStats) {
        println!("{}", self.summary_line(stats));
    }
}
