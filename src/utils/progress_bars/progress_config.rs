// src/utils/progress_bars/progress_config.rs

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::env;

/// Configuration for progress tracking during sweeps
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to put the running outcome tallies into the bar message
    pub detailed: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
        }
    }
}

impl ProgressConfig {
    /// No bars at all. The default for pipelines driven by the HTTP trigger,
    /// which has no terminal to draw on.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            detailed: false,
        }
    }

    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            detailed: env::var("PROGRESS_DETAILED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Check if detailed progress should be shown
    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    /// A bar over the comparison groups of one sweep, hidden when disabled.
    pub fn group_bar(&self, total_groups: usize, emoji: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total_groups as u64);
        let template = format!(
            "  {} [{{elapsed_precise}}] {{bar:30.cyan/blue}} {{pos}}/{{len}} groups {{msg}}",
            emoji
        );
        match ProgressStyle::default_bar().template(&template) {
            Ok(style) => pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  ")),
            Err(e) => warn!("Invalid progress bar template: {}", e),
        }
        pb
    }
}
