//! Adaptive output pacing.
//!
//! Short fragments are released one character at a time with the longest
//! delay, long fragments in fixed-size chunks with the shortest delay, and
//! anything in between character by character with a delay interpolated on a
//! log scale.

use std::time::Duration;

/// Pacing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    /// Pacing on or off
    pub enabled: bool,
    /// Texts at or below this many characters use `max_delay`
    pub short_threshold: usize,
    /// Texts at or above this many characters use `min_delay` and chunking
    pub long_threshold: usize,
    /// Shortest per-piece delay
    pub min_delay: Duration,
    /// Longest per-piece delay
    pub max_delay: Duration,
    /// Characters per piece for long texts
    pub chunk_size: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            short_threshold: 10,
            long_threshold: 50,
            min_delay: Duration::from_millis(16),
            max_delay: Duration::from_millis(24),
            chunk_size: 5,
        }
    }
}

/// A text split into pieces with the delay between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPlan {
    /// Pieces to emit in order
    pub pieces: Vec<String>,
    /// Delay after each piece except the last
    pub delay: Duration,
}

/// Computes pacing plans
#[derive(Debug, Clone, Default)]
pub struct StreamOptimizer {
    config: PacingConfig,
}

impl StreamOptimizer {
    /// Create an optimizer
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Whether pacing is applied at all
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Per-piece delay for a text of `len` characters
    pub fn delay_for(&self, len: usize) -> Duration {
        let PacingConfig {
            short_threshold,
            long_threshold,
            min_delay,
            max_delay,
            ..
        } = self.config;

        if len <= short_threshold {
            return max_delay;
        }
        if len >= long_threshold {
            return min_delay;
        }

        let ratio = (len as f64 / short_threshold.max(1) as f64).ln()
            / (long_threshold as f64 / short_threshold.max(1) as f64).ln();
        let span = max_delay.as_secs_f64() - min_delay.as_secs_f64();
        Duration::from_secs_f64((max_delay.as_secs_f64() - ratio * span).max(0.0))
    }

    /// Split `text` for paced emission
    pub fn plan(&self, text: &str) -> PacingPlan {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        let piece_len = if len >= self.config.long_threshold {
            self.config.chunk_size.max(1)
        } else {
            1
        };

        PacingPlan {
            pieces: chars.chunks(piece_len).map(|c| c.iter().collect()).collect(),
            delay: self.delay_for(len),
        }
    }
}
