//! Session configuration.

use std::time::Duration;

use crate::error::SessionError;

/// Largest supported grid edge. Keeps `N²` within a `u16` number space and
/// line indices within `u8`.
pub const MAX_GRID_SIZE: usize = 15;

/// Tunables for one session.
///
/// The defaults are the classic game: a 5×5 board, five completed
/// lines to win (one per letter of B-I-N-G-O) and a two-minute allowance for
/// a silent opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Board edge length `N`.
    pub grid_size: usize,
    /// Completed lines required to win.
    pub win_threshold: usize,
    /// How long the opponent may stay silent while we wait on it.
    /// `None` disables liveness detection.
    pub peer_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { grid_size: 5, win_threshold: 5, peer_timeout: Some(Duration::from_secs(120)) }
    }
}

impl SessionConfig {
    /// Set the board edge length.
    #[must_use]
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Set the winning line count.
    #[must_use]
    pub fn with_win_threshold(mut self, win_threshold: usize) -> Self {
        self.win_threshold = win_threshold;
        self
    }

    /// Set or clear the peer timeout.
    #[must_use]
    pub fn with_peer_timeout(mut self, peer_timeout: Option<Duration>) -> Self {
        self.peer_timeout = peer_timeout;
        self
    }

    /// Number of lines on the board: `N` rows, `N` columns, two diagonals.
    pub fn line_count(&self) -> usize {
        2 * self.grid_size + 2
    }

    /// Highest number that can be placed (`N²`).
    pub fn max_number(&self) -> usize {
        self.grid_size * self.grid_size
    }

    /// Check the configuration is playable.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(SessionError::Config {
                reason: format!("grid size must be in 1..={MAX_GRID_SIZE}, got {}", self.grid_size),
            });
        }

        if self.win_threshold == 0 || self.win_threshold > self.line_count() {
            return Err(SessionError::Config {
                reason: format!(
                    "win threshold must be in 1..={}, got {}",
                    self.line_count(),
                    self.win_threshold
                ),
            });
        }

        if self.peer_timeout == Some(Duration::ZERO) {
            return Err(SessionError::Config { reason: "peer timeout must be non-zero".to_string() });
        }

        Ok(())
    }
}
