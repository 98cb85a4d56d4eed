//! ProSe Timer Management
//!
//! This module implements the retransmission timers used by the PC5
//! direct-link signalling procedures.
//!
//! # Timer Definitions (3GPP TS 24.554)
//!
//! - T5080: ProSe Direct Link Establishment Request retransmission
//! - T5087: ProSe Direct Link Release Request retransmission
//!
//! A timer is armed when the owning state machine enters the state that
//! needs it and must be stopped when that state is left; `perform_tick`
//! reports expiry exactly once per armed period and counts expiries for the
//! retransmission budget.

use std::fmt;
use std::time::{Duration, Instant};

/// Timer code for T5080 (Direct Link Establishment Request retransmission)
pub const TIMER_T5080: u16 = 5080;
/// Timer code for T5087 (Direct Link Release Request retransmission)
pub const TIMER_T5087: u16 = 5087;

/// Default T5080 interval per TS 24.554: 8 seconds
pub const DEFAULT_T5080_INTERVAL: Duration = Duration::from_secs(8);
/// Default T5087 interval used by the reference scenarios: 5 seconds
pub const DEFAULT_T5087_INTERVAL: Duration = Duration::from_secs(5);

/// Retransmission timer for PC5 signalling procedures.
///
/// Tracks start time, interval, running status, and expiry count for the
/// retry logic of the direct-link state machine.
#[derive(Debug)]
pub struct ProseTimer {
    /// Timer code (e.g., 5080 for T5080)
    code: u16,
    /// Timer interval
    interval: Duration,
    /// When the timer was started
    start_time: Option<Instant>,
    /// Whether the timer is currently running
    is_running: bool,
    /// Number of times the timer has expired
    expiry_count: u32,
}

impl ProseTimer {
    /// Create a new ProSe timer.
    ///
    /// # Arguments
    /// * `code` - Timer code (e.g., 5080 for T5080)
    /// * `interval` - Timer interval
    pub fn new(code: u16, interval: Duration) -> Self {
        Self {
            code,
            interval,
            start_time: None,
            is_running: false,
            expiry_count: 0,
        }
    }

    /// Start the timer.
    ///
    /// # Arguments
    /// * `clear_expiry_count` - Whether to reset the expiry count
    pub fn start(&mut self, clear_expiry_count: bool) {
        if clear_expiry_count {
            self.reset_expiry_count();
        }
        self.start_time = Some(Instant::now());
        self.is_running = true;
    }

    /// Stop the timer.
    ///
    /// # Arguments
    /// * `clear_expiry_count` - Whether to reset the expiry count
    pub fn stop(&mut self, clear_expiry_count: bool) {
        if clear_expiry_count {
            self.reset_expiry_count();
        }
        if self.is_running {
            self.start_time = None;
            self.is_running = false;
        }
    }

    /// Reset the expiry count to zero.
    pub fn reset_expiry_count(&mut self) {
        self.expiry_count = 0;
    }

    /// Check if the timer has expired and update state.
    ///
    /// This should be called periodically. Returns `true` if the timer just
    /// expired on this tick; the timer stops itself on expiry and must be
    /// re-armed for the next retransmission round.
    pub fn perform_tick(&mut self) -> bool {
        if self.is_running {
            if let Some(start) = self.start_time {
                if start.elapsed() >= self.interval {
                    self.stop(false);
                    self.expiry_count += 1;
                    return true;
                }
            }
        }
        false
    }

    /// Check if the timer is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Get the timer code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the timer interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Get the remaining time until expiry.
    ///
    /// Returns zero if the timer is not running or has expired.
    pub fn remaining(&self) -> Duration {
        if !self.is_running {
            return Duration::ZERO;
        }
        match self.start_time {
            Some(start) => self.interval.saturating_sub(start.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Get the number of times the timer has expired.
    pub fn expiry_count(&self) -> u32 {
        self.expiry_count
    }
}

impl fmt::Display for ProseTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_running {
            write!(
                f,
                "T{}: rem[{}ms] int[{}ms]",
                self.code,
                self.remaining().as_millis(),
                self.interval.as_millis()
            )
        } else {
            write!(f, "T{}: .", self.code)
        }
    }
}
