//! RSRP Filtering and Relay Eligibility
//!
//! Raw RSRP samples arrive with every discovery observation and are too
//! noisy to act on directly. Each relay candidate owns an exponential filter
//! that smooths the samples, and an eligibility flag derived from the
//! filtered value against a threshold with a hysteresis band so candidates
//! do not flap at the boundary.

use prosesim_common::config::ProseConfig;

/// Parameters of the RSRP filter and the eligibility rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsrpFilterConfig {
    /// Exponential smoothing coefficient, in [0, 1].
    ///
    /// `filtered = alpha * filtered_prev + (1 - alpha) * raw`; larger values
    /// weigh history more heavily.
    pub alpha: f64,
    /// Eligibility threshold (dBm)
    pub threshold_dbm: f64,
    /// Hysteresis margin (dB) applied on both sides of the threshold
    pub hysteresis_db: f64,
}

impl From<&ProseConfig> for RsrpFilterConfig {
    fn from(config: &ProseConfig) -> Self {
        Self {
            alpha: config.filter_alpha,
            threshold_dbm: config.rsrp_threshold_dbm,
            hysteresis_db: config.hysteresis_db,
        }
    }
}

/// Exponential RSRP filter with hysteresis-based eligibility.
#[derive(Debug, Clone)]
pub struct RsrpFilter {
    config: RsrpFilterConfig,
    filtered: Option<f64>,
    eligible: bool,
}

impl RsrpFilter {
    /// Creates a new filter; the first sample initializes the filtered value.
    pub fn new(config: RsrpFilterConfig) -> Self {
        Self {
            config,
            filtered: None,
            eligible: false,
        }
    }

    /// Feeds a raw RSRP sample and returns the updated (filtered, eligible)
    /// pair.
    ///
    /// Eligibility flips to true only above `threshold + hysteresis` and to
    /// false only below `threshold - hysteresis`; inside the band the
    /// previous value is kept.
    pub fn update(&mut self, raw_dbm: f64) -> (f64, bool) {
        let filtered = match self.filtered {
            Some(prev) => self.config.alpha * prev + (1.0 - self.config.alpha) * raw_dbm,
            None => raw_dbm,
        };
        self.filtered = Some(filtered);

        if filtered >= self.config.threshold_dbm + self.config.hysteresis_db {
            self.eligible = true;
        } else if filtered < self.config.threshold_dbm - self.config.hysteresis_db {
            self.eligible = false;
        }

        (filtered, self.eligible)
    }

    /// Returns the current filtered value, if any sample has been fed.
    pub fn filtered(&self) -> Option<f64> {
        self.filtered
    }

    /// Returns the current eligibility.
    pub fn eligible(&self) -> bool {
        self.eligible
    }
}
