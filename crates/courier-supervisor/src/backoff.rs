// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Disconnect classification and retry delay schedules.

use std::collections::HashSet;
use std::time::Duration;

use courier_config::model::ReconnectConfig;
use courier_core::traits::transport::DisconnectCause;
use serde::Serialize;

/// Which retry schedule a retryable close falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    /// Stream errors right after pairing. Short linear schedule.
    Fast,
    /// Everything else, including server-requested restarts.
    Standard,
}

/// How a close is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// Credentials are gone or superseded; a human must re-pair.
    Terminal,
    Retry(RetryClass),
}

/// Code lists deciding [`CloseClass`]. A close without a code is standard.
#[derive(Debug, Clone)]
pub struct ClassificationPolicy {
    terminal: HashSet<u16>,
    fast: HashSet<u16>,
}

impl ClassificationPolicy {
    pub fn new(
        terminal: impl IntoIterator<Item = u16>,
        fast: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            terminal: terminal.into_iter().collect(),
            fast: fast.into_iter().collect(),
        }
    }

    pub fn classify(&self, cause: &DisconnectCause) -> CloseClass {
        match cause.code {
            Some(code) if self.terminal.contains(&code) => CloseClass::Terminal,
            Some(code) if self.fast.contains(&code) => CloseClass::Retry(RetryClass::Fast),
            _ => CloseClass::Retry(RetryClass::Standard),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Growth {
    Linear,
    Exponential,
}

/// An attempt budget plus a capped delay curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub max_attempts: u32,
    base: Duration,
    ceiling: Duration,
    growth: Growth,
}

impl Schedule {
    /// `base * (attempt + 1)`, capped.
    pub fn linear(max_attempts: u32, base: Duration, ceiling: Duration) -> Self {
        Self {
            max_attempts,
            base,
            ceiling,
            growth: Growth::Linear,
        }
    }

    /// `base * 2^attempt`, capped.
    pub fn exponential(max_attempts: u32, base: Duration, ceiling: Duration) -> Self {
        Self {
            max_attempts,
            base,
            ceiling,
            growth: Growth::Exponential,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let raw = match self.growth {
            Growth::Linear => self.base.saturating_mul(attempt.saturating_add(1)),
            Growth::Exponential => {
                let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor)
            }
        };
        raw.min(self.ceiling)
    }
}

/// Everything the reconnect supervisor needs to decide what a close means.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub classification: ClassificationPolicy,
    pub fast: Schedule,
    pub standard: Schedule,
}

impl RetryPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            classification: ClassificationPolicy::new(
                config.terminal_codes.iter().copied(),
                config.fast_codes.iter().copied(),
            ),
            fast: Schedule::linear(
                config.fast_max_attempts,
                Duration::from_millis(config.fast_base_delay_ms),
                Duration::from_millis(config.fast_max_delay_ms),
            ),
            standard: Schedule::exponential(
                config.standard_max_attempts,
                Duration::from_millis(config.standard_base_delay_ms),
                Duration::from_millis(config.standard_max_delay_ms),
            ),
        }
    }

    pub fn classify(&self, cause: &DisconnectCause) -> CloseClass {
        self.classification.classify(cause)
    }

    pub fn schedule(&self, class: RetryClass) -> &Schedule {
        match class {
            RetryClass::Fast => &self.fast,
            RetryClass::Standard => &self.standard,
        }
    }

    pub fn budget(&self, class: RetryClass) -> u32 {
        self.schedule(class).max_attempts
    }

    pub fn delay(&self, class: RetryClass, attempt: u32) -> Duration {
        self.schedule(class).delay(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}
