/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Matcher configuration.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use serde::Deserialize;
use serde::Serialize;

/// Tuning for one match session's drive loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// First retry delay after a no-progress step.
    pub initial_backoff: Duration,
    /// Retry delay ceiling; the loop holds here while nothing arrives.
    pub max_backoff: Duration,
    /// Growth factor between consecutive no-progress retries.
    pub backoff_multiplier: f64,
    /// Overall budget for the session. `None` retries forever, matching
    /// the behavior callers of unbounded matches expect.
    pub deadline: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            deadline: None,
        }
    }
}

impl MatchConfig {
    /// The retry backoff for one session. Progress resets it; it never
    /// gives up on its own — termination is the deadline's job.
    pub(crate) fn retry_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_multiplier(self.backoff_multiplier)
            .with_max_elapsed_time(None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff;

    use super::*;

    #[test]
    fn backoff_grows_to_the_ceiling_and_never_gives_up() {
        let config = MatchConfig::default();
        let mut backoff = config.retry_backoff();
        let mut last = Duration::ZERO;
        for _ in 0..64 {
            let next = backoff.next_backoff().expect("must not give up");
            assert!(next <= config.max_backoff + config.max_backoff / 2);
            last = next;
        }
        assert!(last >= config.initial_backoff);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = MatchConfig {
            deadline: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: MatchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
