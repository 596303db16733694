// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::RetryConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{info, warn, Instrument};

/// Delay before the given attempt (1-based), `None` when the attempt budget
/// is exhausted. Exponential growth capped at `max_delay`, with optional
/// multiplicative jitter.
pub fn get_delay(config: &RetryConfig, attempt: u32) -> Option<Duration> {
    if attempt >= config.max_attempts {
        return None;
    }

    let base = config.min_delay.as_nanos() as f64 * config.multiplier.powi(attempt as i32 - 1);
    let capped = base.min(config.max_delay.as_nanos() as f64);

    let with_jitter = match config.max_jitter_factor {
        Some(max_jitter_factor) => {
            let jitter = rand::rng().random_range(0.0..=max_jitter_factor);
            capped * (1.0 + jitter)
        }
        None => capped,
    };

    Some(Duration::from_nanos(
        with_jitter.min(config.max_delay.as_nanos() as f64) as u64,
    ))
}

/// Executes `action` with the given retry policy, retrying while
/// `is_retriable` holds and the attempt budget lasts. `target` and `op` only
/// tag the log records.
pub async fn with_retries<'a, In, F, G, R, E>(
    target: &'static str,
    op: &'static str,
    op_id: Option<String>,
    config: &RetryConfig,
    i: &'a In,
    action: F,
    is_retriable: G,
) -> Result<R, E>
where
    In: 'a,
    F: for<'b> Fn(&'b In) -> Pin<Box<dyn Future<Output = Result<R, E>> + 'b + Send>>,
    G: Fn(&E) -> bool,
    E: Display,
{
    let span = match &op_id {
        Some(op_id) => tracing::info_span!("retries", target, op, op_id = %op_id),
        None => tracing::info_span!("retries", target, op),
    };

    async move {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match action(i).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("{target} {op} succeeded after {attempt} attempts");
                    }
                    break Ok(result);
                }
                Err(error) if is_retriable(&error) => match get_delay(config, attempt) {
                    Some(delay) => {
                        warn!("{target} {op} attempt {attempt} failed with {error}, retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!("{target} {op} failed with {error}, no attempts left");
                        break Err(error);
                    }
                },
                Err(error) => break Err(error),
            }
        }
    }
    .instrument(span)
    .await
}
