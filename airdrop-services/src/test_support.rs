//! Scripted price sources shared by unit tests

use airdrop_core::{AirdropError, AirdropResult, PriceEntry, PriceSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One scripted upstream response
pub struct Step {
    pub delay: Duration,
    pub result: AirdropResult<HashMap<String, PriceEntry>>,
}

impl Step {
    /// Every requested id priced at `price`
    pub fn prices(ids: &[&str], price: Decimal) -> Self {
        let quotes = ids
            .iter()
            .map(|id| (id.to_string(), PriceEntry::new(price, Decimal::ZERO)))
            .collect();
        Self {
            delay: Duration::ZERO,
            result: Ok(quotes),
        }
    }

    pub fn fail(reason: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(AirdropError::network(reason)),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Replays a queue of steps; fails once the queue is empty
#[derive(Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Virtual-clock instants at which each call started
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch_prices(&self, _ids: &[String]) -> AirdropResult<HashMap<String, PriceEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());

        let step = self.steps.lock().pop_front();
        match step {
            Some(step) => {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                step.result
            }
            None => Err(AirdropError::network("connection refused")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
