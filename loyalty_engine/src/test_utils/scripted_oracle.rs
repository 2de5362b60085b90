use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    accrual::{AccrualClientError, AccrualOracle, AccrualResponse, AccrualStatus},
    db_types::OrderNumber,
};

pub type ScriptedOutcome = Result<Option<AccrualResponse>, AccrualClientError>;

/// An in-memory accrual system that plays back pre-programmed answers, and remembers what it was asked.
///
/// Each order number has a queue of outcomes. Outcomes are handed out in order, and the last one repeats forever.
/// Numbers without a script are reported as unregistered.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<HashMap<String, VecDeque<ScriptedOutcome>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn then(self, number: &str, outcome: ScriptedOutcome) -> Self {
        self.script.lock().unwrap().entry(number.to_string()).or_default().push_back(outcome);
        self
    }

    pub fn processed(self, number: &str, accrual: &str) -> Self {
        let accrual = serde_json::from_str::<serde_json::Number>(accrual).expect("accrual must be a JSON number");
        let response = AccrualResponse::new(number, AccrualStatus::Processed).with_accrual(accrual);
        self.then(number, Ok(Some(response)))
    }

    pub fn status(self, number: &str, status: AccrualStatus) -> Self {
        self.then(number, Ok(Some(AccrualResponse::new(number, status))))
    }

    pub fn unregistered(self, number: &str) -> Self {
        self.then(number, Ok(None))
    }

    pub fn throttled(self, number: &str, retry_after: Option<Duration>) -> Self {
        self.then(number, Err(AccrualClientError::TooManyRequests { retry_after }))
    }

    pub fn failing(self, number: &str, error: AccrualClientError) -> Self {
        self.then(number, Err(error))
    }

    /// All the order numbers asked about so far, in the order they were asked.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, number: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|n| n.as_str() == number).count()
    }

    fn next_outcome(&self, number: &str) -> ScriptedOutcome {
        let mut script = self.script.lock().unwrap();
        match script.get_mut(number) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(None)),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(None)),
            None => Ok(None),
        }
    }
}

impl AccrualOracle for ScriptedOracle {
    async fn fetch_accrual(&self, number: &OrderNumber) -> Result<Option<AccrualResponse>, AccrualClientError> {
        self.calls.lock().unwrap().push(number.as_str().to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_outcome(number.as_str())
    }
}
