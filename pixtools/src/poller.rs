//! The client-side fallback for learning the outcome of a payment.
//!
//! [`PaymentPoller`] asks the server for the status of a payment every few seconds until the payment is settled or the
//! deadline passes. A failed or slow status check is never an outcome; the poller simply tries again on the next tick.
//! The completion callback runs at most once per [`CompletionGuard`], which can be shared with other consumers (e.g. a
//! WebSocket listener) that may learn about the approval first.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use log::*;
use pix_payment_engine::db_types::PaymentStatus;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(600);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[allow(async_fn_in_trait)]
pub trait StatusQuery {
    /// The status string the server reports for the payment
    async fn query_status(&self, id: &str) -> Result<String>;
}

/// Makes sure the "payment complete" action happens once, however many times approval is observed.
#[derive(Debug, Default)]
pub struct CompletionGuard {
    processed: AtomicBool,
}

impl CompletionGuard {
    /// Returns `true` for the first caller only.
    pub fn try_complete(&self) -> bool {
        !self.processed.swap(true, Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.processed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Approved,
    /// The payment was rejected or cancelled
    Failed(PaymentStatus),
    /// Another consumer completed the payment first
    AlreadyCompleted,
    TimedOut,
}

/// What happened on a single tick
#[derive(Debug)]
pub enum PollTick<'a> {
    Status(&'a str),
    Error(&'a anyhow::Error),
    Timeout,
}

pub struct PaymentPoller<Q> {
    query: Q,
    interval: Duration,
    deadline: Duration,
    query_timeout: Duration,
    guard: Arc<CompletionGuard>,
}

impl<Q: StatusQuery> PaymentPoller<Q> {
    pub fn new(query: Q) -> Self {
        Self {
            query,
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            guard: Arc::default(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_guard(mut self, guard: Arc<CompletionGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn guard(&self) -> Arc<CompletionGuard> {
        Arc::clone(&self.guard)
    }

    /// Polls until the payment settles or the deadline passes. `on_tick` sees every check; `on_approved` runs only if
    /// this poller is the one that completes the payment.
    pub async fn poll<T, C>(&self, id: &str, mut on_tick: T, on_approved: C) -> PollOutcome
    where
        T: FnMut(&PollTick<'_>),
        C: FnOnce(),
    {
        let deadline = Instant::now() + self.deadline;
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if time::timeout_at(deadline, ticker.tick()).await.is_err() || Instant::now() >= deadline {
                info!("Gave up waiting for payment {id} after {:?}", self.deadline);
                return PollOutcome::TimedOut;
            }
            if self.guard.is_complete() {
                return PollOutcome::AlreadyCompleted;
            }
            let status = match time::timeout(self.query_timeout, self.query.query_status(id)).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    debug!("Status check for {id} failed. Trying again. {e}");
                    on_tick(&PollTick::Error(&e));
                    continue;
                },
                Err(_) => {
                    debug!("Status check for {id} timed out. Trying again.");
                    on_tick(&PollTick::Timeout);
                    continue;
                },
            };
            on_tick(&PollTick::Status(&status));
            match PaymentStatus::from_processor(&status) {
                Some(PaymentStatus::Approved) => {
                    if self.guard.try_complete() {
                        on_approved();
                        return PollOutcome::Approved;
                    }
                    return PollOutcome::AlreadyCompleted;
                },
                Some(s @ (PaymentStatus::Rejected | PaymentStatus::Cancelled)) => return PollOutcome::Failed(s),
                _ => trace!("Payment {id} is {status}"),
            }
        }
    }
}
