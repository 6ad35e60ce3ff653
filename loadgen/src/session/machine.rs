//! Drives one virtual user through entry, the optional queued wait, and verify

use metrics::histogram;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use super::outcome::Outcome;
use super::state::{Session, SessionId, SessionState};
use super::watcher::{WatchOutcome, watch_until};
use crate::client::{ClientError, QueueApi};
use crate::config::SessionConfig;
use crate::protocol::WaitStatus;

/// Runs a single session to exactly one terminal outcome.
///
/// Errors never escape `run`; every failure is classified into an
/// [`Outcome`] and the session ends in `Done` or `Failed`.
pub struct SessionMachine {
    session: Session,
    api: Arc<dyn QueueApi>,
    config: Arc<SessionConfig>,
}

impl SessionMachine {
    pub fn new(id: SessionId, api: Arc<dyn QueueApi>, config: Arc<SessionConfig>) -> Self {
        Self {
            session: Session::new(id),
            api,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the protocol once. Calling it again after it finished is a no-op
    /// that returns the recorded outcome.
    pub async fn run(&mut self) -> Outcome {
        if let Some(outcome) = self.session.state().outcome() {
            return outcome;
        }

        let outcome = self.drive().await;
        let terminal = if outcome.is_success() {
            SessionState::Done(outcome)
        } else {
            SessionState::Failed(outcome)
        };
        self.session.advance(terminal);
        debug!(outcome = %outcome, "session finished");
        outcome
    }

    async fn drive(&mut self) -> Outcome {
        self.session.advance(SessionState::Entering);

        let started = Instant::now();
        let result = self
            .api
            .enter_or_check(self.config.action_id, &self.config.destination_url)
            .await;
        histogram!("loadgen_phase_duration_seconds", "phase" => "entry").record(started.elapsed());

        let ticket = match result {
            Ok(ticket) => ticket,
            Err(e) => return self.fail(entry_outcome(&e), e),
        };

        self.session.token = ticket.credential().map(str::to_string);
        self.session.customer_id = ticket.customer_id().map(str::to_string);

        let Some(status) = ticket.wait_status else {
            return self.fail(Outcome::EntryFailure, "entry response carried no waitStatus");
        };
        debug!(status = %status, customer_id = ?self.session.customer_id, "entered");
        self.session.wait_status = Some(status.clone());

        match status {
            // READY at entry means this deployment admits without a stream
            WaitStatus::Enter | WaitStatus::Ready => self.admit_immediately().await,
            _ => self.wait_in_queue().await,
        }
    }

    async fn admit_immediately(&mut self) -> Outcome {
        self.session.advance(SessionState::EnteredImmediate);
        if !self.config.verify_on_immediate {
            return Outcome::ImmediateSuccess;
        }

        let Some(token) = self.session.token.clone() else {
            return self.fail(
                Outcome::EntryFailure,
                "immediate admission returned no credential to verify",
            );
        };

        self.session.advance(SessionState::Verifying);
        match self.verify(&token).await {
            Ok(()) => Outcome::ImmediateSuccess,
            Err(outcome) => outcome,
        }
    }

    async fn wait_in_queue(&mut self) -> Outcome {
        let (Some(customer_id), Some(token)) =
            (self.session.customer_id.clone(), self.session.token.clone())
        else {
            return self.fail(
                Outcome::EntryFailure,
                "queued entry response is missing customerId or credential",
            );
        };

        self.session.advance(SessionState::Waiting);
        let started = Instant::now();
        // One deadline covers both the handshake and the watch
        let deadline = wait_deadline(started, self.config.wait_timeout);

        let opened = timeout_at(
            deadline,
            self.api
                .open_status_stream(self.config.action_id, &customer_id),
        )
        .await;
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return self.fail(Outcome::StreamError, e),
            Err(_) => {
                return self.fail(
                    Outcome::StreamTimeout,
                    "status stream did not open before the wait timeout",
                );
            }
        };

        let watched = watch_until(&mut stream, &mut self.session, deadline).await;
        histogram!("loadgen_phase_duration_seconds", "phase" => "wait").record(started.elapsed());

        match watched {
            WatchOutcome::Ready => {}
            WatchOutcome::Timeout => {
                let reason = format!("no READY within {:?}", self.config.wait_timeout);
                return self.fail(Outcome::StreamTimeout, reason);
            }
            WatchOutcome::StreamError(reason) => return self.fail(Outcome::StreamError, reason),
        }

        self.session.advance(SessionState::Ready);
        self.session.advance(SessionState::Verifying);
        match self.verify(&token).await {
            Ok(()) => Outcome::QueuedSuccess,
            Err(outcome) => outcome,
        }
    }

    async fn verify(&self, token: &str) -> Result<(), Outcome> {
        let started = Instant::now();
        let result = self.api.verify(token).await;
        histogram!("loadgen_phase_duration_seconds", "phase" => "verify").record(started.elapsed());

        result.map_err(|e| self.fail(verify_outcome(&e), e))
    }

    fn fail(&self, outcome: Outcome, reason: impl Display) -> Outcome {
        warn!(
            outcome = %outcome,
            state = ?self.session.state(),
            rank = ?self.session.last_rank,
            "session failed: {reason}"
        );
        outcome
    }
}

/// Roughly 30 years; stands in for "no deadline" when the timeout overflows `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn wait_deadline(started: Instant, wait_timeout: Duration) -> Instant {
    started
        .checked_add(wait_timeout)
        .unwrap_or_else(|| started + FAR_FUTURE)
}

fn entry_outcome(err: &ClientError) -> Outcome {
    match err {
        ClientError::Network { .. } => Outcome::NetworkError,
        ClientError::Rejected { .. } | ClientError::Malformed { .. } => Outcome::EntryFailure,
        ClientError::Stream(_) | ClientError::Unexpected { .. } => Outcome::UnexpectedError,
    }
}

fn verify_outcome(err: &ClientError) -> Outcome {
    match err {
        ClientError::Network { .. } => Outcome::NetworkError,
        ClientError::Rejected { .. } | ClientError::Malformed { .. } => Outcome::VerifyFailure,
        ClientError::Stream(_) | ClientError::Unexpected { .. } => Outcome::UnexpectedError,
    }
}
