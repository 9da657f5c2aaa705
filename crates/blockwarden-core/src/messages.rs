//! Request/response contract between ephemeral UI surfaces and the
//! controller.
//!
//! A surface that comes and goes (popup, options page, CLI invocation)
//! drives the long-lived side exclusively through these messages; every
//! handler is a thin dispatch onto the ledger or the reroll machine, and an
//! absent listener on either side is a legitimate no-op, never an error.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::controller::Controller;
use crate::error::CoreError;
use crate::ledger::TemporaryUnblock;
use crate::reroll::Phase;

/// Messages a UI surface may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    TemporaryUnblock { domain: String, expires_at_ms: u64 },
    CancelTemporaryUnblock { domain: String },
    GetActiveUnblocks,
    ClearTemporaryUnblocks,
    ScheduleRerollReset { fire_at_ms: u64 },
    CancelRerollReset,
}

/// Replies to [`Request`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Response {
    Ack,
    Unblocks { unblocks: Vec<TemporaryUnblock> },
    Error { message: String },
}

impl Response {
    fn from_outcome(outcome: Result<(), CoreError>) -> Self {
        match outcome {
            Ok(()) => Response::Ack,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }
}

impl Controller {
    /// Dispatch one UI request.
    pub fn handle_request<Tz: TimeZone>(&self, request: Request, now: DateTime<Tz>) -> Response {
        let now_ms = now.timestamp_millis() as u64;
        match request {
            Request::TemporaryUnblock {
                domain,
                expires_at_ms,
            } => Response::from_outcome(self.ledger().add(&domain, expires_at_ms, now_ms)),
            Request::CancelTemporaryUnblock { domain } => {
                // Canceling the exemption a locked card created must also
                // release the card and restart the dependent countdowns.
                let state = self.reroll().load();
                let selected_domain = state.selected_card.and_then(|index| {
                    match state.cards.get(index) {
                        Some(crate::reroll::CardOption::Domain { domain, .. }) => {
                            Some(domain.clone())
                        }
                        _ => None,
                    }
                });
                let normalized = crate::domain::normalize_domain(&domain);
                if state.phase() == Phase::Locked
                    && selected_domain
                        .map(|d| crate::domain::normalize_domain(&d) == normalized)
                        .unwrap_or(false)
                {
                    Response::from_outcome(
                        self.reroll()
                            .cancel_selected(now_ms, &mut rand::thread_rng())
                            .map(drop),
                    )
                } else {
                    Response::from_outcome(self.ledger().remove(&domain, now_ms))
                }
            }
            Request::GetActiveUnblocks => Response::Unblocks {
                unblocks: self.ledger().get_active(now_ms),
            },
            Request::ClearTemporaryUnblocks => {
                Response::from_outcome(self.ledger().clear_all())
            }
            Request::ScheduleRerollReset { fire_at_ms } => {
                Response::from_outcome(self.reroll().schedule_reset_at(fire_at_ms).map(drop))
            }
            Request::CancelRerollReset => {
                Response::from_outcome(self.reroll().cancel_reset().map(drop))
            }
        }
    }
}
