// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The publish pump.
//!
//! While a session is active the pump keeps a configured number of Publish
//! requests outstanding so the server always has capacity to deliver
//! subscription notifications promptly. Responses are topped up
//! immediately from their completion callbacks; a one-second repeated
//! callback re-primes the pump after transient stalls.
//!
//! Server feedback shapes the pump for the life of the session:
//!
//! - `BadNoSubscription` halts it until a subscription is created
//! - `BadTooManyPublishRequests` permanently lowers the target (min 1)

use ualink_types::messages::{
    NotificationMessage, PublishRequest, PublishResponse, SubscriptionAcknowledgement, UaResponse,
};
use ualink_types::StatusCode;

use std::time::Duration;

use crate::client::Client;

/// Deadline for pump-issued Publish requests.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(3600);

/// Handler invoked for every notification message the server delivers.
pub type NotificationHandler = Box<dyn FnMut(u32, &NotificationMessage)>;

// =============================================================================
// PumpStats
// =============================================================================

/// Counters for publish-pump activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct PumpStats {
    /// Publish requests sent.
    pub sent: u64,
    /// Publish responses received.
    pub responses: u64,
    /// Notification messages delivered to the handler.
    pub notifications: u64,
    /// Keep-alive responses received.
    pub keep_alives: u64,
    /// Times the target was lowered by the server.
    pub target_reductions: u64,
}

// =============================================================================
// PublishPump
// =============================================================================

/// State of the publish pump.
#[derive(Debug, Default)]
pub(crate) struct PublishPump {
    /// Target count of outstanding Publish requests; 0 disables the pump.
    target: u16,

    /// Publish requests currently awaiting a response.
    outstanding: u16,

    /// Halted after `BadNoSubscription` until a subscription exists.
    no_subscription: bool,

    /// Acknowledgements to echo in the next Publish request.
    acks: Vec<SubscriptionAcknowledgement>,

    stats: PumpStats,
}

impl PublishPump {
    /// Arms the pump for a new session.
    pub fn start(&mut self, target: u16) {
        self.target = target;
        self.outstanding = 0;
        self.no_subscription = false;
        self.acks.clear();
    }

    /// Disarms the pump; outstanding bookkeeping is dropped.
    pub fn reset(&mut self) {
        self.target = 0;
        self.outstanding = 0;
        self.no_subscription = false;
        self.acks.clear();
    }

    /// Re-enables sending after a subscription was created.
    pub fn resume(&mut self) {
        self.no_subscription = false;
    }

    /// Returns `true` if another Publish request should be dispatched.
    pub fn wants_publish(&self) -> bool {
        self.target > 0 && !self.no_subscription && self.outstanding < self.target
    }

    /// Current target of outstanding requests.
    pub fn target(&self) -> u16 {
        self.target
    }

    /// Publish requests currently outstanding.
    pub fn outstanding(&self) -> u16 {
        self.outstanding
    }

    /// Activity counters.
    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    fn take_acks(&mut self) -> Vec<SubscriptionAcknowledgement> {
        std::mem::take(&mut self.acks)
    }

    fn restore_acks(&mut self, acks: Vec<SubscriptionAcknowledgement>) {
        let mut acks = acks;
        acks.append(&mut self.acks);
        self.acks = acks;
    }
}

// =============================================================================
// Client pump driver
// =============================================================================

impl Client {
    /// Installs the handler receiving every delivered notification message.
    pub fn set_notification_handler<F>(&mut self, handler: F)
    where
        F: FnMut(u32, &NotificationMessage) + 'static,
    {
        self.notification_handler = Some(Box::new(handler));
    }

    /// Publish-pump statistics.
    pub fn publish_pump_stats(&self) -> PumpStats {
        self.pump.stats
    }

    /// The pump's current target of outstanding Publish requests.
    pub fn publish_pump_target(&self) -> u16 {
        self.pump.target()
    }

    /// Publish requests currently awaiting a response.
    pub fn publish_requests_outstanding(&self) -> u16 {
        self.pump.outstanding()
    }

    /// Tops the pump up to its target. Runs from the repeated callback and
    /// from every Publish completion.
    pub(crate) fn publish_pump_tick(&mut self) {
        while self.session.is_some() && self.channel.is_some() && self.pump.wants_publish() {
            let acks = self.pump.take_acks();
            let request = PublishRequest {
                subscription_acknowledgements: acks.clone(),
                ..Default::default()
            };
            // A Publish may legitimately stay outstanding far longer than
            // the service timeout; the server answers when it has
            // notifications.
            let dispatched = self.async_service_with_timeout(
                request,
                PUBLISH_TIMEOUT,
                |client: &mut Client, _id, response| {
                    client.handle_publish_response(response);
                },
            );
            match dispatched {
                Ok(_) => {
                    self.pump.outstanding += 1;
                    self.pump.stats.sent += 1;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "publish dispatch failed");
                    self.pump.restore_acks(acks);
                    break;
                }
            }
        }
    }

    fn handle_publish_response(&mut self, response: PublishResponse) {
        self.pump.outstanding = self.pump.outstanding.saturating_sub(1);
        self.pump.stats.responses += 1;

        let status = response.service_result();
        if status.is_good() {
            let message = &response.notification_message;
            if message.is_keep_alive() {
                self.pump.stats.keep_alives += 1;
            } else {
                self.pump.stats.notifications += 1;
                self.pump.acks.push(SubscriptionAcknowledgement {
                    subscription_id: response.subscription_id,
                    sequence_number: message.sequence_number,
                });
            }
            if let Some(handler) = self.notification_handler.as_mut() {
                handler(response.subscription_id, message);
            }
            self.publish_pump_tick();
            return;
        }

        match status {
            StatusCode::BAD_NO_SUBSCRIPTION => {
                tracing::debug!("publish halted: no subscription on the session");
                self.pump.no_subscription = true;
            }
            StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS => {
                self.pump.target = self.pump.target.saturating_sub(1).max(1);
                self.pump.stats.target_reductions += 1;
                tracing::info!(target = self.pump.target, "publish target lowered by server");
            }
            StatusCode::BAD_SHUTDOWN
            | StatusCode::BAD_SECURE_CHANNEL_CLOSED
            | StatusCode::BAD_SERVER_NOT_CONNECTED
            | StatusCode::BAD_SESSION_ID_INVALID
            | StatusCode::BAD_SESSION_CLOSED => {
                // Synthetic or teardown failures; the session reset disarms
                // the pump.
            }
            other => {
                tracing::warn!(status = %other, "publish failed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_publish() {
        let mut pump = PublishPump::default();
        assert!(!pump.wants_publish());

        pump.start(2);
        assert!(pump.wants_publish());
        pump.outstanding = 2;
        assert!(!pump.wants_publish());

        pump.outstanding = 1;
        pump.no_subscription = true;
        assert!(!pump.wants_publish());
        pump.resume();
        assert!(pump.wants_publish());
    }

    #[test]
    fn test_target_never_drops_below_one() {
        let mut pump = PublishPump::default();
        pump.start(1);
        pump.target = pump.target.saturating_sub(1).max(1);
        assert_eq!(pump.target, 1);
    }

    #[test]
    fn test_ack_restore_preserves_order() {
        let mut pump = PublishPump::default();
        pump.start(1);
        pump.acks.push(SubscriptionAcknowledgement {
            subscription_id: 1,
            sequence_number: 1,
        });
        let taken = pump.take_acks();
        pump.acks.push(SubscriptionAcknowledgement {
            subscription_id: 1,
            sequence_number: 2,
        });
        pump.restore_acks(taken);
        let numbers: Vec<u32> = pump.acks.iter().map(|a| a.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }
}
