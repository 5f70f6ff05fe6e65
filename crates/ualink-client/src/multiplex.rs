// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The request multiplexer: a table of outstanding requests keyed by
//! request id.
//!
//! Every entry is completed exactly once: either with the decoded response
//! body or with a synthetic failure status (timeout, shutdown, channel
//! loss). Synchronous waiters park their outcome in a completion slot the
//! pumping caller polls; asynchronous entries carry a boxed callback. The
//! table never invokes callbacks itself: completion hands back ready-to-run
//! thunks so the caller can run them after all table borrows are released.
//!
//! The table is generic over the callback context so it can be tested in
//! isolation; the client instantiates it with itself.

use std::collections::HashMap;
use std::time::Instant;

use ualink_types::StatusCode;

use crate::error::UsageError;

// =============================================================================
// Outcomes and responders
// =============================================================================

/// How an outstanding request ended.
#[derive(Debug)]
pub enum ServiceOutcome {
    /// A response message arrived.
    Message {
        /// Binary encoding id of the body.
        type_id: u32,
        /// The encoded body.
        body: Vec<u8>,
    },

    /// The core manufactured a failure with this status.
    Fault(StatusCode),
}

/// Callback completing an asynchronous request.
pub type AsyncResponder<C> = Box<dyn FnOnce(&mut C, u32, ServiceOutcome)>;

/// An async completion with its arguments captured, ready to invoke.
pub type CompletionThunk<C> = Box<dyn FnOnce(&mut C)>;

/// Who is waiting for a request.
pub enum Responder<C> {
    /// A synchronous caller pumping the event loop.
    Sync,

    /// An asynchronous callback.
    Async(AsyncResponder<C>),
}

struct Pending<C> {
    responder: Responder<C>,
    deadline: Instant,
}

// =============================================================================
// MultiplexerStats
// =============================================================================

/// Counters for multiplexer activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiplexerStats {
    /// Requests registered.
    pub dispatched: u64,
    /// Requests completed with a response.
    pub completed: u64,
    /// Requests failed synthetically.
    pub failed: u64,
    /// Requests failed by deadline.
    pub timed_out: u64,
}

// =============================================================================
// Multiplexer
// =============================================================================

/// The outstanding-request table.
pub struct Multiplexer<C> {
    pending: HashMap<u32, Pending<C>>,
    completed_sync: HashMap<u32, ServiceOutcome>,
    /// Cap on outstanding requests; 0 means no cap.
    max_outstanding: u32,
    stats: MultiplexerStats,
}

impl<C: 'static> Multiplexer<C> {
    /// Creates an empty table with the given cap (0 = no cap).
    pub fn new(max_outstanding: u32) -> Self {
        Self {
            pending: HashMap::new(),
            completed_sync: HashMap::new(),
            max_outstanding,
            stats: MultiplexerStats::default(),
        }
    }

    /// Lowers or lifts the outstanding-request cap.
    pub fn set_max_outstanding(&mut self, cap: u32) {
        self.max_outstanding = cap;
    }

    /// Number of requests currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Activity counters.
    pub fn stats(&self) -> MultiplexerStats {
        self.stats
    }

    /// Registers an outstanding request.
    ///
    /// Fails with [`UsageError::TooManyRequests`] when the cap would be
    /// exceeded.
    pub fn register(
        &mut self,
        request_id: u32,
        responder: Responder<C>,
        deadline: Instant,
    ) -> Result<(), UsageError> {
        if self.max_outstanding != 0 && self.pending.len() >= self.max_outstanding as usize {
            return Err(UsageError::TooManyRequests {
                outstanding: self.pending.len(),
                limit: self.max_outstanding,
            });
        }
        self.pending.insert(request_id, Pending { responder, deadline });
        self.stats.dispatched += 1;
        Ok(())
    }

    /// Removes an entry without completing it (send failure, sync timeout).
    pub fn remove(&mut self, request_id: u32) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    /// Returns `true` if the request is still outstanding.
    pub fn is_pending(&self, request_id: u32) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Completes a request with an outcome.
    ///
    /// For a synchronous waiter the outcome is parked for
    /// [`Self::take_sync_outcome`] and `None` is returned; for an
    /// asynchronous entry the callback comes back as a thunk with the
    /// outcome captured. A request id with no entry yields `None`; a
    /// response is delivered at most once.
    pub fn complete(
        &mut self,
        request_id: u32,
        outcome: ServiceOutcome,
    ) -> Option<CompletionThunk<C>> {
        let pending = self.pending.remove(&request_id)?;
        if matches!(outcome, ServiceOutcome::Fault(_)) {
            self.stats.failed += 1;
        } else {
            self.stats.completed += 1;
        }
        match pending.responder {
            Responder::Sync => {
                self.completed_sync.insert(request_id, outcome);
                None
            }
            Responder::Async(callback) => {
                Some(Box::new(move |ctx: &mut C| callback(ctx, request_id, outcome)))
            }
        }
    }

    /// Takes the parked outcome of a synchronous request.
    pub fn take_sync_outcome(&mut self, request_id: u32) -> Option<ServiceOutcome> {
        self.completed_sync.remove(&request_id)
    }

    /// Fails every entry whose deadline has passed with `BadTimeout`.
    pub fn expire(&mut self, now: Instant) -> Vec<CompletionThunk<C>> {
        let due: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, p)| now >= p.deadline)
            .map(|(id, _)| *id)
            .collect();

        let mut thunks = Vec::new();
        for request_id in due {
            let Some(pending) = self.pending.remove(&request_id) else {
                continue;
            };
            self.stats.timed_out += 1;
            match pending.responder {
                Responder::Sync => {
                    self.completed_sync
                        .insert(request_id, ServiceOutcome::Fault(StatusCode::BAD_TIMEOUT));
                }
                Responder::Async(callback) => thunks.push(Box::new(move |ctx: &mut C| {
                    callback(ctx, request_id, ServiceOutcome::Fault(StatusCode::BAD_TIMEOUT))
                })
                    as CompletionThunk<C>),
            }
        }
        thunks
    }

    /// Fails every outstanding request with `status`.
    ///
    /// Used on shutdown (`BadShutdown`) and channel loss
    /// (`BadSecureChannelClosed`).
    pub fn fail_all(&mut self, status: StatusCode) -> Vec<CompletionThunk<C>> {
        let mut thunks = Vec::new();
        for (request_id, pending) in self.pending.drain() {
            self.stats.failed += 1;
            match pending.responder {
                Responder::Sync => {
                    self.completed_sync
                        .insert(request_id, ServiceOutcome::Fault(status));
                }
                Responder::Async(callback) => thunks.push(Box::new(move |ctx: &mut C| {
                    callback(ctx, request_id, ServiceOutcome::Fault(status))
                })
                    as CompletionThunk<C>),
            }
        }
        thunks
    }
}

impl<C> std::fmt::Debug for Multiplexer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("outstanding", &self.pending.len())
            .field("max_outstanding", &self.max_outstanding)
            .field("stats", &self.stats)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Ctx = Vec<(u32, StatusCode)>;

    fn recorder() -> AsyncResponder<Ctx> {
        Box::new(|ctx: &mut Ctx, id, outcome| {
            let status = match outcome {
                ServiceOutcome::Fault(status) => status,
                ServiceOutcome::Message { .. } => StatusCode::GOOD,
            };
            ctx.push((id, status));
        })
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn test_sync_completion_is_parked() {
        let mut mux: Multiplexer<Ctx> = Multiplexer::new(0);
        mux.register(1, Responder::Sync, far()).unwrap();
        assert!(mux.is_pending(1));

        let thunk = mux.complete(
            1,
            ServiceOutcome::Message {
                type_id: 634,
                body: vec![1, 2],
            },
        );
        assert!(thunk.is_none());
        assert!(!mux.is_pending(1));
        assert!(matches!(
            mux.take_sync_outcome(1),
            Some(ServiceOutcome::Message { type_id: 634, .. })
        ));
        // Exactly once.
        assert!(mux.take_sync_outcome(1).is_none());
    }

    #[test]
    fn test_out_of_order_async_completion() {
        let mut mux: Multiplexer<Ctx> = Multiplexer::new(0);
        let mut ctx = Ctx::new();
        for id in [1, 2, 3] {
            mux.register(id, Responder::Async(recorder()), far()).unwrap();
        }
        for id in [3, 1, 2] {
            let thunk = mux
                .complete(id, ServiceOutcome::Message { type_id: 676, body: vec![] })
                .unwrap();
            thunk(&mut ctx);
        }
        assert_eq!(
            ctx.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );
    }

    #[test]
    fn test_double_completion_is_ignored() {
        let mut mux: Multiplexer<Ctx> = Multiplexer::new(0);
        mux.register(5, Responder::Async(recorder()), far()).unwrap();
        assert!(mux
            .complete(5, ServiceOutcome::Fault(StatusCode::GOOD))
            .is_some());
        assert!(mux
            .complete(5, ServiceOutcome::Fault(StatusCode::GOOD))
            .is_none());
    }

    #[test]
    fn test_cap_enforced() {
        let mut mux: Multiplexer<Ctx> = Multiplexer::new(2);
        mux.register(1, Responder::Sync, far()).unwrap();
        mux.register(2, Responder::Sync, far()).unwrap();
        let err = mux.register(3, Responder::Sync, far()).unwrap_err();
        assert!(matches!(err, UsageError::TooManyRequests { .. }));
        assert_eq!(err.status_code(), StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    #[test]
    fn test_expire_splits_sync_and_async() {
        let mut mux: Multiplexer<Ctx> = Multiplexer::new(0);
        let now = Instant::now();
        mux.register(1, Responder::Sync, now).unwrap();
        mux.register(2, Responder::Async(recorder()), now).unwrap();
        mux.register(3, Responder::Sync, far()).unwrap();

        let mut ctx = Ctx::new();
        for thunk in mux.expire(now + Duration::from_millis(1)) {
            thunk(&mut ctx);
        }
        assert!(matches!(
            mux.take_sync_outcome(1),
            Some(ServiceOutcome::Fault(StatusCode::BAD_TIMEOUT))
        ));
        assert_eq!(ctx, vec![(2, StatusCode::BAD_TIMEOUT)]);
        assert!(mux.is_pending(3));
        assert_eq!(mux.stats().timed_out, 2);
    }

    #[test]
    fn test_fail_all() {
        let mut mux: Multiplexer<Ctx> = Multiplexer::new(0);
        mux.register(1, Responder::Sync, far()).unwrap();
        mux.register(2, Responder::Async(recorder()), far()).unwrap();

        let mut ctx = Ctx::new();
        for thunk in mux.fail_all(StatusCode::BAD_SHUTDOWN) {
            thunk(&mut ctx);
        }
        assert_eq!(mux.outstanding(), 0);
        assert!(matches!(
            mux.take_sync_outcome(1),
            Some(ServiceOutcome::Fault(StatusCode::BAD_SHUTDOWN))
        ));
        assert_eq!(ctx, vec![(2, StatusCode::BAD_SHUTDOWN)]);
    }
}
