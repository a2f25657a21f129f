//! Per-worker request/response bridge.
//!
//! The bridge is the single hand-off point between orchestrator tasks that
//! call into a worker and the task that services the worker's stream. The
//! orchestrator side calls [`Bridge::request`] and is suspended until the
//! stream side hands back a reply through [`Bridge::deliver`], the deadline
//! elapses, or the stream ends ([`Bridge::close`], or [`Bridge::fail`] when
//! the worker broke the protocol).
//!
//! The stream carries no correlation ids, so at most one instruction is in
//! flight per worker. Concurrent callers queue on a FIFO lock around the
//! whole publish/await cycle. When a caller gives up on an instruction that
//! already went out, the bridge counts it as abandoned and drops the next
//! inbound reply instead of handing it to a later caller.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, Mutex as AsyncMutex, Notify};

use crate::envelope::Envelope;
use crate::error::{FleetError, Result};
use crate::protocol::WorkerId;

/// Call state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    AwaitingResult,
    Closed,
}

/// What became of an inbound reply handed to [`Bridge::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the waiting caller.
    Delivered,
    /// Answer to an instruction whose caller already gave up; dropped.
    Stale,
    /// Nothing was waiting for a reply; dropped.
    Unsolicited,
    /// The bridge is closed; dropped.
    Closed,
}

struct Inner {
    state: BridgeState,
    // Published by the caller, not yet taken by the stream handler.
    outbox: Option<Envelope>,
    waiter: Option<oneshot::Sender<Result<Envelope>>>,
    // Instructions on the wire whose replies must be discarded.
    abandoned: usize,
}

pub struct Bridge {
    worker_id: WorkerId,
    turn: AsyncMutex<()>,
    inner: Mutex<Inner>,
    outbox_ready: Notify,
}

impl Bridge {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            turn: AsyncMutex::new(()),
            inner: Mutex::new(Inner {
                state: BridgeState::Idle,
                outbox: None,
                waiter: None,
                abandoned: 0,
            }),
            outbox_ready: Notify::new(),
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn state(&self) -> BridgeState {
        self.lock_inner().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == BridgeState::Closed
    }

    /// Number of inbound replies that will be discarded before the next
    /// reply is delivered to a caller.
    pub fn stale_replies_pending(&self) -> usize {
        self.lock_inner().abandoned
    }

    /// Send one instruction and wait for the worker's reply.
    ///
    /// The envelope's `deadline`, when set, bounds the wait. Callers queue
    /// behind any call already in flight on this bridge; the deadline only
    /// starts once this call's instruction has been published.
    ///
    /// # Errors
    ///
    /// `Timeout` if the deadline passes first, `Disconnected` if the bridge
    /// is or becomes closed before a reply arrives, or the error passed to
    /// [`Bridge::fail`] if the stream was torn down over a protocol violation.
    pub async fn request(&self, envelope: Envelope) -> Result<Envelope> {
        let _turn = self.turn.lock().await;

        let deadline = envelope.deadline;
        let kind = envelope.kind();

        let receiver = {
            let mut inner = self.lock_inner();
            if inner.state == BridgeState::Closed {
                return Err(FleetError::disconnected(self.worker_id.clone()));
            }
            let (sender, receiver) = oneshot::channel();
            inner.outbox = Some(envelope);
            inner.waiter = Some(sender);
            inner.state = BridgeState::AwaitingResult;
            receiver
        };
        self.outbox_ready.notify_one();

        // Dropped before `_turn`, so the next caller sees a settled bridge.
        let mut pending = PendingCall {
            bridge: self,
            settled: false,
        };

        let received = match deadline {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::warn!(
                        worker_id = %self.worker_id,
                        instruction = kind,
                        timeout_ms = limit.as_millis() as u64,
                        "instruction timed out"
                    );
                    return Err(FleetError::timeout(self.worker_id.clone(), limit));
                }
            },
            None => receiver.await,
        };
        pending.settled = true;

        received.unwrap_or_else(|_| Err(FleetError::disconnected(self.worker_id.clone())))
    }

    /// Next instruction to write to the worker's stream.
    ///
    /// Returns `None` once the bridge is closed. Safe to drop mid-wait: a
    /// published instruction stays in the outbox until taken.
    pub async fn next_instruction(&self) -> Option<Envelope> {
        loop {
            {
                let mut inner = self.lock_inner();
                if inner.state == BridgeState::Closed {
                    return None;
                }
                if let Some(envelope) = inner.outbox.take() {
                    return Some(envelope);
                }
            }
            self.outbox_ready.notified().await;
        }
    }

    /// Hand an inbound reply from the worker's stream to the waiting caller.
    pub fn deliver(&self, envelope: Envelope) -> Delivery {
        let mut inner = self.lock_inner();

        if inner.state == BridgeState::Closed {
            return Delivery::Closed;
        }

        if inner.abandoned > 0 {
            inner.abandoned -= 1;
            tracing::debug!(
                worker_id = %self.worker_id,
                reply = envelope.kind(),
                "discarding reply to abandoned instruction"
            );
            return Delivery::Stale;
        }

        // The current instruction has not been written yet, so this
        // cannot be its answer.
        if inner.outbox.is_some() {
            tracing::warn!(
                worker_id = %self.worker_id,
                reply = envelope.kind(),
                "reply arrived before instruction was sent"
            );
            return Delivery::Unsolicited;
        }

        match inner.waiter.take() {
            Some(waiter) => {
                inner.state = BridgeState::Idle;
                match waiter.send(Ok(envelope)) {
                    Ok(()) => Delivery::Delivered,
                    // Caller timed out between the deadline and this reply.
                    Err(_) => Delivery::Stale,
                }
            }
            None => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    reply = envelope.kind(),
                    "unsolicited reply"
                );
                Delivery::Unsolicited
            }
        }
    }

    /// Mark the worker's stream as gone. Fails the waiting caller with
    /// `Disconnected` and wakes the stream handler.
    pub fn close(&self) {
        if self.shut(None) {
            tracing::debug!(worker_id = %self.worker_id, "bridge closed");
        }
    }

    /// Close the bridge, failing the waiting caller with `error` instead of
    /// `Disconnected`.
    pub fn fail(&self, error: FleetError) {
        let message = error.to_string();
        if self.shut(Some(error)) {
            tracing::debug!(worker_id = %self.worker_id, error = %message, "bridge failed");
        }
    }

    // Moves the bridge to `Closed` and wakes the stream handler. A pending
    // caller gets `error`, or `Disconnected` when none is given. Returns
    // false if the bridge was already closed.
    fn shut(&self, error: Option<FleetError>) -> bool {
        let waiter = {
            let mut inner = self.lock_inner();
            if inner.state == BridgeState::Closed {
                return false;
            }
            inner.state = BridgeState::Closed;
            inner.outbox = None;
            inner.abandoned = 0;
            inner.waiter.take()
        };
        if let (Some(waiter), Some(error)) = (waiter, error) {
            let _ = waiter.send(Err(error));
        }
        self.outbox_ready.notify_waiters();
        self.outbox_ready.notify_one();
        true
    }

    fn abandon_current(&self) {
        let mut inner = self.lock_inner();
        if inner.state == BridgeState::Closed {
            return;
        }
        if inner.outbox.take().is_some() {
            inner.waiter = None;
            tracing::debug!(worker_id = %self.worker_id, "withdrew unsent instruction");
        } else if inner.waiter.take().is_some() {
            inner.abandoned += 1;
            tracing::debug!(
                worker_id = %self.worker_id,
                abandoned = inner.abandoned,
                "instruction abandoned, its reply will be discarded"
            );
        }
        inner.state = BridgeState::Idle;
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("worker_id", &self.worker_id)
            .field("state", &self.state())
            .finish()
    }
}

// Releases the in-flight slot when a call ends without a reply (deadline
// elapsed or the caller's future was dropped).
struct PendingCall<'a> {
    bridge: &'a Bridge,
    settled: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.bridge.abandon_current();
        }
    }
}
