//! Group transfer gate.
//!
//! In sync-replication mode a producer's publish returns only once its
//! message's end offset has been replicated to at least one slave. Each
//! blocked producer enqueues a [`GroupCommitRequest`]; a dedicated
//! service task checks requests against the replicated offset, waiting
//! in bounded rounds for acknowledgement progress.
//!
//! Producers append to a write list under a mutex; the service task
//! swaps the write list with its own read list and drains the read list
//! without holding any lock, keeping the producer hot path contention
//! free.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Rounds of waiting per request before giving up.
const TRANSFER_WAIT_ROUNDS: usize = 5;
/// Length of one waiting round.
const TRANSFER_WAIT_INTERVAL: Duration = Duration::from_secs(1);
/// Idle poll interval of the service task (bounds shutdown latency).
const SERVICE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A producer blocked until `next_offset` is replicated.
#[derive(Debug)]
pub struct GroupCommitRequest {
    next_offset: i64,
    completion: oneshot::Sender<bool>,
}

impl GroupCommitRequest {
    /// Create a request and the receiver the producer blocks on. The
    /// received value is `true` iff the offset was replicated in time.
    pub fn new(next_offset: i64) -> (Self, oneshot::Receiver<bool>) {
        let (completion, rx) = oneshot::channel();
        (
            Self {
                next_offset,
                completion,
            },
            rx,
        )
    }

    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }

    fn complete(self, transfer_ok: bool) {
        let _ = self.completion.send(transfer_ok);
    }
}

/// Gate blocking producers on slave acknowledgement progress.
pub struct GroupTransferGate {
    /// Mutator-appended request list; swapped out by the service task
    requests: Mutex<Vec<GroupCommitRequest>>,
    request_arrived: Notify,
    transfer_notify: Notify,
    /// Shared view of `push2slave_max_offset`
    acked_offset: Arc<AtomicI64>,
    shutdown: AtomicBool,
}

impl GroupTransferGate {
    pub fn new(acked_offset: Arc<AtomicI64>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            request_arrived: Notify::new(),
            transfer_notify: Notify::new(),
            acked_offset,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Enqueue a producer wait. After shutdown the request fails
    /// immediately.
    pub fn put_request(&self, request: GroupCommitRequest) {
        if self.shutdown.load(Ordering::Acquire) {
            request.complete(false);
            return;
        }
        self.requests.lock().push(request);
        self.request_arrived.notify_one();
    }

    /// Producer helper: enqueue and block until the outcome is known.
    pub async fn wait_for_transfer(&self, next_offset: i64) -> bool {
        let (request, rx) = GroupCommitRequest::new(next_offset);
        self.put_request(request);
        rx.await.unwrap_or(false)
    }

    /// Wake the service task after acknowledgement progress.
    pub fn notify_transfer_some(&self) {
        self.transfer_notify.notify_waiters();
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.request_arrived.notify_one();
        self.transfer_notify.notify_waiters();
    }

    /// Spawn the service task draining producer waits.
    pub fn run(self: &Arc<Self>) -> JoinHandle<()> {
        let gate = self.clone();
        tokio::spawn(async move {
            let mut read_list: Vec<GroupCommitRequest> = Vec::new();

            while !gate.shutdown.load(Ordering::Acquire) {
                let _ = tokio::time::timeout(
                    SERVICE_POLL_INTERVAL,
                    gate.request_arrived.notified(),
                )
                .await;

                {
                    let mut write_list = gate.requests.lock();
                    std::mem::swap(&mut *write_list, &mut read_list);
                }

                for request in read_list.drain(..) {
                    let mut transfer_ok =
                        gate.acked_offset.load(Ordering::Acquire) >= request.next_offset();

                    for _ in 0..TRANSFER_WAIT_ROUNDS {
                        if transfer_ok || gate.shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        let _ = tokio::time::timeout(
                            TRANSFER_WAIT_INTERVAL,
                            gate.transfer_notify.notified(),
                        )
                        .await;
                        transfer_ok =
                            gate.acked_offset.load(Ordering::Acquire) >= request.next_offset();
                    }

                    if !transfer_ok {
                        warn!(
                            next_offset = request.next_offset(),
                            "transfer to slave timed out"
                        );
                    }
                    request.complete(transfer_ok);
                }
            }

            // fail every wait still pending at shutdown
            let mut write_list = gate.requests.lock();
            for request in write_list.drain(..).chain(read_list.drain(..)) {
                request.complete(false);
            }
            drop(write_list);
            info!("group transfer gate stopped");
        })
    }
}
