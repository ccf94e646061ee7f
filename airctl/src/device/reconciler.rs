//! Status reconciliation for a device
//!
//! Status pushes arrive on the device's status topic in broker order. Each
//! payload is decoded into a [`Status`]; a good one replaces the last-known
//! status wholesale and wakes observers, a bad one is logged and dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error};

use crate::models::status::{PowerState, Status};

/// Last-known status of a device.
///
/// The reconciler is the only writer. Readers get a consistent snapshot
/// through the watch channel, never a half-written record.
pub struct StatusCell {
    status: watch::Sender<Status>,

    /// Power requested by the last toggle that the device has not answered yet
    pending_power: Mutex<Option<PowerState>>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (status, _) = watch::channel(Status::default());
        Self {
            status,
            pending_power: Mutex::new(None),
        }
    }

    /// Snapshot of the last-known status
    pub fn current(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Observe status changes; only real changes wake the receiver
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    /// Power state a toggle should request now.
    ///
    /// Consecutive toggles alternate even before the device reports back.
    pub async fn next_power(&self) -> PowerState {
        let mut pending = self.pending_power.lock().await;
        let base = match pending.as_ref() {
            Some(requested) => requested.clone(),
            None => self.status.borrow().power.clone(),
        };
        let next = base.toggled();
        *pending = Some(next.clone());
        next
    }

    /// Replace the status, returning whether it differs from the previous one
    async fn replace(&self, status: Status) -> bool {
        // the device has spoken; its view of power wins over our request
        self.pending_power.lock().await.take();
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        })
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of handling one status payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Status changed and observers were notified
    Updated,
    /// Same status as before, nobody was woken
    Unchanged,
    /// Payload did not decode, previous status kept
    Rejected,
}

/// Consumes status payloads for one device
pub struct StatusReconciler {
    device: String,
    cell: Arc<StatusCell>,
}

impl StatusReconciler {
    pub fn new(device: impl Into<String>, cell: Arc<StatusCell>) -> Self {
        Self {
            device: device.into(),
            cell,
        }
    }

    pub async fn handle(&self, payload: &[u8]) -> Reconciled {
        debug!(device = %self.device, payload = %String::from_utf8_lossy(payload), "status received");

        let status = match Status::from_payload(payload) {
            Ok(status) => status,
            Err(e) => {
                error!(device = %self.device, "{}", e);
                return Reconciled::Rejected;
            }
        };

        if self.cell.replace(status).await {
            Reconciled::Updated
        } else {
            Reconciled::Unchanged
        }
    }

    /// Handle payloads until the inbox closes
    pub async fn run(self, mut inbox: mpsc::Receiver<Vec<u8>>) {
        while let Some(payload) = inbox.recv().await {
            self.handle(&payload).await;
        }
        debug!(device = %self.device, "status inbox closed");
    }
}
