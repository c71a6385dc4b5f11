use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::RecordStore;
use crate::error::StatsError;
use crate::models::{FilterSpec, GradeStatistics};
use crate::stats;

/// Identifies one accepted aggregation request. Ids increase monotonically
/// in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Exactly one delivery per accepted request, in submission order. The
/// originating filter rides along so the receiver can recognize and discard
/// a result it no longer cares about.
#[derive(Debug)]
pub struct StatsDelivery {
    pub request_id: RequestId,
    pub filter: FilterSpec,
    pub outcome: Result<GradeStatistics, StatsError>,
}

struct StatsRequest {
    id: RequestId,
    filter: FilterSpec,
}

/// Owns the single background aggregation worker. Requests queue FIFO
/// behind any in-flight computation; there is no cancellation and no
/// reordering. Queue depth stays near zero at classroom scale.
pub struct StatsCoordinator {
    requests: mpsc::UnboundedSender<StatsRequest>,
    worker: JoinHandle<()>,
    next_id: AtomicU64,
}

impl StatsCoordinator {
    /// Starts the worker and hands back the delivery side of the channel.
    pub fn spawn(
        store: Arc<dyn RecordStore>,
    ) -> (StatsCoordinator, mpsc::UnboundedReceiver<StatsDelivery>) {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<StatsRequest>();
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            tracing::info!("stats worker started");
            while let Some(request) = request_rx.recv().await {
                let outcome = match store.fetch_records(&request.filter).await {
                    Ok(records) => {
                        Ok(stats::compute(&records, request.filter.subject_is_pinned()))
                    }
                    Err(e) => Err(StatsError::StoreUnavailable(format!("{e:#}"))),
                };
                tracing::debug!(request_id = request.id.0, "aggregation finished");

                let delivery = StatsDelivery {
                    request_id: request.id,
                    filter: request.filter,
                    outcome,
                };
                if delivery_tx.send(delivery).is_err() {
                    // Receiver dropped; nothing left to deliver to.
                    break;
                }
            }
            tracing::info!("stats worker drained");
        });

        let coordinator = StatsCoordinator {
            requests: request_tx,
            worker,
            next_id: AtomicU64::new(1),
        };
        (coordinator, delivery_rx)
    }

    /// Submits an aggregation request; never blocks. The result or error
    /// arrives on the delivery channel after any earlier requests.
    pub fn request(&self, filter: FilterSpec) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // Send fails only once the worker has exited, and the worker only
        // exits early when the delivery receiver is already gone.
        let _ = self.requests.send(StatsRequest { id, filter });
        id
    }

    /// Closes the submission side and waits for the worker to drain.
    /// Already-submitted requests still get their deliveries.
    pub async fn shutdown(self) {
        drop(self.requests);
        let _ = self.worker.await;
    }
}
