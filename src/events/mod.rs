use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after each committed inventory operation.
///
/// Emission is fire-and-forget relative to the transactional outcome: a full
/// or closed channel is logged and never fails the operation that produced
/// the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryReceived {
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        movement_id: Uuid,
    },
    InventoryDispatched {
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        movement_id: Uuid,
    },
    InventoryTransferred {
        product_batch_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        quantity: i32,
        correlation_id: Uuid,
    },
    InventoryReserved {
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        reference: Option<String>,
    },
    InventoryReleased {
        product_batch_id: Uuid,
        location_id: Uuid,
        quantity: i32,
        reference: Option<String>,
    },
    InventoryAdjusted {
        product_batch_id: Uuid,
        location_id: Uuid,
        adjustment_quantity: i32,
        new_available_qty: i32,
        reason: Option<String>,
    },
    LowStockDetected {
        product_batch_id: Uuid,
        location_id: Uuid,
        available_qty: i32,
        threshold: i32,
        detected_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Builds a sender/receiver pair with the given channel capacity.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Consumes events off the channel and logs them. Callers that need richer
/// behavior (outbox publishing, projections) run their own consumer instead.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStockDetected {
                product_batch_id,
                location_id,
                available_qty,
                threshold,
                ..
            } => {
                warn!(
                    product_batch_id = %product_batch_id,
                    location_id = %location_id,
                    available_qty = %available_qty,
                    threshold = %threshold,
                    "Low stock detected"
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
