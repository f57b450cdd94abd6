use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartUpdated(Uuid),
    CartCleared(Uuid),
    CartMerged {
        user_cart_id: Uuid,
        session_cart_id: Uuid,
    },
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
    },
    CartItemRemoved {
        cart_id: Uuid,
        product_id: Uuid,
    },
    CouponApplied {
        cart_id: Uuid,
        code: String,
    },
    CouponRemoved(Uuid),

    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    TrackingNumberAdded {
        order_id: Uuid,
        tracking_number: String,
    },

    // Catalog events
    StockDepleted(Uuid),
    ReviewSubmitted {
        product_id: Uuid,
        review_id: Uuid,
    },
    ReviewApproved(Uuid),

    // Account events
    UserRegistered(Uuid),
    WishlistItemAdded {
        user_id: Uuid,
        product_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Event delivery is best-effort and must never abort a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!("Event dropped: {}", err);
        }
    }
}

/// Drains the event channel, logging each event. There is no background
/// processing beyond this; events exist for observability and tests.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "domain event");
    }
    info!("event channel closed; processor exiting");
}
