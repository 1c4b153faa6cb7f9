use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Domain events emitted by the services after their transactions commit.
///
/// Events are best-effort notifications for downstream consumers; a full
/// channel or closed receiver never fails the originating request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ItemCreated {
        item_id: Uuid,
        sku: String,
    },
    ItemRestocked {
        item_id: Uuid,
        quantity: i32,
    },
    StockDebited {
        item_id: Uuid,
        quantity: i32,
    },
    StockCredited {
        item_id: Uuid,
        quantity: i32,
    },
    CartItemAdded {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartCleared {
        cart_id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        from: String,
        to: String,
    },
    OrderCancelled {
        order_id: Uuid,
        order_number: String,
    },
    CheckoutCompleted {
        order_id: Uuid,
        customer_id: Uuid,
        item_count: usize,
    },
}

/// Cloneable handle for publishing events onto the shared channel.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.tx
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("failed to send event: {}", e)))
    }

    /// Sends an event, logging on failure instead of propagating it. Used on
    /// paths where the database work has already committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("event publish failed: {}", e);
        }
    }
}

/// Creates a bounded event channel.
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("event processor started");
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => debug!(event = %json, "domain event"),
            Err(e) => error!("failed to serialize event: {}", e),
        }
    }
    info!("event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (sender, mut rx) = event_channel(8);
        sender
            .send(Event::CartCleared { cart_id: Uuid::new_v4() })
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(Event::CartCleared { .. })));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = event_channel(1);
        drop(rx);
        // Must not panic or error out.
        sender
            .send_or_log(Event::CartCleared { cart_id: Uuid::new_v4() })
            .await;
    }

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = Event::StockDebited {
            item_id: Uuid::nil(),
            quantity: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stock_debited");
        assert_eq!(json["quantity"], 3);
    }
}
