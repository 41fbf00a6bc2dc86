use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::damage_report::DamageStatus;

/// Domain events emitted after a lending change has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LendingEvent {
    ItemBorrowed {
        borrow_id: Uuid,
        item_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        quantity: i32,
    },
    ItemReturned {
        return_id: Uuid,
        borrow_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        remaining_on_borrow: i32,
    },
    DamageReported {
        report_id: Uuid,
        item_id: Uuid,
    },
    DamageStatusChanged {
        report_id: Uuid,
        from: DamageStatus,
        to: DamageStatus,
    },
}

impl LendingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemBorrowed { .. } => "item_borrowed",
            Self::ItemReturned { .. } => "item_returned",
            Self::DamageReported { .. } => "damage_reported",
            Self::DamageStatusChanged { .. } => "damage_status_changed",
        }
    }
}

/// Envelope carrying the event and the moment it was emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: LendingEvent,
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

    /// Bounded channel pair sized from configuration.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    fn envelope(payload: LendingEvent) -> Event {
        Event {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Sends an event asynchronously, waiting for channel capacity
    pub async fn send(&self, payload: LendingEvent) -> Result<(), String> {
        self.sender
            .send(Self::envelope(payload))
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-log variant used after a commit. Never waits: a full or closed
    /// channel drops the notification, the committed change stands.
    pub fn send_or_log(&self, payload: LendingEvent) {
        let name = payload.name();
        if let Err(e) = self.sender.try_send(Self::envelope(payload)) {
            counter!("lending_events.dropped", 1, "event" => name);
            warn!(event = name, error = %e, "event dropped");
        }
    }
}

/// Consumes events until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("lending_events.processed", 1, "event" => event.payload.name());
        match &event.payload {
            LendingEvent::ItemBorrowed {
                borrow_id,
                item_id,
                project_id,
                user_id,
                quantity,
            } => info!(
                event_id = %event.id,
                %borrow_id, %item_id, %project_id, %user_id, quantity,
                "item borrowed"
            ),
            LendingEvent::ItemReturned {
                return_id,
                borrow_id,
                item_id,
                quantity,
                remaining_on_borrow,
            } => info!(
                event_id = %event.id,
                %return_id, %borrow_id, %item_id, quantity, remaining_on_borrow,
                "item returned"
            ),
            LendingEvent::DamageReported { report_id, item_id } => {
                info!(event_id = %event.id, %report_id, %item_id, "damage reported")
            }
            LendingEvent::DamageStatusChanged {
                report_id,
                from,
                to,
            } => info!(
                event_id = %event.id,
                %report_id, from = %from, to = %to,
                "damage report status changed"
            ),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_wraps_payload_in_envelope() {
        let (sender, mut rx) = EventSender::channel(4);
        let report_id = Uuid::new_v4();
        sender
            .send(LendingEvent::DamageReported {
                report_id,
                item_id: Uuid::nil(),
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.payload,
            LendingEvent::DamageReported {
                report_id,
                item_id: Uuid::nil()
            }
        );
    }

    #[tokio::test]
    async fn closed_channel_is_not_fatal() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        assert!(sender
            .send(LendingEvent::DamageReported {
                report_id: Uuid::nil(),
                item_id: Uuid::nil()
            })
            .await
            .is_err());
        sender
            .send_or_log(LendingEvent::DamageReported {
                report_id: Uuid::nil(),
                item_id: Uuid::nil(),
            });
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_waiting() {
        let (sender, mut rx) = EventSender::channel(1);
        for _ in 0..3 {
            sender
                .send_or_log(LendingEvent::DamageReported {
                    report_id: Uuid::new_v4(),
                    item_id: Uuid::nil(),
                });
        }
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(LendingEvent::DamageStatusChanged {
            report_id: Uuid::nil(),
            from: DamageStatus::Pending,
            to: DamageStatus::Approved,
        })
        .unwrap();
        assert_eq!(json["type"], "damage_status_changed");
        assert_eq!(json["to"], "Approved");
    }
}
