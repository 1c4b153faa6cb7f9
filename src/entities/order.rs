use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter as StrumEnumIter, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Order entity. Customer, addresses and line items are immutable after
/// creation; only `status` (and the recomputed totals) may change, and status
/// changes must follow [`OrderStatus::can_transition_to`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable identifier (e.g. `ORD-1A2B3C4D`), distinct from `id`.
    #[sea_orm(unique)]
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub shipping_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub phone_number: String,
    pub delivery_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order lifecycle states. Persisted as the snake_case string form.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Display,
    EnumString,
    AsRefStr,
    StrumEnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// Only orders that have not yet shipped can be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Forward path pending -> processing -> shipped -> delivered, with
    /// cancellation from the first two states and refund from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Pending, Self::Processing)
            | (Self::Processing, Self::Shipped)
            | (Self::Shipped, Self::Delivered) => true,
            (_, Self::Cancelled) => self.is_cancellable(),
            (_, Self::Refunded) => true,
            _ => false,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parses the persisted status string.
    pub fn status(&self) -> Result<OrderStatus, ServiceError> {
        self.status.parse().map_err(|_| {
            ServiceError::InternalError(format!("order {} has unknown status {}", self.id, self.status))
        })
    }
}

/// Generates a fresh human-readable order number.
pub fn generate_order_number() -> String {
    format!(
        "ORD-{}",
        Uuid::new_v4().simple().to_string()[..8].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn forward_path_transitions_are_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn cancellation_only_before_shipping() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for terminal in [
            OrderStatus::Cancelled,
            OrderStatus::Delivered,
            OrderStatus::Refunded,
        ] {
            for next in OrderStatus::iter() {
                assert!(!terminal.can_transition_to(next), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn refund_reachable_from_any_non_terminal_state() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn no_self_transitions() {
        for status in OrderStatus::iter() {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn status_string_round_trip() {
        assert_eq!(OrderStatus::Pending.as_ref(), "pending");
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("bogus".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_numbers_are_prefixed_and_unique() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert!(a.starts_with("ORD-"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}
