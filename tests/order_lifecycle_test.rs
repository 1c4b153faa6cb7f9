//! Integration tests for order status transitions.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::{
    entities::order::OrderStatus,
    errors::ServiceError,
    services::checkout::{CheckoutInput, DirectOrderInput, DirectOrderLine},
};

async fn place_order(app: &TestApp, customer_id: Uuid) -> storefront_api::services::orders::OrderWithItems {
    let item = app.seed_item("Widget", dec!(10.00), 10).await;
    app.state
        .services
        .checkout
        .create_direct_order(
            customer_id,
            DirectOrderInput {
                items: vec![DirectOrderLine {
                    item_id: item.id,
                    quantity: 1,
                }],
                delivery: CheckoutInput {
                    shipping_address: "1 Test Street".to_string(),
                    phone_number: "+15550100".to_string(),
                    delivery_instructions: None,
                },
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn orders_walk_the_forward_path() {
    let app = TestApp::new().await;
    let placed = place_order(&app, Uuid::new_v4()).await;
    assert_eq!(placed.order.status, "pending");

    for (next, expected) in [
        (OrderStatus::Processing, "processing"),
        (OrderStatus::Shipped, "shipped"),
        (OrderStatus::Delivered, "delivered"),
    ] {
        let updated = app
            .state
            .services
            .orders
            .update_status(placed.order.id, next)
            .await
            .unwrap();
        assert_eq!(updated.status, expected);
    }

    // Delivered is terminal.
    let err = app
        .state
        .services
        .orders
        .update_status(placed.order.id, OrderStatus::Refunded)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn skipping_states_is_rejected() {
    let app = TestApp::new().await;
    let placed = place_order(&app, Uuid::new_v4()).await;

    let err = app
        .state
        .services
        .orders
        .update_status(placed.order.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let err = app
        .state
        .services
        .orders
        .update_status(placed.order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn cancellation_must_use_the_cancel_path() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let placed = place_order(&app, customer_id).await;

    // Flipping the status directly would skip the stock credit.
    let err = app
        .state
        .services
        .orders
        .update_status(placed.order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let cancelled = app
        .state
        .services
        .orders
        .cancel_order(placed.order.id, customer_id)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
}

#[tokio::test]
async fn orders_are_found_by_number() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let placed = place_order(&app, customer_id).await;

    let found = app
        .state
        .services
        .orders
        .get_by_order_number(&placed.order.order_number, customer_id)
        .await
        .unwrap();
    assert_eq!(found.order.id, placed.order.id);
    assert_eq!(found.items.len(), 1);

    // The wrong customer reads as not found, like any missing order.
    let err = app
        .state
        .services
        .orders
        .get_by_order_number(&placed.order.order_number, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = app
        .state
        .services
        .orders
        .get_by_order_number("ORD-DOESNOTX", customer_id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn strangers_cannot_cancel_an_order() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let placed = place_order(&app, owner).await;

    let err = app
        .state
        .services
        .orders
        .cancel_order(placed.order.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // The order is untouched and still cancellable by its owner.
    let unchanged = app
        .state
        .services
        .orders
        .get_order_for_customer(placed.order.id, owner)
        .await
        .unwrap();
    assert_eq!(unchanged.order.status, "pending");

    let cancelled = app
        .state
        .services
        .orders
        .cancel_order(placed.order.id, owner)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
}
