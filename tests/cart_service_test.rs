//! Integration tests for cart management.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::errors::ServiceError;

#[tokio::test]
async fn one_cart_per_customer() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    let first = app
        .state
        .services
        .carts
        .get_or_create_cart(customer_id)
        .await
        .unwrap();
    let second = app
        .state
        .services
        .carts
        .get_or_create_cart(customer_id)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let other = app
        .state
        .services
        .carts
        .get_or_create_cart(Uuid::new_v4())
        .await
        .unwrap();
    assert_ne!(first.id, other.id);
}

#[tokio::test]
async fn adding_an_item_twice_merges_the_line() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_item("Widget", dec!(19.99), 10).await;

    app.state
        .services
        .carts
        .add_item(customer_id, item.id, 2)
        .await
        .unwrap();
    let cart = app
        .state
        .services
        .carts
        .add_item(customer_id, item.id, 3)
        .await
        .unwrap();

    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 5);
    assert_eq!(cart.total_items, 5);
    assert_eq!(cart.total_price, dec!(99.95));
    assert!(!cart.is_empty);
}

#[tokio::test]
async fn adding_beyond_stock_is_rejected() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_item("Widget", dec!(10.00), 4).await;

    app.state
        .services
        .carts
        .add_item(customer_id, item.id, 3)
        .await
        .unwrap();

    // 3 already held, 2 more would exceed the 4 in stock.
    let err = app
        .state
        .services
        .carts
        .add_item(customer_id, item.id, 2)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let cart = app.state.services.carts.get_cart(customer_id).await.unwrap();
    assert_eq!(cart.lines[0].quantity, 3);
}

#[tokio::test]
async fn inactive_items_cannot_be_added() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_inactive_item("Retired", dec!(10.00), 10).await;

    let err = app
        .state
        .services
        .carts
        .add_item(customer_id, item.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
}

#[tokio::test]
async fn zero_quantity_update_removes_the_line() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_item("Widget", dec!(10.00), 10).await;

    app.state
        .services
        .carts
        .add_item(customer_id, item.id, 2)
        .await
        .unwrap();

    let cart = app
        .state
        .services
        .carts
        .update_item_quantity(customer_id, item.id, 4)
        .await
        .unwrap();
    assert_eq!(cart.lines[0].quantity, 4);

    let cart = app
        .state
        .services
        .carts
        .update_item_quantity(customer_id, item.id, 0)
        .await
        .unwrap();
    assert!(cart.is_empty);
    assert_eq!(cart.total_items, 0);
    assert_eq!(cart.total_price, dec!(0));
}

#[tokio::test]
async fn removing_a_missing_line_is_not_found() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_item("Widget", dec!(10.00), 10).await;

    app.state
        .services
        .carts
        .get_or_create_cart(customer_id)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .carts
        .remove_item(customer_id, item.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn clearing_keeps_the_cart_row() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let widget = app.seed_item("Widget", dec!(10.00), 10).await;
    let gadget = app.seed_item("Gadget", dec!(5.00), 10).await;

    app.state
        .services
        .carts
        .add_item(customer_id, widget.id, 1)
        .await
        .unwrap();
    app.state
        .services
        .carts
        .add_item(customer_id, gadget.id, 2)
        .await
        .unwrap();

    let before = app.state.services.carts.get_cart(customer_id).await.unwrap();
    assert_eq!(before.total_items, 3);

    let cleared = app
        .state
        .services
        .carts
        .clear_cart(customer_id)
        .await
        .unwrap();
    assert!(cleared.is_empty);
    assert_eq!(cleared.cart_id, before.cart_id);

    // Clearing leaves stock untouched.
    let stocked = app.state.services.inventory.get_item(widget.id).await.unwrap();
    assert_eq!(stocked.quantity, 10);
}

#[tokio::test]
async fn clearing_an_untouched_cart_succeeds() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();

    // First contact with the cart; nothing to delete, nothing to fail.
    let cleared = app
        .state
        .services
        .carts
        .clear_cart(customer_id)
        .await
        .unwrap();
    assert!(cleared.is_empty);
    assert_eq!(cleared.customer_id, customer_id);

    // Clearing twice is a no-op, not an error.
    let again = app
        .state
        .services
        .carts
        .clear_cart(customer_id)
        .await
        .unwrap();
    assert_eq!(again.cart_id, cleared.cart_id);
    assert!(again.is_empty);
}

#[tokio::test]
async fn oversized_quantities_cannot_overflow_a_line() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_item("Widget", dec!(10.00), 10).await;

    app.state
        .services
        .carts
        .add_item(customer_id, item.id, 1)
        .await
        .unwrap();

    // Merging i32::MAX into the existing line must fail cleanly.
    let err = app
        .state
        .services
        .carts
        .add_item(customer_id, item.id, i32::MAX)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let cart = app.state.services.carts.get_cart(customer_id).await.unwrap();
    assert_eq!(cart.lines[0].quantity, 1);
}

#[tokio::test]
async fn totals_reflect_current_catalog_prices() {
    let app = TestApp::new().await;
    let customer_id = Uuid::new_v4();
    let item = app.seed_item("Widget", dec!(10.00), 10).await;

    app.state
        .services
        .carts
        .add_item(customer_id, item.id, 2)
        .await
        .unwrap();

    app.state
        .services
        .inventory
        .update_item(
            item.id,
            storefront_api::services::inventory::UpdateItemInput {
                price: Some(dec!(12.50)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let cart = app.state.services.carts.get_cart(customer_id).await.unwrap();
    assert_eq!(cart.total_price, dec!(25.00));

    let count = app
        .state
        .services
        .carts
        .item_count(customer_id)
        .await
        .unwrap();
    assert_eq!(count, 2);
}
