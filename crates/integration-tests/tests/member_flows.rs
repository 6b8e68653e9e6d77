//! Integration tests for checkout, rentals and recommendations.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bookhub_client::storage::keys;
use bookhub_client::{
    AbortController, Cart, CheckoutError, CheckoutService, KeyValueStore, RecommendationError, RecommendationService,
    RentalService,
};
use bookhub_core::{BookId, CartItem, Price, RentalId};
use bookhub_integration_tests::{MockBookHub, TestClient};
use rust_decimal::Decimal;
use serde_json::json;

fn stocked_cart(client: &TestClient) -> Cart {
    let mut cart = Cart::new();
    cart.add(CartItem::new(BookId::new("A"), "Kindred", Price::from_units(100), 2).unwrap());
    cart.add(CartItem::new(BookId::new("B"), "Piranesi", Price::from_units(50), 1).unwrap());
    cart.save(client.store.as_ref()).unwrap();
    cart
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_partial_success_clears_cart() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_member_session(&client);
    server.set_batch_response(json!({
        "success": true,
        "rentalsCreated": 1,
        "unavailableBooks": ["B"]
    }));
    let mut cart = stocked_cart(&client);

    let receipt = CheckoutService::new(client.api.clone())
        .checkout(&mut cart)
        .await
        .unwrap();

    assert!(receipt.is_partial());
    assert_eq!(
        receipt.messages(),
        vec![
            "1 book(s) rented".to_string(),
            "1 book(s) were unavailable: B".to_string()
        ]
    );
    assert_eq!(receipt.purchase_total.amount(), Decimal::from(250));
    assert_eq!(receipt.rental_fee.amount(), Decimal::from(75));
    assert!(cart.is_empty());
    assert!(client.store.get(keys::CART).is_none());

    let body = server.batch_bodies().pop().unwrap();
    assert_eq!(body["rentalDuration"], 14);
    assert_eq!(
        body["items"],
        json!([{ "bookId": "A", "quantity": 2 }, { "bookId": "B", "quantity": 1 }])
    );
}

#[tokio::test]
async fn test_checkout_rejected_keeps_cart() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_member_session(&client);
    server.set_batch_response(json!({ "success": false, "message": "All books unavailable" }));
    let mut cart = stocked_cart(&client);
    let before = cart.clone();

    let err = CheckoutService::new(client.api.clone())
        .checkout(&mut cart)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Rejected(ref m) if m == "All books unavailable"));
    assert_eq!(cart, before);
    assert_eq!(Cart::load(client.store.as_ref()), before);
}

#[tokio::test]
async fn test_checkout_requires_member_session() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let mut cart = stocked_cart(&client);

    let err = CheckoutService::new(client.api.clone())
        .checkout(&mut cart)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::NotAllowed { redirect: "/login" }));
    assert!(server.batch_bodies().is_empty());
    assert!(!cart.is_empty());
}

#[tokio::test]
async fn test_checkout_refused_for_admin() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_admin_session(&client);
    let mut cart = stocked_cart(&client);

    let err = CheckoutService::new(client.api.clone())
        .checkout(&mut cart)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::NotAllowed { .. }));
    assert!(server.requests_to("/rentals/batch").is_empty());
}

// =============================================================================
// Rentals
// =============================================================================

#[tokio::test]
async fn test_rental_history() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_member_session(&client);

    let rentals = RentalService::new(client.api.clone()).history().await.unwrap();

    assert_eq!(rentals.len(), 2);
    assert_eq!(rentals.first().unwrap().id, RentalId::new("r1"));
    assert!(!rentals.first().unwrap().is_returned);
    assert!(rentals.last().unwrap().is_returned);
}

#[tokio::test]
async fn test_return_rental() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.seed_member_session(&client);

    let rental = RentalService::new(client.api.clone())
        .return_rental(&RentalId::new("r1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(rental.id, RentalId::new("r1"));
    assert!(rental.is_returned);
    let request = server.requests_to("/rentals/return/r1").pop().unwrap();
    assert_eq!(request.method, "POST");
}

// =============================================================================
// Recommendations
// =============================================================================

#[tokio::test]
async fn test_recommendations_are_cached() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let service = RecommendationService::new(client.api.clone());
    let controller = AbortController::new();

    let first = service.fetch(&controller.signal()).await.unwrap();
    let second = service.fetch(&controller.signal()).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(first.first().unwrap().title, "Kindred");
    assert_eq!(server.requests_to("/books/recommendations").len(), 1);
    assert!(client.store.get(keys::CACHED_RECOMMENDATIONS).is_some());
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let server = MockBookHub::start().await;
    let client = server.client();
    let service = RecommendationService::new(client.api.clone());
    let controller = AbortController::new();

    service.fetch(&controller.signal()).await.unwrap();
    service.invalidate();
    service.fetch(&controller.signal()).await.unwrap();

    assert_eq!(server.requests_to("/books/recommendations").len(), 2);
}

#[tokio::test]
async fn test_abort_in_flight_recommendations() {
    let server = MockBookHub::start().await;
    let client = server.client();
    server.delay_recommendations(Duration::from_secs(5));
    let service = RecommendationService::new(client.api.clone());
    let controller = AbortController::new();
    let signal = controller.signal();

    let fetch = tokio::spawn(async move { service.fetch(&signal).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.abort();

    let result = tokio::time::timeout(Duration::from_secs(2), fetch)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(RecommendationError::Aborted)));
    assert!(client.store.get(keys::CACHED_RECOMMENDATIONS).is_none());
}
