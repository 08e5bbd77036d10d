use actix_web::{http::StatusCode, test::TestRequest};
use chrono::{Duration, Utc};
use md_common::Money;
use mealdrop_engine::db_types::{
    DeliveryAddress,
    LineItem,
    MenuItemId,
    Order,
    OrderId,
    OrderStatus,
    PaymentMethod,
    Role,
    UserId,
};

use super::{
    helpers::{send, token_for},
    mocks::MockDb,
};
use crate::data_objects::{OtpSubmission, PaymentConfirmation, StatusUpdateRequest};

fn order_fixture(status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
        id: 1,
        order_id: OrderId("md-0000deadbeef".into()),
        customer_id: UserId(1),
        line_items: vec![LineItem { menu_item_id: MenuItemId(7), quantity: 3, unit_price: Money::from_minor(15_000) }],
        total: Money::from_minor(45_000),
        currency: "INR".into(),
        status,
        payment_method: PaymentMethod::Online,
        intent_id: Some("intent_md-0000deadbeef".into()),
        payment_id: None,
        payment_signature: None,
        delivery_address: DeliveryAddress {
            line1: "14 MG Road".into(),
            line2: None,
            city: "Bengaluru".into(),
            postcode: "560001".into(),
            latitude: None,
            longitude: None,
        },
        assigned_courier_id: None,
        delivery_otp: None,
        otp_expiry: None,
        estimated_delivery_time: None,
        paid_at: None,
        delivered_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let (status, _) = send(MockDb::new(), MockDb::new(), TestRequest::get().uri("/api/orders"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn garbage_token_is_unauthorized() {
    let (status, _) =
        send(MockDb::new(), MockDb::new(), TestRequest::get().uri("/api/orders"), Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wrong_role_is_forbidden() {
    let token = token_for(3, Role::Courier);
    let (status, _) = send(MockDb::new(), MockDb::new(), TestRequest::get().uri("/api/orders"), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn customers_list_their_own_orders() {
    let mut db = MockDb::new();
    db.expect_fetch_orders_for_customer().returning(|_| Ok(vec![order_fixture(OrderStatus::Pending)]));
    let token = token_for(1, Role::Customer);
    let (status, body) = send(db, MockDb::new(), TestRequest::get().uri("/api/orders"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("md-0000deadbeef"), "body: {body}");
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let mut db = MockDb::new();
    db.expect_fetch_order().returning(|_| Ok(None));
    let token = token_for(1, Role::Customer);
    let (status, _) =
        send(db, MockDb::new(), TestRequest::get().uri("/api/orders/md-0000deadbeef"), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn the_delivery_otp_never_appears_in_a_response() {
    let mut db = MockDb::new();
    db.expect_fetch_order().returning(|_| {
        let mut order = order_fixture(OrderStatus::OutForDelivery);
        order.delivery_otp = Some("482913".into());
        order.otp_expiry = Some(Utc::now() + Duration::minutes(10));
        Ok(Some(order))
    });
    let token = token_for(1, Role::Customer);
    let (status, body) =
        send(db, MockDb::new(), TestRequest::get().uri("/api/orders/md-0000deadbeef"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("482913"), "the OTP leaked into the response: {body}");
}

#[actix_web::test]
async fn replayed_payment_confirmation_is_a_conflict() {
    let mut db = MockDb::new();
    db.expect_fetch_order().returning(|_| Ok(Some(order_fixture(OrderStatus::Paid))));
    let token = token_for(1, Role::Customer);
    let req = TestRequest::post().uri("/api/orders/md-0000deadbeef/payment").set_json(PaymentConfirmation {
        intent_id: "intent_md-0000deadbeef".into(),
        payment_id: "pay_900".into(),
        signature: "deadbeef".into(),
    });
    let (status, _) = send(db, MockDb::new(), req, Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn tampered_signature_maps_to_conflict() {
    let mut db = MockDb::new();
    db.expect_fetch_order().returning(|_| Ok(Some(order_fixture(OrderStatus::Pending))));
    let token = token_for(1, Role::Customer);
    let req = TestRequest::post().uri("/api/orders/md-0000deadbeef/payment").set_json(PaymentConfirmation {
        intent_id: "intent_md-0000deadbeef".into(),
        payment_id: "pay_900".into(),
        signature: "00".repeat(32),
    });
    let (status, _) = send(db, MockDb::new(), req, Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn customers_cannot_drive_the_owner_status_machine() {
    let token = token_for(1, Role::Customer);
    let req = TestRequest::put()
        .uri("/api/orders/md-0000deadbeef/status")
        .set_json(StatusUpdateRequest { status: OrderStatus::Confirmed, estimated_delivery_time: None });
    let (status, _) = send(MockDb::new(), MockDb::new(), req, Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn expired_otp_maps_to_conflict() {
    let mut db = MockDb::new();
    db.expect_fetch_order().returning(|_| {
        let mut order = order_fixture(OrderStatus::OutForDelivery);
        order.assigned_courier_id = Some(UserId(3));
        order.delivery_otp = Some("482913".into());
        order.otp_expiry = Some(Utc::now() - Duration::minutes(1));
        Ok(Some(order))
    });
    let token = token_for(3, Role::Courier);
    let req = TestRequest::post()
        .uri("/api/orders/md-0000deadbeef/deliver")
        .set_json(OtpSubmission { otp: "482913".into() });
    let (status, body) = send(db, MockDb::new(), req, Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("expired"), "body: {body}");
}
