use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use mealdrop_engine::db_types::{Role, Shop, ShopId};

use super::{
    helpers::{send, token_for},
    mocks::MockDb,
};
use crate::data_objects::NewShopRequest;

#[actix_web::test]
async fn owners_can_open_a_shop() {
    let mut shops = MockDb::new();
    shops.expect_fetch_shop_for_owner().returning(|_| Ok(None));
    shops.expect_create_shop().returning(|owner, name| {
        Ok(Shop { id: ShopId(1), owner_id: owner, name: name.to_string(), created_at: Utc::now() })
    });
    let token = token_for(2, Role::Owner);
    let req = TestRequest::post().uri("/api/shop").set_json(NewShopRequest { name: "Meera's Kitchen".into() });
    let (status, body) = send(MockDb::new(), shops, req, Some(&token)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.contains("Meera's Kitchen"), "body: {body}");
}

#[actix_web::test]
async fn a_second_shop_is_a_conflict() {
    let mut shops = MockDb::new();
    shops.expect_fetch_shop_for_owner().returning(|owner| {
        Ok(Some(Shop { id: ShopId(1), owner_id: owner, name: "Meera's Kitchen".into(), created_at: Utc::now() }))
    });
    let token = token_for(2, Role::Owner);
    let req = TestRequest::post().uri("/api/shop").set_json(NewShopRequest { name: "Second Kitchen".into() });
    let (status, _) = send(MockDb::new(), shops, req, Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn owners_without_a_shop_get_not_found() {
    let mut shops = MockDb::new();
    shops.expect_fetch_shop_for_owner().returning(|_| Ok(None));
    let token = token_for(2, Role::Owner);
    let (status, _) = send(MockDb::new(), shops, TestRequest::get().uri("/api/shop"), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
