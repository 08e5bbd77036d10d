use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use mealdrop_engine::db_types::{Role, User, UserId};

use super::{helpers::send, mocks::MockDb};
use crate::data_objects::AuthRequest;

#[actix_web::test]
async fn health_needs_no_token() {
    let (status, _) = send(MockDb::new(), MockDb::new(), TestRequest::get().uri("/health"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn known_accounts_get_an_access_token() {
    let mut db = MockDb::new();
    db.expect_fetch_user_by_email().returning(|email| {
        Ok(Some(User {
            id: UserId(1),
            name: "Asha".into(),
            email: email.to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
        }))
    });
    let req = TestRequest::post().uri("/auth").set_json(AuthRequest { email: "asha@example.com".into() });
    let (status, body) = send(db, MockDb::new(), req, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("access_token"), "body: {body}");
}

#[actix_web::test]
async fn unknown_accounts_are_refused() {
    let mut db = MockDb::new();
    db.expect_fetch_user_by_email().returning(|_| Ok(None));
    let req = TestRequest::post().uri("/auth").set_json(AuthRequest { email: "nobody@example.com".into() });
    let (status, _) = send(db, MockDb::new(), req, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
