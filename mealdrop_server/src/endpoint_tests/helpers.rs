use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
};
use chrono::{Duration, Utc};
use md_common::Secret;
use mealdrop_engine::{
    db_types::{Role, User, UserId},
    gateway::PaymentGateway,
    relay::LocationRelay,
    traits::LogDispatcher,
    OrderFlowApi,
    ShopApi,
};

use super::mocks::MockDb;
use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
    middleware::{AclMiddlewareFactory, JwtAuthFactory},
    routes,
};

pub const GATEWAY_SECRET: &str = "endpoint_test_secret";

// A fixed test secret. DO NOT re-use it anywhere.
pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: Secret::new("0123456789abcdef0123456789abcdef".into()),
        token_lifetime: Duration::hours(1),
    }
}

pub fn token_for(id: i64, role: Role) -> String {
    let user = User {
        id: UserId(id),
        name: format!("user-{id}"),
        email: format!("user-{id}@example.com"),
        role,
        created_at: Utc::now(),
    };
    TokenIssuer::new(&test_auth_config()).issue(&user).expect("Failed to sign token")
}

/// Fires a request at a test instance of the full route table, backed by the given mocks.
/// `orders_db` backs the `OrderFlowApi`, `shops_db` the `ShopApi`.
pub async fn send(
    orders_db: MockDb,
    shops_db: MockDb,
    req: TestRequest,
    token: Option<&str>,
) -> (StatusCode, String) {
    let cfg = test_auth_config();
    let gateway = PaymentGateway::from_credentials(Some("key_test".into()), Some(GATEWAY_SECRET.into()));
    let orders_api = OrderFlowApi::new(orders_db, gateway, Arc::new(LogDispatcher));
    let shops_api = ShopApi::new(shops_db);
    let app = App::new()
        .app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(shops_api))
        .app_data(web::Data::new(TokenIssuer::new(&cfg)))
        .app_data(web::Data::new(TokenVerifier::new(&cfg)))
        .app_data(web::Data::new(LocationRelay::new(8)))
        .service(routes::health)
        .service(web::resource("/auth").route(web::post().to(routes::auth::<MockDb>)))
        .service(
            web::scope("/api")
                .wrap(JwtAuthFactory)
                .service(
                    web::resource("/orders")
                        .route(web::post().to(routes::create_order::<MockDb>))
                        .route(web::get().to(routes::my_orders::<MockDb>))
                        .wrap(AclMiddlewareFactory::new(&[Role::Customer])),
                )
                .service(web::resource("/orders/{id}").route(web::get().to(routes::order_by_id::<MockDb>)))
                .service(web::resource("/orders/{id}/payment").route(web::post().to(routes::confirm_payment::<MockDb>)))
                .service(
                    web::resource("/orders/{id}/status")
                        .route(web::put().to(routes::update_status::<MockDb>))
                        .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
                )
                .service(
                    web::resource("/orders/{id}/deliver")
                        .route(web::post().to(routes::verify_delivery_otp::<MockDb>))
                        .wrap(AclMiddlewareFactory::new(&[Role::Courier])),
                )
                .service(
                    web::resource("/shop")
                        .route(web::post().to(routes::create_shop::<MockDb>))
                        .route(web::get().to(routes::my_shop::<MockDb>))
                        .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
                ),
        );

    let mut req = req;
    if let Some(token) = token {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        // Middleware rejections surface as bare errors; render them the way the server would.
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
    }
}
