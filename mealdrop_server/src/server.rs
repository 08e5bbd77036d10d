use std::sync::Arc;
use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use mealdrop_engine::{
    db_types::Role,
    gateway::PaymentGateway,
    relay::LocationRelay,
    traits::LogDispatcher,
    OrderFlowApi,
    ShopApi,
    SqliteDatabase,
};

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::ServerConfig,
    errors::ServerError,
    middleware::{AclMiddlewareFactory, JwtAuthFactory},
    routes,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    // The relay is shared across workers; rooms must fan out regardless of which worker accepted
    // the subscriber.
    let relay = web::Data::new(LocationRelay::new(config.relay_buffer));
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let gateway = PaymentGateway::from_credentials(
            config.gateway_key_id.clone(),
            config.gateway_key_secret.as_ref().map(|s| s.reveal().clone()),
        );
        let orders_api = OrderFlowApi::new(db.clone(), gateway, Arc::new(LogDispatcher));
        let shops_api = ShopApi::new(db.clone());
        let issuer = TokenIssuer::new(&config.auth);
        let verifier = TokenVerifier::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mealdrop::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(shops_api))
            .app_data(web::Data::new(issuer))
            .app_data(web::Data::new(verifier))
            .app_data(relay.clone());
        let api_scope = web::scope("/api")
            .wrap(JwtAuthFactory)
            .service(
                web::resource("/orders")
                    .route(web::post().to(routes::create_order::<SqliteDatabase>))
                    .route(web::get().to(routes::my_orders::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Customer])),
            )
            .service(web::resource("/orders/{id}").route(web::get().to(routes::order_by_id::<SqliteDatabase>)))
            .service(
                web::resource("/orders/{id}/payment")
                    .route(web::post().to(routes::confirm_payment::<SqliteDatabase>)),
            )
            .service(
                web::resource("/orders/{id}/status")
                    .route(web::put().to(routes::update_status::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
            )
            .service(
                web::resource("/orders/{id}/courier")
                    .route(web::put().to(routes::assign_courier::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
            )
            .service(
                web::resource("/orders/{id}/accept")
                    .route(web::post().to(routes::accept_order::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Courier])),
            )
            .service(
                web::resource("/orders/{id}/otp")
                    .route(web::post().to(routes::send_delivery_otp::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Courier])),
            )
            .service(
                web::resource("/orders/{id}/deliver")
                    .route(web::post().to(routes::verify_delivery_otp::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Courier])),
            )
            .service(
                web::resource("/orders/{id}/location")
                    .route(web::post().to(routes::publish_location::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Courier])),
            )
            .service(
                web::resource("/orders/{id}/location/stream")
                    .route(web::get().to(routes::location_stream::<SqliteDatabase>)),
            )
            .service(
                web::resource("/shop")
                    .route(web::post().to(routes::create_shop::<SqliteDatabase>))
                    .route(web::get().to(routes::my_shop::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
            )
            .service(
                web::resource("/shop/menu")
                    .route(web::post().to(routes::add_menu_item::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
            )
            .service(
                web::resource("/shop/orders")
                    .route(web::get().to(routes::shop_orders::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Owner])),
            )
            .service(
                web::resource("/courier/orders")
                    .route(web::get().to(routes::courier_orders::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Courier])),
            )
            .service(
                web::resource("/items/{id}/rating")
                    .route(web::post().to(routes::rate_item::<SqliteDatabase>))
                    .wrap(AclMiddlewareFactory::new(&[Role::Customer])),
            );
        app.service(routes::health)
            .service(web::resource("/register").route(web::post().to(routes::register::<SqliteDatabase>)))
            .service(web::resource("/auth").route(web::post().to(routes::auth::<SqliteDatabase>)))
            .service(web::resource("/menu/{shop_id}").route(web::get().to(routes::menu::<SqliteDatabase>)))
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
