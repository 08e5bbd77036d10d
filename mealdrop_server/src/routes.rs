//! Request handler definitions.
//!
//! Handlers are generic over the storage backend so the endpoint tests can run them against
//! mocks; the server binds them to `SqliteDatabase` at registration. Keep handlers thin: role
//! and state checks live in the engine, this module only translates HTTP to engine calls.

use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use mealdrop_engine::{
    db_types::{MenuItemId, Order, OrderId, Role, ShopId},
    relay::{LocationRelay, PositionUpdate},
    traits::{MarketplaceDatabase, ShopManagement, StorageError},
    OrderFlowApi,
    OrderFlowError,
    OrderRequest,
    ShopApi,
};
use tokio::sync::broadcast;

use crate::{
    auth::{JwtClaims, TokenIssuer},
    data_objects::{
        AuthRequest,
        AuthResponse,
        CourierAssignment,
        JsonResponse,
        LocationPing,
        NewMenuItemRequest,
        NewShopRequest,
        OtpSubmission,
        PaymentConfirmation,
        RatingRequest,
        RegisterRequest,
        StatusUpdateRequest,
    },
    errors::{AuthError, ServerError},
};

// ----------------------------------------------   Health  ---------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Accounts  --------------------------------------

/// Mirrors an identity-provider account into the marketplace. The role is fixed here, once.
pub async fn register<B: MarketplaceDatabase + 'static>(
    body: web::Json<RegisterRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(OrderFlowError::Validation("name and email are required".into()).into());
    }
    let user = api.db().create_user(req.name.trim(), req.email.trim(), req.role).await.map_err(|e| match e {
        StorageError::Database(m) if m.contains("UNIQUE") => {
            ServerError::OrderFlow(OrderFlowError::Conflict(format!("{} is already registered", req.email)))
        },
        other => ServerError::OrderFlow(other.into()),
    })?;
    Ok(HttpResponse::Ok().json(user))
}

/// Issues an access token for a known account. Credential checking is delegated to the identity
/// provider upstream; this server only maps the account onto its role claims.
pub async fn auth<B: MarketplaceDatabase + 'static>(
    body: web::Json<AuthRequest>,
    api: web::Data<OrderFlowApi<B>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received auth request");
    let user = api
        .db()
        .fetch_user_by_email(body.email.trim())
        .await
        .map_err(|e| ServerError::OrderFlow(e.into()))?
        .ok_or(AuthError::UnknownUser)?;
    let access_token = issuer.issue(&user)?;
    debug!("💻️ Issued access token for {} ({})", user.email, user.role);
    Ok(HttpResponse::Ok().json(AuthResponse { access_token }))
}

//----------------------------------------------   Orders  ----------------------------------------

pub async fn create_order<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    body: web::Json<OrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let placed = api.create_order(claims.identity(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(placed))
}

pub async fn my_orders<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.orders_for_customer(claims.identity()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn shop_orders<B: MarketplaceDatabase + ShopManagement + 'static>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.orders_for_shop_owner(claims.identity()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn courier_orders<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.orders_for_courier(claims.identity()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn order_by_id<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let order = fetch_order_for_participant(&claims, &order_id, api.as_ref()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Gateway payment confirmation. Authenticated but deliberately not ownership-scoped; the HMAC
/// signature is the proof.
pub async fn confirm_payment<B: MarketplaceDatabase + 'static>(
    _claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<PaymentConfirmation>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let confirmation = body.into_inner();
    let order = api
        .verify_payment(&order_id, &confirmation.intent_id, &confirmation.payment_id, &confirmation.signature)
        .await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn update_status<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let req = body.into_inner();
    let order = api.update_status(claims.identity(), &order_id, req.status, req.estimated_delivery_time).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn assign_courier<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<CourierAssignment>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let order = api.assign_courier(claims.identity(), &order_id, body.into_inner().courier).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn accept_order<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let order = api.accept_order(claims.identity(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn send_delivery_otp<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    api.send_delivery_otp(claims.identity(), &order_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Delivery OTP sent to the customer")))
}

pub async fn verify_delivery_otp<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<OtpSubmission>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let order = api.verify_delivery_otp(claims.identity(), &order_id, &body.otp).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Ratings  ---------------------------------------

pub async fn rate_item<B: MarketplaceDatabase + ShopManagement + 'static>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<RatingRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let item = MenuItemId(path.into_inner());
    let aggregate = api.rate_item(claims.identity(), item, body.rating).await?;
    Ok(HttpResponse::Ok().json(aggregate))
}

//----------------------------------------------   Shops  -----------------------------------------

pub async fn create_shop<B: ShopManagement + 'static>(
    claims: JwtClaims,
    body: web::Json<NewShopRequest>,
    api: web::Data<ShopApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let shop = api.create_shop(claims.identity(), &body.name).await?;
    Ok(HttpResponse::Created().json(shop))
}

pub async fn my_shop<B: ShopManagement + 'static>(
    claims: JwtClaims,
    api: web::Data<ShopApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let shop = api
        .my_shop(claims.identity())
        .await?
        .ok_or_else(|| OrderFlowError::NotFound(format!("shop for user {}", claims.sub)))?;
    Ok(HttpResponse::Ok().json(shop))
}

pub async fn add_menu_item<B: ShopManagement + 'static>(
    claims: JwtClaims,
    body: web::Json<NewMenuItemRequest>,
    api: web::Data<ShopApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let item = api.add_menu_item(claims.identity(), &req.name, req.price).await?;
    Ok(HttpResponse::Created().json(item))
}

/// Public menu browse; no authentication required.
pub async fn menu<B: ShopManagement + 'static>(
    path: web::Path<i64>,
    api: web::Data<ShopApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let items = api.menu(ShopId(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(items))
}

//----------------------------------------------   Location relay  --------------------------------

/// The assigned courier publishes a position fix into the order's relay room.
pub async fn publish_location<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<LocationPing>,
    api: web::Data<OrderFlowApi<B>>,
    relay: web::Data<LocationRelay>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    api.check_courier_assignment(claims.identity(), &order_id).await?;
    let ping = body.into_inner();
    let update = PositionUpdate { order_id, lat: ping.lat, lng: ping.lng, timestamp: Utc::now() };
    let subscribers = relay.publish(update);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "subscribers": subscribers })))
}

/// SSE stream of courier positions for one order. Best effort: a subscriber joining late misses
/// earlier positions and a slow one skips ahead.
pub async fn location_stream<B: MarketplaceDatabase + 'static>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    relay: web::Data<LocationRelay>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    // Only participants of the order may watch the courier.
    fetch_order_for_participant(&claims, &order_id, api.as_ref()).await?;
    let rx = relay.subscribe(&order_id);
    debug!("📡️ {} subscribed to the location stream for order {order_id}", claims.sub);
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(update) => match serde_json::to_string(&update) {
                    Ok(data) => {
                        let chunk = web::Bytes::from(format!("data: {data}\n\n"));
                        return Some((Ok::<_, actix_web::Error>(chunk), rx));
                    },
                    Err(e) => {
                        warn!("📡️ Could not serialize a position update. {e}");
                        continue;
                    },
                },
                // Skipped ahead; only the newest positions matter.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

//----------------------------------------------   helpers  ---------------------------------------

/// Fetches an order on behalf of any of its three participants, masking existence from everyone
/// else.
async fn fetch_order_for_participant<B: MarketplaceDatabase>(
    claims: &JwtClaims,
    order_id: &OrderId,
    api: &OrderFlowApi<B>,
) -> Result<Order, ServerError> {
    let not_found = || OrderFlowError::NotFound(format!("order {order_id}"));
    let order = api.db().fetch_order(order_id).await.map_err(OrderFlowError::from)?.ok_or_else(not_found)?;
    let identity = claims.identity();
    let is_participant = match identity.role {
        Role::Customer => order.customer_id == identity.id,
        Role::Courier => order.assigned_courier_id == Some(identity.id),
        Role::Owner => api.db().owner_supplies_order(identity.id, order_id).await.map_err(OrderFlowError::from)?,
    };
    if is_participant {
        Ok(order)
    } else {
        debug!("💻️ {} is not a participant of order {order_id}; masking as not found", identity.id);
        Err(not_found().into())
    }
}
