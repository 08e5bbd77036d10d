use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use md_common::Money;

use crate::{
    api::{
        errors::OrderFlowError,
        order_objects::{CourierRef, OrderRequest, PlacedOrder},
    },
    db_types::{
        Identity,
        MenuItemId,
        NewOrder,
        Order,
        OrderId,
        OrderStatus,
        PaymentMethod,
        PaymentReference,
        RatingAggregate,
        Role,
        User,
    },
    gateway::PaymentGateway,
    helpers::{check_otp, generate_otp, DELIVERY_OTP_TTL},
    traits::{MarketplaceDatabase, NotificationDispatcher, ShopManagement, StorageError},
};

/// `OrderFlowApi` is the order lifecycle engine: it owns every legal state transition, the role
/// checks guarding each one, and the side effects a transition triggers (gateway calls, OTP
/// dispatch).
///
/// The state machine, with the acting role in brackets:
///
/// | From                              | Operation [actor]                  | To               |
/// |-----------------------------------|------------------------------------|------------------|
/// | (new)                             | create_order [customer], online    | pending          |
/// | (new)                             | create_order [customer], COD       | cod_pending      |
/// | pending                           | verify_payment [any authenticated] | paid             |
/// | paid                              | assign_courier [owner]             | confirmed        |
/// | paid..out_for_delivery            | update_status [owner]              | target status    |
/// | confirmed, preparing              | accept_order [assigned courier]    | out_for_delivery |
/// | confirmed..out_for_delivery       | send_delivery_otp [assigned]       | unchanged        |
/// | otp pending                       | verify_delivery_otp [assigned]     | delivered        |
/// | any non-terminal                  | update_status(cancelled) [owner]   | cancelled        |
///
/// `delivered` and `cancelled` are terminal; no operation accepts an order in either state.
/// Every mutation is a conditional update at the storage layer, so racing transitions cannot
/// both land (see [`MarketplaceDatabase`]).
pub struct OrderFlowApi<B> {
    db: B,
    gateway: PaymentGateway,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, gateway: PaymentGateway, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { db, gateway, dispatcher }
    }

    pub fn gateway(&self) -> &PaymentGateway {
        &self.gateway
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Creates a new order for the acting customer.
    ///
    /// The total is recomputed from the line-item snapshots and the client-supplied figure must
    /// match it exactly; the gateway intent is always sized from the recomputed total, never from
    /// client input. Online orders require a configured gateway; there is no silent fallback to
    /// cash-on-delivery.
    pub async fn create_order(&self, actor: Identity, req: OrderRequest) -> Result<PlacedOrder, OrderFlowError> {
        require_role(actor, Role::Customer)?;
        let computed = validate_and_total(&req)?;
        if computed != req.total {
            return Err(OrderFlowError::Validation(format!(
                "order total {} does not match the line items, which sum to {computed}",
                req.total
            )));
        }
        let order = NewOrder::new(actor.id, req.line_items, computed, req.payment_method, req.delivery_address);
        let (status, intent) = match req.payment_method {
            PaymentMethod::Online => {
                let intent = self.gateway.create_intent(computed, &order.currency, order.order_id.as_str())?;
                (OrderStatus::Pending, Some(intent))
            },
            PaymentMethod::CashOnDelivery => (OrderStatus::CodPending, None),
        };
        let stored = self.db.insert_order(order, status, intent.as_ref().map(|i| i.intent_id.as_str())).await?;
        debug!("📦️ Order {} created for {} with status {status} ({computed})", stored.order_id, actor.id);
        Ok(PlacedOrder { order: stored, intent })
    }

    /// Verifies a completed online payment against the gateway signature and moves the order from
    /// `pending` to `paid`.
    ///
    /// The caller must be authenticated but is deliberately not required to own the order: the
    /// confirmation is webhook-shaped, and the HMAC signature rather than the caller identity is the
    /// proof. A rejected signature leaves the order untouched.
    pub async fn verify_payment(
        &self,
        order_id: &OrderId,
        intent_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_required(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(OrderFlowError::Conflict(format!(
                "order {order_id} is {} and cannot accept a payment confirmation",
                order.status
            )));
        }
        match order.intent_id.as_deref() {
            Some(stored) if stored == intent_id => {},
            _ => {
                return Err(OrderFlowError::Validation(format!(
                    "intent id does not belong to order {order_id}"
                )))
            },
        }
        self.gateway.verify_signature(intent_id, payment_id, signature)?;
        let reference = PaymentReference {
            intent_id: intent_id.to_string(),
            payment_id: payment_id.to_string(),
            signature: signature.to_string(),
        };
        let order = self.db.mark_paid(order_id, &reference).await?;
        info!("💳️📦️ Order {order_id} is paid (payment {payment_id})");
        Ok(order)
    }

    /// Owner-driven status change. The target must be one of `confirmed`, `preparing`,
    /// `out_for_delivery` or `cancelled`, the order must be non-terminal, and the acting owner
    /// must supply at least one line item of the order through their shop.
    pub async fn update_status(
        &self,
        actor: Identity,
        order_id: &OrderId,
        new_status: OrderStatus,
        eta: Option<DateTime<Utc>>,
    ) -> Result<Order, OrderFlowError> {
        require_role(actor, Role::Owner)?;
        if !new_status.is_owner_assignable() {
            return Err(OrderFlowError::Validation(format!("{new_status} is not a status an owner can set")));
        }
        let order = self.fetch_required(order_id).await?;
        if order.status.is_terminal() {
            return Err(OrderFlowError::Conflict(format!("order {order_id} is {} and cannot change", order.status)));
        }
        self.check_owner_membership(actor, order_id).await?;
        let updated = self.db.update_status(order_id, order.status, new_status, eta).await?;
        info!("📦️ Order {order_id}: {} -> {new_status} by {}", order.status, actor.id);
        Ok(updated)
    }

    /// Assigns a courier to the order. The target must hold the courier role; assigning over an
    /// existing courier is allowed. If the order is still `paid`, assignment auto-advances it to
    /// `confirmed` as a convenience.
    pub async fn assign_courier(
        &self,
        actor: Identity,
        order_id: &OrderId,
        courier: CourierRef,
    ) -> Result<Order, OrderFlowError> {
        require_role(actor, Role::Owner)?;
        let order = self.fetch_required(order_id).await?;
        if order.status.is_terminal() {
            return Err(OrderFlowError::Conflict(format!("order {order_id} is {} and cannot change", order.status)));
        }
        self.check_owner_membership(actor, order_id).await?;
        let target = match &courier {
            CourierRef::Id(id) => self.db.fetch_user(*id).await?,
            CourierRef::Email(email) => self.db.fetch_user_by_email(email).await?,
        };
        let target = target.ok_or_else(|| OrderFlowError::Validation(format!("no such courier: {courier}")))?;
        if target.role != Role::Courier {
            return Err(OrderFlowError::Validation(format!("{} does not have the courier role", target.email)));
        }
        let updated = self.db.assign_courier(order_id, target.id).await?;
        info!("🛵️ Order {order_id} assigned to courier {} (status {})", target.id, updated.status);
        Ok(updated)
    }

    /// The assigned courier accepts the order and takes it out for delivery.
    pub async fn accept_order(&self, actor: Identity, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        require_role(actor, Role::Courier)?;
        let order = self.fetch_assigned(actor, order_id).await?;
        if order.status.is_terminal() {
            return Err(OrderFlowError::Conflict(format!("order {order_id} is {} and cannot change", order.status)));
        }
        if !matches!(order.status, OrderStatus::Confirmed | OrderStatus::Preparing) {
            return Err(OrderFlowError::Conflict(format!(
                "order {order_id} is {} and cannot be taken out for delivery",
                order.status
            )));
        }
        let updated = self.db.update_status(order_id, order.status, OrderStatus::OutForDelivery, None).await?;
        info!("🛵️ Order {order_id} is out for delivery with courier {}", actor.id);
        Ok(updated)
    }

    /// Issues a proof-of-delivery OTP and dispatches it to the customer out-of-band. The status is
    /// unchanged; reissuing replaces the previous code, so a resend after a failed handover is
    /// safe.
    pub async fn send_delivery_otp(&self, actor: Identity, order_id: &OrderId) -> Result<(), OrderFlowError> {
        require_role(actor, Role::Courier)?;
        let order = self.fetch_assigned(actor, order_id).await?;
        if !order.status.allows_otp_issue() {
            return Err(OrderFlowError::Conflict(format!(
                "order {order_id} is {} and a delivery OTP cannot be issued",
                order.status
            )));
        }
        let customer = self
            .db
            .fetch_user(order.customer_id)
            .await?
            .ok_or_else(|| OrderFlowError::Database(format!("customer record missing for order {order_id}")))?;
        let otp = generate_otp();
        let expiry = Utc::now() + DELIVERY_OTP_TTL;
        self.db.set_delivery_otp(order_id, &otp, expiry).await?;
        self.dispatch_with_retry(&customer, order_id, &otp, expiry).await?;
        info!("🔐️ Delivery OTP issued for order {order_id}, expires {expiry}");
        Ok(())
    }

    /// Verifies the proof-of-delivery OTP and completes the order.
    ///
    /// On a mismatch or expiry the stored OTP pair is left in place (the courier can retry or
    /// resend); on success the pair is cleared atomically with setting `delivered`. A concurrent
    /// second verification loses the conditional update and is reported as no-OTP-pending.
    pub async fn verify_delivery_otp(
        &self,
        actor: Identity,
        order_id: &OrderId,
        otp: &str,
    ) -> Result<Order, OrderFlowError> {
        require_role(actor, Role::Courier)?;
        let order = self.fetch_assigned(actor, order_id).await?;
        check_otp(order.delivery_otp.as_deref(), order.otp_expiry, otp, Utc::now())?;
        let delivered = match self.db.complete_delivery(order_id, otp, Utc::now()).await {
            Ok(order) => order,
            Err(StorageError::StaleTransition(_)) => {
                // Lost a double-verify race: the OTP was consumed between our read and write.
                debug!("🔐️ OTP for order {order_id} was consumed concurrently");
                return Err(crate::helpers::OtpError::NoOtpPending.into());
            },
            Err(e) => return Err(e.into()),
        };
        info!("🔐️📦️ Order {order_id} delivered by courier {}", actor.id);
        Ok(delivered)
    }

    /// The acting customer's own orders.
    pub async fn orders_for_customer(&self, actor: Identity) -> Result<Vec<Order>, OrderFlowError> {
        require_role(actor, Role::Customer)?;
        Ok(self.db.fetch_orders_for_customer(actor.id).await?)
    }

    /// The orders currently assigned to the acting courier.
    pub async fn orders_for_courier(&self, actor: Identity) -> Result<Vec<Order>, OrderFlowError> {
        require_role(actor, Role::Courier)?;
        Ok(self.db.fetch_orders_for_courier(actor.id).await?)
    }

    /// Whether `actor` is the courier assigned to the order. Used by the location relay endpoint;
    /// unassigned couriers see not-found, as for the other courier-scoped operations.
    pub async fn check_courier_assignment(&self, actor: Identity, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        require_role(actor, Role::Courier)?;
        self.fetch_assigned(actor, order_id).await
    }

    async fn fetch_required(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("order {order_id}")))
    }

    /// Courier-scoped fetch. A courier that is not assigned to the order gets not-found rather
    /// than forbidden, so unassigned couriers cannot probe for order existence.
    async fn fetch_assigned(&self, actor: Identity, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.fetch_required(order_id).await?;
        if order.assigned_courier_id != Some(actor.id) {
            debug!("🛵️ Courier {} is not assigned to order {order_id}; masking as not found", actor.id);
            return Err(OrderFlowError::NotFound(format!("order {order_id}")));
        }
        Ok(order)
    }

    async fn check_owner_membership(&self, actor: Identity, order_id: &OrderId) -> Result<(), OrderFlowError> {
        if self.db.owner_supplies_order(actor.id, order_id).await? {
            Ok(())
        } else {
            Err(OrderFlowError::Forbidden(format!("order {order_id} contains no items from your shop")))
        }
    }

    async fn dispatch_with_retry(
        &self,
        customer: &User,
        order_id: &OrderId,
        otp: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), OrderFlowError> {
        if let Err(first) = self.dispatcher.send_delivery_otp(&customer.email, order_id, otp, expiry).await {
            warn!("📧️ OTP dispatch for order {order_id} failed, retrying once. {first}");
            self.dispatcher
                .send_delivery_otp(&customer.email, order_id, otp, expiry)
                .await
                .map_err(|e| OrderFlowError::DispatchFailed(e.to_string()))?;
        }
        Ok(())
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase + ShopManagement
{
    /// The orders flowing through the acting owner's shop.
    pub async fn orders_for_shop_owner(&self, actor: Identity) -> Result<Vec<Order>, OrderFlowError> {
        require_role(actor, Role::Owner)?;
        let shop = self
            .db
            .fetch_shop_for_owner(actor.id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("shop for {}", actor.id)))?;
        Ok(self.db.fetch_orders_for_shop(shop.id).await?)
    }

    /// Records the acting customer's rating of a menu item.
    ///
    /// Only customers who have had the item delivered may rate it. A repeat rating by the same
    /// customer rebalances the average without growing the count.
    pub async fn rate_item(
        &self,
        actor: Identity,
        item: MenuItemId,
        rating: u8,
    ) -> Result<RatingAggregate, OrderFlowError> {
        require_role(actor, Role::Customer)?;
        if !(1..=5).contains(&rating) {
            return Err(OrderFlowError::Validation(format!("rating {rating} is out of range (1-5)")));
        }
        if self.db.fetch_menu_item(item).await?.is_none() {
            return Err(OrderFlowError::NotFound(format!("menu item {item}")));
        }
        if !self.db.has_delivered_order_with_item(actor.id, item).await? {
            return Err(OrderFlowError::Conflict(format!(
                "{item} has not been delivered to {} and cannot be rated",
                actor.id
            )));
        }
        let aggregate = self.db.upsert_rating(item, actor.id, rating).await?;
        debug!("⭐️ {} rated {item}: {rating}. New aggregate {:.2} over {}", actor.id, aggregate.average, aggregate.count);
        Ok(aggregate)
    }
}

fn require_role(actor: Identity, role: Role) -> Result<(), OrderFlowError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(OrderFlowError::Forbidden(format!("this operation requires the {role} role")))
    }
}

fn validate_and_total(req: &OrderRequest) -> Result<Money, OrderFlowError> {
    if req.line_items.is_empty() {
        return Err(OrderFlowError::Validation("an order needs at least one line item".into()));
    }
    let mut total = Money::default();
    for item in &req.line_items {
        if item.quantity == 0 {
            return Err(OrderFlowError::Validation(format!("quantity for {} must be at least 1", item.menu_item_id)));
        }
        if item.unit_price.is_negative() {
            return Err(OrderFlowError::Validation(format!("unit price for {} is negative", item.menu_item_id)));
        }
        let line = item
            .unit_price
            .checked_times(item.quantity)
            .map_err(|e| OrderFlowError::Validation(e.to_string()))?;
        total = total.checked_add(line).map_err(|e| OrderFlowError::Validation(e.to_string()))?;
    }
    Ok(total)
}
