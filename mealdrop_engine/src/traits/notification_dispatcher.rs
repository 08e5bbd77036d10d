use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::*;
use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, Error)]
#[error("Could not dispatch notification. {0}")]
pub struct DispatchError(pub String);

/// Out-of-band delivery of OTP codes. The transport (SMTP, provider API) lives behind this
/// boundary; the engine only cares that a dispatch either landed or failed.
///
/// Resending the same OTP must be safe: the engine retries a failed dispatch once, and a resend
/// simply repeats the current code.
pub trait NotificationDispatcher: Send + Sync + 'static {
    fn send_delivery_otp<'a>(
        &'a self,
        recipient: &'a str,
        order_id: &'a OrderId,
        otp: &'a str,
        expiry: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;
}

/// Logs the dispatch instead of sending it. Stands in wherever a real mail transport is not
/// configured; the OTP itself is only visible at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn send_delivery_otp<'a>(
        &'a self,
        recipient: &'a str,
        order_id: &'a OrderId,
        otp: &'a str,
        expiry: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            info!("📧️ Delivery OTP for order {order_id} dispatched to {recipient} (expires {expiry})");
            debug!("📧️ OTP for order {order_id}: {otp}");
            Ok(())
        })
    }
}
