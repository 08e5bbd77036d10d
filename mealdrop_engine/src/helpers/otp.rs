//! One-time codes used as proof-of-presence credentials.
//!
//! Two flows share this pattern: the delivery OTP (issued to the customer, read back by the
//! courier at the door, 10 minute expiry) and the account-recovery OTP (5 minute expiry, sent by
//! the external auth collaborator). Codes are always six digits drawn uniformly from
//! 100000-999999, so a leading-zero five-digit value can never be produced.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

pub const DELIVERY_OTP_TTL: Duration = Duration::minutes(10);
pub const RECOVERY_OTP_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("No OTP is pending for this order")]
    NoOtpPending,
    #[error("The OTP has expired")]
    Expired,
    #[error("The OTP does not match")]
    Mismatch,
}

pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100_000..=999_999u32).to_string()
}

/// Checks a supplied OTP against the stored value and expiry.
///
/// Expiry is checked before the value: an expired code is reported as expired even when it
/// matches, and the stored fields are left for the caller to keep until a resend or a later valid
/// verification replaces them.
pub fn check_otp(
    stored: Option<&str>,
    expiry: Option<DateTime<Utc>>,
    supplied: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpError> {
    let (stored, expiry) = match (stored, expiry) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(OtpError::NoOtpPending),
    };
    if now > expiry {
        return Err(OtpError::Expired);
    }
    if stored != supplied {
        return Err(OtpError::Mismatch);
    }
    Ok(())
}
