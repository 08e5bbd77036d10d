pub mod otp;

pub use otp::{check_otp, generate_otp, OtpError, DELIVERY_OTP_TTL, RECOVERY_OTP_TTL};
