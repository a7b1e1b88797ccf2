/// One-time codes for email verification and password reset
///
/// A code is six decimal digits. Only its Argon2 hash is stored, next to an
/// expiry timestamp. Checking a code never consumes it; the caller clears the
/// slot with a conditional write keyed on the stored hash, so two requests
/// racing with the same code cannot both succeed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::password::{hash_password, verify_password, PasswordError};
use crate::models::{OtpPurpose, StoredOtp};

/// Lifetime of a verification code
pub const VERIFY_OTP_TTL_HOURS: i64 = 24;

/// Lifetime of a password reset code
pub const RESET_OTP_TTL_MINUTES: i64 = 15;

/// Errors from checking a submitted code
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("No OTP found. Please request a new one.")]
    NotFound,

    #[error("OTP has expired. Please request a new one.")]
    Expired,

    #[error("Invalid OTP.")]
    Invalid,

    #[error(transparent)]
    Hash(#[from] PasswordError),
}

/// Random code in `100000..=999999`
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn hash_otp(otp: &str) -> Result<String, PasswordError> {
    hash_password(otp)
}

/// Expiry for a code issued at `now`
pub fn expires_at(purpose: OtpPurpose, now: DateTime<Utc>) -> DateTime<Utc> {
    match purpose {
        OtpPurpose::Verify => now + Duration::hours(VERIFY_OTP_TTL_HOURS),
        OtpPurpose::Reset => now + Duration::minutes(RESET_OTP_TTL_MINUTES),
    }
}

/// Checks `candidate` against the stored slot
///
/// Expiry is checked before the hash, so an expired code is rejected even
/// when it is correct.
pub fn check_otp(
    candidate: &str,
    stored: Option<&StoredOtp>,
    now: DateTime<Utc>,
) -> Result<(), OtpError> {
    let stored = stored.ok_or(OtpError::NotFound)?;

    if stored.expires_at < now {
        return Err(OtpError::Expired);
    }

    if verify_password(candidate, &stored.hash)? {
        Ok(())
    } else {
        Err(OtpError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_shape() {
        for _ in 0..50 {
            let otp = generate_otp();
            let value: u32 = otp.parse().unwrap();

            assert_eq!(otp.len(), 6);
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_expiry_windows() {
        let now = Utc::now();

        assert_eq!(expires_at(OtpPurpose::Verify, now) - now, Duration::hours(24));
        assert_eq!(expires_at(OtpPurpose::Reset, now) - now, Duration::minutes(15));
    }

    #[test]
    fn test_check_otp() {
        let now = Utc::now();
        let stored = StoredOtp {
            hash: hash_otp("123456").unwrap(),
            expires_at: now + Duration::minutes(5),
        };

        assert!(check_otp("123456", Some(&stored), now).is_ok());
        assert!(matches!(
            check_otp("654321", Some(&stored), now),
            Err(OtpError::Invalid)
        ));
        assert!(matches!(check_otp("123456", None, now), Err(OtpError::NotFound)));
    }

    #[test]
    fn test_expired_code_rejected_even_if_correct() {
        let now = Utc::now();
        let stored = StoredOtp {
            hash: hash_otp("123456").unwrap(),
            expires_at: now - Duration::seconds(1),
        };

        assert!(matches!(
            check_otp("123456", Some(&stored), now),
            Err(OtpError::Expired)
        ));
    }
}
