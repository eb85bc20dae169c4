use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Six-digit numeric email verification code, 2-hour lifetime.
pub fn verification_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    n.to_string()
}

pub fn verification_code_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(2)
}

/// Password reset token: 20 random bytes hex-encoded (160 bits of entropy),
/// 1-hour lifetime. Possession of the emailed token is the authorization.
pub fn reset_token() -> String {
    hex::encode(rand::random::<[u8; 20]>())
}

pub fn reset_token_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(1)
}

/// Reactivation token for auto-deactivated accounts. Lifetime is
/// configurable, so only the value is generated here.
pub fn reactivation_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_code_is_six_digits() {
        for _ in 0..100 {
            let code = verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.chars().next(), Some('0'), "no leading zero by construction");
        }
    }

    #[test]
    fn reset_token_is_forty_hex_chars() {
        let token = reset_token();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        assert_ne!(reset_token(), reset_token());
        assert_ne!(reactivation_token(), reactivation_token());
    }

    #[test]
    fn expiries_are_in_the_future() {
        let now = Utc::now();
        assert!(verification_code_expiry(now) > now);
        assert!(reset_token_expiry(now) > now);
    }
}
