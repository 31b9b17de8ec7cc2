use rand::Rng;
use time::{Duration, OffsetDateTime};

pub const OTP_MIN: u32 = 100_000;
pub const OTP_MAX: u32 = 999_999;

/// Six-digit numeric code, uniform over `100000..=999999`.
pub fn generate() -> String {
    rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX).to_string()
}

/// A code together with the instant it stops being accepted. Code and expiry
/// are one value so neither can be stored without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

impl PendingOtp {
    pub fn issue(ttl: Duration, now: OffsetDateTime) -> Self {
        Self {
            code: generate(),
            expires_at: now + ttl,
        }
    }

    /// Exact code match and `now` strictly before expiry.
    pub fn accepts(&self, candidate: &str, now: OffsetDateTime) -> bool {
        self.code == candidate && now < self.expires_at
    }
}
