//! Premium entitlement derived from the stored expiry instant
//!
//! There is no payment processing: typing the activation keyword into the
//! chat input grants (or renews) a seven day entitlement.

use chrono::{DateTime, Duration, Utc};

use super::entities::AppUser;

/// Reserved chat input that activates premium
pub const ACTIVATION_KEYWORD: &str = "premium";

pub const PREMIUM_PERIOD_DAYS: i64 = 7;

/// Entitlement as seen at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremiumStatus {
    Never,
    Active { until: DateTime<Utc> },
    Expired { at: DateTime<Utc> },
}

impl PremiumStatus {
    pub fn of(user: &AppUser, now: DateTime<Utc>) -> Self {
        match user.premium_expires_at {
            None => Self::Never,
            Some(expiry) if expiry > now => Self::Active { until: expiry },
            Some(expiry) => Self::Expired { at: expiry },
        }
    }
}

pub fn is_premium(user: &AppUser, now: DateTime<Utc>) -> bool {
    matches!(PremiumStatus::of(user, now), PremiumStatus::Active { .. })
}

/// Premium was purchased once and its expiry is now in the past
pub fn had_just_expired(user: &AppUser, now: DateTime<Utc>) -> bool {
    matches!(PremiumStatus::of(user, now), PremiumStatus::Expired { .. })
}

/// Trimmed, case-insensitive exact match of the activation keyword
pub fn is_activation_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(ACTIVATION_KEYWORD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Activated,
    Renewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumGrant {
    pub kind: ActivationKind,
    pub expires_at: DateTime<Utc>,
}

/// New expiry is always `now + 7 days`; a prior expiry is overwritten, not extended.
pub fn grant(user: &AppUser, now: DateTime<Utc>) -> PremiumGrant {
    let kind = if is_premium(user, now) {
        ActivationKind::Renewed
    } else {
        ActivationKind::Activated
    };

    PremiumGrant {
        kind,
        expires_at: now + Duration::days(PREMIUM_PERIOD_DAYS),
    }
}
