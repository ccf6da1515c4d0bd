use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a link expires. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryMode {
    /// Each viewer gets an independent window starting at their first access.
    Countdown,
    /// One absolute deadline shared by all viewers.
    Fixed,
    /// No time-based expiry; only revocation ends access.
    Manual,
}

impl ExpiryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryMode::Countdown => "countdown",
            ExpiryMode::Fixed => "fixed",
            ExpiryMode::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "countdown" => Some(ExpiryMode::Countdown),
            "fixed" => Some(ExpiryMode::Fixed),
            "manual" => Some(ExpiryMode::Manual),
            _ => None,
        }
    }
}

/// Link-level status. `Revoked` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Expired,
    Revoked,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Active => "active",
            LinkStatus::Expired => "expired",
            LinkStatus::Revoked => "revoked",
        }
    }
}

/// Why an otherwise-valid link is denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiredReason {
    /// The owner's subscription is inactive.
    OwnerInactive,
    /// A fixed-mode link passed its shared deadline.
    DeadlinePassed,
    /// This viewer's countdown window has run out.
    ViewerWindowClosed,
}

impl ExpiredReason {
    /// Default viewer-facing message, used when the owner set no custom one.
    pub fn default_message(&self) -> &'static str {
        match self {
            ExpiredReason::OwnerInactive => "The owner's subscription is inactive",
            ExpiredReason::DeadlinePassed => "This link has expired",
            ExpiredReason::ViewerWindowClosed => "Your viewing session has expired",
        }
    }
}

/// Outcome of evaluating a link for one viewer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Viewable. `deadline`/`remaining_seconds` are `None` in manual mode.
    Active {
        deadline: Option<DateTime<Utc>>,
        remaining_seconds: Option<i64>,
    },
    Expired {
        reason: ExpiredReason,
    },
    Revoked,
    /// Countdown mode with no session for this viewer: the viewer must go
    /// through the resolve step before content can be fetched.
    SessionRequired,
}
