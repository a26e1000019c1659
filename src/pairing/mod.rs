/// Pairing lifecycle
///
/// A pair is created pending with a 6-digit invite code, becomes active when
/// a second user joins, and ends through the unbind protocol: either the
/// other member confirms, or the requester confirms again after a 7 day
/// cooling-off period.

mod manager;

pub use manager::{PairingManager, UNBIND_COOLING_OFF_DAYS};

use serde::{Deserialize, Serialize};

/// Create pair request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePairRequest {
    #[serde(rename = "type")]
    pub pair_type: String,
}

/// Join pair request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPairRequest {
    pub invite_code: String,
}

/// How a confirmed unbind was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbindResolution {
    /// The non-requesting member agreed
    MutualConsent,
    /// The requester confirmed after the cooling-off period
    CoolingOffElapsed,
}

impl UnbindResolution {
    pub fn message(&self) -> &'static str {
        match self {
            UnbindResolution::MutualConsent => "both members confirmed, the pair has ended",
            UnbindResolution::CoolingOffElapsed => "cooling-off period elapsed, the pair has ended",
        }
    }
}

/// Unbind request status as seen by one member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbindStatus {
    pub has_request: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by_me: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_elapsed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_force_unbind: Option<bool>,
}
