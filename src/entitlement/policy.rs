//! Feature access policy
//!
//! Pure mapping from tier to feature flags. No I/O, no other inputs.

use super::types::{Feature, Tier};

/// Whether `tier` grants unmetered access to `feature`.
///
/// Free-tier AI is handled separately by the daily usage meter; this
/// table answers only the subscription question.
pub fn has_access(tier: Tier, feature: Feature) -> bool {
    match feature {
        // Connect-only: access to a practitioner/coach
        Feature::Practitioner => tier == Tier::Connect,
        // Everything else is included in any paid tier
        Feature::Ai | Feature::Sms | Feature::Export | Feature::FileUpload => tier.is_paid(),
    }
}
