//! 25-year post-mission deorbit compliance.
//!
//! Only inactive payloads and rocket bodies are held to the guideline. Debris
//! and unknown objects have no owner to comply, and active objects are still
//! within their mission.

use crate::lifetime::estimate_lifetime;
use orbitwatch_core::{CompliancePolicy, ComplianceSummary, Lifetime, ObjectType, TrackedObject};

/// Outcome for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    /// Stable orbit, excluded from the rate
    Indefinite,
    /// Not subject to the guideline or no lifetime could be determined
    NotApplicable,
}

/// True for objects the guideline applies to.
pub fn is_subject(object: &TrackedObject) -> bool {
    !object.active && matches!(object.object_type, ObjectType::Payload | ObjectType::RocketBody)
}

/// Catalog lifetime when present, otherwise estimated from perigee altitude.
fn resolve_lifetime(object: &TrackedObject, perigee_km: Option<f64>, policy: &CompliancePolicy) -> Option<Lifetime> {
    match object.lifetime {
        Some(Lifetime::Years(y)) if y.is_finite() => Some(Lifetime::years(y)),
        Some(Lifetime::Indefinite) => Some(Lifetime::Indefinite),
        _ => perigee_km.map(|p| estimate_lifetime(p, policy)),
    }
}

/// Classify one object against the policy.
pub fn status(object: &TrackedObject, perigee_km: Option<f64>, policy: &CompliancePolicy) -> ComplianceStatus {
    if !is_subject(object) {
        return ComplianceStatus::NotApplicable;
    }
    match resolve_lifetime(object, perigee_km, policy) {
        Some(Lifetime::Indefinite) => ComplianceStatus::Indefinite,
        Some(Lifetime::Years(y)) if y <= policy.max_lifetime_years => ComplianceStatus::Compliant,
        Some(Lifetime::Years(_)) => ComplianceStatus::NonCompliant,
        None => ComplianceStatus::NotApplicable,
    }
}

/// Summarise compliance over `(object, perigee altitude)` pairs.
pub fn evaluate_compliance<'a, I>(objects: I, policy: &CompliancePolicy) -> ComplianceSummary
where
    I: IntoIterator<Item = (&'a TrackedObject, Option<f64>)>,
{
    let mut summary = ComplianceSummary::default();
    for (object, perigee_km) in objects {
        match status(object, perigee_km, policy) {
            ComplianceStatus::Compliant => summary.compliant += 1,
            ComplianceStatus::NonCompliant => summary.non_compliant += 1,
            ComplianceStatus::Indefinite => summary.indefinite_excluded += 1,
            ComplianceStatus::NotApplicable => continue,
        }
        summary.evaluated += 1;
    }

    let denominator = summary.compliant + summary.non_compliant;
    summary.rate = (denominator > 0).then(|| summary.compliant as f64 / denominator as f64);
    summary
}
