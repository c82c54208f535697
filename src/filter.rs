use serde::Serialize;

use crate::record::{BookRecord, RightsHint};

/// Why a record was accepted onto, or kept off, the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    YearCutoff,
    ExplicitStatement,
    ScrapedFallback,
    RejectedLanguage,
    RejectedRecent,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub accepted: bool,
    pub reason: Reason,
}

impl EligibilityDecision {
    fn accepted(reason: Reason) -> Self {
        Self {
            accepted: true,
            reason,
        }
    }

    fn rejected(reason: Reason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}

/// Decide whether a record qualifies for the checklist.
///
/// Rules apply in order, first match wins:
/// 1. not declared in English -> rejected
/// 2. explicit public-domain rights statement -> accepted
/// 3. explicit restricted rights statement -> rejected
/// 4. published on or before the cutoff year -> accepted
/// 5. an external lookup reported public domain -> accepted
/// 6. otherwise indeterminate -> rejected
///
/// The caller obtains `scrape_signal` elsewhere; this function does no
/// I/O and is safe to call with `None`, in which case rule 5 always
/// falls through.
pub fn decide(
    record: &BookRecord,
    cutoff_year: i32,
    scrape_signal: Option<bool>,
) -> EligibilityDecision {
    if !record.languages.iter().any(|lang| lang == "en") {
        return EligibilityDecision::rejected(Reason::RejectedLanguage);
    }

    match record.rights_hint {
        RightsHint::ExplicitPublicDomain => {
            return EligibilityDecision::accepted(Reason::ExplicitStatement);
        }
        RightsHint::ExplicitRestricted => {
            return EligibilityDecision::rejected(Reason::RejectedRecent);
        }
        RightsHint::Unknown => {}
    }

    if let Some(year) = record.year
        && year <= cutoff_year
    {
        return EligibilityDecision::accepted(Reason::YearCutoff);
    }

    if scrape_signal == Some(true) {
        return EligibilityDecision::accepted(Reason::ScrapedFallback);
    }

    EligibilityDecision::rejected(Reason::Indeterminate)
}
