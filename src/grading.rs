use lazy_static::lazy_static;
use regex::Regex;

use crate::types::ConditionLabel;

lazy_static! {
    // Grading vendor followed by a numeric grade, e.g. "PSA 10", "cgc9.5"
    static ref GRADE_REGEX: Regex = Regex::new(r"(?i)(PSA|CGC|BGS)\s*(\d+(?:\.\d+)?)").unwrap();
}

/// Derives the condition label from a listing title. Total and deterministic:
/// the grade digits are kept verbatim, everything else (raw, loose, or no
/// grading wording at all) maps to "Ungraded".
pub fn condition_label(title: &str) -> ConditionLabel {
    match GRADE_REGEX.captures(title) {
        Some(caps) => ConditionLabel::graded(&caps[1], &caps[2]),
        None => ConditionLabel::ungraded(),
    }
}
