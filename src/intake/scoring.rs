//! Lead scoring: triage priority for a completed intake.
//!
//! Additive and uncapped. Every rule is independent, and a missing field
//! simply fails its condition.

use std::collections::BTreeMap;

use super::model::{Branch, field};

const SWELLING: u32 = 30;
const SEVERE_PAIN: u32 = 20;
const MILD_PAIN: u32 = 5;
const FEVER: u32 = 20;
const LARGE_CHIP: u32 = 15;
const IMPLANTS: u32 = 15;
const VENEERS: u32 = 10;
const ASAP: u32 = 10;
const THIS_WEEK: u32 = 5;

/// Pain at or above this level counts as severe.
const SEVERE_PAIN_THRESHOLD: f64 = 7.0;

/// Score a set of answers. Pure and deterministic.
pub fn lead_score(branch: Branch, fields: &BTreeMap<String, String>) -> u32 {
    let get = |name: &str| fields.get(name).map(String::as_str);
    let mut score = 0;

    if branch == Branch::Swelling {
        score += SWELLING;
    }
    if branch == Branch::Pain {
        let severe = get(field::PAIN_SCALE)
            .and_then(parse_pain_scale)
            .is_some_and(|v| v >= SEVERE_PAIN_THRESHOLD);
        score += if severe { SEVERE_PAIN } else { MILD_PAIN };
    }
    if get(field::FEVER) == Some("Yes") {
        score += FEVER;
    }
    if get(field::CHIP_SIZE) == Some("Large") {
        score += LARGE_CHIP;
    }
    match get(field::SUBCATEGORY) {
        Some("Implants") => score += IMPLANTS,
        Some("Veneers") => score += VENEERS,
        _ => {}
    }
    match get(field::TIMEFRAME) {
        Some("ASAP") => score += ASAP,
        Some("This week") => score += THIS_WEEK,
        _ => {}
    }

    score
}

/// Leniently read a pain level: the first number in the text, with
/// Arabic-Indic digits accepted. `"9/10"` reads as 9, `"abc"` as `None`.
pub fn parse_pain_scale(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => {
                char::from_digit(c as u32 - 0x0660, 10).unwrap_or(c)
            }
            '\u{066B}' => '.',
            other => other,
        })
        .collect();

    let start = normalized.find(|c: char| c.is_ascii_digit())?;
    let number: String = normalized[start..]
        .chars()
        .scan(false, |seen_dot, c| {
            if c.is_ascii_digit() {
                Some(c)
            } else if c == '.' && !*seen_dot {
                *seen_dot = true;
                Some(c)
            } else {
                None
            }
        })
        .collect();
    number.trim_end_matches('.').parse().ok()
}
