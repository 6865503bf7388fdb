//! Canonical-token classification of patient answers.
//!
//! Answers are mapped to stable tokens before anything else looks at them:
//! a tapped option label (in any locale) maps straight to its value, and
//! free text falls through to ordered keyword rules. Locale decides which
//! keyword sets are consulted, never what gets stored.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::model::{Branch, Locale};
use super::prompts::{self, Choice, Question};

/// Keyword rule mapping free text to a branch.
#[derive(Debug, Clone)]
struct CategoryRule {
    branch: Branch,
    locale: Locale,
    regex: Regex,
}

/// Keyword rule mapping free text to an aesthetic subcategory value.
#[derive(Debug, Clone)]
struct SubcategoryRule {
    value: &'static str,
    regex: Regex,
}

/// Ordered keyword rules for every classification the router needs.
pub struct Classifier {
    /// In precedence order: pain, broken, swelling, aesthetic.
    category_rules: Vec<CategoryRule>,
    subcategory_rules: Vec<SubcategoryRule>,
    negative: Regex,
    affirmative: Regex,
}

/// Reading of an answer to a Yes/No question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
    /// Neither; the question should be asked again.
    Unclear,
}

static SHARED: LazyLock<Classifier> = LazyLock::new(Classifier::default_rules);

fn rule(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

impl Classifier {
    /// Process-wide instance with the default rules.
    pub fn shared() -> &'static Classifier {
        &SHARED
    }

    pub fn default_rules() -> Self {
        use Branch::*;
        use Locale::*;

        let category = |branch, locale, pattern: &str| CategoryRule {
            branch,
            locale,
            regex: rule(pattern),
        };

        let category_rules = vec![
            category(Pain, En, r"(?i)(pain|sensitiv|ache|aching|hurt|throb|sore)"),
            category(Pain, Ar, r"(ألم|وجع|يوجع|يؤلم|حساسي)"),
            category(Broken, En, r"(?i)(broke|break|chip|crack|fractur|snapp)"),
            category(Broken, Ar, r"(مكسور|كسر|انكسر|مشروخ|شرخ|متشظ)"),
            category(Swelling, En, r"(?i)(swell|swollen|infect|abscess|pus\b|puffy)"),
            category(Swelling, Ar, r"(تورم|متورم|انتفاخ|التهاب|عدوى|خراج)"),
            category(
                Aesthetic,
                En,
                r"(?i)(aesthetic|cosmetic|whiten|bleach|veneer|implant|smile)",
            ),
            category(Aesthetic, Ar, r"(تجميل|تبييض|قشور|فينير|زراعة|زرع|ابتسامة)"),
        ];

        let subcategory_rules = vec![
            SubcategoryRule {
                value: "Whitening",
                regex: rule(r"(?i)(whiten|bleach|تبييض)"),
            },
            SubcategoryRule {
                value: "Veneers",
                regex: rule(r"(?i)(veneer|lumineer|قشور|فينير)"),
            },
            SubcategoryRule {
                value: "Implants",
                regex: rule(r"(?i)(implant|زراعة|زرع)"),
            },
        ];

        Self {
            category_rules,
            subcategory_rules,
            negative: rule(r"(?i)^\s*(no|nope|nah|not really|nothing|لا|كلا|لأ)\b"),
            affirmative: rule(
                r"(?i)^\s*(yes|yeah|yep|sure|ok|okay|please|of course|نعم|أجل|اجل|ايوه|أيوه|طبعا|طبعاً)\b",
            ),
        }
    }

    /// Map a category answer to exactly one branch. Never returns `Unset`.
    ///
    /// Exact option labels of either locale win; otherwise keyword rules
    /// of the allowed locales are tried in precedence order, and anything
    /// unmatched is `Routine`.
    pub fn category(&self, message: &str, locales: &[Locale]) -> Branch {
        if let Some(value) = match_choice(prompts::CATEGORY_CHOICES, message) {
            if let Ok(branch) = value.parse::<Branch>() {
                return branch;
            }
        }

        for rule in &self.category_rules {
            if locales.contains(&rule.locale) && rule.regex.is_match(message) {
                debug!(branch = %rule.branch, locale = %rule.locale, "Category matched keyword rule");
                return rule.branch;
            }
        }
        Branch::Routine
    }

    /// Canonical aesthetic subcategory, or the raw text if nothing matches.
    pub fn subcategory(&self, message: &str) -> String {
        if let Some(value) = match_choice(prompts::SUBCATEGORY.choices, message) {
            return value.to_string();
        }
        self.subcategory_rules
            .iter()
            .find(|r| r.regex.is_match(message))
            .map(|r| r.value.to_string())
            .unwrap_or_else(|| message.to_string())
    }

    /// Read a Yes/No answer: option labels first, then the keyword rules.
    pub fn yes_no(&self, message: &str) -> YesNo {
        match match_choice(prompts::MORE_INFO_CHOICE.choices, message) {
            Some("No") => YesNo::No,
            Some(_) => YesNo::Yes,
            None if self.negative.is_match(message) => YesNo::No,
            None if self.affirmative.is_match(message) => YesNo::Yes,
            None => YesNo::Unclear,
        }
    }

    /// Value to store for an answer: the option value when the message is
    /// one of the question's labels, else the raw message.
    pub fn canonical_answer(&self, question: &Question, message: &str) -> String {
        match_choice(question.choices, message)
            .unwrap_or(message)
            .to_string()
    }
}

/// Find the choice whose value or localized label equals the message,
/// ignoring case and surrounding whitespace.
fn match_choice(choices: &'static [Choice], message: &str) -> Option<&'static str> {
    let needle = message.trim().to_lowercase();
    choices
        .iter()
        .find(|c| {
            c.value.to_lowercase() == needle
                || c.label.variants().iter().any(|l| l.to_lowercase() == needle)
        })
        .map(|c| c.value)
}
