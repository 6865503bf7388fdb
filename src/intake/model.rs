//! Session, record, and reply data models.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display language of a session. Fixed when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "ar" | "arabic" => Ok(Self::Ar),
            other => Err(format!("unknown locale '{other}'")),
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue category chosen at step 2. Stored as a canonical token, never as
/// the localized display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    #[default]
    Unset,
    Pain,
    Broken,
    Swelling,
    Aesthetic,
    Routine,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Pain => "pain",
            Self::Broken => "broken",
            Self::Swelling => "swelling",
            Self::Aesthetic => "aesthetic",
            Self::Routine => "routine",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" => Ok(Self::Unset),
            "pain" => Ok(Self::Pain),
            "broken" => Ok(Self::Broken),
            "swelling" => Ok(Self::Swelling),
            "aesthetic" => Ok(Self::Aesthetic),
            "routine" => Ok(Self::Routine),
            other => Err(format!("unknown branch '{other}'")),
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field names written into `Session::fields`.
pub mod field {
    pub const ISSUE_CATEGORY: &str = "issueCategory";
    pub const SIDE: &str = "side";
    pub const TOOTH_POSITION: &str = "toothPosition";
    pub const PAIN_SCALE: &str = "painScale";
    pub const CHIP_SIZE: &str = "chipSize";
    pub const SWELLING_AREA: &str = "swellingArea";
    pub const FEVER: &str = "fever";
    pub const SWELLING_DURATION: &str = "swellingDuration";
    pub const SUBCATEGORY: &str = "subcategory";
    pub const WHITENING_HISTORY: &str = "whiteningHistory";
    pub const VENEER_COUNT: &str = "veneerCount";
    pub const MISSING_TEETH: &str = "missingTeeth";
    pub const LAST_VISIT: &str = "lastVisit";
    pub const TIMEFRAME: &str = "timeframe";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const PHONE: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const DATE_OF_BIRTH: &str = "dateOfBirth";
    pub const LOCATION: &str = "location";
    pub const INSURANCE: &str = "insurance";
    pub const MORE_INFO_CHOICE: &str = "moreInfoChoice";
    pub const MORE_INFO: &str = "moreInfo";

    /// Fields that are not branch-specific details.
    pub const NON_DETAIL: &[&str] = &[
        ISSUE_CATEGORY,
        FIRST_NAME,
        LAST_NAME,
        PHONE,
        EMAIL,
        DATE_OF_BIRTH,
        LOCATION,
        INSURANCE,
        MORE_INFO_CHOICE,
        MORE_INFO,
    ];
}

/// One active conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// Transition that runs on the next inbound message. Starts at 1.
    pub step: u32,
    pub branch: Branch,
    pub locale: Locale,
    pub fields: BTreeMap<String, String>,
    /// Id reserved for the record on the first save attempt, so a retry
    /// after a failed save writes the same record.
    #[serde(default)]
    pub record_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, locale: Locale) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            step: 1,
            branch: Branch::Unset,
            locale,
            fields: BTreeMap::new(),
            record_id: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Record an answer. Fields only grow; a later answer to the same
    /// question overwrites the value but never removes the key.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Structured reply for one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub done: bool,
}

impl Reply {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            options: None,
            done: false,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = if options.is_empty() { None } else { Some(options) };
        self
    }

    pub fn finished(mut self) -> Self {
        self.done = true;
        self
    }
}

/// Completed intake record. Built once at the terminal step and handed to
/// storage; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRecord {
    pub id: Uuid,
    pub session_id: String,
    pub locale: Locale,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<String>,
    pub issue_category: String,
    pub branch: Branch,
    /// Branch-specific answers keyed by field name.
    pub details: BTreeMap<String, String>,
    pub more_info: String,
    /// JSON snapshot of `details`.
    pub notes: String,
    pub lead_score: u32,
    pub created_at: DateTime<Utc>,
}

impl IntakeRecord {
    /// Build the record from a finished session.
    pub fn from_session(session: &Session, lead_score: u32) -> Self {
        let owned = |name: &str| session.field(name).unwrap_or_default().to_string();
        let optional = |name: &str| {
            session
                .field(name)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let details: BTreeMap<String, String> = session
            .fields
            .iter()
            .filter(|(k, _)| !field::NON_DETAIL.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let notes = serde_json::to_string(&details).unwrap_or_else(|_| "{}".to_string());

        Self {
            id: session.record_id.unwrap_or_else(Uuid::new_v4),
            session_id: session.session_id.clone(),
            locale: session.locale,
            first_name: owned(field::FIRST_NAME),
            last_name: owned(field::LAST_NAME),
            phone: owned(field::PHONE),
            email: optional(field::EMAIL),
            date_of_birth: optional(field::DATE_OF_BIRTH),
            location: optional(field::LOCATION),
            insurance: optional(field::INSURANCE),
            issue_category: owned(field::ISSUE_CATEGORY),
            branch: session.branch,
            details,
            more_info: owned(field::MORE_INFO),
            notes,
            lead_score,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_step_one() {
        let s = Session::new("abc", Locale::Ar);
        assert_eq!(s.step, 1);
        assert_eq!(s.branch, Branch::Unset);
        assert_eq!(s.locale, Locale::Ar);
        assert!(s.fields.is_empty());
    }

    #[test]
    fn branch_display_matches_serde() {
        for branch in [
            Branch::Unset,
            Branch::Pain,
            Branch::Broken,
            Branch::Swelling,
            Branch::Aesthetic,
            Branch::Routine,
        ] {
            let json = serde_json::to_string(&branch).unwrap();
            assert_eq!(format!("\"{branch}\""), json);
            assert_eq!(branch.as_str().parse::<Branch>().unwrap(), branch);
        }
    }

    #[test]
    fn locale_parses_loosely() {
        assert_eq!(" AR ".parse::<Locale>().unwrap(), Locale::Ar);
        assert_eq!("english".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn record_splits_identity_from_details() {
        let mut s = Session::new("s-1", Locale::En);
        s.branch = Branch::Pain;
        s.set_field(field::ISSUE_CATEGORY, "Tooth pain / sensitivity");
        s.set_field(field::SIDE, "Left");
        s.set_field(field::PAIN_SCALE, "9");
        s.set_field(field::FIRST_NAME, "Sam");
        s.set_field(field::LAST_NAME, "Lee");
        s.set_field(field::PHONE, "0500000000");
        s.set_field(field::MORE_INFO_CHOICE, "No");
        s.set_field(field::MORE_INFO, "");

        let record = IntakeRecord::from_session(&s, 25);
        assert_eq!(record.first_name, "Sam");
        assert_eq!(record.issue_category, "Tooth pain / sensitivity");
        assert_eq!(record.branch, Branch::Pain);
        assert_eq!(record.lead_score, 25);
        assert!(record.email.is_none());
        assert_eq!(record.details.len(), 2);
        assert_eq!(record.details["side"], "Left");
        assert!(!record.details.contains_key(field::FIRST_NAME));

        let notes: BTreeMap<String, String> = serde_json::from_str(&record.notes).unwrap();
        assert_eq!(notes, record.details);
    }

    #[test]
    fn reply_omits_empty_options() {
        let reply = Reply::text("hi").with_options(Vec::new());
        assert!(reply.options.is_none());
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("options").is_none());
        assert_eq!(json["done"], false);
    }
}
