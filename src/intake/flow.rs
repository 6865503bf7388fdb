//! Intake flow table: which question belongs to which `(branch, step)`.
//!
//! The whole conversation is data: a plan is the category question, the
//! branch's follow-up slots, the identity slots, and the two elaboration
//! slots. Step `s >= 2` answers `plan[s - 2]`; step `plan.len() + 2` is the
//! terminal step that persists the record.

use super::model::{Branch, Locale, Session, field};
use super::prompts::{self, Question};

/// Flow switches that distinguish the single-locale, bilingual and
/// extended-identity variants of the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    /// Locale for sessions that don't request one (or when not bilingual).
    pub default_locale: Locale,
    /// Accept a per-session locale and match keywords of both languages.
    pub bilingual: bool,
    /// Ask email, date of birth, location and insurance after the phone.
    pub extended_identity: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            default_locale: Locale::En,
            bilingual: false,
            extended_identity: false,
        }
    }
}

impl FlowConfig {
    /// Locale a new session gets, given what the caller asked for.
    pub fn session_locale(&self, requested: Option<Locale>) -> Locale {
        match requested {
            Some(locale) if self.bilingual => locale,
            _ => self.default_locale,
        }
    }

    /// Keyword sets the classifier may use for a session.
    pub fn keyword_locales(&self, session_locale: Locale) -> &'static [Locale] {
        if self.bilingual {
            &[Locale::En, Locale::Ar]
        } else {
            match session_locale {
                Locale::En => &[Locale::En],
                Locale::Ar => &[Locale::Ar],
            }
        }
    }
}

/// One position in the question plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Category selection; its answer picks the branch.
    Category,
    Ask(&'static Question),
    /// Question chosen by `(branch, subcategory)`, falling back to the
    /// timeframe question.
    Tailored,
    /// "Add more information?". A No answer skips `MoreInfoText`.
    MoreInfoChoice,
    MoreInfoText,
}

impl Slot {
    /// Resolve the slot to the concrete question for this session.
    pub fn question(&self, session: &Session) -> &'static Question {
        match self {
            Self::Category => &prompts::CATEGORY,
            Self::Ask(q) => *q,
            Self::Tailored => tailored_question(session.branch, session.field(field::SUBCATEGORY)),
            Self::MoreInfoChoice => &prompts::MORE_INFO_CHOICE,
            Self::MoreInfoText => &prompts::MORE_INFO,
        }
    }
}

const PAIN_SLOTS: &[Slot] = &[
    Slot::Ask(&prompts::PAIN_SIDE),
    Slot::Ask(&prompts::PAIN_POSITION),
    Slot::Ask(&prompts::PAIN_SCALE),
];

const BROKEN_SLOTS: &[Slot] = &[
    Slot::Ask(&prompts::BROKEN_POSITION),
    Slot::Ask(&prompts::CHIP_SIZE),
    Slot::Ask(&prompts::TIMEFRAME),
];

const SWELLING_SLOTS: &[Slot] = &[
    Slot::Ask(&prompts::SWELLING_AREA),
    Slot::Ask(&prompts::FEVER),
    Slot::Ask(&prompts::SWELLING_DURATION),
];

const AESTHETIC_SLOTS: &[Slot] = &[Slot::Ask(&prompts::SUBCATEGORY), Slot::Tailored];

const ROUTINE_SLOTS: &[Slot] = &[Slot::Ask(&prompts::LAST_VISIT), Slot::Tailored];

const IDENTITY_SLOTS: &[Slot] = &[
    Slot::Ask(&prompts::FIRST_NAME),
    Slot::Ask(&prompts::LAST_NAME),
    Slot::Ask(&prompts::PHONE),
];

const EXTENDED_IDENTITY_SLOTS: &[Slot] = &[
    Slot::Ask(&prompts::EMAIL),
    Slot::Ask(&prompts::DATE_OF_BIRTH),
    Slot::Ask(&prompts::LOCATION),
    Slot::Ask(&prompts::INSURANCE),
];

const ELABORATION_SLOTS: &[Slot] = &[Slot::MoreInfoChoice, Slot::MoreInfoText];

/// Follow-up slots between category selection and identity collection.
pub fn branch_slots(branch: Branch) -> &'static [Slot] {
    match branch {
        Branch::Pain => PAIN_SLOTS,
        Branch::Broken => BROKEN_SLOTS,
        Branch::Swelling => SWELLING_SLOTS,
        Branch::Aesthetic => AESTHETIC_SLOTS,
        Branch::Routine => ROUTINE_SLOTS,
        Branch::Unset => &[],
    }
}

/// Tailored follow-up for a branch/subcategory pair.
pub fn tailored_question(branch: Branch, subcategory: Option<&str>) -> &'static Question {
    match (branch, subcategory) {
        (Branch::Aesthetic, Some("Whitening")) => &prompts::WHITENING_HISTORY,
        (Branch::Aesthetic, Some("Veneers")) => &prompts::VENEER_COUNT,
        (Branch::Aesthetic, Some("Implants")) => &prompts::MISSING_TEETH,
        _ => &prompts::TIMEFRAME,
    }
}

/// Full question plan for a branch.
pub fn plan(branch: Branch, config: &FlowConfig) -> Vec<Slot> {
    let mut slots = vec![Slot::Category];
    slots.extend_from_slice(branch_slots(branch));
    slots.extend_from_slice(IDENTITY_SLOTS);
    if config.extended_identity {
        slots.extend_from_slice(EXTENDED_IDENTITY_SLOTS);
    }
    slots.extend_from_slice(ELABORATION_SLOTS);
    slots
}

/// Step at which the record is persisted.
pub fn finalize_step(branch: Branch, config: &FlowConfig) -> u32 {
    plan(branch, config).len() as u32 + 2
}

/// What the router does on a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// First turn: greet and show the category options.
    Greeting,
    /// Store the answer to this slot's question.
    Answer(Slot),
    /// Build, score and persist the record.
    Finalize,
    /// No transition defined; terminal-absorbing.
    Unknown,
}

/// Resolve `(branch, step)` to a stage.
pub fn stage(branch: Branch, step: u32, config: &FlowConfig) -> Stage {
    if step == 1 {
        return Stage::Greeting;
    }
    if step == 2 {
        return if branch.is_set() {
            Stage::Unknown
        } else {
            Stage::Answer(Slot::Category)
        };
    }
    // Past step 2 the branch must be set, otherwise the session is corrupt.
    if step < 2 || !branch.is_set() {
        return Stage::Unknown;
    }

    let plan = plan(branch, config);
    let finalize = plan.len() as u32 + 2;
    if step < finalize {
        Stage::Answer(plan[(step - 2) as usize])
    } else if step == finalize {
        Stage::Finalize
    } else {
        Stage::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCHES: [Branch; 5] = [
        Branch::Pain,
        Branch::Broken,
        Branch::Swelling,
        Branch::Aesthetic,
        Branch::Routine,
    ];

    #[test]
    fn first_two_steps_are_shared() {
        let config = FlowConfig::default();
        assert_eq!(stage(Branch::Unset, 1, &config), Stage::Greeting);
        assert_eq!(stage(Branch::Unset, 2, &config), Stage::Answer(Slot::Category));
    }

    #[test]
    fn step_zero_and_corrupt_states_are_unknown() {
        let config = FlowConfig::default();
        assert_eq!(stage(Branch::Pain, 0, &config), Stage::Unknown);
        assert_eq!(stage(Branch::Unset, 0, &config), Stage::Unknown);
        // Category already answered but step rewound.
        assert_eq!(stage(Branch::Pain, 2, &config), Stage::Unknown);
        // Past category without a branch.
        assert_eq!(stage(Branch::Unset, 3, &config), Stage::Unknown);
    }

    #[test]
    fn pain_plan_walks_side_position_scale_then_identity() {
        let config = FlowConfig::default();
        let fields: Vec<&str> = (3..finalize_step(Branch::Pain, &config))
            .map(|step| match stage(Branch::Pain, step, &config) {
                Stage::Answer(Slot::Ask(q)) => q.field,
                Stage::Answer(Slot::MoreInfoChoice) => field::MORE_INFO_CHOICE,
                Stage::Answer(Slot::MoreInfoText) => field::MORE_INFO,
                other => panic!("unexpected stage {other:?} at step {step}"),
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                field::SIDE,
                field::TOOTH_POSITION,
                field::PAIN_SCALE,
                field::FIRST_NAME,
                field::LAST_NAME,
                field::PHONE,
                field::MORE_INFO_CHOICE,
                field::MORE_INFO,
            ]
        );
        assert_eq!(finalize_step(Branch::Pain, &config), 11);
        assert_eq!(stage(Branch::Pain, 11, &config), Stage::Finalize);
        assert_eq!(stage(Branch::Pain, 12, &config), Stage::Unknown);
    }

    #[test]
    fn identity_phase_follows_branch_slots_for_every_branch() {
        let config = FlowConfig::default();
        for branch in BRANCHES {
            let first_identity = 3 + branch_slots(branch).len() as u32;
            assert_eq!(
                stage(branch, first_identity, &config),
                Stage::Answer(Slot::Ask(&prompts::FIRST_NAME)),
                "branch {branch}"
            );
            assert_eq!(
                stage(branch, first_identity + 2, &config),
                Stage::Answer(Slot::Ask(&prompts::PHONE)),
                "branch {branch}"
            );
        }
    }

    #[test]
    fn extended_identity_adds_four_steps() {
        let basic = FlowConfig::default();
        let extended = FlowConfig {
            extended_identity: true,
            ..FlowConfig::default()
        };
        for branch in BRANCHES {
            assert_eq!(
                finalize_step(branch, &extended),
                finalize_step(branch, &basic) + 4
            );
        }
        let after_phone = 3 + branch_slots(Branch::Routine).len() as u32 + 3;
        assert_eq!(
            stage(Branch::Routine, after_phone, &extended),
            Stage::Answer(Slot::Ask(&prompts::EMAIL))
        );
    }

    #[test]
    fn tailored_falls_back_to_timeframe() {
        assert_eq!(
            tailored_question(Branch::Aesthetic, Some("Implants")).field,
            field::MISSING_TEETH
        );
        assert_eq!(
            tailored_question(Branch::Aesthetic, Some("Veneers")).field,
            field::VENEER_COUNT
        );
        assert_eq!(
            tailored_question(Branch::Aesthetic, Some("Whitening")).field,
            field::WHITENING_HISTORY
        );
        assert_eq!(
            tailored_question(Branch::Aesthetic, Some("Braces")).field,
            field::TIMEFRAME
        );
        assert_eq!(tailored_question(Branch::Routine, None).field, field::TIMEFRAME);
    }

    #[test]
    fn session_locale_respects_bilingual_switch() {
        let single = FlowConfig::default();
        assert_eq!(single.session_locale(Some(Locale::Ar)), Locale::En);

        let bilingual = FlowConfig {
            bilingual: true,
            ..FlowConfig::default()
        };
        assert_eq!(bilingual.session_locale(Some(Locale::Ar)), Locale::Ar);
        assert_eq!(bilingual.session_locale(None), Locale::En);
        assert_eq!(bilingual.keyword_locales(Locale::En).len(), 2);
        assert_eq!(single.keyword_locales(Locale::En), &[Locale::En]);
    }
}
