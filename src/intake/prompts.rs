//! Localized prompts and option lists.
//!
//! Every user-facing string lives here as an `{en, ar}` pair. Option values
//! are canonical tokens that get stored in session fields and compared by
//! the scorer; labels are only ever used for display and for matching a
//! patient's tapped option back to its value.

use super::model::{Locale, field};

/// A string in every supported locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Text {
    pub en: &'static str,
    pub ar: &'static str,
}

impl Text {
    pub const fn new(en: &'static str, ar: &'static str) -> Self {
        Self { en, ar }
    }

    pub fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Ar => self.ar,
        }
    }

    /// All localized variants, for matching input regardless of locale.
    pub fn variants(&self) -> [&'static str; 2] {
        [self.en, self.ar]
    }
}

/// One selectable option: canonical value plus localized label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub value: &'static str,
    pub label: Text,
}

const fn choice(value: &'static str, en: &'static str, ar: &'static str) -> Choice {
    Choice {
        value,
        label: Text::new(en, ar),
    }
}

/// A question the flow can ask, and the field its answer is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub field: &'static str,
    pub prompt: Text,
    pub choices: &'static [Choice],
}

impl Question {
    /// Localized option labels, in table order.
    pub fn option_labels(&self, locale: Locale) -> Vec<String> {
        self.choices
            .iter()
            .map(|c| c.label.get(locale).to_string())
            .collect()
    }
}

// ── Shared option sets ──────────────────────────────────────────────

const YES_NO: &[Choice] = &[choice("Yes", "Yes", "نعم"), choice("No", "No", "لا")];

const TIMEFRAME_CHOICES: &[Choice] = &[
    choice("ASAP", "ASAP", "في أقرب وقت"),
    choice("This week", "This week", "هذا الأسبوع"),
    choice("This month", "This month", "هذا الشهر"),
    choice("Just exploring", "Just exploring", "أستكشف الخيارات فقط"),
];

const NOT_SURE: Choice = choice("Not sure", "Not sure", "لست متأكداً");
const BOTH: Choice = choice("Both", "Both", "كلاهما");

// ── Category (step 2) ───────────────────────────────────────────────

/// Category options. Values are the branch tokens.
pub const CATEGORY_CHOICES: &[Choice] = &[
    choice("pain", "Tooth pain / sensitivity", "ألم أو حساسية في الأسنان"),
    choice("broken", "Broken / chipped tooth", "سن مكسور أو متشظٍ"),
    choice("swelling", "Swelling / infection", "تورم أو التهاب"),
    choice(
        "aesthetic",
        "Aesthetic (whitening, veneers, implants)",
        "تجميل (تبييض، قشور، زراعة)",
    ),
    choice("routine", "Routine check-up / cleaning", "فحص دوري أو تنظيف"),
];

pub const CATEGORY: Question = Question {
    field: field::ISSUE_CATEGORY,
    prompt: Text::new(
        "Hi! Welcome to our dental clinic. What brings you in today?",
        "مرحباً! أهلاً بك في عيادتنا لطب الأسنان. ما سبب زيارتك اليوم؟",
    ),
    choices: CATEGORY_CHOICES,
};

// ── Pain ────────────────────────────────────────────────────────────

pub const PAIN_SIDE: Question = Question {
    field: field::SIDE,
    prompt: Text::new("Which side is the pain on?", "في أي جهة تشعر بالألم؟"),
    choices: &[
        choice("Left", "Left", "اليسار"),
        choice("Right", "Right", "اليمين"),
        BOTH,
        NOT_SURE,
    ],
};

pub const PAIN_POSITION: Question = Question {
    field: field::TOOTH_POSITION,
    prompt: Text::new(
        "Is it an upper or a lower tooth?",
        "هل السن في الفك العلوي أم السفلي؟",
    ),
    choices: &[
        choice("Upper", "Upper", "علوي"),
        choice("Lower", "Lower", "سفلي"),
        BOTH,
        NOT_SURE,
    ],
};

pub const PAIN_SCALE: Question = Question {
    field: field::PAIN_SCALE,
    prompt: Text::new(
        "On a scale of 1 to 10, how bad is the pain?",
        "على مقياس من 1 إلى 10، ما مدى شدة الألم؟",
    ),
    choices: &[],
};

// ── Broken ──────────────────────────────────────────────────────────

pub const BROKEN_POSITION: Question = Question {
    field: field::TOOTH_POSITION,
    prompt: Text::new(
        "Is the broken tooth at the front or the back?",
        "هل السن المكسور في الأمام أم في الخلف؟",
    ),
    choices: &[
        choice("Front", "Front", "أمامي"),
        choice("Back", "Back", "خلفي"),
        NOT_SURE,
    ],
};

pub const CHIP_SIZE: Question = Question {
    field: field::CHIP_SIZE,
    prompt: Text::new("How big is the break?", "ما حجم الكسر؟"),
    choices: &[
        choice("Small", "Small", "صغير"),
        choice("Medium", "Medium", "متوسط"),
        choice("Large", "Large", "كبير"),
    ],
};

// ── Swelling ────────────────────────────────────────────────────────

pub const SWELLING_AREA: Question = Question {
    field: field::SWELLING_AREA,
    prompt: Text::new("Where is the swelling?", "أين يوجد التورم؟"),
    choices: &[
        choice("Gum", "Gum", "اللثة"),
        choice("Face / jaw", "Face / jaw", "الوجه أو الفك"),
        BOTH,
    ],
};

pub const FEVER: Question = Question {
    field: field::FEVER,
    prompt: Text::new("Do you have a fever?", "هل لديك حمى؟"),
    choices: YES_NO,
};

pub const SWELLING_DURATION: Question = Question {
    field: field::SWELLING_DURATION,
    prompt: Text::new(
        "How long have you had the swelling?",
        "منذ متى وأنت تعاني من التورم؟",
    ),
    choices: &[
        choice("Less than 24 hours", "Less than 24 hours", "أقل من 24 ساعة"),
        choice("1-3 days", "1-3 days", "من يوم إلى 3 أيام"),
        choice("More than 3 days", "More than 3 days", "أكثر من 3 أيام"),
    ],
};

// ── Aesthetic ───────────────────────────────────────────────────────

pub const SUBCATEGORY: Question = Question {
    field: field::SUBCATEGORY,
    prompt: Text::new(
        "Which treatment are you interested in?",
        "ما العلاج الذي تهتم به؟",
    ),
    choices: &[
        choice("Whitening", "Whitening", "تبييض"),
        choice("Veneers", "Veneers", "قشور"),
        choice("Implants", "Implants", "زراعة"),
        choice("Other", "Other", "أخرى"),
    ],
};

pub const WHITENING_HISTORY: Question = Question {
    field: field::WHITENING_HISTORY,
    prompt: Text::new(
        "Have you had your teeth whitened before?",
        "هل قمت بتبييض أسنانك من قبل؟",
    ),
    choices: YES_NO,
};

pub const VENEER_COUNT: Question = Question {
    field: field::VENEER_COUNT,
    prompt: Text::new(
        "How many teeth would you like veneers on?",
        "على كم سن تود تركيب القشور؟",
    ),
    choices: &[
        choice("1-2 teeth", "1-2 teeth", "سن أو سنان"),
        choice("3-6 teeth", "3-6 teeth", "من 3 إلى 6 أسنان"),
        choice("Full smile", "Full smile", "الابتسامة كاملة"),
    ],
};

pub const MISSING_TEETH: Question = Question {
    field: field::MISSING_TEETH,
    prompt: Text::new(
        "How many teeth are you looking to replace?",
        "كم عدد الأسنان التي تود تعويضها؟",
    ),
    choices: &[
        choice("One", "One", "سن واحد"),
        choice("Two or three", "Two or three", "سنان أو ثلاثة"),
        choice("Four or more", "Four or more", "أربعة أو أكثر"),
    ],
};

// ── Routine ─────────────────────────────────────────────────────────

pub const LAST_VISIT: Question = Question {
    field: field::LAST_VISIT,
    prompt: Text::new(
        "When was your last dental visit?",
        "متى كانت آخر زيارة لك لطبيب الأسنان؟",
    ),
    choices: &[
        choice("Less than 6 months", "Less than 6 months", "أقل من 6 أشهر"),
        choice("6-12 months", "6-12 months", "من 6 إلى 12 شهراً"),
        choice("Over a year", "Over a year", "أكثر من سنة"),
        choice("Never", "Never", "لم أزر طبيب أسنان من قبل"),
    ],
};

/// Asked whenever a branch/subcategory has no tailored question.
pub const TIMEFRAME: Question = Question {
    field: field::TIMEFRAME,
    prompt: Text::new("When would you like to start?", "متى تود أن تبدأ؟"),
    choices: TIMEFRAME_CHOICES,
};

// ── Identity ────────────────────────────────────────────────────────

pub const FIRST_NAME: Question = Question {
    field: field::FIRST_NAME,
    prompt: Text::new("What is your first name?", "ما اسمك الأول؟"),
    choices: &[],
};

pub const LAST_NAME: Question = Question {
    field: field::LAST_NAME,
    prompt: Text::new("And your last name?", "وما اسم العائلة؟"),
    choices: &[],
};

pub const PHONE: Question = Question {
    field: field::PHONE,
    prompt: Text::new(
        "What is the best mobile number to reach you on?",
        "ما رقم الجوال الذي يمكننا التواصل معك عليه؟",
    ),
    choices: &[],
};

pub const EMAIL: Question = Question {
    field: field::EMAIL,
    prompt: Text::new("What is your email address?", "ما بريدك الإلكتروني؟"),
    choices: &[],
};

pub const DATE_OF_BIRTH: Question = Question {
    field: field::DATE_OF_BIRTH,
    prompt: Text::new("What is your date of birth?", "ما تاريخ ميلادك؟"),
    choices: &[],
};

pub const LOCATION: Question = Question {
    field: field::LOCATION,
    prompt: Text::new("Which area do you live in?", "في أي منطقة تسكن؟"),
    choices: &[],
};

pub const INSURANCE: Question = Question {
    field: field::INSURANCE,
    prompt: Text::new(
        "Do you have dental insurance? If so, which provider?",
        "هل لديك تأمين أسنان؟ إذا كان كذلك، فما هي شركة التأمين؟",
    ),
    choices: &[],
};

// ── Elaboration ─────────────────────────────────────────────────────

pub const MORE_INFO_CHOICE: Question = Question {
    field: field::MORE_INFO_CHOICE,
    prompt: Text::new(
        "Would you like to add any more information?",
        "هل تود إضافة أي معلومات أخرى؟",
    ),
    choices: YES_NO,
};

pub const MORE_INFO: Question = Question {
    field: field::MORE_INFO,
    prompt: Text::new(
        "Please tell us anything else we should know.",
        "يرجى إخبارنا بأي شيء آخر يجب أن نعرفه.",
    ),
    choices: &[],
};

// ── Fixed replies ───────────────────────────────────────────────────

const THANK_YOU: Text = Text::new(
    "Thank you, {name}! Our team will contact you shortly to arrange your visit.",
    "شكراً لك يا {name}! سيتواصل معك فريقنا قريباً لترتيب موعدك.",
);

const RESTART: Text = Text::new(
    "This conversation can't continue. Please restart the chat to begin again.",
    "لا يمكن متابعة هذه المحادثة. يرجى إعادة بدء المحادثة من جديد.",
);

const PLEASE_REPEAT: Text = Text::new(
    "Sorry, I didn't catch that. Could you please repeat?",
    "عذراً، لم أفهم ذلك. هل يمكنك الإعادة من فضلك؟",
);

const SAVING: Text = Text::new(
    "One moment please, we're saving your details.",
    "لحظة من فضلك، نقوم بحفظ بياناتك.",
);

/// Closing message, addressed by first name.
pub fn thank_you(locale: Locale, first_name: &str) -> String {
    THANK_YOU.get(locale).replace("{name}", first_name)
}

pub fn restart(locale: Locale) -> &'static str {
    RESTART.get(locale)
}

pub fn please_repeat(locale: Locale) -> &'static str {
    PLEASE_REPEAT.get(locale)
}

/// Sent while the session's record is being written.
pub fn saving(locale: Locale) -> &'static str {
    SAVING.get(locale)
}
