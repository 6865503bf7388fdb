//! Step transition for one inbound message.
//!
//! `advance` is pure apart from mutating the session it is given: no I/O,
//! no clock beyond what `Session` records. The engine decides what to do
//! with a `Transition::Finalize`.

use tracing::debug;

use super::classify::{Classifier, YesNo};
use super::flow::{self, FlowConfig, Slot, Stage};
use super::model::{Locale, Reply, Session, field};
use super::prompts::{self, Question};

/// Outcome of running the current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Send this reply and wait for the next message.
    Prompt(Reply),
    /// All answers are in; the record must be built and persisted.
    Finalize,
    /// Step has no transition. The session was not modified.
    Restart(Reply),
}

/// Render a question as a reply in the given locale.
pub fn render(question: &Question, locale: Locale) -> Reply {
    Reply::text(question.prompt.get(locale)).with_options(question.option_labels(locale))
}

/// Run the transition for `session.step` against a trimmed, non-empty
/// message.
pub fn advance(session: &mut Session, message: &str, config: &FlowConfig) -> Transition {
    match flow::stage(session.branch, session.step, config) {
        Stage::Greeting => {
            session.step = 2;
            Transition::Prompt(render(&prompts::CATEGORY, session.locale))
        }
        Stage::Answer(slot) => answer(session, slot, message, config),
        Stage::Finalize => Transition::Finalize,
        Stage::Unknown => {
            debug!(
                session_id = %session.session_id,
                step = session.step,
                branch = %session.branch,
                "No transition for step"
            );
            Transition::Restart(Reply::text(prompts::restart(session.locale)))
        }
    }
}

fn answer(session: &mut Session, slot: Slot, message: &str, config: &FlowConfig) -> Transition {
    let classifier = Classifier::shared();

    match slot {
        Slot::Category => {
            let locales = config.keyword_locales(session.locale);
            session.set_field(field::ISSUE_CATEGORY, message);
            session.branch = classifier.category(message, locales);
            debug!(session_id = %session.session_id, branch = %session.branch, "Branch selected");
        }
        Slot::MoreInfoChoice => match classifier.yes_no(message) {
            YesNo::No => {
                session.set_field(field::MORE_INFO_CHOICE, "No");
                session.set_field(field::MORE_INFO, "");
                session.step += 2;
                return next_prompt(session, config);
            }
            YesNo::Yes => session.set_field(field::MORE_INFO_CHOICE, "Yes"),
            YesNo::Unclear => {
                debug!(session_id = %session.session_id, "Unclear yes/no answer, asking again");
                return Transition::Prompt(render(slot.question(session), session.locale));
            }
        },
        Slot::MoreInfoText => session.set_field(field::MORE_INFO, message),
        Slot::Ask(_) | Slot::Tailored => {
            let question = slot.question(session);
            let value = if question.field == field::SUBCATEGORY {
                classifier.subcategory(message)
            } else {
                classifier.canonical_answer(question, message)
            };
            session.set_field(question.field, value);
        }
    }

    session.step += 1;
    next_prompt(session, config)
}

/// Prompt for whatever the (already advanced) step expects next.
fn next_prompt(session: &Session, config: &FlowConfig) -> Transition {
    match flow::stage(session.branch, session.step, config) {
        Stage::Answer(slot) => Transition::Prompt(render(slot.question(session), session.locale)),
        Stage::Finalize => Transition::Finalize,
        Stage::Greeting | Stage::Unknown => {
            Transition::Restart(Reply::text(prompts::restart(session.locale)))
        }
    }
}
