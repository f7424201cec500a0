//! # Careline Bot Crate
//!
//! A scripted questionnaire bot: a chat participant that loads a question
//! script from the remote backend, interviews the other chat members over
//! the relay, and collects their answers.

mod bot;
mod error;
mod script;

pub use bot::{
    BotOptions, BotStatus, QuestionnaireBot, RecordedAnswer, METADATA_ANSWER, METADATA_END,
    METADATA_POSSIBLE_ANSWERS,
};
pub use error::{QuestionnaireError, QuestionnaireResult};
pub use script::{AnswerOption, AnswerType, Question};
