//! The questionnaire bot: a scripted interviewer participant.

use std::collections::BTreeMap;
use std::time::Duration;

use careline_api::{ApiClient, VisitTypeRef};
use careline_relay::{
    ChatEvent, ChatInterface, ChatRelay, ChatStatus, EventPayload, MemberProfile, MessageMetadata,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::QuestionnaireResult;
use crate::script::{parse_question_script, Question};

/// Metadata kind carried by an inbound answer message
pub const METADATA_ANSWER: &str = "QuestionnaireAnswer";
/// Metadata kind carried by an outbound question message
pub const METADATA_POSSIBLE_ANSWERS: &str = "QuestionnairePossibleAnswers";
/// Metadata kind carried by the end-of-questionnaire message
pub const METADATA_END: &str = "QuestionnaireEnd";

/// Bot configuration
#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Nickname the bot joins the chat with
    pub nick_name: String,
    /// Avatar the bot joins the chat with
    pub avatar: String,
    /// Delay between the typing signal and the actual message send
    pub typing_delay: Duration,
    /// Visit type whose questionnaire template is loaded
    pub visit_type_id: i64,
    /// Greeting sent when the interview opens
    pub welcome_message: String,
    /// Message sent once the question list is exhausted
    pub end_message: String,
    /// Message sent when an unrecognized reply is received
    pub repeat_message: String,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            nick_name: "Careline Assistant".to_string(),
            avatar: String::new(),
            typing_delay: Duration::ZERO,
            visit_type_id: 1,
            welcome_message: "Hi! I have a few questions before your visit.".to_string(),
            end_message: "That was the last question, thank you!".to_string(),
            repeat_message: "Sorry, I didn't catch that. Could you answer again?".to_string(),
        }
    }
}

/// Bot lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotStatus {
    /// Script not loaded; all relay events are ignored
    NotReady,
    /// Script loaded; the bot interacts
    Ready,
}

/// An answer collected during the interview
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
    /// Id of the question the answer belongs to
    pub question_id: i64,
    /// Raw answer payload as received
    pub data: Value,
}

/// A scripted interviewer driving a question/answer flow over the relay.
///
/// Load the script with [`QuestionnaireBot::start`] before binding; while the
/// bot is [`BotStatus::NotReady`] every relay event is a no-op by design.
pub struct QuestionnaireBot {
    interface_id: Option<String>,
    member_id: Option<String>,
    status: BotStatus,
    options: BotOptions,
    client: ApiClient,
    questions: Vec<Question>,
    current_question: i32,
    answers: Vec<RecordedAnswer>,
    members: BTreeMap<String, MemberProfile>,
}

impl QuestionnaireBot {
    /// Create a bot that will load its script over the given client
    pub fn new(client: ApiClient, options: BotOptions) -> Self {
        Self {
            interface_id: None,
            member_id: None,
            status: BotStatus::NotReady,
            options,
            client,
            questions: Vec::new(),
            current_question: -1,
            answers: Vec::new(),
            members: BTreeMap::new(),
        }
    }

    /// Load the question script from the backend and become ready.
    ///
    /// Fails with a [`crate::QuestionnaireError`] naming the missing response
    /// level when the backend answer is structurally invalid.
    pub async fn start(&mut self) -> QuestionnaireResult<()> {
        let response = self
            .client
            .get_question_list(&[VisitTypeRef {
                visit_type_id: self.options.visit_type_id,
            }])
            .await?;
        self.questions = parse_question_script(response)?;
        self.status = BotStatus::Ready;
        info!(
            questions = self.questions.len(),
            "questionnaire script loaded"
        );
        Ok(())
    }

    /// Current bot state
    pub fn status(&self) -> BotStatus {
        self.status
    }

    /// Answers collected so far, in interview order
    pub fn answers(&self) -> &[RecordedAnswer] {
        &self.answers
    }

    /// Number of questions in the loaded script
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    fn handle_chat_started(&mut self, members: Vec<MemberProfile>, relay: &ChatRelay) {
        for member in members {
            self.members.insert(member.id.clone(), member);
        }
        self.open_interview(relay);
    }

    fn handle_participant_joined(&mut self, member: MemberProfile, relay: &ChatRelay) {
        self.members.insert(member.id.clone(), member);
        // covers the bot seeing its first counterpart only after ChatStarted
        self.open_interview(relay);
    }

    /// Join the relay, greet, and ask the first question — exactly once
    fn open_interview(&mut self, relay: &ChatRelay) {
        if self.current_question >= 0 {
            return;
        }
        let Some(interface_id) = self.interface_id.clone() else {
            warn!("questionnaire bot received events before being bound");
            return;
        };

        if self.member_id.is_none() {
            match relay.add_participant(
                &interface_id,
                &self.options.nick_name,
                &self.options.avatar,
            ) {
                Ok(member_id) => self.member_id = Some(member_id),
                Err(error) => {
                    warn!(%error, "questionnaire bot could not join the chat");
                    return;
                }
            }
        }

        self.send_with_typing(relay, self.options.welcome_message.clone(), None);
        self.current_question = 0;
        self.ask_question(relay, 0);
    }

    fn handle_message(&mut self, metadata: Option<MessageMetadata>, relay: &ChatRelay) {
        match metadata {
            Some(metadata) if metadata.kind == METADATA_ANSWER && self.current_question >= 0 => {
                let question_id = self
                    .questions
                    .get(self.current_question as usize)
                    .map(|q| q.id)
                    .unwrap_or_default();
                debug!(question_id, "answer recorded");
                self.answers.push(RecordedAnswer {
                    question_id,
                    data: metadata.data,
                });
                self.current_question += 1;
                self.ask_question(relay, self.current_question);
            }
            _ => {
                self.send_with_typing(relay, self.options.repeat_message.clone(), None);
            }
        }
    }

    /// Ask the question at `index`, or send the end message when the script
    /// is exhausted
    fn ask_question(&mut self, relay: &ChatRelay, index: i32) {
        if index >= 0 && (index as usize) < self.questions.len() {
            let question = &self.questions[index as usize];
            let metadata = MessageMetadata::new(
                METADATA_POSSIBLE_ANSWERS,
                serde_json::json!({
                    "answerType": question.answer_type.as_str(),
                    "possibleAnswers": question.options,
                }),
            );
            self.send_with_typing(relay, question.text.clone(), Some(metadata));
        } else {
            let metadata = MessageMetadata::new(METADATA_END, Value::Null);
            self.send_with_typing(relay, self.options.end_message.clone(), Some(metadata));
        }
    }

    /// Send a message, preceded by a typing signal.
    ///
    /// With a configured typing delay the send becomes a fire-once timer that
    /// re-checks relay status at fire time; it is not awaited by the caller
    /// and has no explicit cancel path.
    fn send_with_typing(
        &self,
        relay: &ChatRelay,
        message: String,
        metadata: Option<MessageMetadata>,
    ) {
        let Some(interface_id) = self.interface_id.clone() else {
            return;
        };
        let sender_id = self.member_id.clone().unwrap_or_else(|| interface_id.clone());

        relay.start_typing(&sender_id, None);

        if self.options.typing_delay.is_zero() {
            if let Err(error) =
                relay.send_message(&interface_id, message, metadata, None, Some(sender_id))
            {
                warn!(%error, "questionnaire bot failed to send message");
            }
            return;
        }

        let delay = self.options.typing_delay;
        let relay = relay.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if relay.status() != ChatStatus::Active {
                debug!("chat no longer active, dropping delayed bot message");
                return;
            }
            if let Err(error) =
                relay.send_message(&interface_id, message, metadata, None, Some(sender_id))
            {
                warn!(%error, "questionnaire bot failed to send delayed message");
            }
        });
    }
}

impl ChatInterface for QuestionnaireBot {
    fn interface_id(&self) -> Option<String> {
        self.interface_id.clone()
    }

    fn assign_interface_id(&mut self, id: String) {
        self.interface_id = Some(id);
    }

    fn on_event(&mut self, event: ChatEvent, relay: &ChatRelay) {
        // not ready means not interacting, by contract
        if self.status != BotStatus::Ready {
            return;
        }

        match event.payload {
            EventPayload::ChatStarted { members } => self.handle_chat_started(members, relay),
            EventPayload::ChatParticipantJoined { member } => {
                self.handle_participant_joined(member, relay)
            }
            EventPayload::ChatParticipantLeft => {
                if let Some(member_id) = event.sender_id {
                    self.members.remove(&member_id);
                }
            }
            EventPayload::ChatMessage { metadata, .. } => self.handle_message(metadata, relay),
            EventPayload::ChatEnded
            | EventPayload::ChatTypingStarted
            | EventPayload::ChatTypingEnded => {}
        }
    }
}
