use thiserror::Error;
use tracing::{debug, error, info};

use crate::backend::{ChatResponse, TransportError};
use crate::constants::{DEFAULT_MAX_HISTORY, ERROR_REPLY};
use crate::conversation::{Conversation, Message, OutboundPayload};
use crate::render::Renderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("nothing to send")]
    EmptyInput,
    #[error("still waiting for the previous answer")]
    Busy,
    #[error("no question is waiting for an answer")]
    NotAwaiting,
}

/// One chat with the service. At most one question is in flight; `submit`
/// moves Idle -> AwaitingResponse and `settle` moves back.
pub struct ChatSession {
    conversation: Conversation,
    state: SessionState,
    max_history: usize,
    renderer: Renderer,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(Renderer::default(), DEFAULT_MAX_HISTORY)
    }
}

impl ChatSession {
    pub fn new(renderer: Renderer, max_history: usize) -> Self {
        Self {
            conversation: Conversation::new(),
            state: SessionState::Idle,
            max_history,
            renderer,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == SessionState::AwaitingResponse
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Records the user's message and returns the request to send for it.
    pub fn submit(&mut self, input: &str) -> Result<OutboundPayload, SubmitError> {
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if self.is_awaiting() {
            return Err(SubmitError::Busy);
        }

        let payload = OutboundPayload::build(input, self.conversation.messages(), self.max_history);
        info!(
            question = %payload.question,
            history_len = payload.chat_history.len(),
            "question submitted"
        );
        if let (Some(first), Some(last)) = (payload.chat_history.first(), payload.chat_history.last()) {
            debug!(
                first = %serde_json::to_string(first).unwrap_or_default(),
                last = %serde_json::to_string(last).unwrap_or_default(),
                "history window"
            );
        }

        self.conversation.push(Message::user(input));
        self.state = SessionState::AwaitingResponse;
        Ok(payload)
    }

    /// Appends the answer (or the fixed apology on failure) and returns to idle.
    pub fn settle(
        &mut self,
        outcome: Result<ChatResponse, TransportError>,
    ) -> Result<&Message, SubmitError> {
        if !self.is_awaiting() {
            return Err(SubmitError::NotAwaiting);
        }
        let message = match outcome {
            Ok(response) => {
                let rendered = self.renderer.render(&response.chat_response);
                Message::assistant(rendered, response.references)
            }
            Err(err) => {
                error!(error = %err, "question failed");
                Message::assistant_notice(ERROR_REPLY)
            }
        };
        self.conversation.push(message);
        self.state = SessionState::Idle;
        self.conversation.last().ok_or(SubmitError::NotAwaiting)
    }

    /// Starts over with an empty conversation.
    pub fn reset(&mut self) -> Result<(), SubmitError> {
        if self.is_awaiting() {
            return Err(SubmitError::Busy);
        }
        self.conversation = Conversation::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Reference, Role};
    use pretty_assertions::assert_eq;

    fn answer(text: &str) -> Result<ChatResponse, TransportError> {
        Ok(ChatResponse {
            chat_response: text.to_string(),
            references: Vec::new(),
        })
    }

    #[test]
    fn submit_then_settle_round_trip() {
        let mut session = ChatSession::default();
        let payload = session.submit("What is a FIR?").unwrap();
        assert_eq!(payload.question, "What is a FIR?");
        assert!(payload.chat_history.is_empty());
        assert_eq!(session.state(), SessionState::AwaitingResponse);

        let reply = session
            .settle(Ok(ChatResponse {
                chat_response: "<|start_header_id|>assistant<|end_header_id|>\n\nA **First Information Report**."
                    .to_string(),
                references: vec![Reference {
                    title: "CrPC 154".to_string(),
                    url: "https://example.org/154".to_string(),
                }],
            }))
            .unwrap();
        assert_eq!(reply.role(), Role::Assistant);
        assert_eq!(reply.content(), "A **First Information Report**.");
        assert_eq!(
            reply.safe_html().map(|h| h.as_str()),
            Some("<p>A <strong>First Information Report</strong>.</p>")
        );
        assert_eq!(reply.references().len(), 1);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.conversation().len(), 2);
    }

    #[test]
    fn history_excludes_the_current_question() {
        let mut session = ChatSession::default();
        session.submit("first").unwrap();
        session.settle(answer("one")).unwrap();
        let payload = session.submit("second").unwrap();
        let contents: Vec<&str> = payload.chat_history.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "one"]);
    }

    #[test]
    fn twelve_prior_messages_window_to_last_ten() {
        let mut session = ChatSession::default();
        for i in 1..=6 {
            session.submit(&format!("question {i}")).unwrap();
            session.settle(answer(&format!("answer {i}"))).unwrap();
        }
        assert_eq!(session.conversation().len(), 12);
        let payload = session.submit("question 7").unwrap();
        assert_eq!(payload.chat_history.len(), 10);
        assert_eq!(payload.chat_history[0].content, "question 2");
        assert_eq!(payload.chat_history[9].content, "answer 6");
        assert!(payload.chat_history.iter().all(|e| e.content != "question 1" && e.content != "answer 1"));
    }

    #[test]
    fn rejects_blank_input_and_concurrent_submits() {
        let mut session = ChatSession::default();
        assert_eq!(session.submit("   ").unwrap_err(), SubmitError::EmptyInput);
        assert!(session.conversation().is_empty());

        session.submit("pending").unwrap();
        assert_eq!(session.submit("another").unwrap_err(), SubmitError::Busy);
        assert_eq!(session.reset().unwrap_err(), SubmitError::Busy);
        assert_eq!(session.conversation().len(), 1);
    }

    #[test]
    fn settle_without_pending_question_is_rejected() {
        let mut session = ChatSession::default();
        assert_eq!(session.settle(answer("stray")).unwrap_err(), SubmitError::NotAwaiting);
        assert!(session.conversation().is_empty());
    }

    #[test]
    fn transport_failure_becomes_fixed_notice() {
        let mut session = ChatSession::default();
        session.submit("will fail").unwrap();
        let reply = session
            .settle(Err(TransportError::Status {
                status: 500,
                body: "Traceback: secret detail".to_string(),
            }))
            .unwrap();
        assert_eq!(reply.content(), ERROR_REPLY);
        assert!(reply.safe_html().is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.conversation().messages()[0].content(), "will fail");
        assert!(session.submit("retry by hand").is_ok());
    }

    #[test]
    fn user_input_is_kept_verbatim() {
        let mut session = ChatSession::default();
        session.submit("  **not markdown** <b> ").unwrap();
        let sent = &session.conversation().messages()[0];
        assert_eq!(sent.content(), "  **not markdown** <b> ");
        assert!(sent.rendered().is_none());
    }

    #[test]
    fn reset_clears_conversation_when_idle() {
        let mut session = ChatSession::default();
        session.submit("q").unwrap();
        session.settle(answer("a")).unwrap();
        session.reset().unwrap();
        assert!(session.conversation().is_empty());
    }
}
