use serde::{Deserialize, Serialize};

use crate::render::{RenderedResponse, SafeHtml};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// One turn in a conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
    rendered: Option<RenderedResponse>,
    references: Vec<Reference>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            rendered: None,
            references: Vec::new(),
        }
    }

    pub fn assistant(rendered: RenderedResponse, references: Vec<Reference>) -> Self {
        Self {
            role: Role::Assistant,
            content: rendered.plain_text.clone(),
            rendered: Some(rendered),
            references,
        }
    }

    /// Assistant-authored text shown as is, without HTML.
    pub fn assistant_notice(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            rendered: None,
            references: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn rendered(&self) -> Option<&RenderedResponse> {
        self.rendered.as_ref()
    }

    pub fn safe_html(&self) -> Option<&SafeHtml> {
        self.rendered.as_ref().map(|r| &r.safe_html)
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }
}

/// Append-only, in chronological order.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Every reference cited so far, oldest answer first.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.messages.iter().flat_map(|m| m.references.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundPayload {
    pub question: String,
    pub chat_history: Vec<HistoryEntry>,
}

impl OutboundPayload {
    /// `prior` must not contain the question being sent.
    pub fn build(question: impl Into<String>, prior: &[Message], max_history: usize) -> Self {
        Self {
            question: question.into(),
            chat_history: window_history(prior, max_history),
        }
    }
}

/// The trailing `min(len, max)` messages, oldest first, reduced to
/// role and content.
pub fn window_history(messages: &[Message], max: usize) -> Vec<HistoryEntry> {
    let start = messages.len().saturating_sub(max);
    messages[start..]
        .iter()
        .map(|m| HistoryEntry {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn exchange(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{i}"))
                } else {
                    Message::assistant(Renderer::default().render(&format!("**a{i}**")), Vec::new())
                }
            })
            .collect()
    }

    #[test]
    fn window_keeps_trailing_messages_in_order() {
        let messages = exchange(12);
        let window = window_history(&messages, 10);
        assert_eq!(window.len(), 10);
        let contents: Vec<&str> = window.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["q2", "**a3**", "q4", "**a5**", "q6", "**a7**", "q8", "**a9**", "q10", "**a11**"]
        );
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[1].role, Role::Assistant);
    }

    #[test]
    fn window_length_is_min_of_len_and_max() {
        for n in 0..15 {
            let messages = exchange(n);
            for max in [0, 1, 4, 10, 20] {
                let window = window_history(&messages, max);
                assert_eq!(window.len(), n.min(max));
                let tail: Vec<&str> = messages[n - n.min(max)..].iter().map(|m| m.content()).collect();
                let got: Vec<&str> = window.iter().map(|e| e.content.as_str()).collect();
                assert_eq!(got, tail);
            }
        }
    }

    #[test]
    fn payload_serializes_without_presentation_fields() {
        let mut prior = vec![Message::user("What is bail?")];
        prior.push(Message::assistant(
            Renderer::default().render("Bail is *temporary* release."),
            vec![Reference {
                title: "CrPC 436".to_string(),
                url: "https://example.org/436".to_string(),
            }],
        ));
        let payload = OutboundPayload::build("And anticipatory bail?", &prior, 10);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "question": "And anticipatory bail?",
                "chat_history": [
                    { "role": "user", "content": "What is bail?" },
                    { "role": "assistant", "content": "Bail is *temporary* release." }
                ]
            })
        );
    }

    #[test]
    fn conversation_collects_references_across_turns() {
        let reference = |t: &str| Reference {
            title: t.to_string(),
            url: format!("https://example.org/{t}"),
        };
        let mut conversation = Conversation::new();
        conversation.push(Message::user("q"));
        conversation.push(Message::assistant(Renderer::default().render("a"), vec![reference("one")]));
        conversation.push(Message::assistant_notice("notice"));
        conversation.push(Message::assistant(
            Renderer::default().render("b"),
            vec![reference("two"), reference("three")],
        ));
        let titles: Vec<&str> = conversation.references().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
        assert_eq!(conversation.len(), 4);
        assert!(conversation.messages()[2].safe_html().is_none());
    }
}
