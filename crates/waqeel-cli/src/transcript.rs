//! Standalone HTML snapshot of a conversation.
//!
//! Assistant answers are inserted as their rendered fragment without further
//! processing. Everything else (user text, notices, reference titles and
//! URLs) is escaped here.

use std::path::Path;

use anyhow::{Context, Result};

use crate::constants::APP_TITLE;
use crate::conversation::{Conversation, Message, Reference, Role};
use crate::render::{escape_html, is_script_url};

const STYLE: &str = "body{margin:0;background:#0f172a;color:#e2e8f0;font-family:sans-serif;}\
main{max-width:56rem;margin:0 auto;padding:2rem 1.5rem;}\
h1.title{color:#fbbf24;font-size:1.4rem;}\
.message{border-radius:1rem;padding:1rem 1.5rem;margin:1.25rem 0;max-width:80%;line-height:1.6;}\
.user{margin-left:auto;background:#f59e0b;color:#0f172a;white-space:pre-wrap;}\
.assistant{background:#1e293b;border:1px solid #334155;}\
.assistant code{background:#0f172a;color:#fbbf24;padding:0.1em 0.35em;border-radius:4px;}\
.assistant a,.references a{color:#fbbf24;}\
.references{margin-top:1rem;padding-top:0.75rem;border-top:1px solid #334155;font-size:0.9rem;}\
.references a{display:block;margin:0.25rem 0;}\
aside{margin-top:2rem;border:1px solid #334155;border-radius:1rem;padding:1rem 1.5rem;}";

pub fn render_transcript(conversation: &Conversation) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(APP_TITLE).as_str()));
    out.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n<main>\n"));
    out.push_str(&format!("<h1 class=\"title\">{}</h1>\n", escape_html(APP_TITLE).as_str()));

    for message in conversation.messages() {
        push_message(&mut out, message);
    }

    let all: Vec<&Reference> = conversation.references().collect();
    if !all.is_empty() {
        out.push_str("<aside>\n<h2>Legal References</h2>\n");
        for reference in all {
            push_reference(&mut out, reference);
        }
        out.push_str("</aside>\n");
    }

    out.push_str("</main>\n</body>\n</html>\n");
    out
}

pub fn write_transcript(conversation: &Conversation, path: &Path) -> Result<()> {
    std::fs::write(path, render_transcript(conversation))
        .with_context(|| format!("failed to write transcript to {}", path.display()))
}

fn push_message(out: &mut String, message: &Message) {
    match message.role() {
        Role::User => {
            out.push_str("<div class=\"message user\">");
            out.push_str(escape_html(message.content()).as_str());
            out.push_str("</div>\n");
        }
        Role::Assistant => {
            out.push_str("<div class=\"message assistant\">");
            match message.safe_html() {
                Some(html) => out.push_str(html.as_str()),
                None => {
                    out.push_str("<p>");
                    out.push_str(escape_html(message.content()).as_str());
                    out.push_str("</p>");
                }
            }
            if !message.references().is_empty() {
                out.push_str("<div class=\"references\"><p>References:</p>");
                for reference in message.references() {
                    push_reference(out, reference);
                }
                out.push_str("</div>");
            }
            out.push_str("</div>\n");
        }
    }
}

fn push_reference(out: &mut String, reference: &Reference) {
    let href = if is_script_url(&reference.url) {
        "#".to_string()
    } else {
        escape_html(&reference.url).as_str().to_string()
    };
    out.push_str(&format!(
        "<a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
        escape_html(&reference.title).as_str()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatResponse;
    use crate::session::ChatSession;

    fn sample() -> Conversation {
        let mut session = ChatSession::default();
        session.submit("Is <b>this</b> bold?").unwrap();
        session
            .settle(Ok(ChatResponse {
                chat_response: "## Answer\n* **No**, it is escaped".to_string(),
                references: vec![
                    Reference {
                        title: "Evidence Act & \"notes\"".to_string(),
                        url: "https://example.org/a?x=1&y=2".to_string(),
                    },
                    Reference {
                        title: "bad".to_string(),
                        url: "javascript:alert(1)".to_string(),
                    },
                ],
            }))
            .unwrap();
        session.conversation().clone()
    }

    #[test]
    fn inserts_fragment_and_escapes_everything_else() {
        let html = render_transcript(&sample());
        assert!(html.contains("<div class=\"message user\">Is &lt;b&gt;this&lt;/b&gt; bold?</div>"));
        assert!(html.contains("<h2>Answer</h2><ul><li><strong>No</strong>, it is escaped</li></ul>"));
        assert!(html.contains(
            "<a href=\"https://example.org/a?x=1&amp;y=2\" target=\"_blank\" rel=\"noopener noreferrer\">Evidence Act &amp; &quot;notes&quot;</a>"
        ));
        assert!(html.contains("<a href=\"#\" target=\"_blank\" rel=\"noopener noreferrer\">bad</a>"));
        assert!(!html.contains("javascript:"));
        assert!(html.contains("<h2>Legal References</h2>"));
    }

    #[test]
    fn empty_conversation_has_no_reference_panel() {
        let html = render_transcript(&Conversation::new());
        assert!(!html.contains("Legal References"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.html");
        write_transcript(&sample(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Legal References"));
    }
}
