use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::conversation::{OutboundPayload, Reference};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to question-answering service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("question-answering service responded with status {status}")]
    Status { status: u16, body: String },
    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    pub chat_response: String,
    pub references: Vec<Reference>,
}

impl ChatResponse {
    /// Lenient about shape: a missing or non-string `chat_response` is turned
    /// into text, unusable `references` entries are skipped.
    pub fn from_body(body: &str) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_str(body)?;
        debug!(
            keys = ?value.as_object().map(|o| o.keys().cloned().collect::<Vec<_>>()),
            "response shape"
        );
        let chat_response = coerce_to_text(value.get("chat_response"));
        let references = value
            .get("references")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<Reference>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            chat_response,
            references,
        })
    }
}

fn coerce_to_text(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // Arrays and objects keep their compact JSON text.
        Some(other) => other.to_string(),
    }
}

pub trait QaClient: Send + Sync {
    fn ask(&self, payload: &OutboundPayload) -> Result<ChatResponse, TransportError>;
}

pub struct HttpQaClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpQaClient {
    /// `timeout: None` waits for the service indefinitely.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl QaClient for HttpQaClient {
    fn ask(&self, payload: &OutboundPayload) -> Result<ChatResponse, TransportError> {
        info!(
            endpoint = %self.endpoint,
            history_len = payload.chat_history.len(),
            "sending question"
        );
        let response = self.http.post(&self.endpoint).json(payload).send()?;
        let status = response.status();
        info!(status = %status, "response received");

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            error!(status = %status, body = %body, "service returned an error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text()?;
        let parsed = ChatResponse::from_body(&body)?;
        debug!(
            preview = %parsed.chat_response.chars().take(100).collect::<String>(),
            references = parsed.references.len(),
            "chat response"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves one canned HTTP response on a local port and hands back the raw
    /// request it received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            let _ = tx.send(request);
        });
        (format!("http://{addr}/chat"), rx)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn client(endpoint: String) -> HttpQaClient {
        let http = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpQaClient { http, endpoint }
    }

    #[test]
    fn error_status_is_a_transport_failure() {
        let (endpoint, _rx) = serve_once("500 Internal Server Error", "oops");
        let err = client(endpoint)
            .ask(&OutboundPayload::build("What is bail?", &[], 10))
            .unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn success_status_posts_question_and_parses_answer() {
        let (endpoint, rx) = serve_once(
            "200 OK",
            r#"{"chat_response":"hi","references":[{"title":"IPC 420","url":"https://example.org/420"}]}"#,
        );
        let parsed = client(endpoint)
            .ask(&OutboundPayload::build("What is bail?", &[], 10))
            .unwrap();
        assert_eq!(
            parsed,
            ChatResponse {
                chat_response: "hi".to_string(),
                references: vec![Reference {
                    title: "IPC 420".to_string(),
                    url: "https://example.org/420".to_string(),
                }],
            }
        );

        let request = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(request.starts_with("POST /chat "), "request: {request}");
        assert!(request.contains(r#""question":"What is bail?""#), "request: {request}");
        assert!(request.contains(r#""chat_history":[]"#), "request: {request}");
    }

    #[test]
    fn non_json_success_body_is_a_decode_error() {
        let (endpoint, _rx) = serve_once("200 OK", "<html>ok</html>");
        let err = client(endpoint)
            .ask(&OutboundPayload::build("q", &[], 10))
            .unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)), "error: {err:?}");
    }

    #[test]
    fn parses_answer_and_references() {
        let body = r#"{
            "chat_response": "Section 498A deals with cruelty.",
            "references": [
                { "title": "IPC 498A", "url": "https://example.org/498a" },
                { "title": "missing url" },
                { "title": "CrPC 41", "url": "https://example.org/41" }
            ]
        }"#;
        let parsed = ChatResponse::from_body(body).unwrap();
        assert_eq!(parsed.chat_response, "Section 498A deals with cruelty.");
        let titles: Vec<&str> = parsed.references.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["IPC 498A", "CrPC 41"]);
    }

    #[test]
    fn coerces_non_string_answers() {
        let cases = [
            (r#"{}"#, "undefined"),
            (r#"{"chat_response": null}"#, "null"),
            (r#"{"chat_response": 42}"#, "42"),
            (r#"{"chat_response": true}"#, "true"),
            (r#"{"chat_response": ["a", 1]}"#, r#"["a",1]"#),
            (r#"{"chat_response": {"k": 1}}"#, r#"{"k":1}"#),
            (r#""just a string""#, "undefined"),
        ];
        for (body, expected) in cases {
            let parsed = ChatResponse::from_body(body).unwrap();
            assert_eq!(parsed.chat_response, expected, "body: {body}");
            assert!(parsed.references.is_empty());
        }
    }

    #[test]
    fn non_array_references_are_ignored() {
        let parsed = ChatResponse::from_body(r#"{"chat_response": "x", "references": "none"}"#).unwrap();
        assert!(parsed.references.is_empty());
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let err = ChatResponse::from_body("<html>502</html>").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }
}
