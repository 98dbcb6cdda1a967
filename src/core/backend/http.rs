use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::{Backend, BackendError, Outcome};
use crate::core::logstream::LogEmitter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Log(String),
    Result(Outcome),
    Error(String),
}

/// Parse one SSE line. Returns `None` for blank lines, comments and unknown event types.
pub fn parse_event(line: &str) -> Option<StreamEvent> {
    let data = line.trim().strip_prefix("data:")?.trim();
    let json: Value = serde_json::from_str(data).ok()?;
    let text = |key: &str| {
        json.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    match json.get("type").and_then(|v| v.as_str()).unwrap_or("") {
        "log" => Some(StreamEvent::Log(text("line"))),
        "result" => Some(StreamEvent::Result(
            match json.get("processed").and_then(|v| v.as_u64()) {
                Some(processed) => Outcome::counted(text("message"), processed),
                None => Outcome::message(text("message")),
            },
        )),
        "error" => Some(StreamEvent::Error(text("message"))),
        _ => None,
    }
}

/// Backend bridge speaking JSON over HTTP with an SSE response per call.
pub struct HttpBackend {
    client: Client,
    api_url: String,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn rejection(res: reqwest::Response) -> BackendError {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| format!("HTTP {}", status));
        BackendError::Rejected(message)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn invoke(
        &self,
        command: &str,
        args: Value,
        logs: Option<LogEmitter>,
    ) -> Result<Outcome, BackendError> {
        let url = format!("{}/invoke/{}", self.api_url, command);
        debug!(
            "Invoking backend command '{}' (log channel: {})",
            command,
            logs.as_ref().map(|l| l.channel()).unwrap_or("none")
        );

        let res = self.client.post(&url).json(&args).send().await?;
        if !res.status().is_success() {
            return Err(Self::rejection(res).await);
        }

        let stream = res.bytes_stream();
        let mut reader =
            tokio_util::io::StreamReader::new(stream.map(|r| r.map_err(std::io::Error::other)));
        let mut buf_reader = tokio::io::BufReader::new(&mut reader);
        let mut line_buf = String::new();

        loop {
            line_buf.clear();
            match buf_reader.read_line(&mut line_buf).await {
                Ok(0) => break,
                Ok(_) => match parse_event(&line_buf) {
                    Some(StreamEvent::Log(line)) => {
                        if let Some(logs) = &logs {
                            logs.emit(line);
                        }
                    }
                    Some(StreamEvent::Result(outcome)) => return Ok(outcome),
                    Some(StreamEvent::Error(message)) => {
                        return Err(BackendError::Rejected(message));
                    }
                    None => {}
                },
                Err(e) => return Err(BackendError::Transport(e.to_string())),
            }
        }

        warn!("Backend stream for '{}' ended without a result", command);
        Err(BackendError::Protocol(format!(
            "stream for '{}' ended without a result",
            command
        )))
    }

    async fn cancel(&self, cancel_command: &str) -> Result<(), BackendError> {
        let url = format!("{}/cancel/{}", self.api_url, cancel_command);
        let res = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(res).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_result_and_error_events() {
        assert_eq!(
            parse_event(r#"data: {"type":"log","line":"Connecting..."}"#),
            Some(StreamEvent::Log("Connecting...".into()))
        );
        assert_eq!(
            parse_event(r#"data:{"type":"result","message":"Deleted 12 messages","processed":12}"#),
            Some(StreamEvent::Result(Outcome::counted("Deleted 12 messages", 12)))
        );
        assert_eq!(
            parse_event(r#"data: {"type":"result","message":"ok"}"#),
            Some(StreamEvent::Result(Outcome::message("ok")))
        );
        assert_eq!(
            parse_event(r#"data: {"type":"error","message":"401: Unauthorized"}"#),
            Some(StreamEvent::Error("401: Unauthorized".into()))
        );
    }

    #[test]
    fn ignores_non_data_lines() {
        assert_eq!(parse_event(""), None);
        assert_eq!(parse_event(": keep-alive"), None);
        assert_eq!(parse_event("event: log"), None);
        assert_eq!(parse_event("data: not json"), None);
        assert_eq!(parse_event(r#"data: {"type":"ping"}"#), None);
    }

    #[test]
    fn api_url_is_normalized() {
        let backend = HttpBackend::new("http://127.0.0.1:17990/", Duration::from_secs(5))
            .expect("client builds");
        assert_eq!(backend.api_url(), "http://127.0.0.1:17990");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let backend =
            HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client builds");
        let err = backend
            .invoke("token_info", serde_json::json!({}), None)
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
