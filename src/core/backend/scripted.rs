use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Backend, BackendError, Outcome};
use crate::core::logstream::LogEmitter;

#[derive(Clone)]
pub struct Script {
    pub lines: Vec<String>,
    pub line_delay: Duration,
    pub result: Result<Outcome, BackendError>,
    /// Wait for a cancel before settling; the call then rejects.
    pub hold: bool,
    /// Cancel command that releases a held call.
    pub cancel_command: Option<String>,
}

impl Script {
    pub fn ok(lines: &[&str], outcome: Outcome) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            line_delay: Duration::from_millis(1),
            result: Ok(outcome),
            hold: false,
            cancel_command: None,
        }
    }

    pub fn err(lines: &[&str], message: &str) -> Self {
        Self {
            result: Err(BackendError::Rejected(message.to_string())),
            ..Self::ok(lines, Outcome::message(""))
        }
    }

    pub fn held(lines: &[&str], cancel_command: Option<&str>) -> Self {
        Self {
            hold: true,
            cancel_command: cancel_command.map(String::from),
            ..Self::err(lines, "Operation cancelled")
        }
    }
}

/// Backend double that replays a script per command and records every call.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, Script>>,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
    invocations: Mutex<Vec<(String, Value)>>,
    cancels: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, command: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), script);
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn invoke(
        &self,
        command: &str,
        args: Value,
        logs: Option<LogEmitter>,
    ) -> Result<Outcome, BackendError> {
        self.invocations
            .lock()
            .unwrap()
            .push((command.to_string(), args));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .ok_or_else(|| BackendError::Rejected(format!("Unknown command: {}", command)))?;
        let token = CancellationToken::new();
        if let Some(cancel_command) = &script.cancel_command {
            self.in_flight
                .lock()
                .unwrap()
                .insert(cancel_command.clone(), token.clone());
        }

        for line in &script.lines {
            tokio::time::sleep(script.line_delay).await;
            if let Some(logs) = &logs {
                logs.emit(line.clone());
            }
        }
        if script.hold {
            token.cancelled().await;
        }
        if let Some(cancel_command) = &script.cancel_command {
            self.in_flight.lock().unwrap().remove(cancel_command);
        }
        script.result
    }

    async fn cancel(&self, cancel_command: &str) -> Result<(), BackendError> {
        self.cancels.lock().unwrap().push(cancel_command.to_string());
        if let Some(token) = self.in_flight.lock().unwrap().get(cancel_command) {
            token.cancel();
        }
        Ok(())
    }
}
