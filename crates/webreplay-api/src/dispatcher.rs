//! Routes request envelopes to the store and the executor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use webreplay_protocols::{
    Instruction, InstructionFilter, InstructionStore, ReplayError, Variables,
};
use webreplay_runtime::InstructionExecutor;
use webreplay_storage::{export_bundle, import_bundle};

use crate::error::ApiError;
use crate::message::{Request, Response};

const DEFAULT_LOG_LIMIT: usize = 10;

/// Entry returned by `list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionSummary {
    pub id: String,
    pub name: String,
    pub url_pattern: String,
    pub steps: usize,
    pub modified: DateTime<Utc>,
}

impl From<&Instruction> for InstructionSummary {
    fn from(instruction: &Instruction) -> Self {
        Self {
            id: instruction.id.clone(),
            name: instruction.name.clone(),
            url_pattern: instruction.url_pattern.clone(),
            steps: instruction.steps.len(),
            modified: instruction.modified,
        }
    }
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize)]
struct SavePayload {
    instruction: Instruction,
}

/// `run` takes either a stored instruction's `id` or an inline `instruction`.
#[derive(Deserialize)]
struct RunPayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    instruction: Option<Instruction>,
    #[serde(default)]
    variables: Variables,
}

#[derive(Default, Deserialize)]
struct StatusPayload {
    id: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ImportPayload {
    data: String,
}

#[derive(Default, Deserialize)]
struct ExportPayload {
    #[serde(default)]
    ids: Vec<String>,
}

/// Handles one request at a time; share it behind an `Arc` to serve many.
pub struct Dispatcher {
    executor: Arc<InstructionExecutor>,
}

impl Dispatcher {
    pub fn new(executor: Arc<InstructionExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<InstructionExecutor> {
        &self.executor
    }

    fn store(&self) -> &dyn InstructionStore {
        self.executor.store().as_ref()
    }

    /// Never fails: errors come back as an error response with the request id.
    pub async fn handle(&self, request: Request) -> Response {
        let Request {
            id,
            action,
            payload,
        } = request;
        debug!(action = %action, "Dispatching request");

        match self.dispatch(&action, payload).await {
            Ok(result) => Response::ok(id, result),
            Err(e) => {
                warn!(action = %action, kind = e.kind(), "Request failed: {}", e);
                Response::err(id, &e)
            }
        }
    }

    async fn dispatch(&self, action: &str, payload: Value) -> Result<Value, ApiError> {
        match action {
            "list" => {
                let filter: InstructionFilter = optional(payload)?;
                let summaries: Vec<InstructionSummary> = self
                    .store()
                    .list(&filter)
                    .await?
                    .iter()
                    .map(InstructionSummary::from)
                    .collect();
                Ok(json!({ "instructions": summaries }))
            }
            "get" => {
                let IdPayload { id } = required(payload)?;
                Ok(serde_json::to_value(self.store().get(&id).await?)?)
            }
            "save" => {
                let SavePayload { instruction } = required(payload)?;
                let saved = self.store().save(instruction).await?;
                info!(id = %saved.id, name = %saved.name, "Instruction saved");
                Ok(serde_json::to_value(saved)?)
            }
            "delete" => {
                let IdPayload { id } = required(payload)?;
                self.store().delete(&id).await?;
                info!(id = %id, "Instruction deleted");
                Ok(json!({ "deleted": id }))
            }
            "run" => {
                let RunPayload {
                    id,
                    instruction,
                    variables,
                } = required(payload)?;
                let result = match (id, instruction) {
                    (Some(id), None) => self.executor.run_by_id(&id, &variables).await,
                    (None, Some(mut instruction)) => {
                        if instruction.id.is_empty() {
                            instruction.id =
                                format!("inline-{}", Utc::now().timestamp_millis());
                        }
                        debug!(id = %instruction.id, "Running inline instruction");
                        self.executor.run(&instruction, &variables).await
                    }
                    _ => {
                        return Err(ApiError::InvalidRequest(
                            "run needs exactly one of `id` or `instruction`".to_string(),
                        ));
                    }
                };
                let outcome = result.map_err(|e| match e {
                    ReplayError::Store(e) => ApiError::Store(e),
                    other => ApiError::Replay(other),
                })?;
                Ok(serde_json::to_value(outcome)?)
            }
            "stop" => Ok(json!({ "stopped": self.executor.stop() })),
            "status" => {
                let StatusPayload { id, limit } = optional(payload)?;
                let mut status = json!({ "state": self.executor.state() });
                if let Some(id) = id {
                    let logs = self
                        .store()
                        .execution_logs(&id, limit.unwrap_or(DEFAULT_LOG_LIMIT))
                        .await?;
                    status["logs"] = serde_json::to_value(logs)?;
                }
                Ok(status)
            }
            "import" => {
                let ImportPayload { data } = required(payload)?;
                let imported: Vec<InstructionSummary> = import_bundle(self.store(), &data)
                    .await?
                    .iter()
                    .map(InstructionSummary::from)
                    .collect();
                Ok(json!({ "imported": imported }))
            }
            "export" => {
                let ExportPayload { ids } = optional(payload)?;
                Ok(json!({ "data": export_bundle(self.store(), &ids).await? }))
            }
            other => Err(ApiError::UnknownAction(other.to_string())),
        }
    }
}

fn required<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

/// Like [`required`], but a missing payload means `T::default()`.
fn optional<T: DeserializeOwned + Default>(payload: Value) -> Result<T, ApiError> {
    if payload.is_null() {
        return Ok(T::default());
    }
    required(payload)
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
