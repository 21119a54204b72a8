//! Persistence boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::execution::ExecutionLog;
use crate::instruction::Instruction;

/// Filter for [`InstructionStore::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionFilter {
    /// Only instructions whose URL pattern matches this page URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Case-insensitive substring of the instruction name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
}

impl InstructionFilter {
    pub fn matches(&self, instruction: &Instruction) -> bool {
        let url_ok = self
            .url
            .as_deref()
            .is_none_or(|url| instruction.matches_url(url));
        let name_ok = self.name_contains.as_deref().is_none_or(|needle| {
            instruction
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        url_ok && name_ok
    }
}

/// Keyed store for instructions and their execution logs.
#[async_trait]
pub trait InstructionStore: Send + Sync {
    /// Persist an instruction. Assigns an id and `created` when absent and
    /// refreshes `modified`. Returns the stored instruction.
    async fn save(&self, instruction: Instruction) -> Result<Instruction, StoreError>;

    async fn get(&self, id: &str) -> Result<Instruction, StoreError>;

    /// Instructions matching `filter`, ordered by name.
    async fn list(&self, filter: &InstructionFilter) -> Result<Vec<Instruction>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn append_execution_log(&self, log: ExecutionLog) -> Result<(), StoreError>;

    /// Most recent logs first, at most `limit`.
    async fn execution_logs(
        &self,
        instruction_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let instruction = Instruction::new("Checkout Flow").with_url_pattern("https://shop/*");

        assert!(InstructionFilter::default().matches(&instruction));

        let by_name = InstructionFilter {
            name_contains: Some("checkout".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&instruction));

        let by_url = InstructionFilter {
            url: Some("https://blog/post".to_string()),
            ..Default::default()
        };
        assert!(!by_url.matches(&instruction));
    }
}
