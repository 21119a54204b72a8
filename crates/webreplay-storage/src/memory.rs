//! In-memory instruction store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use webreplay_protocols::{
    ExecutionLog, Instruction, InstructionFilter, InstructionStore, StoreError,
};

use crate::{sort_by_name, stamp};

/// Process-local store. Contents vanish with the process.
pub struct MemoryStore {
    instructions: RwLock<HashMap<String, Instruction>>,
    logs: RwLock<HashMap<String, Vec<ExecutionLog>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            instructions: RwLock::new(HashMap::new()),
            logs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstructionStore for MemoryStore {
    async fn save(&self, instruction: Instruction) -> Result<Instruction, StoreError> {
        let instruction = stamp(instruction);
        let mut store = self.instructions.write().await;
        store.insert(instruction.id.clone(), instruction.clone());
        Ok(instruction)
    }

    async fn get(&self, id: &str) -> Result<Instruction, StoreError> {
        let store = self.instructions.read().await;
        store
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: &InstructionFilter) -> Result<Vec<Instruction>, StoreError> {
        let store = self.instructions.read().await;
        let mut instructions: Vec<_> = store
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        sort_by_name(&mut instructions);
        Ok(instructions)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let removed = self.instructions.write().await.remove(id);
        if removed.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.logs.write().await.remove(id);
        Ok(())
    }

    async fn append_execution_log(&self, log: ExecutionLog) -> Result<(), StoreError> {
        let mut logs = self.logs.write().await;
        logs.entry(log.instruction_id.clone()).or_default().push(log);
        Ok(())
    }

    async fn execution_logs(
        &self,
        instruction_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(instruction_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webreplay_protocols::ExecutionStatus;

    #[tokio::test]
    async fn test_save_assigns_id_and_keeps_it() {
        let store = MemoryStore::new();
        let saved = store.save(Instruction::new("Login")).await.unwrap();
        assert!(!saved.id.is_empty());

        let mut renamed = saved.clone();
        renamed.name = "Login v2".to_string();
        let resaved = store.save(renamed).await.unwrap();
        assert_eq!(resaved.id, saved.id);
        assert!(resaved.modified >= saved.modified);
        assert_eq!(store.get(&saved.id).await.unwrap().name, "Login v2");
    }

    #[tokio::test]
    async fn test_list_sorted_and_filtered() {
        let store = MemoryStore::new();
        for name in ["checkout", "Browse", "Account"] {
            store.save(Instruction::new(name)).await.unwrap();
        }
        let names: Vec<String> = store
            .list(&InstructionFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Account", "Browse", "checkout"]);

        let filter = InstructionFilter {
            name_contains: Some("OUT".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.delete("ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_logs_newest_first() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            let mut log = ExecutionLog::begin("i1", "demo");
            log.finish(ExecutionStatus::Success, None);
            store.append_execution_log(log).await.unwrap();
        }
        let mut last = ExecutionLog::begin("i1", "demo");
        last.finish(ExecutionStatus::Failed, Some("boom".to_string()));
        store.append_execution_log(last.clone()).await.unwrap();

        let logs = store.execution_logs("i1", 2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, last.id);
        assert!(store.execution_logs("other", 10).await.unwrap().is_empty());
    }
}
