//! File-backed instruction store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use webreplay_protocols::{
    ExecutionLog, Instruction, InstructionFilter, InstructionStore, StoreError,
};

use crate::{sort_by_name, stamp};

/// Instructions and logs under one root directory:
/// ```text
/// {root}/
/// ├── instructions/
/// │   └── {id}.json      pretty-printed instruction
/// └── logs/
///     └── {id}.jsonl     one execution log per line, oldest first
/// ```
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("instructions")).await?;
        fs::create_dir_all(root.join("logs")).await?;
        debug!("FileStore initialized at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn instruction_path(&self, id: &str) -> PathBuf {
        self.root
            .join("instructions")
            .join(format!("{}.json", sanitize_id(id)))
    }

    fn log_path(&self, id: &str) -> PathBuf {
        self.root
            .join("logs")
            .join(format!("{}.jsonl", sanitize_id(id)))
    }

    async fn read_instruction(path: &Path) -> Result<Instruction, StoreError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Keep ids usable as file names.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl InstructionStore for FileStore {
    async fn save(&self, instruction: Instruction) -> Result<Instruction, StoreError> {
        let instruction = stamp(instruction);
        let path = self.instruction_path(&instruction.id);
        let content = serde_json::to_string_pretty(&instruction)?;
        fs::write(&path, content).await?;
        debug!("Saved instruction '{}' to {:?}", instruction.id, path);
        Ok(instruction)
    }

    async fn get(&self, id: &str) -> Result<Instruction, StoreError> {
        let path = self.instruction_path(id);
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::read_instruction(&path).await
    }

    async fn list(&self, filter: &InstructionFilter) -> Result<Vec<Instruction>, StoreError> {
        let mut instructions = Vec::new();
        let mut entries = fs::read_dir(self.root.join("instructions")).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_instruction(&path).await {
                Ok(instruction) if filter.matches(&instruction) => instructions.push(instruction),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable instruction file {:?}: {}", path, e),
            }
        }

        sort_by_name(&mut instructions);
        Ok(instructions)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.instruction_path(id);
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        fs::remove_file(&path).await?;

        let logs = self.log_path(id);
        if fs::try_exists(&logs).await? {
            fs::remove_file(&logs).await?;
        }
        debug!("Deleted instruction '{}'", id);
        Ok(())
    }

    async fn append_execution_log(&self, log: ExecutionLog) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&log)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(&log.instruction_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn execution_logs(
        &self,
        instruction_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError> {
        let path = self.log_path(instruction_id);
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        let mut logs: Vec<ExecutionLog> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("Skipping malformed log line in {:?}: {}", path, e);
                    None
                }
            })
            .collect();
        logs.reverse();
        logs.truncate(limit);
        Ok(logs)
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
