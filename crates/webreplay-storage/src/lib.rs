//! # webreplay Storage
//!
//! [`InstructionStore`] implementations and the import/export file format.
//!
//! - [`MemoryStore`] - process-local, for tests and dry runs
//! - [`FileStore`] - one JSON file per instruction plus JSON-lines run logs

mod file;
mod memory;
mod transfer;

use std::sync::Arc;

use webreplay_config::{StorageBackend, StorageConfig};
use webreplay_protocols::{Instruction, InstructionStore, StoreError};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use transfer::{export_bundle, import_bundle};

/// Open the store selected by `config`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn InstructionStore>, StoreError> {
    Ok(match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::new(config.dir_path()).await?),
    })
}

/// Assign an id and creation time when absent and refresh `modified`.
pub(crate) fn stamp(mut instruction: Instruction) -> Instruction {
    if instruction.id.trim().is_empty() {
        instruction.id = uuid::Uuid::new_v4().to_string();
        instruction.created = chrono::Utc::now();
    }
    instruction.touch();
    instruction
}

/// Instructions ordered by name, then id.
pub(crate) fn sort_by_name(instructions: &mut [Instruction]) {
    instructions.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}
