//! Import and export in the instruction file format.

use tracing::{debug, info};
use webreplay_protocols::{
    Instruction, InstructionBundle, InstructionFilter, InstructionStore, StoreError,
};

/// Serialize instructions as a single-line bundle. Empty `ids` exports everything.
pub async fn export_bundle(
    store: &dyn InstructionStore,
    ids: &[String],
) -> Result<String, StoreError> {
    let instructions = if ids.is_empty() {
        store.list(&InstructionFilter::default()).await?
    } else {
        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            selected.push(store.get(id).await?);
        }
        selected
    };
    debug!(count = instructions.len(), "Exporting instructions");
    Ok(InstructionBundle::new(instructions).to_json_line()?)
}

/// Parse a bundle and save every instruction in it.
///
/// Instructions whose id is already taken are saved under a fresh id, so an
/// import never overwrites existing work.
pub async fn import_bundle(
    store: &dyn InstructionStore,
    input: &str,
) -> Result<Vec<Instruction>, StoreError> {
    let bundle = InstructionBundle::parse(input.trim())?;
    if !bundle.is_supported_version() {
        return Err(StoreError::UnsupportedVersion(bundle.version));
    }

    let mut saved = Vec::with_capacity(bundle.instructions.len());
    for mut instruction in bundle.instructions {
        if !instruction.id.is_empty() && store.get(&instruction.id).await.is_ok() {
            debug!(id = %instruction.id, "Id already in use, assigning a new one");
            instruction.id.clear();
        }
        saved.push(store.save(instruction).await?);
    }
    info!(count = saved.len(), "Imported instructions");
    Ok(saved)
}
