//! Instruction subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use webreplay_config::Config;
use webreplay_host_cdp::CdpPage;
use webreplay_protocols::{InstructionFilter, InstructionStore, Variables};
use webreplay_runtime::{ActionEngine, InstructionExecutor};
use webreplay_storage::{export_bundle, import_bundle, open_store};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Connect to the browser and build an executor over the configured store.
pub(crate) async fn build_executor(
    config: &Config,
    endpoint: Option<&str>,
) -> Result<Arc<InstructionExecutor>, Box<dyn std::error::Error>> {
    let endpoint = endpoint.unwrap_or(&config.browser.endpoint);
    info!("Connecting to browser at {}", endpoint);
    let page = CdpPage::connect(endpoint).await?;

    let engine = Arc::new(ActionEngine::new(Arc::new(page), config.engine.clone()));
    let store = open_store(&config.storage).await?;
    Ok(Arc::new(InstructionExecutor::new(
        engine,
        store,
        config.executor.clone(),
    )))
}

/// Replay one instruction. Ctrl-C requests a stop.
pub(crate) async fn run_instruction(
    config: &Config,
    id: &str,
    vars: Vec<(String, String)>,
    endpoint: Option<&str>,
) -> CmdResult {
    let executor = build_executor(config, endpoint).await?;
    let overrides: Variables = vars.into_iter().collect();

    let interrupt = {
        let executor = executor.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping run");
                executor.stop();
            }
        })
    };
    let result = executor.run_by_id(id, &overrides).await;
    interrupt.abort();

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.status.is_success() {
        let reason = outcome.log.error.as_deref().unwrap_or("step failed");
        return Err(format!("run of {} failed: {}", id, reason).into());
    }
    Ok(())
}

pub(crate) async fn list_instructions(
    config: &Config,
    url: Option<String>,
    name: Option<String>,
    format: &str,
) -> CmdResult {
    let store = open_store(&config.storage).await?;
    let filter = InstructionFilter {
        url,
        name_contains: name,
    };
    let instructions = store.list(&filter).await?;

    if instructions.is_empty() {
        println!("No instructions found.");
        return Ok(());
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&instructions)?);
        }
        _ => {
            println!("{:<38} {:<30} {:>5}  {}", "ID", "NAME", "STEPS", "URL PATTERN");
            println!("{}", "-".repeat(90));
            for instruction in instructions {
                let pattern = if instruction.url_pattern.is_empty() {
                    "-"
                } else {
                    instruction.url_pattern.as_str()
                };
                println!(
                    "{:<38} {:<30} {:>5}  {}",
                    instruction.id,
                    instruction.name,
                    instruction.steps.len(),
                    pattern
                );
            }
        }
    }

    Ok(())
}

pub(crate) async fn show_instruction(config: &Config, id: &str, logs: usize) -> CmdResult {
    let store = open_store(&config.storage).await?;
    let instruction = store.get(id).await?;

    println!("Instruction: {}", instruction.name);
    println!("{}", "=".repeat(50));
    println!("ID:          {}", instruction.id);
    if let Some(description) = &instruction.description {
        println!("Description: {}", description);
    }
    if !instruction.url_pattern.is_empty() {
        println!("URL pattern: {}", instruction.url_pattern);
    }
    println!("Modified:    {}", instruction.modified.to_rfc3339());

    if !instruction.variables.is_empty() {
        println!("\nVariables:");
        let masked = instruction.mask_secrets(&instruction.resolve_variables(&Variables::new()));
        for (name, def) in &instruction.variables {
            let value = masked.get(name).map(String::as_str).unwrap_or_default();
            println!("  - {} ({:?}) = {:?}", name, def.kind, value);
        }
    }

    println!("\nSteps:");
    for (index, step) in instruction.steps.iter().enumerate() {
        let target = step
            .selector
            .as_ref()
            .map(|s| s.primary.value.as_str())
            .unwrap_or("");
        println!("  {:>3}. {:<22} {}", index + 1, step.action_name(), target);
    }

    if logs > 0 {
        let history = store.execution_logs(id, logs).await?;
        if !history.is_empty() {
            println!("\nRecent runs:");
            for log in history {
                println!(
                    "  {}  {:<8} {:>7}ms  {}",
                    log.started_at.to_rfc3339(),
                    format!("{:?}", log.status).to_lowercase(),
                    log.duration_ms,
                    log.error.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

pub(crate) async fn delete_instruction(config: &Config, id: &str) -> CmdResult {
    let store = open_store(&config.storage).await?;
    store.delete(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub(crate) async fn import_instructions(config: &Config, file: &Path) -> CmdResult {
    let input = if file == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(file).await?
    };

    let store = open_store(&config.storage).await?;
    let imported = import_bundle(store.as_ref(), &input).await?;
    for instruction in &imported {
        println!("{}  {}", instruction.id, instruction.name);
    }
    println!("Imported {} instruction(s)", imported.len());
    Ok(())
}

pub(crate) async fn export_instructions(
    config: &Config,
    ids: &[String],
    output: Option<PathBuf>,
) -> CmdResult {
    let store = open_store(&config.storage).await?;
    let data = export_bundle(store.as_ref(), ids).await?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, format!("{}\n", data)).await?;
            info!("Exported bundle to {:?}", path);
        }
        None => println!("{}", data),
    }
    Ok(())
}
