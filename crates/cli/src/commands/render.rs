use std::fs;
use std::path::Path;

use deplo_core::config::{AppConfig, LoadOptions};
use deplo_core::{
    synthesize, AgentId, ExposureSpec, FsPromptLoader, PromptSource, SynthesisEnvironment,
    WorkloadSpec,
};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct RenderedPair {
    agent_id: AgentId,
    workload: WorkloadSpec,
    exposure: ExposureSpec,
}

/// Synthesizes the pair the server would apply for `agent_id`, with secrets masked. Nothing
/// is sent to the cluster.
pub fn run(agent_id: &str, prompt_file: Option<&Path>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "render",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let agent_id = match AgentId::parse(agent_id) {
        Ok(agent_id) => agent_id,
        Err(error) => {
            return CommandResult::failure("render", "invalid_agent_id", error.to_string(), 4);
        }
    };

    let prompt = match prompt_file {
        Some(path) => fs::read_to_string(path).map_err(|error| {
            (
                "configuration_not_found",
                format!("could not read prompt file `{}`: {error}", path.display()),
                5,
            )
        }),
        None => load_from_root(&config, &agent_id),
    };
    let prompt = match prompt {
        Ok(prompt) => prompt,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("render", error_class, message, exit_code);
        }
    };

    let environment = SynthesisEnvironment::from(&config.workload);
    let pair = synthesize(&agent_id, &prompt, &environment);

    CommandResult::document(
        "render",
        &RenderedPair { agent_id, workload: pair.workload.redacted(), exposure: pair.exposure },
    )
}

fn load_from_root(
    config: &AppConfig,
    agent_id: &AgentId,
) -> Result<String, (&'static str, String, u8)> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| ("runtime_init", format!("failed to initialize async runtime: {error}"), 3),
    )?;

    let loader = FsPromptLoader::new(&config.prompts.root);
    runtime
        .block_on(loader.load(agent_id))
        .map_err(|error| ("configuration_not_found", error.to_string(), 5))
}

