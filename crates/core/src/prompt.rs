use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::agent::AgentId;

pub const PROMPT_FILE_NAME: &str = "prompt.txt";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("configuration for agent `{agent_id}` not found at `{path}`: {source}")]
    ConfigurationNotFound {
        agent_id: AgentId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of an agent's configuration text.
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn load(&self, agent_id: &AgentId) -> Result<String, PromptError>;
}

/// Reads `{root}/{agent_id}/prompt.txt` on every call.
#[derive(Clone, Debug)]
pub struct FsPromptLoader {
    root: PathBuf,
}

impl FsPromptLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prompt_path(&self, agent_id: &AgentId) -> PathBuf {
        self.root.join(agent_id.as_str()).join(PROMPT_FILE_NAME)
    }
}

#[async_trait]
impl PromptSource for FsPromptLoader {
    async fn load(&self, agent_id: &AgentId) -> Result<String, PromptError> {
        let path = self.prompt_path(agent_id);
        // Invalid UTF-8 surfaces as io::ErrorKind::InvalidData and is treated as unreadable.
        tokio::fs::read_to_string(&path).await.map_err(|source| {
            PromptError::ConfigurationNotFound { agent_id: agent_id.clone(), path, source }
        })
    }
}
