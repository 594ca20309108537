use crate::config::RagConfig;
use crate::utils::error::Result;
use clap::Args;
use std::path::PathBuf;

/// Flags shared by `rag-chat` and `rag-store`. They take precedence over the
/// config file and the environment.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory scanned for .txt, .md and .pdf documents
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Directory holding the persisted vector index
    #[arg(long, global = true)]
    pub persist_dir: Option<String>,

    /// Chat model served by Ollama
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Embedding model served by Ollama
    #[arg(long, global = true)]
    pub embedding_model: Option<String>,
}

impl CommonArgs {
    pub fn resolve_config(&self) -> Result<RagConfig> {
        let mut config = RagConfig::load(self.config.as_deref())?;
        self.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_to(&self, config: &mut RagConfig) {
        if let Some(dir) = &self.data_dir {
            config.documents.data_directory = dir.clone();
        }
        if let Some(dir) = &self.persist_dir {
            config.store.persist_directory = dir.clone();
        }
        if let Some(model) = &self.model {
            config.ollama.chat_model = model.clone();
        }
        if let Some(model) = &self.embedding_model {
            config.ollama.embedding_model = model.clone();
        }
    }
}
