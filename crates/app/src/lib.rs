//! Aidline application composition root
//!
//! Wires configuration, the LLM provider, the file-backed store and the
//! translation catalog into an `Orchestrator`, and parses the commands of the
//! terminal front end.

use std::path::Path;
use std::sync::Arc;

use aidline_common::{Catalog, Config};
use aidline_conversations::{
    AiGateway, ConversationsRepositories, FileStore, KeyValueStore, Orchestrator,
};
use aidline_llm::{LlmConfig, LlmService, LlmServiceFactory};

/// Build the orchestrator described by `config`
pub fn create_orchestrator(config: &Config) -> Result<Orchestrator, anyhow::Error> {
    let llm = LlmServiceFactory::create(LlmConfig::from(config))?;
    let store = Arc::new(FileStore::new(config.data_dir.clone()));

    tracing::info!(
        provider = %config.provider,
        data_dir = %config.data_dir.display(),
        "Composing conversation engine"
    );

    Ok(compose(llm, store))
}

/// Compose from explicit collaborators
pub fn compose(llm: Arc<dyn LlmService>, store: Arc<dyn KeyValueStore>) -> Orchestrator {
    Orchestrator::new(
        ConversationsRepositories::new(store),
        AiGateway::new(llm),
        Arc::new(Catalog::new()),
    )
}

/// English name of a language code, used to pin the reply language
pub fn language_name(code: &str) -> Option<String> {
    let name = match code.trim().to_ascii_lowercase().as_str() {
        "fr" => "French",
        "en" => "English",
        "es" => "Spanish",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ar" => "Arabic",
        "nl" => "Dutch",
        "wo" => "Wolof",
        _ => return None,
    };
    Some(name.to_string())
}

/// MIME type guessed from a file extension
pub fn image_mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// One line of terminal input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    List,
    Select(usize),
    Rename(usize, String),
    Delete(usize),
    Attach(String),
    Detach(String),
    Logout,
    Quit,
    Help,
    /// Anything that is not a slash command is chat input
    Say(String),
    Invalid(String),
}

impl Command {
    /// Conversation indexes are 1-based in the terminal
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line.to_string());
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        let index = |s: &str| s.parse::<usize>().ok().filter(|n| *n > 0);

        match name {
            "new" => Self::New,
            "list" => Self::List,
            "logout" => Self::Logout,
            "quit" | "exit" => Self::Quit,
            "help" => Self::Help,
            "select" => index(args)
                .map(Self::Select)
                .unwrap_or_else(|| Self::Invalid("usage: /select <n>".to_string())),
            "delete" => index(args)
                .map(Self::Delete)
                .unwrap_or_else(|| Self::Invalid("usage: /delete <n>".to_string())),
            "rename" => {
                let parsed = args
                    .split_once(char::is_whitespace)
                    .and_then(|(n, title)| Some((index(n)?, title.trim())))
                    .filter(|(_, title)| !title.is_empty());
                match parsed {
                    Some((n, title)) => Self::Rename(n, title.to_string()),
                    None => Self::Invalid("usage: /rename <n> <title>".to_string()),
                }
            }
            "attach" if !args.is_empty() => Self::Attach(args.to_string()),
            "detach" if !args.is_empty() => Self::Detach(args.to_string()),
            "attach" | "detach" => Self::Invalid(format!("usage: /{} <name>", name)),
            other => Self::Invalid(format!("unknown command: /{}", other)),
        }
    }
}

pub const HELP: &str = "\
/new                 start a conversation
/list                list conversations
/select <n>          switch conversation
/rename <n> <title>  rename a conversation
/delete <n>          delete a conversation
/attach <path>       stage an image for the next message
/detach <name>       unstage an image
/logout              sign out and erase local data
/quit                exit";
