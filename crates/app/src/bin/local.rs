// Aidline - Local terminal client

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{error, info};

use aidline_app::{image_mime_for, language_name, Command, HELP};
use aidline_common::config::{Config, DEFAULT_LOG_FILTER};
use aidline_conversations::{AppUser, AttachmentStaging, Orchestrator, SendOutcome};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Aidline local client");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let orchestrator = Arc::new(aidline_app::create_orchestrator(&config).map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?);

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let user = match orchestrator.restore_session().await? {
            Some(user) => user,
            None => match prompt_login(&mut input).await? {
                Some(user) => {
                    orchestrator.login(user.clone()).await?;
                    user
                }
                None => break,
            },
        };

        say(&format!("Signed in as {} ({})", user.profile.name, user.country)).await?;
        render_active(&orchestrator).await?;

        if !chat_loop(&orchestrator, &mut input).await? {
            break;
        }
    }

    info!("Aidline local client stopped");
    Ok(())
}

async fn say(text: &str) -> anyhow::Result<()> {
    let mut out = tokio::io::stdout();
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

async fn ask(input: &mut Input, prompt: &str) -> anyhow::Result<Option<String>> {
    let mut out = tokio::io::stdout();
    out.write_all(prompt.as_bytes()).await?;
    out.flush().await?;
    Ok(input.next_line().await?.map(|l| l.trim().to_string()))
}

/// Simulated login: country and language are all the identity there is
async fn prompt_login(input: &mut Input) -> anyhow::Result<Option<AppUser>> {
    let Some(country) = ask(input, "Country: ").await? else {
        return Ok(None);
    };
    let Some(language) = ask(input, "Language code [fr]: ").await? else {
        return Ok(None);
    };

    let country = if country.is_empty() { "France".to_string() } else { country };
    let language = if language.is_empty() { "fr".to_string() } else { language };
    let name = language_name(&language);

    Ok(Some(AppUser::simulated(country, language, name, None)))
}

async fn render_active(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let snapshot = orchestrator.snapshot().await;
    let Some(conversation) = snapshot.active_id.and_then(|id| snapshot.conversation(id)) else {
        return say("(no conversation, type /new)").await;
    };

    say(&format!("== {} ==", conversation.title)).await?;
    for message in &conversation.messages {
        say(&format!("[{}] {}", message.role, message.content)).await?;
        for source in message.sources.iter().flatten() {
            say(&format!("    - {} <{}>", source.title, source.uri)).await?;
        }
    }
    Ok(())
}

/// Returns `false` when the user quits, `true` after logout
async fn chat_loop(orchestrator: &Arc<Orchestrator>, input: &mut Input) -> anyhow::Result<bool> {
    let mut staging = AttachmentStaging::new();

    while let Some(line) = ask(input, "> ").await? {
        match Command::parse(&line) {
            Command::Say(text) => {
                let outcome = orchestrator.send_message(&text, staging.take()).await?;
                match outcome {
                    SendOutcome::Rejected(reason) => say(&format!("(not sent: {})", reason)).await?,
                    SendOutcome::Failed { error, .. } => {
                        render_active(orchestrator).await?;
                        say(&format!("! {}", error)).await?;
                    }
                    SendOutcome::PremiumActivated { .. } | SendOutcome::Settled { .. } => {
                        render_active(orchestrator).await?
                    }
                }
            }
            Command::New => {
                orchestrator.create_conversation().await?;
                render_active(orchestrator).await?;
            }
            Command::List => {
                let snapshot = orchestrator.snapshot().await;
                for (i, c) in snapshot.conversations.iter().enumerate() {
                    let marker = if Some(c.id) == snapshot.active_id { "*" } else { " " };
                    say(&format!("{} {}. {}", marker, i + 1, c.title)).await?;
                }
            }
            Command::Select(n) => match conversation_at(orchestrator, n).await {
                Some(id) => {
                    orchestrator.select_conversation(id).await;
                    render_active(orchestrator).await?;
                }
                None => say("(no such conversation)").await?,
            },
            Command::Rename(n, title) => match conversation_at(orchestrator, n).await {
                Some(id) => {
                    orchestrator.rename_conversation(id, &title).await;
                }
                None => say("(no such conversation)").await?,
            },
            Command::Delete(n) => match conversation_at(orchestrator, n).await {
                Some(id) => {
                    orchestrator.delete_conversation(id).await;
                }
                None => say("(no such conversation)").await?,
            },
            Command::Attach(path) => attach(&mut staging, Path::new(&path)).await?,
            Command::Detach(name) => {
                if !staging.remove(&name) {
                    say("(not staged)").await?;
                }
            }
            Command::Logout => {
                orchestrator.logout().await?;
                say("Signed out, local data erased.").await?;
                return Ok(true);
            }
            Command::Quit => return Ok(false),
            Command::Help => say(HELP).await?,
            Command::Invalid(msg) => say(&format!("({})", msg)).await?,
        }
    }

    Ok(false)
}

async fn conversation_at(orchestrator: &Orchestrator, n: usize) -> Option<uuid::Uuid> {
    let snapshot = orchestrator.snapshot().await;
    snapshot.conversations.get(n.checked_sub(1)?).map(|c| c.id)
}

async fn attach(staging: &mut AttachmentStaging, path: &Path) -> anyhow::Result<()> {
    let Some(mime) = image_mime_for(path) else {
        return say("(only images can be attached)").await;
    };

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => return say(&format!("(cannot read {}: {})", path.display(), e)).await,
    };

    let name = path.file_name().and_then(|n| n.to_str());
    match staging.stage(name, mime, &bytes) {
        Ok(true) => {
            let names: Vec<&str> = staging.attachments().iter().map(|a| a.name.as_str()).collect();
            say(&format!("(staged: {})", names.join(", "))).await
        }
        Ok(false) => say("(already staged)").await,
        Err(e) => say(&format!("({})", e)).await,
    }
}
