use std::io::Write;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use colloquy_cli::{
    commands::{Command, HELP},
    config::{Config, StoreBackend},
    render::spawn_renderer,
};
use colloquy_llm::{ChatClient, OpenAIClient};
use colloquy_persist::{MemoryPersistenceClient, MessageRole, PersistenceClient};
use colloquy_session::{
    ChatSession, HistoryPanel, SessionError, SubmitOutcome, ValidationFailure,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!(owner = %config.session.owner, backend = ?config.store.backend, "starting colloquy");

    let store = connect_store(&config).await?;

    let mut openai = OpenAIClient::new(config.openai_api_key.clone())?;
    if let Some(base_url) = &config.llm.base_url {
        openai = openai.with_base_url(base_url.clone());
    }
    let chat_client: Arc<dyn ChatClient> = Arc::new(openai);

    let session = ChatSession::builder()
        .user_id(&config.session.owner)
        .store(store)
        .chat_client(chat_client)
        .llm_config(config.llm.clone().into())
        .event_capacity(config.session.event_capacity)
        .build()?;

    let mut panel = HistoryPanel::new(session.clone());
    let renderer = spawn_renderer(session.clone());

    println!("{HELP}\n");
    if panel.refresh().await.is_ok() && !panel.entries().is_empty() {
        print_listing(&panel);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Quit => break,
            command => run(command, &session, &mut panel).await,
        }
        prompt();
    }

    renderer.abort();
    tracing::info!("session closed");
    Ok(())
}

async fn run(command: Command, session: &ChatSession, panel: &mut HistoryPanel) {
    let index = command.index();
    let result = match command {
        Command::Say(text) => match session.submit(&text).await {
            Ok(SubmitOutcome::Completed { .. }) => {
                println!();
                Ok(())
            }
            Ok(SubmitOutcome::Abandoned) => Ok(()),
            Err(SessionError::Validation(ValidationFailure::EmptyInput)) => Ok(()),
            Err(e) => {
                println!();
                Err(e)
            }
        },
        Command::New => panel.new_chat().await.map(|_| println!("Started a new conversation.")),
        Command::List => panel.refresh().await.map(|_| print_listing(panel)),
        Command::Open(_) => match listed(panel, index) {
            Some(id) => match panel.open(&id).await {
                Ok(()) => {
                    print_transcript(session).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            None => Ok(()),
        },
        Command::Delete(_) => match listed(panel, index) {
            Some(id) => panel.remove(&id).await.map(|_| println!("Deleted.")),
            None => Ok(()),
        },
        Command::Close => session.select_conversation(None).await,
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Invalid(message) => {
            println!("{message}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        match e {
            SessionError::PartialDelete { .. } => eprintln!("Run /delete again to finish removing it."),
            e if e.is_retryable() => eprintln!("This may be temporary; try again."),
            _ => {}
        }
    }
}

fn listed(panel: &HistoryPanel, index: Option<usize>) -> Option<String> {
    let entry = index.and_then(|i| panel.get(i));
    if entry.is_none() {
        println!("No such conversation; /list shows the numbers.");
    }
    entry.map(|e| e.id.clone())
}

fn print_listing(panel: &HistoryPanel) {
    if panel.entries().is_empty() {
        println!("No conversations yet.");
        return;
    }
    for (i, entry) in panel.entries().iter().enumerate() {
        let marker = if entry.active { '*' } else { ' ' };
        println!(
            "{marker}{:>3}. {}  ({})",
            i + 1,
            entry.title,
            entry.updated_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(preview) = &entry.preview {
            println!("      {preview}");
        }
    }
}

async fn print_transcript(session: &ChatSession) {
    for message in session.messages().await {
        let speaker = match message.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "assistant",
        };
        println!("{speaker}: {}", message.content);
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; conversations are lost on exit");
            Ok(Arc::new(MemoryPersistenceClient::new()))
        }
        StoreBackend::Mongodb => connect_mongodb(config).await,
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    let uri = config
        .mongodb_uri
        .as_deref()
        .ok_or_else(|| anyhow!("MONGODB_URI environment variable is required for the mongodb backend"))?;

    tracing::info!("Connecting to MongoDB");
    let client = colloquy_persist::MongoPersistenceClient::connect(uri, &config.store.database).await?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    Err(anyhow!("this build has no MongoDB support; rebuild with --features mongodb"))
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so they do not interleave with the conversation
    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
