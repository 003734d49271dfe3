use chattoz::models::{ChannelEvent, CreateSessionRequest, Role, SessionMode};
use chattoz::services::{ChatSession, MemoryStore, NoticeBoard, NoticeId, NoticeLevel, Slate, SlateView};
use chattoz::{
    decode_qr_png, BackendHttp, ChannelSignal, ClientConfig, MemoryApi, MemoryClient,
    SessionClient, TranslationClient, Translator,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "chattoz")]
#[command(about = "Real-time chat translation client", long_about = None)]
struct Cli {
    /// Overrides CHATTOZ_USER_ID
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session as host and chat once the guest joins
    Host {
        #[arg(long, default_value = "english")]
        from: String,
        #[arg(long, default_value = "spanish")]
        to: String,
        /// Require confirmation before translated lines are sent
        #[arg(long)]
        confirm: bool,
        #[arg(long, default_value = "Scan this code to chat with me")]
        invite: String,
        /// Write the invite QR code to this PNG file
        #[arg(long)]
        qr_out: Option<PathBuf>,
    },
    /// Join an existing session as guest
    Guest { session_id: String },
    /// Translate text, optionally keeping an editable slate open
    Slate {
        text: String,
        #[arg(long, default_value = "en")]
        from: String,
        #[arg(long, default_value = "ja")]
        to: String,
        /// Preset tag to apply; repeatable
        #[arg(long = "preset")]
        presets: Vec<String>,
        /// Keep reading edits from stdin
        #[arg(long)]
        interactive: bool,
    },
    /// Manage the user's memories
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    List,
    Add { text: String },
    Edit { id: String, text: String },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> CliResult {
    init_logging()?;
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(user) = cli.user {
        config = config.with_user_id(user);
    }
    let config = Arc::new(config);
    let http = BackendHttp::new(Arc::clone(&config))?;
    let notices = Arc::new(NoticeBoard::new(config.notice_ttl));

    match cli.command {
        Commands::Host {
            from,
            to,
            confirm,
            invite,
            qr_out,
        } => {
            let mut request = CreateSessionRequest::new(from, to);
            if confirm {
                request.mode = SessionMode::Confirm;
            }
            let mut session = ChatSession::host(Arc::clone(&config), Arc::clone(&notices));
            // Subscribe first so a guest joining during setup is still printed.
            let updates = session.subscribe();
            let invite = session
                .start_host(
                    &SessionClient::new(http.clone()),
                    &TranslationClient::new(http),
                    request,
                    &invite,
                )
                .await?;

            println!("{}", invite.translated_invite);
            println!("Invite link: {}", invite.invite_url);
            if let Some(path) = qr_out {
                tokio::fs::write(&path, decode_qr_png(&invite.qr_base64)?).await?;
                println!("QR code written to {}", path.display());
            }
            println!("Waiting for the guest to join...");
            chat_loop(session, updates, notices).await
        }
        Commands::Guest { session_id } => {
            let mut session = ChatSession::guest(Arc::clone(&config), Arc::clone(&notices));
            let updates = session.subscribe();
            session.join_as_guest(&session_id).await?;
            chat_loop(session, updates, notices).await
        }
        Commands::Slate {
            text,
            from,
            to,
            presets,
            interactive,
        } => {
            let translator: Arc<dyn Translator> = Arc::new(TranslationClient::new(http.clone()));
            let memories: Arc<dyn MemoryApi> = Arc::new(MemoryClient::new(http));
            let slate = Slate::new(translator, memories, Arc::clone(&notices), config.debounce);
            slate.set_languages(&from, &to).await;
            for preset in &presets {
                slate.add_preset(preset).await;
            }
            slate.set_input(text).await;
            slate.send().await?;
            print_slate(&slate.view().await);
            if interactive {
                slate_loop(slate, config.debounce, &notices).await?;
            }
            Ok(())
        }
        Commands::Memory { action } => {
            let api: Arc<dyn MemoryApi> = Arc::new(MemoryClient::new(http));
            let store = MemoryStore::new(api, notices);
            match action {
                MemoryAction::List => store.refresh().await?,
                MemoryAction::Add { text } => store.create(&text).await?,
                MemoryAction::Edit { id, text } => {
                    store.refresh().await?;
                    store.edit(&id, &text).await?;
                }
                MemoryAction::Delete { id } => {
                    store.refresh().await?;
                    store.delete(&id).await?;
                }
            }
            for memory in store.memories().await {
                println!("{}\t{}", memory.id, memory.message);
            }
            Ok(())
        }
    }
}

/// Reads lines from stdin and prints the peer's messages as they arrive.
///
/// `/auto on|off` toggles auto mode, `/s N` sends suggestion N, `/quit` leaves.
async fn chat_loop(
    mut session: ChatSession,
    mut updates: broadcast::Receiver<ChannelSignal>,
    notices: Arc<NoticeBoard>,
) -> CliResult {
    let me = session.role();
    let mut shown: NoticeId = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line.split_once(' ').unwrap_or((line, "")) {
                    ("/quit", _) => break,
                    ("/auto", arg) => session.set_auto_mode(arg == "on").await,
                    ("/s", n) => {
                        let suggestions = session.view().await.suggestions;
                        let pick = n.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                        match pick.and_then(|i| suggestions.get(i).cloned()) {
                            Some(text) => {
                                let _ = session.send_suggestion(&text).await;
                            }
                            None => eprintln!("no such suggestion"),
                        }
                    }
                    _ => {
                        session.set_input(line).await;
                        // Failures are raised as notices and logged.
                        let _ = session.send().await;
                    }
                }
                shown = print_notices(&notices, shown).await;
            }
            signal = updates.recv() => {
                shown = print_notices(&notices, shown).await;
                match signal {
                    Ok(ChannelSignal::Event(event)) => print_event(me, &event),
                    Ok(ChannelSignal::Closed { .. }) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Dropped {} chat updates", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

fn print_event(me: Role, event: &ChannelEvent) {
    match event {
        ChannelEvent::GuestJoined if me == Role::Host => println!("* {} joined", me.peer()),
        ChannelEvent::GuestJoined => {}
        ChannelEvent::Suggestions(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("  [{}] {}", i + 1, item);
            }
        }
        ChannelEvent::Chat(message) if message.is_from(me) => {
            println!("you: {}  →  {}", message.original, message.translated)
        }
        ChannelEvent::Chat(message) => println!("{}: {}", message.from, message.translated),
    }
}

/// Each stdin line replaces the source text; `/regen`, `/save` and `/quit` are commands.
async fn slate_loop(slate: Slate, debounce: Duration, notices: &NoticeBoard) -> CliResult {
    let mut shown: NoticeId = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/regen" => {
                let _ = slate.regenerate().await;
            }
            "/save" => {
                let _ = slate.save_source_to_memory().await;
                shown = print_notices(notices, shown).await;
                continue;
            }
            text => {
                slate.edit_source(text).await;
                tokio::time::sleep(debounce).await;
                while slate.view().await.loading {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
        shown = print_notices(notices, shown).await;
        print_slate(&slate.view().await);
    }
    slate.cancel_pending().await;
    Ok(())
}

/// Prints notices raised since `shown` to stderr; returns the newest id seen.
async fn print_notices(notices: &NoticeBoard, shown: NoticeId) -> NoticeId {
    let mut newest = shown;
    for notice in notices.active().await.into_iter().filter(|n| n.id > shown) {
        let marker = match notice.level {
            NoticeLevel::Error => "!",
            NoticeLevel::Success => "+",
            NoticeLevel::Info => "*",
        };
        eprintln!("{} {}", marker, notice.text);
        newest = newest.max(notice.id);
    }
    newest
}

fn print_slate(view: &SlateView) {
    println!("{} ({})", view.source, view.source_lang);
    println!("{} ({})", view.target, view.target_lang);
    if view.presets_badge_active() {
        println!("  presets: {}", view.applied_presets.join(", "));
    }
    if view.memories_badge_active() {
        for memory in &view.memories_used {
            println!("  memory {}: {}", memory.id, memory.message);
        }
    }
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "info,chattoz=debug,reqwest=warn,hyper=warn,tungstenite=warn".to_string()
        } else {
            "warn,chattoz=info".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // stdout carries the chat itself.
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!("chattoz {} starting, log level: {}", env!("CARGO_PKG_VERSION"), log_level);
    Ok(())
}
