//! `MarketChat`: marketplace listings, wishlist and buyer-seller chat from
//! the terminal.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/marketchat/config.toml`).
//!
//! ```bash
//! # Browse listings
//! cargo run --bin marketchat -- --user-id 2 --token tok-bob products
//!
//! # Chat with the seller of product 4
//! cargo run --bin marketchat -- --user-id 2 --token tok-bob chat --product 4
//!
//! # Or pick a room from your room list
//! MARKETCHAT_USER_ID=2 MARKETCHAT_TOKEN=tok-bob cargo run --bin marketchat -- chat
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use marketchat::backend::Marketplace;
use marketchat::backend::http::HttpMarketplace;
use marketchat::catalog::{CatalogView, ProductEntry, WishlistTransition};
use marketchat::chat::{
    BackOutcome, ChatController, ChatState, EntryMode, EventOutcome, IntervalRefresh,
    RefreshSource,
};
use marketchat::config::{CliArgs, ClientConfig, Command};
use marketchat::identity::IdentityContext;
use marketchat_proto::model::{MessageId, ProductId, RoomId, Timestamp};
use marketchat_proto::product::{ProductDraft, ProductStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

type AppResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file so they never interleave with the chat transcript.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(server = %config.server_url, "marketchat starting");

    let result = run(cli.command.clone().unwrap_or(Command::Products), &config).await;

    tracing::info!("marketchat exiting");
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns `None` if the log path has no parent directory or file name.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("marketchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: &ClientConfig) -> AppResult {
    let identity = Arc::new(config.identity()?);
    let backend = Arc::new(HttpMarketplace::new(
        &config.server_url,
        Arc::clone(&identity),
        config.request_timeout,
    )?);
    let mut catalog = CatalogView::new(
        Arc::clone(&backend),
        Arc::clone(&identity),
        config.wishlist_policy,
    );

    match command {
        Command::Products => {
            catalog.load().await?;
            print_products(catalog.entries());
        }
        Command::Mine => print_products(&catalog.my_listings().await?),
        Command::Wishes => print_products(&catalog.my_wishlist().await?),
        Command::Wish { product } => {
            catalog.load().await?;
            match catalog.toggle_wishlist(product).await? {
                WishlistTransition::Confirmed {
                    wishlisted: true, ..
                } => println!("Added product {product} to your wishlist."),
                WishlistTransition::Confirmed { .. } => {
                    println!("Removed product {product} from your wishlist.");
                }
                other => {
                    if let Some(notice) = catalog.notice() {
                        println!("{notice}");
                    } else {
                        println!("{other:?}");
                    }
                }
            }
        }
        Command::Sell {
            name,
            price,
            description,
        } => {
            let mut draft = ProductDraft::new(name, price);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            let product = catalog.create_listing(&draft).await?;
            println!("Listed [{}] {}.", product.id, product.name);
        }
        Command::SoldOut { product } => {
            set_status(&mut catalog, product, ProductStatus::SoldOut).await?;
        }
        Command::OnSale { product } => {
            set_status(&mut catalog, product, ProductStatus::OnSale).await?;
        }
        Command::Delete { product } => {
            catalog.load().await?;
            catalog.delete_listing(product).await?;
            println!("Deleted product {product}.");
        }
        Command::Rooms => {
            let mut chat = controller(backend, identity, config);
            chat.open()?;
            settle_room_list(&mut chat).await;
            Renderer::new(&config.timestamp_format).render(&chat);
        }
        Command::Chat { product, room } => {
            let mut chat = controller(backend, identity, config);
            if let Some(product) = product {
                catalog.load().await?;
                chat.start_chat(catalog.chat_target(product)?, EntryMode::FromProduct)?;
            } else {
                chat.open()?;
                if let Some(room) = room {
                    settle_room_list(&mut chat).await;
                    chat.select_room(room)?;
                }
            }
            run_chat(&mut chat, &config.timestamp_format).await?;
        }
    }
    Ok(())
}

fn controller(
    backend: Arc<HttpMarketplace>,
    identity: Arc<IdentityContext>,
    config: &ClientConfig,
) -> ChatController<HttpMarketplace> {
    ChatController::new(backend, identity, IntervalRefresh::new(config.poll_interval))
}

async fn set_status(
    catalog: &mut CatalogView<HttpMarketplace>,
    product: ProductId,
    status: ProductStatus,
) -> AppResult {
    catalog.load().await?;
    let updated = catalog.set_status(product, status).await?;
    println!("[{}] {} is now {}.", updated.id, updated.name, updated.status);
    Ok(())
}

/// Applies events until the room list load has finished either way.
async fn settle_room_list<M: Marketplace, R: RefreshSource>(chat: &mut ChatController<M, R>) {
    while matches!(chat.state(), ChatState::LoadingRoomList) {
        chat.pump().await;
    }
}

enum Input {
    Line(Option<String>),
    Event(marketchat::chat::ChatEvent),
}

/// Interactive chat loop over stdin.
async fn run_chat<M: Marketplace, R: RefreshSource>(
    chat: &mut ChatController<M, R>,
    timestamp_format: &str,
) -> AppResult {
    println!("Commands: /back  /refresh  /open <room>  /retry  /dismiss  /quit");
    let mut renderer = Renderer::new(timestamp_format);
    renderer.render(chat);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            Some(event) = chat.next_event() => Input::Event(event),
        };
        match input {
            Input::Event(event) => {
                if chat.handle_event(event) == EventOutcome::Updated {
                    renderer.render(chat);
                }
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => {
                if !handle_line(chat, line.trim()) {
                    break;
                }
                renderer.render(chat);
            }
        }
    }

    chat.close();
    Ok(())
}

/// Applies one line of user input. Returns `false` when the user leaves.
fn handle_line<M: Marketplace, R: RefreshSource>(
    chat: &mut ChatController<M, R>,
    line: &str,
) -> bool {
    let result = match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("/back", _) => match chat.back() {
            BackOutcome::ShowRoomList => Ok(()),
            BackOutcome::ExitChat => return false,
        },
        ("/refresh", _) => chat.refresh_now(),
        ("/retry", _) => chat.open(),
        ("/dismiss", _) => {
            chat.dismiss_notice();
            Ok(())
        }
        ("/open", arg) => match arg.trim().parse::<RoomId>() {
            Ok(room) => chat.select_room(room),
            Err(_) => {
                println!("! usage: /open <room id>");
                Ok(())
            }
        },
        _ if matches!(chat.state(), ChatState::RoomList { .. }) => {
            match line.parse::<RoomId>() {
                Ok(room) => chat.select_room(room),
                Err(_) => {
                    println!("! type a room id to open it");
                    Ok(())
                }
            }
        }
        _ => {
            chat.set_input(line);
            chat.send()
        }
    };
    if let Err(e) = result {
        println!("! {e}");
    }
    true
}

/// Prints state changes and new messages without repeating history.
struct Renderer<'a> {
    timestamp_format: &'a str,
    state: &'static str,
    room: Option<RoomId>,
    last_shown: Option<MessageId>,
    notice: Option<String>,
}

impl<'a> Renderer<'a> {
    const fn new(timestamp_format: &'a str) -> Self {
        Self {
            timestamp_format,
            state: "",
            room: None,
            last_shown: None,
            notice: None,
        }
    }

    fn render<M: Marketplace, R: RefreshSource>(&mut self, chat: &ChatController<M, R>) {
        let state = chat.state();
        let room = state.room().map(|r| r.id);
        let entered = state.name() != self.state || room != self.room;
        self.state = state.name();
        self.room = room;
        if entered {
            self.last_shown = None;
        }

        match state {
            ChatState::Idle => {}
            ChatState::LoadingRoomList => println!("Loading your chat rooms..."),
            ChatState::EnteringRoom { product_id } => {
                println!("Opening chat about product {product_id}...");
            }
            ChatState::RoomList { rooms } => {
                if rooms.is_empty() {
                    println!("No chat rooms yet.");
                }
                for room in rooms {
                    println!(
                        "  [{}] {} with {}: {}",
                        room.id,
                        room.product_name,
                        room.counterpart_name,
                        room.last_message.as_deref().unwrap_or("(no messages)")
                    );
                }
            }
            ChatState::Conversation { room, messages } => {
                if entered {
                    println!(
                        "== {} | chatting with {} ==",
                        room.product_name, room.counterpart_name
                    );
                }
                let last_shown = self.last_shown;
                for message in messages
                    .iter()
                    .filter(|m| last_shown.is_none_or(|seen| m.id > seen))
                {
                    let who = if chat.is_own(message) {
                        "you"
                    } else {
                        message.sender_name.as_str()
                    };
                    println!(
                        "[{}] {who}: {}",
                        format_timestamp(message.created_at, self.timestamp_format),
                        message.content
                    );
                    self.last_shown = Some(message.id);
                }
            }
            ChatState::Error { context } => println!("! {context} (type /retry)"),
        }

        let notice = chat.notice().map(ToString::to_string);
        if notice != self.notice {
            if let Some(text) = &notice {
                println!("! {text}");
            }
            self.notice = notice;
        }
    }
}

fn print_products(entries: &[ProductEntry]) {
    if entries.is_empty() {
        println!("No products.");
    }
    for entry in entries {
        let product = &entry.product;
        let actions = entry.actions();
        let mut offered = Vec::new();
        if actions.start_chat {
            offered.push("chat");
        }
        if actions.toggle_wishlist {
            offered.push(if product.is_wishlisted { "unwish" } else { "wish" });
        }
        if actions.edit {
            offered.push("edit");
        }
        if actions.change_status {
            offered.push("status");
        }
        if actions.delete {
            offered.push("delete");
        }
        println!(
            "[{}] {} - {} ({}) by {}{}  <{}>",
            product.id,
            product.name,
            product.price,
            product.status,
            if entry.is_owner {
                "you"
            } else {
                product.owner_name.as_str()
            },
            if product.is_wishlisted { " *" } else { "" },
            offered.join(", ")
        );
    }
}

/// Format a timestamp in local time with a chrono format string.
///
/// An invalid format string renders as `??:??` instead of panicking.
fn format_timestamp(ts: Timestamp, format: &str) -> String {
    use std::fmt::Write;

    use chrono::{Local, TimeZone};
    let ms = ts.as_millis();
    let secs = (ms / 1000).cast_signed();
    let nsecs = u32::try_from((ms % 1000) * 1_000_000).unwrap_or(0);
    let mut out = String::new();
    match Local.timestamp_opt(secs, nsecs) {
        chrono::LocalResult::Single(dt) if write!(out, "{}", dt.format(format)).is_ok() => out,
        _ => "??:??".to_string(),
    }
}
