//! sociable - command-line client for the sociable social network.
//!
//! Every command runs through the same `ApiClient`, so an expired access
//! token is refreshed transparently and a dead session is reported once.

mod format;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sociable_core::api::DEFAULT_MESSAGE_PAGE_SIZE;
use sociable_core::chat::RoomHistories;
use sociable_core::models::{
    unread_count, LoginRequest, NewComment, NewPost, RegisterRequest, ResetPasswordOtpRequest,
    ResetPasswordRequest, User, VerifyOtpRequest,
};
use sociable_core::{ApiClient, ApiError, AuthState, Config};

use format::{format_timestamp, plural, truncate_string};

/// Exit code when the session ended and the user must log in again
const EXIT_SESSION_EXPIRED: u8 = 2;

/// Width of content previews in listings
const PREVIEW_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "sociable", version, about = "Command-line client for sociable")]
struct Cli {
    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account; a one-time code is emailed for verification
    Register {
        username: String,
        email: String,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Verify a new account with the emailed code
    VerifyOtp { email: String, otp: String },
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Revoke the session on the backend and forget it locally
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Email a password reset code
    ForgotPassword { email: String },
    /// Set a new password using the emailed code
    ResetPassword { email: String, otp: String },
    /// List posts in the feed
    Feed,
    /// Publish a post
    Post {
        content: String,
        /// Attach a media URL (repeatable)
        #[arg(long = "media")]
        media: Vec<String>,
    },
    /// Like a post
    Like { post_id: String },
    /// Comment on a post
    Comment { post_id: String, content: String },
    /// Manage friends and friend requests
    #[command(subcommand)]
    Friends(FriendsCommand),
    /// List chat rooms
    Chats,
    /// Open a chat room with the given members
    NewChat {
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// Show messages in a chat room, newest first
    Messages {
        room_id: String,
        #[arg(long, default_value_t = DEFAULT_MESSAGE_PAGE_SIZE)]
        limit: u32,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Send a message to a chat room
    Send { room_id: String, content: String },
    /// List notifications
    Notifications,
    /// Mark a notification as read
    Read { notification_id: String },
}

#[derive(Subcommand)]
enum FriendsCommand {
    /// List friends
    List,
    /// Friend requests you sent
    Sent,
    /// Friend requests waiting for you
    Pending,
    /// Search users by name
    Search { query: String },
    /// Send a friend request
    Add { user_id: String },
    /// Accept a friend request
    Accept { user_id: String },
    /// Remove a friend
    Remove { user_id: String },
}

impl Command {
    /// Commands that work without a session.
    fn is_public(&self) -> bool {
        matches!(
            self,
            Command::Register { .. }
                | Command::VerifyOtp { .. }
                | Command::Login { .. }
                | Command::ForgotPassword { .. }
                | Command::ResetPassword { .. }
        )
    }
}

/// Initialize the tracing subscriber. The returned guard flushes the log
/// file and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g. RUST_LOG=sociable_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sociable.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ApiError>() {
            Some(api_error) if api_error.is_session_expired() => {
                eprintln!("Session expired. Please log in again.");
                ExitCode::from(EXIT_SESSION_EXPIRED)
            }
            _ => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(command: Command) -> Result<()> {
    let mut config = Config::load()?;
    let session = config.open_session()?;
    let client = ApiClient::from_config(&config, session.clone())?;
    info!(base_url = %config.api_base_url(), "Client ready");

    if !command.is_public() && !session.is_authenticated().await {
        bail!("Not logged in. Run `sociable login` first.");
    }
    let logging_out = matches!(command, Command::Logout);
    let auth_changes = session.subscribe();

    match command {
        Command::Register {
            username,
            email,
            avatar_url,
            bio,
        } => {
            let password = prompt_password()?;
            let ack = client
                .register(&RegisterRequest {
                    username,
                    email: email.clone(),
                    password,
                    avatar_url,
                    bio,
                })
                .await?;
            print_ack(ack.message, "Registered.");
            println!("Check {} for a code, then run `sociable verify-otp`.", email);
        }
        Command::VerifyOtp { email, otp } => {
            let ack = client.verify_otp(&VerifyOtpRequest { email, otp }).await?;
            print_ack(ack.message, "Account verified.");
        }
        Command::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt_email(config.last_email.as_deref())?,
            };
            let password = prompt_password()?;

            println!("\nAuthenticating...");
            let user = client
                .login(&LoginRequest {
                    email: email.clone(),
                    password,
                    device_token: None,
                })
                .await?;

            config.last_email = Some(email);
            config.save()?;

            match user {
                Some(user) => println!("Logged in as {}.", user.display_name()),
                None => println!("Login successful!"),
            }
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => {
            let user = client.get_user().await?;
            println!("{} ({})", user.display_name(), user.id);
            if let Some(email) = &user.email {
                println!("  {}", email);
            }
            if let Some(bio) = &user.bio {
                println!("  {}", bio);
            }
        }
        Command::ForgotPassword { email } => {
            let ack = client
                .send_reset_password_otp(&ResetPasswordOtpRequest { email })
                .await?;
            print_ack(ack.message, "Reset code sent.");
        }
        Command::ResetPassword { email, otp } => {
            let new_password = rpassword::prompt_password("New password: ")?;
            let ack = client
                .reset_password(&ResetPasswordRequest {
                    email,
                    otp,
                    new_password,
                })
                .await?;
            print_ack(ack.message, "Password updated.");
        }
        Command::Feed => {
            let me = viewer(client.get_user().await)?;
            let posts = client.get_posts().await?;
            if posts.is_empty() {
                println!("No posts yet.");
            }
            for post in &posts {
                let liked = me
                    .as_ref()
                    .map(|u| post.is_liked_by(&u.id))
                    .unwrap_or(false);
                println!(
                    "{}  {}  {}",
                    post.id,
                    post.author.username.as_deref().unwrap_or("unknown"),
                    format_timestamp(post.created_at)
                );
                println!("  {}", truncate_string(&post.content, PREVIEW_WIDTH));
                if !post.media_urls.is_empty() {
                    let kind = if post.has_video() { "video" } else { "image" };
                    println!("  [{}] {}", kind, plural(post.media_urls.len(), "attachment"));
                }
                println!(
                    "  {}{}, {}",
                    plural(post.like_count(), "like"),
                    if liked { " (you)" } else { "" },
                    plural(post.comments.len(), "comment")
                );
                if let Some(latest) = post.comments.last() {
                    println!(
                        "    {}: {}",
                        latest.author_name(),
                        truncate_string(&latest.content, PREVIEW_WIDTH)
                    );
                }
            }
        }
        Command::Post { content, media } => {
            let post = client
                .create_post(&NewPost {
                    content,
                    media_urls: media,
                })
                .await?;
            println!("Posted {}.", post.id);
        }
        Command::Like { post_id } => {
            let user = client.get_user().await?;
            let ack = client.like_post(&post_id, &user.id).await?;
            print_ack(ack.message, "Liked.");
        }
        Command::Comment { post_id, content } => {
            let ack = client
                .add_comment(&post_id, &NewComment { content })
                .await?;
            print_ack(ack.message, "Comment added.");
        }
        Command::Friends(friends) => run_friends(&client, friends).await?,
        Command::Chats => {
            let chats = client.get_user_chats().await?;
            if chats.chat_rooms.is_empty() {
                println!("No chats yet.");
            }
            for room in &chats.chat_rooms {
                println!(
                    "{}  {}",
                    room.id,
                    room.display_name.as_deref().unwrap_or("(unnamed)")
                );
            }
        }
        Command::NewChat { members } => {
            let room = client.create_chat_room(members).await?;
            println!("Chat room {} ready.", room.id);
        }
        Command::Messages {
            room_id,
            limit,
            pages,
        } => {
            let mut histories = RoomHistories::with_page_size(limit);
            for _ in 0..pages.max(1) {
                if histories.load_more(&client, &room_id).await? == 0 {
                    break;
                }
            }
            let history = histories.room_mut(&room_id);
            if history.is_empty() {
                println!("No messages.");
            }
            for message in &history.messages {
                println!(
                    "[{}] {}: {}",
                    format_timestamp(message.timestamp),
                    message.sender_name.as_deref().unwrap_or(&message.sender_id),
                    message.content
                );
            }
            if history.has_more {
                println!("(older messages available, use --pages)");
            }
        }
        Command::Send { room_id, content } => {
            let message = client.send_message(&room_id, &content).await?;
            println!("Sent at {}.", format_timestamp(message.timestamp));
        }
        Command::Notifications => {
            let notifications = client.get_notifications().await?;
            println!("{} unread", unread_count(&notifications));
            for n in &notifications {
                println!(
                    "{} {}  {}  {}",
                    if n.is_read { " " } else { "*" },
                    n.id,
                    n.title,
                    truncate_string(&n.body, PREVIEW_WIDTH)
                );
            }
        }
        Command::Read { notification_id } => {
            let ack = client.mark_notification_read(&notification_id).await?;
            print_ack(ack.message, "Marked as read.");
        }
    }

    // A refresh that failed mid-command ends the session even if the command
    // itself tolerated the error.
    if !logging_out
        && auth_changes.has_changed().unwrap_or(false)
        && *auth_changes.borrow() == AuthState::Unauthenticated
    {
        eprintln!("Session expired. Please log in again.");
    }

    Ok(())
}

async fn run_friends(client: &ApiClient, command: FriendsCommand) -> Result<()> {
    let (people, empty) = match command {
        FriendsCommand::List => (client.get_friends().await?, "No friends yet."),
        FriendsCommand::Sent => (client.get_sent_requests().await?, "No sent requests."),
        FriendsCommand::Pending => (client.get_received_requests().await?, "No pending requests."),
        FriendsCommand::Search { query } => (client.search_users(&query).await?, "No matches."),
        FriendsCommand::Add { user_id } => {
            let ack = client.send_friend_request(&user_id).await?;
            print_ack(ack.message, "Friend request sent.");
            return Ok(());
        }
        FriendsCommand::Accept { user_id } => {
            let ack = client.accept_friend_request(&user_id).await?;
            print_ack(ack.message, "Friend request accepted.");
            return Ok(());
        }
        FriendsCommand::Remove { user_id } => {
            let ack = client.remove_friend(&user_id).await?;
            print_ack(ack.message, "Friend removed.");
            return Ok(());
        }
    };

    if people.is_empty() {
        println!("{}", empty);
    }
    for friend in &people {
        match &friend.chat_room {
            Some(room) => println!("{}  {}  (chat {})", friend.id, friend.username, room.id),
            None => println!("{}  {}", friend.id, friend.username),
        }
    }
    Ok(())
}

/// The logged-in user, if it could be fetched. Only a dead session is fatal;
/// the feed still renders without "liked by you" markers otherwise.
fn viewer(result: Result<User, ApiError>) -> Result<Option<User>, ApiError> {
    match result {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.is_session_expired() => Err(e),
        Err(e) => {
            warn!(error = %e, "Could not fetch current user");
            Ok(None)
        }
    }
}

fn print_ack(message: Option<String>, fallback: &str) {
    println!("{}", message.as_deref().unwrap_or(fallback));
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last_email) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Email required"),
        (false, _) => Ok(input.to_string()),
    }
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password required");
    }
    Ok(password)
}
