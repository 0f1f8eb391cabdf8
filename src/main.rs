use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rmcloud_session::{
    ApiError, AuthApi, ConfigError, FileStore, GuardDecision, HttpAuthApi, Identity, Notice, NoticeLevel, RouteGuard,
    SessionConfig, SessionError, SessionEvent, SessionManager, SessionOptions,
};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("not logged in; run `rmcloud-session login` first")]
    NotLoggedIn,
}

#[derive(Parser, Debug)]
#[command(name = "rmcloud-session", about = "rmCloud login session client")]
struct Cli {
    /// Backend base URL (overrides SESSION_API_URL).
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding the persisted session (overrides SESSION_STORE_DIR).
    #[arg(long)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange an emailed access code for a session.
    Login {
        #[arg(long, env = "RMCLOUD_EMAIL")]
        email: String,
        #[arg(long)]
        code: String,
        /// Page to land on after login.
        #[arg(long)]
        return_to: Option<String>,
    },
    /// Forget the persisted session.
    Logout,
    /// Show the persisted session without contacting the backend.
    Status,
    /// Validate the persisted session against the backend once.
    Check,
    /// Keep validating on the poll interval until the session ends or Ctrl-C.
    Watch,
    /// Show the backend's server descriptor.
    About,
    /// Evaluate the navigation guard for a path.
    Guard { path: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SessionConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_owned();
    }
    if let Some(store_dir) = cli.store_dir {
        config.store_dir = store_dir;
    }

    let api = Arc::new(HttpAuthApi::new(&config)?);
    let store = Arc::new(FileStore::new(&config.store_dir));
    let session = SessionManager::new(api.clone(), store, SessionOptions::from(&config));

    match cli.command {
        Command::Login { email, code, return_to } => run_login(&session, &email, &code, return_to).await,
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Status => {
            match session.user() {
                Some(user) => print_identity(&user),
                None => println!("not logged in"),
            }
            Ok(())
        }
        Command::Check => run_check(&session).await,
        Command::Watch => run_watch(&session).await,
        Command::About => {
            let about = api.about().await?;
            println!("{}", about.summary());
            Ok(())
        }
        Command::Guard { path } => {
            match RouteGuard::new(session).check(&path) {
                GuardDecision::Allow => println!("allow {path}"),
                GuardDecision::Redirect(to) => println!("redirect {path} -> {to}"),
            }
            Ok(())
        }
    }
}

async fn run_login(
    session: &SessionManager,
    email: &str,
    code: &str,
    return_to: Option<String>,
) -> Result<(), CliError> {
    // Recorded directly: the guard skips already-authenticated sessions.
    if let Some(path) = return_to {
        session.set_return_url(path);
    }
    let mut events = session.subscribe();
    let result = session.login(code, email).await;
    print_pending(&mut events);
    let user = result?;
    print_identity(&user);
    Ok(())
}

async fn run_check(session: &SessionManager) -> Result<(), CliError> {
    if !session.is_authenticated() {
        return Err(CliError::NotLoggedIn);
    }
    let mut events = session.subscribe();
    let result = session.check_validity().await;
    print_pending(&mut events);
    print_identity(&result?);
    Ok(())
}

async fn run_watch(session: &SessionManager) -> Result<(), CliError> {
    if !session.is_authenticated() {
        return Err(CliError::NotLoggedIn);
    }
    let mut events = session.subscribe();
    session.start_validity_polling();
    println!("watching session (interval {}s), Ctrl-C to stop", session.options().poll_interval.as_secs());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.stop_validity_polling();
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    if event == SessionEvent::Notify(Notice::SessionExpired) || !session.is_authenticated() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    Ok(())
}

fn print_pending(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Notify(notice) => {
            let tag = match notice.level() {
                NoticeLevel::Success => "ok",
                NoticeLevel::Warning => "warn",
                NoticeLevel::Error => "error",
            };
            println!("[{tag}] {}", notice.message());
        }
        SessionEvent::Navigate(path) => println!("-> {path}"),
    }
}

fn print_identity(user: &Identity) {
    println!("logged in as {}", user.email().unwrap_or("<unknown>"));
    let scope: Vec<&str> = user.scope().iter().map(String::as_str).collect();
    println!("scope: {}", if scope.is_empty() { "-".to_owned() } else { scope.join(" ") });
    if user.is_admin() {
        println!("admin: yes");
    }
    if let Some(expiry) = user.expires_at() {
        println!("expires: {expiry}");
    }
}
