mod chat;

use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    banter_client::{ApiClient, ProfileUpdate},
    banter_config::BanterConfig,
    banter_session::{AuthGateway, ProfileService, SessionStore},
};

#[derive(Parser)]
#[command(name = "banter", about = "Banter — group chat client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account.
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "BANTER_PASSWORD")]
        password: String,
    },
    /// Log in and persist the session.
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "BANTER_PASSWORD")]
        password: String,
    },
    /// End the session. The local session always ends, even when the
    /// backend is unreachable.
    Logout,
    /// Show the restored session, if any.
    Whoami,
    /// Profile management.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Join the room: polls for messages and sends stdin lines.
    Chat,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the current profile.
    Show,
    /// Change username and/or password.
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long, env = "BANTER_NEW_PASSWORD")]
        password: Option<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Shared wiring: config, API client, and the restored session.
struct App {
    config: BanterConfig,
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
}

impl App {
    fn init() -> anyhow::Result<Self> {
        let config = banter_config::discover_and_load();
        let client = Arc::new(ApiClient::new(&config.server.base_url)?);
        let store = Arc::new(SessionStore::open(&banter_config::state_dir(&config)));
        store.load();
        debug!(server = %config.server.base_url, "client initialized");
        Ok(Self {
            config,
            client,
            store,
        })
    }

    fn gateway(&self) -> AuthGateway {
        AuthGateway::new(Arc::clone(&self.client), Arc::clone(&self.store))
    }

    fn profile(&self) -> ProfileService {
        ProfileService::new(Arc::clone(&self.client), Arc::clone(&self.store))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let app = App::init()?;

    match cli.command {
        Commands::Register { username, password } => {
            let registered = app.gateway().register(&username, &password).await?;
            println!("registered '{}' (id {})", registered.username, registered.id);
            Ok(())
        },
        Commands::Login { username, password } => {
            let identity = app.gateway().login(&username, &password).await?;
            println!("logged in as '{}'", identity.username);
            Ok(())
        },
        Commands::Logout => {
            app.gateway().logout().await;
            println!("logged out");
            Ok(())
        },
        Commands::Whoami => {
            match app.store.session() {
                Some(session) => {
                    println!("'{}' (id {})", session.user.username, session.user.id);
                },
                None => println!("not logged in"),
            }
            Ok(())
        },
        Commands::Profile { action } => match action {
            ProfileAction::Show => {
                let profile = app.profile().fetch().await?;
                println!(
                    "'{}' (id {}), registered {}",
                    profile.username,
                    profile.id,
                    profile.created_at.format("%Y-%m-%d %H:%M")
                );
                Ok(())
            },
            ProfileAction::Update { username, password } => {
                let profile = app
                    .profile()
                    .update(ProfileUpdate { username, password })
                    .await?;
                println!("profile updated: '{}'", profile.username);
                Ok(())
            },
        },
        Commands::Chat => {
            chat::run(
                Arc::clone(&app.client),
                Arc::clone(&app.store),
                std::time::Duration::from_millis(app.config.feed.poll_interval_ms),
                app.config.feed.page_limit,
            )
            .await
        },
    }
}
