//! BookHub CLI - sign in, manage the cart and rent books from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from BOOKHUB_PASSWORD or --password)
//! bookhub login -e reader@example.com
//!
//! # Fill the cart and rent it
//! bookhub cart add 64f1c0ffee --title "Dune" --price 12.50 --quantity 2
//! bookhub cart show
//! bookhub checkout
//!
//! # Rentals
//! bookhub rentals history
//! bookhub rentals return 650a11aa
//! ```
//!
//! # Environment Variables
//!
//! See [`bookhub_client::config`]. Sessions and the cart are kept in the
//! file named by `BOOKHUB_STORAGE_PATH`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use bookhub_client::ClientConfig;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{App, CommandError};

#[derive(Parser)]
#[command(name = "bookhub")]
#[command(author, version, about = "BookHub command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as a member
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BOOKHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in to the back office
    AdminLogin {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BOOKHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a member account and sign in
    Register {
        /// Full name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BOOKHUB_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        phone: Option<String>,
    },
    /// Sign out and clear stored credentials
    Logout,
    /// Show who is signed in
    Whoami,
    /// Show or edit the signed-in account
    Profile {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Rent everything in the cart
    Checkout,
    /// Rental history and returns
    Rentals {
        #[command(subcommand)]
        action: RentalsAction,
    },
    /// Show recommended books (Ctrl+C aborts the fetch)
    Recommendations {
        /// Ignore the cache
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add copies of a book
    Add {
        book_id: String,

        #[arg(short, long)]
        title: String,

        /// Unit price, e.g. 12.50
        #[arg(short, long)]
        price: Decimal,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a book
    Remove { book_id: String },
    /// Set the number of copies of a book
    Set { book_id: String, quantity: u32 },
    /// List the cart with totals
    Show,
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum RentalsAction {
    /// List all rentals
    History,
    /// Return a rented book
    Return { rental_id: String },
}

/// Initialize Sentry error tracking and return the guard that must be kept
/// alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Map tracing levels onto Sentry events and breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is loaded first so Sentry is up before tracing.
    let config = ClientConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bookhub=info,bookhub_client=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CommandError::from(e)),
    };

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e.user_message());
            ExitCode::FAILURE
        }
    };

    drop(sentry_guard);
    code
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CommandError> {
    let app = App::start(config).await?;

    let result = match cli.command {
        Commands::Login { email, password } => commands::auth::login(&app, &email, password, false).await,
        Commands::AdminLogin { email, password } => {
            commands::auth::login(&app, &email, password, true).await
        }
        Commands::Register {
            name,
            email,
            password,
            phone,
        } => commands::auth::register(&app, name, email, password, phone).await,
        Commands::Logout => {
            commands::auth::logout(&app);
            Ok(())
        }
        Commands::Whoami => {
            commands::auth::whoami(&app);
            Ok(())
        }
        Commands::Profile { name, email, phone } => {
            commands::auth::profile(&app, name, email, phone).await
        }
        Commands::Cart { action } => match action {
            CartAction::Add {
                book_id,
                title,
                price,
                quantity,
            } => commands::cart::add(&app, book_id, title, price, quantity),
            CartAction::Remove { book_id } => commands::cart::remove(&app, &book_id),
            CartAction::Set { book_id, quantity } => commands::cart::set(&app, &book_id, quantity),
            CartAction::Show => {
                commands::cart::show(&app);
                Ok(())
            }
            CartAction::Clear => commands::cart::clear(&app),
        },
        Commands::Checkout => commands::cart::checkout(&app).await,
        Commands::Rentals { action } => match action {
            RentalsAction::History => commands::rentals::history(&app).await,
            RentalsAction::Return { rental_id } => commands::rentals::return_rental(&app, rental_id).await,
        },
        Commands::Recommendations { refresh } => commands::rentals::recommendations(&app, refresh).await,
    };

    app.report_redirects();
    result
}
