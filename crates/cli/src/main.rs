//! Bramble Market CLI - storefront cart and session driver.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of product 101 at its catalog price
//! bramble add 101 --price 19.99 --quantity 2
//!
//! # Show the cart with the checkout summary
//! bramble show
//!
//! # Log in (merges the anonymous cart with the server-side one)
//! bramble login -u maria -p secret
//! ```
//!
//! # Commands
//!
//! - `show` / `count` - read the current cart
//! - `add` / `update` / `remove` / `clear` - mutate the cart
//! - `sync` - re-run the server reconciliation manually
//! - `login` / `signup` / `logout` / `whoami` - session management
//!
//! Configuration comes from the environment (see `BRAMBLE_*` variables in
//! the client crate).

#![cfg_attr(not(test), forbid(unsafe_code))]
// User-facing CLI output goes to stdout by design.
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use bramble_market_client::StorefrontSession;

mod commands;

#[derive(Parser)]
#[command(name = "bramble")]
#[command(author, version, about = "Bramble Market storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart lines and the checkout summary
    Show,
    /// Show the total unit count (the nav badge number)
    Count,
    /// Add a product to the cart
    Add {
        /// Product id
        product_id: i32,

        /// Unit price from the catalog page
        #[arg(short, long)]
        price: Decimal,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (zero or less removes the line)
    Update {
        /// Product id
        product_id: i32,

        /// New quantity
        quantity: i64,
    },
    /// Remove a product from the cart
    Remove {
        /// Product id
        product_id: i32,
    },
    /// Empty the cart
    Clear,
    /// Reconcile the cart with the server (requires a session)
    Sync,
    /// Log in and merge the anonymous cart with the server-side one
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account and log in
    Signup {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Drop the session and the device-local cart copy
    Logout,
    /// Show the current session identity
    Whoami,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let session = StorefrontSession::from_env()?;
    session.cart().init().await;

    match cli.command {
        Commands::Show => commands::cart::show(&session),
        Commands::Count => commands::cart::count(&session),
        Commands::Add {
            product_id,
            price,
            quantity,
        } => commands::cart::add(&session, product_id, price, quantity),
        Commands::Update {
            product_id,
            quantity,
        } => commands::cart::update(&session, product_id, quantity),
        Commands::Remove { product_id } => commands::cart::remove(&session, product_id),
        Commands::Clear => commands::cart::clear(&session),
        Commands::Sync => commands::cart::sync(&session).await,
        Commands::Login { username, password } => {
            commands::auth::login(&session, &username, &password).await?;
        }
        Commands::Signup {
            username,
            email,
            password,
        } => commands::auth::signup(&session, username, email, password).await?,
        Commands::Logout => commands::auth::logout(&session),
        Commands::Whoami => commands::auth::whoami(&session),
    }

    // One-shot process: wait for the background persist cycle before exit.
    session.cart().flush().await;
    Ok(())
}
