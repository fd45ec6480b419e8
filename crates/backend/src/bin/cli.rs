use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use shared_types::User;

use support_relay::{
    db,
    relay::{lookup_category, IntercomClient, IntercomConfig},
    repository::{PgSessionStore, PgUserStore, SessionStore, UserStore},
};

#[derive(Parser)]
#[command(name = "support-admin")]
#[command(about = "Operator tool for the support relay's users, sessions and messages")]
struct Cli {
    /// Postgres connection string used for user and session commands.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect users created by Google login
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Maintain the session table
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Query relayed support requests
    Messages {
        #[command(subcommand)]
        action: MessageAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List every user, newest first
    List,

    /// Show a single user by Google account id
    Show {
        /// The provider's stable account id (the `sub` claim).
        google_id: String,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Delete every session whose expiry has passed
    Purge,
}

#[derive(Subcommand)]
enum MessageAction {
    /// List messages whose subject equals CATEGORY exactly
    List {
        category: String,

        /// Print the raw JSON array instead of a summary
        #[arg(long)]
        json: bool,

        #[arg(long, env = "INTERCOM_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        #[arg(long, env = "INTERCOM_API_URL", default_value = "https://api.intercom.io")]
        api_url: String,

        #[arg(long, env = "INTERCOM_PAGE_SIZE", default_value_t = 50)]
        page_size: u32,

        #[arg(long, env = "INTERCOM_MAX_PAGES", default_value_t = 20)]
        max_pages: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "support_relay=warn".into()),
        )
        .init();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    match cli.command {
        Commands::Users { action } => {
            let pool = connect(cli.database_url.as_deref())?;
            handle_users(&PgUserStore::new(pool), action).await?
        }
        Commands::Sessions { action } => {
            let pool = connect(cli.database_url.as_deref())?;
            handle_sessions(&PgSessionStore::new(pool), action).await?
        }
        Commands::Messages { action } => handle_messages(action).await?,
    }

    Ok(())
}

fn connect(database_url: Option<&str>) -> anyhow::Result<db::DbPool> {
    let url = database_url.context("DATABASE_URL must be set (or pass --database-url)")?;
    db::establish_connection_pool(url, 2)
}

fn print_user(user: &User) {
    println!(
        "[{}] {} <{}> google:{}",
        &user.id.to_string()[..8],
        user.name,
        user.email,
        user.google_id
    );
}

async fn handle_users(store: &dyn UserStore, action: UserAction) -> anyhow::Result<()> {
    match action {
        UserAction::List => {
            let users = store.list().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                for user in &users {
                    print_user(user);
                }
            }
        }
        UserAction::Show { google_id } => match store.find_by_google_id(&google_id).await? {
            Some(user) => {
                print_user(&user);
                println!("    Created: {}", user.created_at.format("%Y-%m-%d %H:%M"));
                println!("    Updated: {}", user.updated_at.format("%Y-%m-%d %H:%M"));
            }
            None => anyhow::bail!("No user with google id {}", google_id),
        },
    }

    Ok(())
}

async fn handle_sessions(store: &dyn SessionStore, action: SessionAction) -> anyhow::Result<()> {
    match action {
        SessionAction::Purge => {
            let removed = store.purge_expired(Utc::now()).await?;
            println!("Purged {} expired sessions", removed);
        }
    }

    Ok(())
}

async fn handle_messages(action: MessageAction) -> anyhow::Result<()> {
    match action {
        MessageAction::List {
            category,
            json,
            access_token,
            api_url,
            page_size,
            max_pages,
        } => {
            let client = IntercomClient::new(
                reqwest::Client::new(),
                IntercomConfig {
                    access_token,
                    admin_id: String::new(),
                    api_url: api_url.trim_end_matches('/').to_string(),
                    page_size,
                    max_pages: max_pages.max(1),
                },
            );

            let listing = lookup_category(&client, &category).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&listing.messages)?);
            } else if listing.messages.is_empty() {
                println!("No messages found for {:?}.", category);
            } else {
                for message in &listing.messages {
                    println!("[{}] {}", message.id, message.subject);
                    if !message.body.is_empty() {
                        println!("    {}", message.body);
                    }
                }
            }

            if listing.truncated {
                eprintln!("Warning: listing was truncated after {} pages", max_pages);
            }
        }
    }

    Ok(())
}
