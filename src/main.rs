use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod error;
mod http_client;
mod models;

use auth::{AuthManager, FileTokenStore, LoginRequest, SignupRequest};
use error::ApiError;
use http_client::JakbuClient;
use models::{CreateTodoRequest, Todo};

/// Command-line client for the JakBu to-do service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: config::GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and start a session
    Signup {
        account_id: String,
        name: String,
        /// Password; prompted interactively when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Log in and store the session
    Login {
        account_id: String,
        /// Password; prompted interactively when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Add a to-do item
    Add {
        title: String,
        /// Date in YYYY-MM-DD form; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show today's to-do list
    Today,

    /// Show the to-do list for a date
    List { date: NaiveDate },

    /// Flip an item between done and not done
    Done { id: i64 },

    /// Set an item's completion state explicitly
    Status {
        id: i64,
        /// Mark done; without this flag the item is marked not done
        #[arg(long)]
        done: bool,
    },

    /// Delete an item
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = config::Config::load(cli.global)?;
    config.validate()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let store = Arc::new(FileTokenStore::open(&config.credentials_file));

    let refresh_http = Client::builder()
        .timeout(Duration::from_secs(config.request_timeout))
        .build()
        .context("Failed to create HTTP client")?;
    let refresh_url = config.base_url.join("/auth/refresh-token")?.to_string();
    let auth = Arc::new(AuthManager::new(store, refresh_http, refresh_url));

    let client = JakbuClient::new(
        config.base_url.clone(),
        auth,
        config.connect_timeout,
        config.request_timeout,
    )?;

    match run(cli.command, &client).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if e.downcast_ref::<ApiError>()
                .is_some_and(ApiError::is_session_expired)
            {
                eprintln!("Your session has expired. Run `jakbu login` to sign in again.");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

async fn run(command: Command, client: &JakbuClient) -> Result<()> {
    match command {
        Command::Signup {
            account_id,
            name,
            password,
        } => {
            let password = password_or_prompt(password, true)?;
            let request = SignupRequest {
                account_id,
                password,
                name,
            };
            match client.signup(&request).await {
                Ok(session) => println!("Welcome, {}! You are now logged in.", session.name),
                Err(ApiError::SessionExpired) => {
                    anyhow::bail!("signup failed: the server rejected the request")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Login {
            account_id,
            password,
        } => {
            let password = password_or_prompt(password, false)?;
            let request = LoginRequest {
                account_id,
                password,
            };
            match client.login(&request).await {
                Ok(session) => println!("Logged in as {}.", session.name),
                Err(ApiError::SessionExpired) => {
                    anyhow::bail!("login failed: check your account ID and password")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Logout => {
            client.logout();
            println!("Logged out.");
        }

        Command::Add { title, date } => {
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let todo = client.create_todo(&CreateTodoRequest { title, date }).await?;
            println!("Added #{}: {} ({})", todo.id, todo.title, todo.date);
        }

        Command::Today => {
            let todos = client.today_todos().await?;
            print_todos(&todos);
        }

        Command::List { date } => {
            let todos = client.todos_on(date).await?;
            print_todos(&todos);
        }

        Command::Done { id } => {
            let todo = client.toggle_todo_done(id).await?;
            let state = if todo.status.is_done() { "done" } else { "not done" };
            println!("#{} {} is now {}.", todo.id, todo.title, state);
        }

        Command::Status { id, done } => {
            let todo = client.set_todo_status(id, done).await?;
            let state = if todo.status.is_done() { "done" } else { "not done" };
            println!("#{} {} is now {}.", todo.id, todo.title, state);
        }

        Command::Delete { id } => {
            client.delete_todo(id).await?;
            println!("Deleted #{}.", id);
        }
    }

    Ok(())
}

fn password_or_prompt(provided: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }

    let mut prompt = dialoguer::Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().context("Failed to read password")
}

fn print_todos(todos: &[Todo]) {
    if todos.is_empty() {
        println!("Nothing to do.");
        return;
    }

    for todo in todos {
        let mark = if todo.status.is_done() { "x" } else { " " };
        println!("[{}] #{:<4} {}  ({})", mark, todo.id, todo.title, todo.date);
    }
}
