//! docadmin: serve the admin pages, or manage admin users from the shell.
//!
//! Settings come from the environment (and `.env`); see `docadmin::AdminConfig`.

use clap::{Parser, Subcommand};
use docadmin::auth::{PASSWORD_HASH_KEY, PASSWORD_KEY};
use docadmin::{app, AdminConfig, AppState, DocId, Document, UserRef};
use rpassword::read_password;
use serde_json::Value;
use std::io::{self, Write};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the admin pages
    Serve {
        /// Listen address, overriding DOCADMIN_BIND
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// Create an admin user; prompts for the password when not given
    CreateUser {
        username: String,
        #[arg(long)]
        password: Option<String>,
        /// Extra attribute as key=value; value is parsed as JSON when it can be
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
    /// List admin users without their password hashes
    ListUsers {},
    /// Change attributes of an admin user
    UpdateUser {
        username: String,
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Remove an attribute
        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },
    /// Delete an admin user by username, or by id with --id
    DeleteUser {
        user: String,
        #[arg(long)]
        id: bool,
    },
    /// Insert, list and drop a scratch collection to check the store
    SelfCheck {},
}

/// Split `key=value`; the value is JSON when it parses, a string otherwise.
fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn parse_assignments(items: &[String]) -> Result<Document, String> {
    let mut doc = Document::new();
    for item in items {
        let (k, v) = parse_assignment(item)?;
        doc.insert(k, v);
    }
    Ok(doc)
}

fn prompt_new_password() -> io::Result<String> {
    loop {
        print!("Password: ");
        io::stdout().flush()?;
        let password = read_password()?;
        if password.is_empty() {
            eprintln!("Password must not be empty");
            continue;
        }
        print!("Confirm password: ");
        io::stdout().flush()?;
        if read_password()? != password {
            eprintln!("Passwords do not match. Please try again.");
            continue;
        }
        return Ok(password);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docadmin=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AdminConfig::from_env()?;
    let state = AppState::connect(config).await?;
    let auth = state.admin.auth();

    match cli.command {
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or(state.config.bind);
            let prefix = state.config.url_prefix.clone();
            let router = app(state.clone());
            let listener = TcpListener::bind(addr).await?;
            let port = listener.local_addr()?.port();
            tracing::info!("docadmin listening on http://{}:{}{}", addr.ip(), port, prefix);
            axum::serve(listener, router).await?;
        }
        Commands::CreateUser { username, password, attrs } => {
            let extra = parse_assignments(&attrs)?;
            let password = match password {
                Some(p) => p,
                None => prompt_new_password()?,
            };
            if auth.create_user(&username, &password, extra).await? {
                println!("created user '{}'", username);
            } else {
                return Err(format!("user '{}' already exists", username).into());
            }
        }
        Commands::ListUsers {} => {
            for user in auth.get_users().await? {
                let mut shown = user.to_json_with_id();
                if let Some(m) = shown.as_object_mut() {
                    m.shift_remove(PASSWORD_HASH_KEY);
                }
                println!("{}", shown);
            }
        }
        Commands::UpdateUser { username, set, unset, password } => {
            let mut changes = parse_assignments(&set)?;
            for key in unset {
                changes.insert(key, Value::Null);
            }
            if password {
                changes.insert(PASSWORD_KEY.into(), Value::String(prompt_new_password()?));
            }
            if !auth.update_user(&username, changes).await? {
                return Err(format!("no user '{}'", username).into());
            }
            println!("updated user '{}'", username);
        }
        Commands::DeleteUser { user, id } => {
            let target = if id {
                UserRef::Id(user.parse::<DocId>()?)
            } else {
                UserRef::Username(&user)
            };
            match auth.delete_user(target).await? {
                Some(removed) => println!("deleted user {}", removed.id),
                None => return Err(format!("no user '{}'", user).into()),
            }
        }
        Commands::SelfCheck {} => {
            state.admin.gateway().self_check().await?;
            println!("store ok");
        }
    }
    Ok(())
}
