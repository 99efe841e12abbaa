//! Parcel Session CLI
//!
//! Drives the booking app's sign-in session against the on-disk local
//! storage: restore the stored session, sign in with a credential handed back
//! by the Google redirect, sign out, or print what the booking screen shows.

use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use parcel_session::provider::{
    Credential, PresentedCredential, ProviderConfig, ProviderConfigJson, UserInfoClient,
};
use parcel_session::session::{
    spawn_expiry_watch, RedbStore, SessionConfig, SessionConfigJson, SessionManager,
    SessionState,
};
use parcel_session::Identity;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "parcel-session")]
#[command(about = "Google sign-in session for the parcel booking app")]
struct Args {
    /// Path to the local storage file
    #[arg(long, env = "PARCEL_SESSION_STORE")]
    store: Option<PathBuf>,

    /// JSON config file with `session` and `provider` sections
    #[arg(long, env = "PARCEL_SESSION_CONFIG")]
    config: Option<PathBuf>,

    /// OAuth client ID
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    client_id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, env = "PARCEL_SESSION_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the stored session and print the identity (or null)
    Status,
    /// Print the URL that starts the Google redirect sign-in
    AuthorizeUrl {
        /// Where the provider sends the token back
        #[arg(long, default_value = "http://localhost:8081/auth/callback")]
        redirect_uri: String,
    },
    /// Sign in with a credential obtained from the provider
    SignIn(SignInArgs),
    /// Clear the stored session
    SignOut,
    /// Print the greeting the booking screen shows
    Greet,
    /// Print identity changes until the session expires or Ctrl-C
    Watch,
}

#[derive(ClapArgs, Debug)]
struct SignInArgs {
    #[command(flatten)]
    credential: CredentialArgs,

    /// Credential lifetime in seconds as declared by the provider
    #[arg(long)]
    expires_in: Option<u64>,
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
struct CredentialArgs {
    /// Signed identity token (JWT)
    #[arg(long)]
    id_token: Option<String>,

    /// Opaque access token, exchanged at the userinfo endpoint
    #[arg(long)]
    access_token: Option<String>,

    /// Full redirect callback URL including the `#access_token=...` fragment
    #[arg(long)]
    callback_url: Option<String>,
}

/// JSON config file layout
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct AppConfigJson {
    #[serde(default)]
    session: SessionConfigJson,
    #[serde(default)]
    provider: ProviderConfigJson,
}

fn load_config(args: &Args) -> Result<(SessionConfig, ProviderConfig)> {
    let mut session_config = SessionConfig::default();
    let mut provider_config = ProviderConfig::default();

    if let Some(path) = &args.config {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let json: AppConfigJson = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        json.session.apply_to(&mut session_config);
        json.provider.apply_to(&mut provider_config);
    }

    if let Some(store) = &args.store {
        session_config.store_path = store.clone();
    }
    if let Some(client_id) = &args.client_id {
        provider_config.client_id = client_id.clone();
    }

    session_config
        .validate()
        .map_err(|e| anyhow!("Session config validation failed: {}", e))?;
    provider_config
        .validate()
        .map_err(|e| anyhow!("Provider config validation failed: {}", e))?;

    Ok((session_config, provider_config))
}

fn presented_credential(args: &SignInArgs) -> Result<PresentedCredential> {
    let credential = &args.credential;

    if let Some(url) = &credential.callback_url {
        return Ok(PresentedCredential::from_callback(url));
    }
    if let Some(token) = &credential.id_token {
        return Ok(PresentedCredential::new(Credential::IdToken {
            token: token.clone(),
            expires_in: args.expires_in,
        }));
    }
    if let Some(token) = &credential.access_token {
        return Ok(PresentedCredential::new(Credential::AccessToken {
            token: token.clone(),
            expires_in: args.expires_in,
        }));
    }

    Err(anyhow!("No credential provided"))
}

fn print_identity(identity: Option<&Identity>) -> Result<()> {
    let json = serde_json::to_string_pretty(&identity).context("Failed to serialize identity")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let (session_config, provider_config) = load_config(&args)?;

    if let Command::AuthorizeUrl { redirect_uri } = &args.command {
        let url = provider_config
            .authorization_url(redirect_uri)
            .map_err(|e| anyhow!("{}", e))?;
        println!("{}", url);
        return Ok(());
    }

    let store = RedbStore::open(session_config.store_path.clone())?;
    info!(path = ?store.path(), "Local storage ready");

    let provider = match &args.command {
        Command::SignIn(sign_in) => presented_credential(sign_in)?,
        _ => PresentedCredential::empty(),
    };
    let profiles = UserInfoClient::new(&provider_config)?;
    let profile_timeout = std::time::Duration::from_secs(provider_config.userinfo_timeout_secs);

    let manager = Arc::new(
        SessionManager::new(
            session_config.clone(),
            Arc::new(store),
            Arc::new(provider),
            Arc::new(profiles),
        )
        .with_profile_timeout(profile_timeout),
    );

    let restored = manager.restore();

    match args.command {
        Command::Status => print_identity(restored.as_ref())?,
        Command::AuthorizeUrl { .. } => {}
        Command::SignIn(_) => {
            if let Some(identity) = restored {
                warn!(user_id = %identity.id, "Already signed in, sign out first to switch accounts");
                print_identity(Some(&identity))?;
                return Ok(());
            }
            let identity = manager
                .sign_in()
                .await
                .map_err(|e| anyhow!("Sign-in failed ({}): {}", e.kind(), e))?;
            print_identity(Some(&identity))?;
        }
        Command::SignOut => {
            manager.sign_out();
            print_identity(None)?;
        }
        Command::Greet => match manager.current_identity() {
            Some(identity) => println!("{}", identity.greeting()),
            None => println!("Sign in with Google to book a parcel delivery."),
        },
        Command::Watch => {
            if manager.state() != SessionState::Authenticated {
                print_identity(None)?;
                return Ok(());
            }

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let _subscription = manager.subscribe(move |identity| {
                let _ = tx.send(identity.cloned());
            });
            let watch = spawn_expiry_watch(
                Arc::clone(&manager),
                session_config.expiry_check_interval_secs,
            );

            print_identity(restored.as_ref())?;
            loop {
                tokio::select! {
                    change = rx.recv() => {
                        let identity = change.flatten();
                        print_identity(identity.as_ref())?;
                        if identity.is_none() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted");
                        break;
                    }
                }
            }
            watch.abort();
        }
    }

    Ok(())
}
