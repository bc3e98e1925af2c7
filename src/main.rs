use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use medireminder::api::HttpClient;
use medireminder::config::{self, ClientConfig};
use medireminder::home::Dashboard;
use medireminder::models::{Credentials, ImageUpload, RecordId};
use medireminder::review::{DraftError, PrescriptionDraft, PrescriptionUpload};
use medireminder::session::{self, AuthState, Session, TokenStore};
use medireminder::ClientError;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Draft(#[from] DraftError),
}

impl CliError {
    fn user_message(&self) -> String {
        match self {
            CliError::Client(e) => e.user_message(),
            CliError::Draft(e) => e.user_message(),
        }
    }
}

/// Medication tracker client.
#[derive(Debug, Parser)]
#[command(name = "medireminder", version, about)]
struct Cli {
    /// Server base URL. Overrides MEDIREMINDER_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in (password read from stdin)
    Login { username: String },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Today's reminders and counts
    Dashboard,
    /// List medications with their status
    Medications,
    /// List reminders
    Reminders,
    /// Flip a reminder's done flag
    Toggle {
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
    },
    /// Extract a prescription from an image and save it
    Upload { image: PathBuf },
}

/// Only ids the server assigned can be addressed from the command line.
fn parse_record_id(raw: &str) -> Result<RecordId, String> {
    let id: RecordId = raw.parse().map_err(|_| format!("'{raw}' is not a record id"))?;
    if id.0 <= 0 {
        return Err(format!("'{raw}' is not a saved record id"));
    }
    Ok(id)
}

#[tokio::main]
async fn main() -> ExitCode {
    medireminder::init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    tracing::info!(api_url = %config.api_url, "{} v{}", config::APP_NAME, config::APP_VERSION);
    let session = Arc::new(Session::restore(TokenStore::new(config.token_path.clone()))?);
    let client = Arc::new(HttpClient::new(&config, session.clone())?);

    match cli.command {
        Command::Login { username } => {
            let password = read_password()?;
            let credentials = Credentials {
                username,
                password: password.as_str().to_owned(),
            };
            let user = session::login(client.as_ref(), &session, &credentials).await?;
            println!("Signed in as {}", user.display_name());
        }
        Command::Logout => {
            session::logout(client.as_ref(), &session).await;
            println!("Signed out");
        }
        Command::Whoami => match session::resume(client.as_ref(), &session).await? {
            AuthState::Authenticated(user) => println!("{} <{}>", user.username, user.email),
            _ => println!("Not signed in"),
        },
        Command::Dashboard => {
            let dashboard = Dashboard::new(client);
            dashboard.refresh().await?;
            let summary = dashboard.summary(&Local::now())?;
            println!(
                "Medications: {} ({} active)\nActive reminders: {}\nUpcoming doses: {}",
                summary.total_medications,
                summary.active_medications,
                summary.active_reminders,
                summary.upcoming_doses
            );
            println!("Today:");
            for reminder in &summary.todays_reminders {
                println!(
                    "  [{}] {} {}",
                    reminder.id,
                    reminder.scheduled_time.with_timezone(&Local).format("%H:%M"),
                    reminder.medication_name.as_deref().unwrap_or("(medication)")
                );
            }
        }
        Command::Medications => {
            let dashboard = Dashboard::new(client);
            dashboard.medications().load().await?;
            for card in dashboard.medications().cards(&Local::now())? {
                let m = &card.medication;
                println!("[{}] {} {} {} ({})", m.id, m.name, m.dosage, m.frequency, card.status);
            }
        }
        Command::Reminders => {
            let dashboard = Dashboard::new(client);
            dashboard.reminders().load(&Default::default()).await?;
            for r in dashboard.reminders().reminders()? {
                println!(
                    "[{}] {} {} {}{}",
                    r.id,
                    r.scheduled_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    r.medication_name.as_deref().unwrap_or("(medication)"),
                    r.repeat,
                    if r.is_done { " done" } else { "" }
                );
            }
        }
        Command::Toggle { id } => {
            let dashboard = Dashboard::new(client);
            dashboard.reminders().load(&Default::default()).await?;
            match dashboard.reminders().toggle_done(id).await?.applied() {
                Some(r) => println!("Reminder {} is now {}", r.id, if r.is_done { "done" } else { "pending" }),
                None => println!("No reminder {id}"),
            }
        }
        Command::Upload { image: path } => {
            let image = ImageUpload::from_path(&path).await.map_err(ClientError::from)?;
            let flow = PrescriptionUpload::new(client);
            let mut draft = PrescriptionDraft::new();
            draft.select_image(image);
            flow.upload(&mut draft).await?;
            println!("Doctor: {}", draft.doctor_name());
            for m in draft.medications() {
                println!("  {} {} {}", m.name, m.dosage, m.frequency);
            }
            let saved = flow.save(&mut draft).await?;
            println!("Saved prescription {}", saved.id);
        }
    }
    Ok(())
}

fn read_password() -> Result<Zeroizing<String>, ClientError> {
    eprint!("Password: ");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_owned()))
}
