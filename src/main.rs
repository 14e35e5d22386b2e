use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kcsync_core::domain::{ClientResource, Phase, RealmResource};
use kcsync_core::keycloak::KeycloakAdminClient;
use kcsync_core::reconcile::{find_realm, NoopSecretProbe};
use kcsync_core::{config::Config, telemetry, ReconcileEngine};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "kcsync-core", version, about = "Converge Keycloak realms and clients")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile or delete a client resource
    Client {
        /// Client resource (JSON)
        #[arg(long)]
        file: PathBuf,
        /// Realm owning the client
        #[arg(long, conflicts_with = "realm_file")]
        realm: Option<String>,
        /// Realm resources to select from with the client's realmSelector
        #[arg(long = "realm-file")]
        realm_file: Vec<PathBuf>,
        #[arg(long)]
        delete: bool,
    },
    /// Reconcile or delete a realm resource
    Realm {
        /// Realm resource (JSON)
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        delete: bool,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    telemetry::init(&config.telemetry)?;
    info!(keycloak = %config.keycloak.url, "Starting kcsync core");

    let admin = KeycloakAdminClient::new(&config.keycloak)?;
    let engine = ReconcileEngine::new(Arc::new(admin), Arc::new(NoopSecretProbe));

    let phase = match cli.command {
        Command::Client {
            file,
            realm,
            realm_file,
            delete,
        } => {
            let resource: ClientResource = read_json(&file)?;
            let realm = match realm {
                Some(realm) => realm,
                None => {
                    let realms = realm_file
                        .iter()
                        .map(|path| read_json::<RealmResource>(path))
                        .collect::<Result<Vec<_>>>()?;
                    find_realm(&realms, &resource.spec.realm_selector)
                        .with_context(|| format!("No realm for client {}", resource.client_id()))?
                        .realm_name()
                        .to_string()
                }
            };

            if delete {
                print_json(&engine.delete_client(&realm, &resource).await?)?;
                Phase::Reconciled
            } else {
                let outcome = engine.reconcile_client(&realm, &resource).await;
                let status = outcome.into_status(&resource.status);
                print_json(&status)?;
                status.phase
            }
        }
        Command::Realm { file, delete } => {
            let resource: RealmResource = read_json(&file)?;
            if delete {
                print_json(&engine.delete_realm(&resource).await?)?;
                Phase::Reconciled
            } else {
                let outcome = engine.reconcile_realm(&resource).await;
                let status = outcome.into_status(&resource.status);
                print_json(&status)?;
                status.phase
            }
        }
    };

    if phase == Phase::Failing {
        std::process::exit(1);
    }
    Ok(())
}
