use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use survey_cache::Neo4jSurveyStore;
use survey_service::api::auth::{JwtAuth, DEVELOPER_ROLE};
use survey_service::{ApiServer, ApiServerConfig, ServiceConfig};

#[derive(Parser)]
#[command(name = "survey-service")]
#[command(about = "Cached survey generation service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start API server
    Serve {
        /// Host to bind to (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// JWT secret key (overrides JWT_SECRET)
        #[arg(long)]
        jwt_secret: Option<String>,
    },

    /// Resolve one description through the pipeline and print the survey
    Generate {
        /// Survey description
        description: String,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Mint a bearer token
    Token {
        /// Token subject
        subject: String,

        /// Role claim
        #[arg(long, default_value = DEVELOPER_ROLE)]
        role: String,
    },

    /// Create the Neo4j key constraint and report store health
    InitStore,

    /// Print the cache key for a description
    Normalize {
        /// Survey description
        description: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "survey_service=info,survey_cache=info".into()),
    );
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Load configuration, logging the reason when it is rejected
fn load_config() -> Result<ServiceConfig> {
    ServiceConfig::from_env()
        .map_err(|e| {
            error!("Invalid configuration: {}", e);
            e
        })
        .context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();
    init_tracing();

    match cli.command {
        Commands::Serve {
            host,
            port,
            jwt_secret,
        } => {
            let mut config = load_config()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(secret) = jwt_secret {
                config.jwt_secret = secret;
            }

            let orchestrator = config.build_orchestrator()?;
            let server = ApiServer::new(ApiServerConfig::from(&config), orchestrator);
            server.start().await?;
        }

        Commands::Generate {
            ref description,
            compact,
        } => {
            let config = load_config()?;
            let orchestrator = config.build_orchestrator()?;
            let outcome = orchestrator.get_or_create_survey(description).await?;

            let json = if compact {
                serde_json::to_string(&outcome.document)?
            } else {
                serde_json::to_string_pretty(&outcome.document)?
            };
            println!("{}", json);
            eprintln!("source: {} (key {})", outcome.source, outcome.key);

            // Let persistence finish before the process exits
            if let Some(write_back) = outcome.write_back {
                if let Some(report) = write_back.wait().await {
                    eprintln!(
                        "write-back: durable {:?}, fast cache {:?}",
                        report.durable, report.fast_cache
                    );
                }
            }
        }

        Commands::Token {
            ref subject,
            ref role,
        } => {
            let config = load_config()?;
            let auth = JwtAuth::new(&config.jwt_secret, config.jwt_ttl_seconds);
            let token = auth.generate_token(subject, Some(role.as_str()))?;
            println!("{}", token);
        }

        Commands::InitStore => {
            let config = load_config()?;
            let store = Neo4jSurveyStore::new(config.neo4j.clone());
            store.ensure_schema().await?;
            let health = store.health_check_detailed().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }

        // Needs no configuration
        Commands::Normalize { ref description } => {
            let key = survey_cache::normalize(description)?;
            println!("{}", key);
            println!("fast cache key: {}", key.fast_cache_key());
        }
    }

    Ok(())
}
