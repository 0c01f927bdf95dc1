// Main entry point for the adpulse API server and admin commands

use anyhow::{Context, Result};
use adpulse_core::domains::organization::{
    apply_billing_event, BillingEvent, Organization, OrganizationStore, PgOrganizationStore, Plan,
    QuotaLedger,
};
use adpulse_core::common::OrganizationId;
use adpulse_core::server::{build_app, build_engine, build_server_deps, AxumAppState};
use adpulse_core::Config;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "adpulse")]
#[command(about = "Ad scraping and analysis service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations, the job runtime and the HTTP server
    Serve,

    /// Create an organization (organizations must exist before jobs are submitted)
    CreateOrg {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "free")]
        plan: Plan,
    },

    /// Zero an organization's quota usage
    ResetQuota {
        #[arg(long)]
        org: OrganizationId,
    },

    /// Apply a confirmed plan change (resets usage)
    ApplyPlan {
        #[arg(long)]
        org: OrganizationId,
        #[arg(long)]
        plan: Plan,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,adpulse_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => serve().await,
        Commands::CreateOrg { name, plan } => {
            let pool = connect(&Config::database_url_from_env()?).await?;
            let org = PgOrganizationStore::new(pool)
                .insert(&Organization::new(name, plan))
                .await?;
            println!("{}", serde_json::to_string_pretty(&org)?);
            Ok(())
        }
        Commands::ResetQuota { org } => {
            let ledger = ledger(&Config::database_url_from_env()?).await?;
            let org = ledger.reset_usage(org).await?;
            println!("{}", serde_json::to_string_pretty(&org)?);
            Ok(())
        }
        Commands::ApplyPlan { org, plan } => {
            let ledger = ledger(&Config::database_url_from_env()?).await?;
            let org = apply_billing_event(&ledger, BillingEvent::PlanChanged { org_id: org, plan })
                .await?;
            println!("{}", serde_json::to_string_pretty(&org)?);
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    tracing::info!("Starting adpulse API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let pool = connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let deps = build_server_deps(&config, pool);
    let engine = Arc::new(build_engine(deps.clone()));
    let app = build_app(AxumAppState { deps, engine });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn connect(database_url: &str) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");
    Ok(pool)
}

async fn ledger(database_url: &str) -> Result<QuotaLedger> {
    let pool = connect(database_url).await?;
    Ok(QuotaLedger::new(Arc::new(PgOrganizationStore::new(pool))))
}
