use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mesh_authz::config::{self, ConfigBuilder};
use mesh_authz::observability::init_observability;
use mesh_authz::reconcile::parse_events;
use mesh_authz::{
    Decision, DirectorySecretResolver, KeySetFactory, LocalStore, OAuthError, PolicyEngine,
    Reconciler, ReqwestFetch, SecretResolver, StaticSecretResolver, TokenValidator,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "mesh-authz")]
#[command(about = "Authorization decisions for service-mesh requests", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long, global = true)]
    json_logs: bool,

    /// JSON array of record watch events to reconcile before answering
    #[arg(short, long, global = true, env = "MESH_AUTHZ_RECORDS")]
    records: Option<PathBuf>,

    /// Directory of mounted secrets (`<dir>/<namespace>/<name>/<key>`)
    #[arg(long, global = true)]
    secrets_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the policy decision for a request
    Evaluate(RequestArgs),

    /// Evaluate a request and validate its bearer token
    Check {
        #[command(flatten)]
        request: RequestArgs,

        /// Bearer token (without the `Bearer ` prefix)
        #[arg(long, env = "MESH_AUTHZ_TOKEN")]
        token: String,
    },
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    #[arg(long)]
    namespace: String,

    #[arg(long)]
    service: String,

    #[arg(long)]
    path: String,

    #[arg(long, default_value = "GET")]
    method: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // CLI values sit below file and env in precedence
    let mut builder = ConfigBuilder::new().json_logs(args.json_logs);
    if let Some(dir) = args.secrets_dir.clone() {
        builder = builder.secrets_dir(dir);
    }
    let mut builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path, builder)?
    } else {
        config::load_config(builder)?
    };
    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }
    let config = builder.build()?;

    init_observability(&config.telemetry)?;

    let fetcher = ReqwestFetch::new(config.fetch())?;
    let key_sets = KeySetFactory::new(Arc::new(fetcher));
    let store = Arc::new(LocalStore::new());
    let secrets: Arc<dyn SecretResolver> = match &config.secrets_dir {
        Some(dir) => Arc::new(DirectorySecretResolver::new(dir)),
        None => Arc::new(StaticSecretResolver::new()),
    };
    let reconciler = Reconciler::new(store.clone(), secrets, key_sets);

    if let Some(ref path) = args.records {
        reconcile_file(&reconciler, path).await?;
    }

    let engine = PolicyEngine::new(store);
    match args.command {
        Command::Evaluate(request) => {
            let decision = evaluate(&engine, &request)?;
            println!("{}", serde_json::to_string_pretty(&describe(&decision))?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { request, token } => {
            let decision = evaluate(&engine, &request)?;
            check(&decision, &token, &TokenValidator::new(config.validation())).await
        }
    }
}

fn evaluate(engine: &PolicyEngine, request: &RequestArgs) -> anyhow::Result<Decision> {
    Ok(engine.evaluate(
        &request.namespace,
        &request.service,
        &request.path,
        &request.method,
    )?)
}

async fn reconcile_file(reconciler: &Reconciler, path: &std::path::Path) -> anyhow::Result<()> {
    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read records file {}: {e}", path.display()))?;
    let events = parse_events(&body)?;
    tracing::info!(count = events.len(), path = %path.display(), "Reconciling records");

    let (tx, rx) = mpsc::channel(events.len().max(1));
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal.cancel();
        }
    });

    let feeder = tokio::spawn(async move {
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    reconciler.run(rx, shutdown).await;
    feeder.await?;
    Ok(())
}

fn describe(decision: &Decision) -> serde_json::Value {
    match decision {
        Decision::None => json!({ "decision": decision.kind() }),
        Decision::Jwt(action) => json!({
            "decision": decision.kind(),
            "jwksUrl": action.key_set.url(),
            "rules": action.rules,
        }),
        Decision::Oidc(action) => json!({
            "decision": decision.kind(),
            "client": action.client.name(),
            "clientId": action.client.id().as_str(),
            "discoveryUrl": action.client.authorization_server().discovery_url(),
            "redirectUri": action.redirect_uri,
            "rules": action.rules,
        }),
    }
}

async fn check(
    decision: &Decision,
    token: &str,
    validator: &TokenValidator,
) -> anyhow::Result<ExitCode> {
    match decision {
        Decision::None => {
            println!("allow");
            Ok(ExitCode::SUCCESS)
        }
        Decision::Jwt(action) => {
            match validator
                .validate(token, action.key_set.as_ref(), &action.rules)
                .await
            {
                Ok(_) => {
                    println!("allow");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    println!("{}", serde_json::to_string_pretty(&rejection(&err))?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Decision::Oidc(_) => {
            println!("{}", serde_json::to_string_pretty(&describe(decision))?);
            tracing::warn!("Request is governed by an OIDC session policy; no bearer check applies");
            Ok(ExitCode::from(2))
        }
    }
}

fn rejection(err: &OAuthError) -> serde_json::Value {
    json!({
        "status": err.http_status(),
        "statusText": err.short_description(),
        "error": err,
        "wwwAuthenticate": err.www_authenticate(),
    })
}
