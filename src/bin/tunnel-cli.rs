use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use invocation_tunnel::affinity::AffinityToken;
use invocation_tunnel::config::{load_config, TunnelConfig};
use invocation_tunnel::marshal::TypeRegistry;
use invocation_tunnel::protocol::{ComponentTarget, InvocationEnvelope, MethodSignature};
use invocation_tunnel::session::SessionId;
use invocation_tunnel::{InvocationClient, Value};

#[derive(Parser)]
#[command(name = "tunnel-cli")]
#[command(about = "Command-line client for the HTTP invocation tunnel", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Config file providing protocol and client settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Affinity token to send as the affinity cookie.
    #[arg(short, long)]
    affinity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TargetArgs {
    #[arg(long, default_value = "")]
    app: String,
    #[arg(long)]
    module: String,
    #[arg(long, default_value = "")]
    distinct: String,
    #[arg(long)]
    bean: String,
    #[arg(long)]
    view: String,
}

impl TargetArgs {
    fn target(&self) -> ComponentTarget {
        ComponentTarget::new(&self.app, &self.module, &self.distinct, &self.bean)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the server for an affinity token
    Affinity,
    /// Open a stateful session
    OpenSession(TargetArgs),
    /// Invoke a method with string arguments
    Invoke {
        #[command(flatten)]
        target: TargetArgs,
        /// Session id from `open-session`
        #[arg(long)]
        session: Option<String>,
        method: String,
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TunnelConfig::default(),
    };
    let affinity = cli.affinity.clone().map(AffinityToken::new);

    let views = match &cli.command {
        Commands::Affinity => Vec::new(),
        Commands::OpenSession(target) | Commands::Invoke { target, .. } => vec![target.view.clone()],
    };
    let registry = TypeRegistry::with_views(config.protocol.views.iter().cloned().chain(views));
    let client = InvocationClient::new(&cli.url, &config.protocol, config.client.clone(), Arc::new(registry));

    let output = match cli.command {
        Commands::Affinity => {
            let token = client.discover_affinity().await?;
            json!({ "affinity": token.as_str() })
        }
        Commands::OpenSession(target) => {
            let opened = client
                .create_session_with_retry(&target.target(), &target.view, affinity.as_ref())
                .await?;
            json!({
                "session_id": opened.locator.session_id.to_string(),
                "locator": opened.locator,
                "affinity": opened.affinity.as_ref().map(AffinityToken::as_str),
            })
        }
        Commands::Invoke {
            target,
            session,
            method,
            args,
        } => {
            let parameter_types = vec!["java.lang.String"; args.len()];
            let arguments = args.into_iter().map(Value::String).collect();
            let mut envelope = InvocationEnvelope::new(
                target.target(),
                &target.view,
                MethodSignature::new(method, parameter_types),
                arguments,
            );
            if let Some(session) = session {
                envelope = envelope.with_session(SessionId::decode(&session)?);
            }
            let result = client.invoke(&envelope, affinity.as_ref()).await?;
            json!({
                "value": result.value,
                "affinity": result.affinity.as_ref().map(AffinityToken::as_str),
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
