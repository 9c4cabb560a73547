//! `cliaas` command line entrypoint.

use anyhow::Context;
use clap::{Parser, Subcommand};

use cliaas::{Client, Config};

#[derive(Debug, Parser)]
#[command(name = "cliaas", version, about = "Replace cloud VMs and swap load balancer members")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replace the VM matching an identifier with one built from a new image.
    ReplaceVm {
        /// Regular expression matched against VM names; must match exactly one.
        #[arg(short, long)]
        identifier: String,
        /// Image to build from (AMI id, VHD URI). Defaults to CLIAAS_IMAGE.
        #[arg(long)]
        image: Option<String>,
    },
    /// Delete the VM matching an identifier.
    DeleteVm {
        #[arg(short, long)]
        identifier: String,
    },
    /// Point a load balancer at exactly the given instances.
    SwapLb {
        /// Load balancer name.
        #[arg(short, long)]
        identifier: String,
        /// Instance ids; repeat the flag for each member.
        #[arg(long = "vm-identifier", required = true)]
        vm_identifiers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let client = Client::from_config(&config)?;
    tracing::info!(provider = ?config.provider.provider(), "cliaas starting");

    match cli.command {
        Command::ReplaceVm { identifier, image } => {
            let image = image
                .or_else(|| config.image.clone())
                .context("no image given (use --image or set CLIAAS_IMAGE)")?;
            let replacement = client
                .replace(&identifier, &image)
                .await
                .with_context(|| format!("failed to replace {identifier}"))?;
            println!("{}", replacement.new_instance_id);
        }
        Command::DeleteVm { identifier } => {
            let deleted = client
                .delete(&identifier)
                .await
                .with_context(|| format!("failed to delete {identifier}"))?;
            tracing::info!(instance_id = %deleted, "delete requested");
        }
        Command::SwapLb {
            identifier,
            vm_identifiers,
        } => {
            let change = client
                .swap_load_balancer(&identifier, &vm_identifiers)
                .await
                .with_context(|| format!("failed to swap members of {identifier}"))?;
            tracing::info!(members = ?change.members, "load balancer updated");
        }
    }

    Ok(())
}
