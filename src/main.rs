use clap::Parser;
use color_eyre::eyre::Result;
use daily_gm::{
    config::{
        AppArgs,
        Cli,
        Commands,
        DeploymentsAction,
    },
    deployment::{
        self,
        DEPLOYMENTS_ROOT,
    },
};

mod client;
mod ui;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _log_guard = client::init_tracing(&cli.app.log_dir())?;

    match cli.command {
        Some(Commands::Deployments { action }) => run_deployments(&cli.app, action),
        None => {
            let config = cli.app.resolve(DEPLOYMENTS_ROOT)?;
            client::run_app(config).await
        }
    }
}

fn run_deployments(args: &AppArgs, action: DeploymentsAction) -> Result<()> {
    deployment::ensure_structure(DEPLOYMENTS_ROOT)?;
    let store = args.deployment_store(DEPLOYMENTS_ROOT)?;
    match action {
        DeploymentsAction::List => {
            let records = store.load()?;
            if records.is_empty() {
                println!("No deployments recorded for {}", store.env());
            }
            for record in records {
                let block = record
                    .deployment_block
                    .map_or_else(|| "-".to_string(), |block| block.to_string());
                println!(
                    "{}  {}  block {}  {}",
                    record.deployed_at.to_rfc3339(),
                    record.contract_address,
                    block,
                    record.network_url
                );
            }
        }
        DeploymentsAction::Record { address, block } => {
            let record = store.record(address, args.rpc_url.clone(), block)?;
            println!(
                "Recorded {} for {} in {}",
                record.contract_address,
                store.env(),
                store.path().display()
            );
        }
    }
    Ok(())
}
