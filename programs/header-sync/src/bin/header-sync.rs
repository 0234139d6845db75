use clap::Parser;
use header_sync::{
    app::App,
    cli::{Cli, Commands},
    config::AppConfig,
    logging::init_subscriber,
    parse_address, read_hex_file,
};
use serde::Serialize;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_file(&cli.config)?;
    init_subscriber(config.log_level())?;
    info!(
        config = %cli.config.display(),
        state = %config.state_path.display(),
        "Header sync starting"
    );

    let app = App::new(&config)?;
    match cli.command {
        Commands::Genesis {
            chain_id,
            header,
            signers,
        } => {
            let signers = signers
                .iter()
                .map(|s| parse_address(s))
                .collect::<anyhow::Result<Vec<_>>>()?;
            print_json(&app.genesis(chain_id, read_hex_file(&header)?, &signers)?)
        }
        Commands::Sync {
            chain_id,
            submitter,
            headers,
        } => {
            let headers = headers
                .iter()
                .map(|path| read_hex_file(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            print_json(&app.sync(chain_id, parse_address(&submitter)?, headers)?)
        }
        Commands::Epoch { chain_id, height } => print_json(&app.epoch(chain_id, height)?),
        Commands::Status { chain_id } => print_json(&app.status(chain_id)?),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
