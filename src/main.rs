use clap::Parser;
use tracing_subscriber::EnvFilter;

use emflow::config::{init_dotenv, AppConfig};
use emflow::{execute, AppError, Cli};

fn init_logging(config: &AppConfig) {
    // RUST_LOG tiene prioridad sobre EMFLOW_LOG
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter)
                                             .with_writer(std::io::stderr)
                                             .try_init()
    {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn run(cli: Cli, mut config: AppConfig) -> Result<(), AppError> {
    if let Some(project) = cli.project {
        config.project_dir = project;
    }
    let outcome = execute(cli.command, &config)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn main() {
    init_dotenv();
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    init_logging(&config);

    if let Err(e) = run(cli, config) {
        tracing::error!("{e}");
        eprintln!("[emflow] {e}");
        std::process::exit(e.exit_code());
    }
}
