use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use nocache_server::config::{Config, Overrides};
use nocache_server::{logger, Server, ServerError};

/// Serve a directory over HTTP with caching disabled on every response
#[derive(Debug, Parser)]
#[command(name = "nocache-server", version, about)]
struct Cli {
    /// Port to listen on [default: 8080]
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind [default: 0.0.0.0, all interfaces]
    #[arg(short, long = "bind", env = "BIND", value_name = "HOST")]
    bind: Option<String>,

    /// Directory to serve [default: current directory]
    #[arg(short = 'd', long, env = "DOC_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file path without extension (optional file)
    #[arg(short, long, default_value = "config", value_name = "PATH")]
    config: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), ServerError> {
    let overrides = Overrides {
        host: cli.bind,
        port: cli.port,
        root: cli.root.map(|p| p.display().to_string()),
    };
    let cfg = Config::load_from(&cli.config, &overrides)?;
    logger::init(&cfg)?;

    // Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers.filter(|&n| n > 0) {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().map_err(ServerError::Runtime)?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), ServerError> {
    let server = Server::bind(cfg)?;
    logger::log_server_start(&server.local_addr(), server.state().root(), &server.state().config);

    server.run().await;
    Ok(())
}
