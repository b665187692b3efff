use std::io::{self, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;

use trellis::{Bootstrap, ContainerSlot, LayeredConfigLoader};
use trellis_config::{ConfigSources, DEFAULT_CONFIG_PATH, DEFAULT_LOCAL_CONFIG_PATH};

/// Bootstraps the application container from layered configuration.
#[derive(Debug, Parser)]
#[command(name = "trellis", version, about)]
struct Args {
    /// Base configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    base: Utf8PathBuf,

    /// Local override merged on top of the base file.
    #[arg(long, default_value = DEFAULT_LOCAL_CONFIG_PATH)]
    local: Utf8PathBuf,

    /// Service to initialise; repeat to initialise several, in order.
    #[arg(long = "service", value_name = "NAME")]
    services: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let loader = LayeredConfigLoader::new(ConfigSources::new(args.base, args.local));

    match Bootstrap::new(&loader, ContainerSlot::global()).run(&args.services) {
        Ok(container) => {
            let mut stdout = io::stdout().lock();
            for name in container.names() {
                if writeln!(stdout, "{name}").is_err() {
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "trellis: {error}");
            ExitCode::FAILURE
        }
    }
}
