use clap::Parser;
use capture_report::{pipeline, settings::Config};
use log::LevelFilter;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "capture-report")]
#[command(about = "Packet statistics and charts for an offline capture file")]
struct Cli {
    #[arg(help = "Capture file to analyze (default: capture.pcap)")]
    file: Option<PathBuf>,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<String>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,

    #[arg(long, help = "Skip the interactive chart viewer")]
    no_tui: bool,

    #[arg(long, help = "Write the 3D scatter page without opening a browser")]
    no_browser: bool,

    #[arg(long, value_name = "PATH", help = "Also write the full report as JSON")]
    export_json: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Save the effective configuration as TOML and exit")]
    write_config: Option<String>,
}

fn init_logger(debug: bool) {
    env_logger::Builder::new()
        .filter_level(if debug { LevelFilter::Debug } else { LevelFilter::Warn })
        .parse_default_env()
        .init();
}

fn build_config(cli: &Cli) -> capture_report::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    if let Some(file) = &cli.file {
        config.capture.file = file.clone();
    }
    if cli.no_tui {
        config.output.interactive = false;
    }
    if cli.no_browser {
        config.output.open_browser = false;
    }
    if let Some(path) = &cli.export_json {
        config.output.export_json = Some(path.clone());
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.debug);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if let Some(path) = &cli.write_config {
        if let Err(e) = config.save_to_file(path) {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
        println!("Configuration written to {}", path);
        return;
    }

    if let Err(e) = pipeline::run(&config) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
