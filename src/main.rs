mod args;
mod retro;
mod server;

use clap::Parser;
use log::{info, warn, LevelFilter};
use snafu::{ErrorCompat, ResultExt};

use crate::args::{Args, Command};
use crate::retro::config_reader::load_settings;
use crate::retro::{run_report, RetroResult};

fn run(args: Args) -> RetroResult<()> {
    let mut settings = load_settings(args.config.as_deref(), args.data_dir.as_deref())?;
    match args.command {
        Some(Command::Report {
            question,
            reference,
            out,
        }) => run_report(&settings, question, reference, out),
        Some(Command::Serve { host, port }) => {
            if let Some(h) = host {
                settings.host = h;
            }
            if let Some(p) = port {
                settings.port = p;
            }
            serve_blocking(settings)
        }
        None => serve_blocking(settings),
    }
}

fn serve_blocking(settings: retro::config_reader::Settings) -> RetroResult<()> {
    info!("serve_blocking: settings: {:?}", settings);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .whatever_context("Could not start the async runtime")?;
    rt.block_on(server::serve(settings))
}

fn main() {
    let args = Args::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();

    if let Err(e) = run(args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
