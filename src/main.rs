#![cfg(not(tarpaulin_include))]

use clap::Parser;
use image_opening::app;
use image_opening::config::{Cli, Command, NetworkArgs, ProcessArgs};
use image_opening::downloader::{output_file_name, to_xlsx};
use image_opening::fetcher::HttpImageSource;
use image_opening::loader::from_xlsx_file;
use image_opening::processor;

/// Main entry point
///
/// Without a subcommand the web interface is started; `process` runs the
/// same pipeline on a local file.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        None | Some(Command::Serve) => app::run(cli.server).await,
        Some(Command::Process(args)) => process_file(&args, &cli.server.network).await,
    }
}

async fn process_file(
    args: &ProcessArgs,
    network: &NetworkArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.to_options()?;
    let source = HttpImageSource::new(network.lookup_timeout(), network.fetch_timeout())?;

    let mut workbook = from_xlsx_file(&args.input)?;
    log::info!(
        "loaded {} ({} sheets)",
        args.input.display(),
        workbook.sheet_count()
    );

    let stats = processor::process(&mut workbook, &options, &source, |s| {
        log::info!("{:>3.0}% {}", s.fraction() * 100.0, s.status_line());
    })
    .await?;

    let output = match &args.output {
        Some(path) => path.clone(),
        None => {
            let name = args
                .input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "workbook.xlsx".to_string());
            args.input.with_file_name(output_file_name(&name))
        }
    };
    std::fs::write(&output, to_xlsx(&workbook)?)?;
    log::info!(
        "wrote {} (inserted {}, formulas {}, skipped {}, failed {})",
        output.display(),
        stats.inserted,
        stats.formulas,
        stats.skipped_non_image,
        stats.failed
    );

    Ok(())
}
