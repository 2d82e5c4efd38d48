//! Command line and environment configuration.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::marketplace::Marketplace;
use crate::processor::{EmbedMode, ProcessOptions, SheetSelection};

#[derive(Debug, Parser)]
#[command(name = "image-opening", version, about = "Embed image previews into catalog workbooks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the web interface (default)
    Serve,
    /// Process a local workbook without the browser
    Process(ProcessArgs),
}

/// Accepted before or after the subcommand
#[derive(Debug, Clone, Args)]
pub struct NetworkArgs {
    /// Seconds to wait for a content-type lookup
    #[arg(long, global = true, env = "IMAGE_OPENING_LOOKUP_TIMEOUT", default_value_t = 10)]
    pub lookup_timeout_secs: u64,

    /// Seconds to wait for an image download
    #[arg(long, global = true, env = "IMAGE_OPENING_FETCH_TIMEOUT", default_value_t = 25)]
    pub fetch_timeout_secs: u64,
}

impl NetworkArgs {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    #[arg(long, env = "IMAGE_OPENING_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "IMAGE_OPENING_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "IMAGE_OPENING_MAX_UPLOAD_MB", default_value_t = 50)]
    pub max_upload_mb: usize,

    #[command(flatten)]
    pub network: NetworkArgs,
}

impl ServerArgs {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn parse_marketplace(s: &str) -> std::result::Result<Marketplace, String> {
    s.parse().map_err(|e: crate::error::PreviewError| e.to_string())
}

fn parse_mode(s: &str) -> std::result::Result<EmbedMode, String> {
    s.parse().map_err(|e: crate::error::PreviewError| e.to_string())
}

#[derive(Debug, Clone, Args)]
pub struct ProcessArgs {
    /// Workbook to read
    pub input: PathBuf,

    /// Where to write the result (defaults to `<input>-preview.xlsx`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_parser = parse_marketplace, default_value = "walmart")]
    pub marketplace: Marketplace,

    /// Resize the marketplace template rows too
    #[arg(long)]
    pub resize_header_rows: bool,

    /// Only process this sheet
    #[arg(long)]
    pub sheet: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub header_row: u32,

    #[arg(long, default_value_t = 140)]
    pub width: u32,

    #[arg(long, default_value_t = 140)]
    pub height: u32,

    /// Do not annotate cells with notes
    #[arg(long)]
    pub no_notes: bool,

    /// Put previews in new `*_preview` columns
    #[arg(long)]
    pub adjacent: bool,

    /// Header of a URL column; repeat for several, omit to auto-detect
    #[arg(long = "column")]
    pub columns: Vec<String>,

    /// picture, formula or auto
    #[arg(long, value_parser = parse_mode, default_value = "picture")]
    pub mode: EmbedMode,

    /// Embed without probing the content type first
    #[arg(long)]
    pub skip_content_check: bool,
}

impl ProcessArgs {
    pub fn to_options(&self) -> Result<ProcessOptions> {
        let options = ProcessOptions {
            marketplace: self.marketplace,
            keep_header_heights: !self.resize_header_rows,
            sheets: match &self.sheet {
                Some(name) => SheetSelection::One(name.clone()),
                None => SheetSelection::All,
            },
            header_row: self.header_row,
            width_px: self.width,
            height_px: self.height,
            keep_notes: !self.no_notes,
            create_adjacent: self.adjacent,
            columns: self.columns.clone(),
            mode: self.mode,
            check_content_type: !self.skip_content_check,
        };
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serving() {
        let cli = Cli::try_parse_from(["image-opening"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.server.port, 3000);
        assert_eq!(cli.server.max_upload_bytes(), 50 * 1024 * 1024);
        assert_eq!(cli.server.network.fetch_timeout(), Duration::from_secs(25));
    }

    #[test]
    fn process_flags_map_to_options() {
        let cli = Cli::try_parse_from([
            "image-opening",
            "process",
            "feed.xlsx",
            "--marketplace",
            "amazon",
            "--column",
            "Main Image",
            "--column",
            "Alt Image",
            "--mode",
            "formula",
            "--adjacent",
            "--sheet",
            "Items",
        ])
        .unwrap();
        let Some(Command::Process(args)) = cli.command else {
            panic!("expected process subcommand");
        };
        let opts = args.to_options().unwrap();
        assert_eq!(opts.marketplace, Marketplace::Amazon);
        assert_eq!(opts.preserve_top_rows(), 4);
        assert_eq!(opts.columns, vec!["Main Image", "Alt Image"]);
        assert_eq!(opts.mode, EmbedMode::Formula);
        assert!(opts.create_adjacent);
        assert_eq!(opts.sheets, SheetSelection::One("Items".into()));
    }

    #[test]
    fn invalid_size_is_rejected() {
        for width in ["10", "100000"] {
            let cli = Cli::try_parse_from(["image-opening", "process", "a.xlsx", "--width", width])
                .unwrap();
            let Some(Command::Process(args)) = cli.command else {
                panic!("expected process subcommand");
            };
            assert!(args.to_options().is_err());
        }
    }

    #[test]
    fn timeouts_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "image-opening",
            "process",
            "feed.xlsx",
            "--fetch-timeout-secs",
            "5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Process(_))));
        assert_eq!(cli.server.network.fetch_timeout(), Duration::from_secs(5));

        let cli = Cli::try_parse_from(["image-opening", "--lookup-timeout-secs", "3", "serve"]).unwrap();
        assert_eq!(cli.server.network.lookup_timeout(), Duration::from_secs(3));
    }
}
