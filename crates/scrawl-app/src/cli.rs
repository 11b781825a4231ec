//! Command-line parsing and commands.

use clap::{Args, Parser, Subcommand};
use peniko::Color;
use scrawl_core::element::HexColor;
use scrawl_core::session::{Document, Session};
use scrawl_core::storage::{FileStore, StorageError};
use scrawl_core::{Editor, EditorConfig};
use scrawl_render::{ExportOptions, RendererError, export_png};
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Render error: {0}")]
    Render(#[from] RendererError),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("No document named {0:?}")]
    UnknownDocument(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inspect and export drawings saved by Scrawl.
#[derive(Parser, Debug)]
#[command(name = "scrawl", version, about = "Inspect and export saved Scrawl sessions")]
pub struct Cli {
    /// Session directory (default: platform data dir)
    #[arg(long, global = true, env = "SCRAWL_STORE")]
    pub store: Option<PathBuf>,

    /// Editor config JSON
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the saved documents; `*` marks the current one
    List,
    /// Render a document to PNG
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Document to export (default: current)
    #[arg(long)]
    pub document: Option<String>,

    /// PNG path (default: <document name>.png)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pixels per unit
    #[arg(long, default_value_t = 1.0, value_parser = parse_positive)]
    pub scale: f64,

    /// Margin in units
    #[arg(long, default_value_t = 20.0, value_parser = parse_non_negative)]
    pub padding: f64,

    /// Background color
    #[arg(long, default_value = "#ffffff", value_parser = parse_color)]
    pub background: HexColor,
}

impl ExportArgs {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            padding: self.padding,
            background: Color::from(self.background),
            scale: self.scale,
        }
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("expected a number, got {:?}", raw))
}

fn parse_positive(raw: &str) -> Result<f64, String> {
    let value = parse_number(raw)?;
    if value <= 0.0 {
        return Err("must be positive".to_string());
    }
    Ok(value)
}

fn parse_non_negative(raw: &str) -> Result<f64, String> {
    let value = parse_number(raw)?;
    if value < 0.0 {
        return Err("must not be negative".to_string());
    }
    Ok(value)
}

fn parse_color(raw: &str) -> Result<HexColor, String> {
    raw.parse().map_err(|_| format!("expected #rrggbb, got {:?}", raw))
}

/// Scope directory the desktop session is saved under.
pub const LOCAL_SCOPE: &str = "local";

/// Load the persisted session from the store `cli` names.
pub fn load_session(cli: &Cli) -> Result<Session, CliError> {
    let config = match &cli.config {
        Some(path) => EditorConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EditorConfig::default(),
    };
    let store = match &cli.store {
        Some(dir) => FileStore::new(dir.clone())?,
        None => FileStore::default_location(LOCAL_SCOPE)?,
    };
    log::info!("Loading session from {}", store.base_path().display());
    let mut editor = Editor::restore(Rc::new(store), config);
    for notice in editor.take_notices() {
        log::warn!("{}", notice.message);
    }
    Ok(editor.session().clone())
}

/// The document `args` asks for, or the current one.
pub fn select_document<'a>(
    session: &'a Session,
    args: &ExportArgs,
) -> Result<&'a Document, CliError> {
    match &args.document {
        Some(name) => session
            .documents()
            .iter()
            .find(|d| &d.name == name)
            .ok_or_else(|| CliError::UnknownDocument(name.clone())),
        None => Ok(session.current_document()),
    }
}

/// Run `cli`, writing human output to `out`.
pub fn run(cli: &Cli, out: &mut dyn std::io::Write) -> Result<(), CliError> {
    let session = load_session(cli)?;
    match &cli.command {
        Command::List => {
            for document in session.documents() {
                let marker = if document.id() == session.current_id() { "*" } else { " " };
                writeln!(
                    out,
                    "{} {} ({} elements)",
                    marker,
                    document.name,
                    document.current().len()
                )?;
            }
        }
        Command::Export(args) => {
            let document = select_document(&session, args)?;
            let png = export_png(document.current(), &session.content, &args.export_options())?;
            let path = args
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.png", document.name)));
            std::fs::write(&path, &png)?;
            writeln!(out, "Exported {:?} to {}", document.name, path.display())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrawl_core::storage::AutoSave;

    fn cli(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("scrawl").chain(args.iter().copied()))
    }

    fn export_args(parsed: &Cli) -> &ExportArgs {
        match &parsed.command {
            Command::Export(args) => args,
            Command::List => panic!("expected export"),
        }
    }

    #[test]
    fn test_parse_export_defaults() {
        let parsed = cli(&["export"]).unwrap();
        let args = export_args(&parsed);
        assert_eq!(args.scale, 1.0);
        assert_eq!(args.padding, 20.0);
        assert_eq!(args.background, HexColor::white());
        assert!(args.document.is_none());
    }

    #[test]
    fn test_parse_flags() {
        let parsed = cli(&[
            "--store",
            "/tmp/s",
            "export",
            "--scale",
            "2",
            "--padding",
            "0",
            "--background",
            "#000000",
        ])
        .unwrap();
        assert_eq!(parsed.store, Some(PathBuf::from("/tmp/s")));
        let args = export_args(&parsed);
        assert_eq!(args.scale, 2.0);
        assert_eq!(args.padding, 0.0);
        assert_eq!(args.background, HexColor::black());

        let list = cli(&["list", "--store", "/tmp/s"]).unwrap();
        assert!(matches!(list.command, Command::List));
        assert_eq!(list.store, Some(PathBuf::from("/tmp/s")));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(cli(&[]).is_err());
        assert!(cli(&["export", "--scale", "0"]).is_err());
        assert!(cli(&["export", "--scale"]).is_err());
        assert!(cli(&["export", "--padding", "-1"]).is_err());
        assert!(cli(&["export", "--background", "red"]).is_err());
        assert!(cli(&["draw"]).is_err());
        assert!(cli(&["list", "export"]).is_err());
    }

    #[test]
    fn test_help_is_generated() {
        let err = cli(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        let help = err.to_string();
        assert!(help.contains("list"));
        assert!(help.contains("export"));
    }

    #[test]
    fn test_export_saved_session() {
        let store_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let store_path = store_dir.path().to_str().unwrap();
        let config = EditorConfig::default();

        let mut session = Session::new(&config);
        session.new_document(Some("Sketch".to_string()));
        let store = FileStore::new(store_dir.path().to_path_buf()).unwrap();
        AutoSave::new(Rc::new(store), &config).save(&session, 0).unwrap();

        let output = out_dir.path().join("sketch.png");
        let parsed = cli(&[
            "--store",
            store_path,
            "export",
            "--document",
            "Sketch",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        let mut out = Vec::new();
        run(&parsed, &mut out).unwrap();
        assert!(output.exists());
        assert!(String::from_utf8(out).unwrap().contains("Sketch"));

        let mut listing = Vec::new();
        run(&cli(&["list", "--store", store_path]).unwrap(), &mut listing).unwrap();
        let listing = String::from_utf8(listing).unwrap();
        assert!(listing.contains("* Sketch"));
        assert!(listing.contains("  Untitled 1"));
    }

    #[test]
    fn test_unknown_document() {
        let store_dir = tempfile::tempdir().unwrap();
        let store_path = store_dir.path().to_str().unwrap();
        let parsed = cli(&["--store", store_path, "export", "--document", "nope"]).unwrap();
        let result = run(&parsed, &mut Vec::new());
        assert!(matches!(result, Err(CliError::UnknownDocument(_))));
    }
}
