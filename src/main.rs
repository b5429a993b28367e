//! Command-line interface for dtdanalyzer

#[cfg(feature = "cli")]
use clap::{ArgGroup, Parser};

#[cfg(feature = "cli")]
use std::fs::File;
#[cfg(feature = "cli")]
use std::io::{self, BufWriter, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use dtdanalyzer::{AnalyzerOptions, DtdAnalyzer, DtdScanner};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "dtdanalyzer")]
#[command(author, version, about = "Convert a DTD into an XML representation of its declarations", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["doc", "system"])))]
struct Cli {
    /// XML document whose DOCTYPE declares the DTD
    #[arg(short = 'd', long = "doc", value_name = "XML")]
    doc: Option<PathBuf>,

    /// DTD file
    #[arg(short = 's', long = "system", value_name = "DTD")]
    system: Option<PathBuf>,

    /// Title embedded in the output
    #[arg(short, long)]
    title: Option<String>,

    /// Whitespace-separated root elements; only declarations reachable from them are written
    #[arg(short, long = "roots", value_name = "ROOTS")]
    roots: Vec<String>,

    /// Log pipeline progress
    #[arg(short, long)]
    verbose: bool,

    /// Output file (defaults to stdout)
    #[arg(value_name = "OUT")]
    output: Option<PathBuf>,
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut scanner = match (&cli.doc, &cli.system) {
        (Some(doc), _) => DtdScanner::from_document_file(doc)?,
        (None, Some(dtd)) => DtdScanner::from_dtd_file(dtd)?,
        (None, None) => return Err("either --doc or --system is required".into()),
    };

    let mut options = AnalyzerOptions::new().with_roots(&cli.roots);
    if let Some(title) = cli.title {
        options = options.with_title(title);
    }

    let analysis = DtdAnalyzer::new(options).analyze(&mut scanner)?;

    match cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(&path)?);
            analysis.write_xml(&mut writer)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            analysis.write_xml(&mut writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
