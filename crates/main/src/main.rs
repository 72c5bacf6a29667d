use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use invoice_pdf::{Invoice, InvoiceBuilder, InvoiceConfig, InvoiceRenderer, SyntheticSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Builds invoices from the synthetic source and renders them as PDF documents.
///
/// Fonts are looked up under `assets/fonts` next to the executable or the library crate, or in
/// the directory named by `INVOICE_PDF_FONTS_DIR`; a system sans-serif family is used otherwise.
#[derive(Parser)]
#[command(author, version, about = "Invoice builder and PDF renderer")]
struct Cli {
    /// TOML file with tax, currency and synthetic-source settings.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reference date for synthesized issue dates (defaults to the local date).
    #[arg(long, global = true, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the invoice for `number` as JSON.
    Show { number: String },

    /// Render the invoice for `number` to `invoice_{number}.pdf`.
    Render {
        number: String,

        /// Render this JSON invoice instead of synthesizing one.
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Directory the PDF is written to.
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = InvoiceConfig::load(cli.config.as_deref())?;
    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Commands::Show { number } => {
            let invoice = synthesize(&config, today, &number)?;
            println!("{}", serde_json::to_string_pretty(&invoice)?);
        }
        Commands::Render {
            number,
            input,
            output_dir,
        } => {
            let invoice = match input {
                Some(path) => read_invoice(&path, &number)?,
                None => synthesize(&config, today, &number)?,
            };
            let renderer = InvoiceRenderer::with_default_fonts(config)?;
            let rendered = renderer.render(&invoice)?;

            fs::create_dir_all(&output_dir)?;
            let path = output_dir.join(&rendered.filename);
            fs::write(&path, &rendered.bytes)?;
            info!(
                path = %path.display(),
                pages = rendered.page_count,
                "wrote invoice"
            );
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn synthesize(
    config: &InvoiceConfig,
    today: NaiveDate,
    number: &str,
) -> Result<Invoice, Box<dyn Error>> {
    let builder = InvoiceBuilder::from_config(config)?;
    let source = SyntheticSource::new(config.synthetic.clone(), today);
    Ok(builder.build_from_source(&source, number)?)
}

fn read_invoice(path: &Path, number: &str) -> Result<Invoice, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let invoice: Invoice = serde_json::from_str(&contents)?;
    if invoice.invoice_number() != number {
        return Err(format!(
            "{} holds invoice {}, not {}",
            path.display(),
            invoice.invoice_number(),
            number
        )
        .into());
    }
    Ok(invoice)
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
