use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use catalogen::config::{CatalogOptions, CatalogPaths};
use catalogen::error::CatalogError;
use catalogen::filter::SupplierCode;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "catalogen",
    version,
    about = "Generate supplier product catalogs (PPTX) from an XLSX product master"
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the catalog deck of one supplier
    Generate {
        /// Supplier code to filter on (e.g. HAK)
        supplier_code: String,

        /// Product master workbook
        #[arg(long, default_value = "products.xlsx")]
        excel: PathBuf,

        /// PPTX template with {{field_N}} placeholders
        #[arg(long, default_value = "catalog_template.pptx")]
        template: PathBuf,

        /// Image root; images live in <images>/<supplier_code>/
        #[arg(long, default_value = "images")]
        images: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// JSON file with column names, aliases and formatting options
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worksheet name (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// 1-based header row
        #[arg(long)]
        header_row: Option<u32>,

        /// 1-based product slide of the template
        #[arg(long)]
        template_slide: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<CatalogError>()
            .map(CatalogError::exit_code)
            .unwrap_or(1);
        process::exit(code);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Generate {
            supplier_code,
            excel,
            template,
            images,
            output,
            config,
            sheet,
            header_row,
            template_slide,
        } => {
            let supplier = SupplierCode::new(supplier_code)?;

            let mut options = match &config {
                Some(path) => CatalogOptions::from_json_file(path)?,
                None => CatalogOptions::default(),
            };
            if sheet.is_some() {
                options.sheet_name = sheet;
            }
            if let Some(row) = header_row {
                options.header_row = row;
            }
            if template_slide.is_some() {
                options.template_slide = template_slide;
            }

            let paths = CatalogPaths {
                spreadsheet: excel,
                template,
                images_dir: images,
                output_dir: output,
            };
            let today = chrono::Local::now().date_naive();

            let result = catalogen::generate_catalog(&supplier, &paths, &options, today)
                .with_context(|| format!("generating catalog for supplier {supplier}"))?;

            for warning in &result.warnings {
                eprintln!("Warning: {warning}");
            }
            println!(
                "Generated: {} ({} products, {} product slides)",
                result.output_path.display(),
                result.products,
                result.product_slides
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::try_parse_from(["catalogen", "generate", "HAK"]).unwrap();
        let Command::Generate {
            supplier_code,
            excel,
            template,
            images,
            output,
            config,
            ..
        } = cli.command;
        assert_eq!(supplier_code, "HAK");
        assert_eq!(excel, PathBuf::from("products.xlsx"));
        assert_eq!(template, PathBuf::from("catalog_template.pptx"));
        assert_eq!(images, PathBuf::from("images"));
        assert_eq!(output, PathBuf::from("output"));
        assert!(config.is_none());
    }

    #[test]
    fn test_generate_requires_supplier_code() {
        assert!(Cli::try_parse_from(["catalogen", "generate"]).is_err());
    }

    #[test]
    fn test_context_keeps_catalog_error_downcastable() {
        let err = anyhow::Error::from(CatalogError::Template("bad".to_string()))
            .context("generating catalog for supplier HAK");
        let code = err
            .downcast_ref::<CatalogError>()
            .map(CatalogError::exit_code);
        assert_eq!(code, Some(3));
    }

    #[test]
    fn test_invalid_supplier_code_fails_before_io() {
        let err = run(Command::Generate {
            supplier_code: "../etc".to_string(),
            excel: "missing.xlsx".into(),
            template: "missing.pptx".into(),
            images: "images".into(),
            output: "output".into(),
            config: None,
            sheet: None,
            header_row: None,
            template_slide: None,
        })
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::InvalidSupplierCode(_))
        ));
    }
}
