//! `confex export` command implementation.

use std::path::PathBuf;

use clap::Args;
use confex_config::{CliSettings, Config, ConfluenceConfig};
use confex_confluence::ConfluenceClient;
use confex_export::{ExportOptions, ExportReport, Exporter, PageStatus, RemoteSource};
use confex_storage::FsSink;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the export command.
#[derive(Args)]
pub(crate) struct ExportArgs {
    /// Space key to export (falls back to `export.space` in config).
    space: Option<String>,

    /// Output directory for the Markdown tree.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Confluence base URL (overrides config).
    #[arg(long)]
    base_url: Option<String>,

    /// Confluence username (overrides config).
    #[arg(long)]
    username: Option<String>,

    /// Confluence API token (overrides config).
    #[arg(long)]
    token: Option<String>,

    /// Rewrite output files even when they are already up to date.
    #[arg(long)]
    force: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub(crate) verbose: bool,

    /// Path to configuration file (default: auto-discover confex.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ExportArgs {
    /// Execute the export command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the export aborts.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            api_token: self.token.clone(),
            out_dir: self.out.clone(),
            space: self.space.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let conf_config = require_confluence_config(&config, &output)?;
        let space = config.export_resolved.space.clone().ok_or_else(|| {
            CliError::Validation(
                "space key required (pass it as an argument or set export.space)".to_owned(),
            )
        })?;

        let client = ConfluenceClient::new(
            &conf_config.base_url,
            &conf_config.username,
            &conf_config.api_token,
        );
        let source = RemoteSource::new(&client);
        let sink = FsSink::new(&config.export_resolved.out_dir);

        output.info(&format!(
            "Exporting space {space} to {}...",
            config.export_resolved.out_dir.display()
        ));

        let options = ExportOptions {
            space_key: space,
            skip_unchanged: !self.force,
        };
        let exporter = Exporter::new(&source, &sink, options);

        let mut report = ExportReport::default();
        let result = exporter.run(&mut report);
        print_report(&output, &report);
        result?;
        Ok(())
    }
}

fn require_confluence_config<'a>(
    config: &'a Config,
    output: &Output,
) -> Result<&'a ConfluenceConfig, CliError> {
    config.require_confluence().map_err(|err| {
        output.error("Error: confluence configuration required");
        output.info("\nAdd the following to your confex.toml:");
        output.info("\n[confluence]");
        output.info(r#"base_url = "https://confluence.example.com""#);
        output.info(r#"username = "exporter@example.com""#);
        output.info(r#"api_token = "${CONFLUENCE_TOKEN}""#);
        CliError::Config(err)
    })
}

fn print_report(output: &Output, report: &ExportReport) {
    if report.pages.is_empty() {
        output.warning("\nNothing exported.");
        return;
    }

    let unchanged = report.pages.iter().filter(|p| p.unchanged).count();
    output.success(&format!(
        "\nExported {} pages ({} unchanged), {} attachments.",
        report.pages_exported(),
        unchanged,
        report.attachments_written()
    ));

    let skipped = report.pages_skipped();
    if skipped > 0 {
        output.highlight(&format!("Stopped early, {skipped} page(s) not visited."));
    }

    let failed: Vec<_> = report
        .pages
        .iter()
        .filter(|p| p.status == PageStatus::Failed)
        .collect();
    if !failed.is_empty() {
        output.warning(&format!("\n{} page(s) failed:", failed.len()));
        for page in failed {
            output.info(&format!(
                r#"  - [{}] "{}": {}"#,
                page.id,
                page.title,
                page.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    let with_attachment_failures: Vec<_> = report
        .pages
        .iter()
        .filter(|p| !p.attachment_failures.is_empty())
        .collect();
    if !with_attachment_failures.is_empty() {
        output.warning("\nAttachment failures:");
        for page in with_attachment_failures {
            for failure in &page.attachment_failures {
                output.info(&format!(r#"  - on "{}": {failure}"#, page.title));
            }
        }
    }

    let unresolved: Vec<_> = report.unresolved().collect();
    if !unresolved.is_empty() {
        output.warning(&format!(
            "\n{} unresolved reference(s) kept as external links:",
            unresolved.len()
        ));
        for reference in unresolved {
            output.info(&format!(
                r#"  - on "{}": {}"#,
                reference.page_title, reference.reference
            ));
        }
    }
}
