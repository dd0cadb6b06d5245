use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod menu;
mod report;
mod terminal;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use freee_core::api::ApiClient;
use freee_core::auth::{AuthSession, FileCredentialStore, Interaction, OAuthClient};
use freee_core::config::{ConfigLocator, Settings};
use freee_core::services::{
    CompanySelector, Document, DocumentKind, DocumentSchema, DocumentService, SelectionError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use menu::{FilterFlags, Selection};
use report::Report;
use terminal::TerminalInteraction;

const DEFAULT_PROFILE: &str = "default";
/// Listings at most this long offer detail sections in menu mode.
const DETAIL_PROMPT_MAX: usize = 5;

#[derive(Parser, Debug)]
#[command(author, version, about = "Report freee invoices and quotations as Markdown")]
struct Cli {
    /// Delete stored tokens and run the authorization flow again
    #[arg(short = 'r', long, global = true)]
    reauth: bool,
    /// Profile name for stored credentials
    #[arg(long, default_value = DEFAULT_PROFILE, global = true)]
    profile: String,
    /// Directory holding credential files (defaults to the user config directory)
    #[arg(long = "config-dir", global = true)]
    config_dir: Option<PathBuf>,
    /// Markdown file to write (defaults to invoices.md / quotations.md)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report invoices
    Invoices(DocumentArgs),
    /// Report quotations
    Quotations(DocumentArgs),
}

#[derive(Args, Debug)]
struct DocumentArgs {
    /// Filter by status code (e.g. paid, unsent)
    #[arg(long)]
    status: Option<String>,
    /// Earliest document date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest document date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Maximum number of documents (1-100)
    #[arg(long, value_parser = menu::parse_limit)]
    limit: Option<usize>,
    /// Only the most recent documents
    #[arg(long)]
    recent: bool,
    /// Include per-document detail sections
    #[arg(long)]
    details: bool,
    /// Use the interactive menu even when filters are given
    #[arg(long)]
    menu: bool,
}

impl DocumentArgs {
    fn flags(&self) -> FilterFlags {
        FilterFlags {
            status: self.status.clone(),
            from: self.from,
            to: self.to,
            limit: self.limit,
            recent: self.recent,
        }
    }
}

fn init_tracing() {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=freee_core=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let (kind, args) = match cli.command {
        Commands::Invoices(ref args) => (DocumentKind::Invoice, args),
        Commands::Quotations(ref args) => (DocumentKind::Quotation, args),
    };
    let schema = kind.schema();
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.md", schema.list_key)));
    let interactive = args.menu || args.flags().is_empty();

    println!("freee {} report", schema.singular.to_lowercase());
    println!("Started: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Output : {}", output.display());

    let settings = Settings::from_env().context("missing freee API configuration")?;
    let store = match &cli.config_dir {
        Some(dir) => FileCredentialStore::new(
            ConfigLocator::with_root(dir).context("unable to use --config-dir")?,
        ),
        None => FileCredentialStore::with_default_locator()
            .context("unable to initialise credential store")?,
    };
    let has_stored = store.exists(&cli.profile);

    let oauth = OAuthClient::from_settings(&settings).context("failed to build OAuth client")?;
    let mut session = AuthSession::new(store, oauth, &settings.api_base_url, cli.profile.as_str())
        .context("failed to initialise session")?;
    let mut terminal = TerminalInteraction;

    let discard = if cli.reauth {
        println!("Re-authentication requested; discarding stored tokens.");
        true
    } else if has_stored && interactive {
        let answer = terminal.prompt(
            "Stored tokens found.\n1. Use the stored tokens\n2. Discard them and re-authorize (after changing app permissions)\nSelect (1-2, Enter=1): ",
        )?;
        answer.trim() == "2"
    } else {
        false
    };

    if discard {
        session
            .reauthenticate(&mut terminal)
            .await
            .context("authorization failed")?;
    } else {
        session
            .ensure_valid(&mut terminal)
            .await
            .context("authentication failed")?;
    }
    info!(profile = %cli.profile, "session ready");

    let client = ApiClient::new(Arc::new(Mutex::new(session)), settings.api_base_url.clone())
        .context("failed to build API client")?;

    if let Err(err) = run_report(client, schema, args, interactive, &output, &mut terminal).await {
        eprintln!("Error: {err:#}");
        fs::write(&output, report::render_error(schema, &err))
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("Error details written to {}", output.display());
        return Err(err);
    }
    Ok(())
}

async fn run_report(
    client: ApiClient,
    schema: &'static DocumentSchema,
    args: &DocumentArgs,
    interactive: bool,
    output: &Path,
    terminal: &mut TerminalInteraction,
) -> Result<()> {
    let selector = CompanySelector::new(client.clone());
    let company_id = match selector.ensure(&mut *terminal).await {
        Ok(company_id) => company_id,
        Err(SelectionError::NoTenant) => {
            println!("No companies are available to this account.");
            write_report(output, &report::render_missing_company(schema))?;
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to select a company"),
    };

    let companies = selector
        .companies()
        .await
        .context("failed to fetch companies")?;
    if companies.is_empty() {
        println!("Company information could not be retrieved.");
        write_report(output, &report::render_missing_company(schema))?;
        return Ok(());
    }
    let Some(company) = companies.iter().find(|c| c.id == company_id) else {
        println!("Company {company_id} is not available to this account.");
        return Ok(());
    };
    println!("Active company: {} (ID: {})", company.label(), company.id);

    let selection = if interactive {
        match menu::prompt_selection(schema, &mut *terminal)? {
            Some(selection) => selection,
            None => {
                println!("Invalid selection.");
                return Ok(());
            }
        }
    } else {
        args.flags().into_selection(schema)?
    };
    let Selection { query, description } = selection;

    let service = DocumentService::new(client, schema);
    let listing = service.list(company_id, query).await;
    println!(
        "Fetched {} {}",
        listing.documents.len(),
        schema.plural.to_lowercase()
    );
    if let Some(diagnostic) = &listing.diagnostic {
        println!("Warning: {diagnostic}");
        for hint in diagnostic.hints() {
            println!("  - {hint}");
        }
    }

    let want_details = if args.details {
        true
    } else if interactive && (1..=DETAIL_PROMPT_MAX).contains(&listing.documents.len()) {
        menu::confirm(&mut *terminal, "Include detail sections?")?
    } else {
        false
    };

    let details = if want_details && !listing.is_empty() {
        let mut details: Vec<Option<Document>> = Vec::with_capacity(listing.documents.len());
        for document in &listing.documents {
            let Some(id) = document.id() else {
                details.push(None);
                continue;
            };
            match service.detail(company_id, &id).await {
                Ok(detail) => details.push(Some(detail)),
                Err(err) => {
                    warn!(%id, error = %err, "skipping document detail");
                    println!("Warning: could not fetch {} {id}: {err}", schema.kind);
                    details.push(None);
                }
            }
        }
        Some(details)
    } else {
        None
    };

    let company_name = company.label().to_owned();
    let rendered = Report {
        schema,
        generated_at: Local::now(),
        company: &company_name,
        filter: &description,
        documents: &listing.documents,
        details: details.as_deref(),
        diagnostic: listing.diagnostic.as_ref(),
    }
    .render();
    write_report(output, &rendered)?;

    if listing.is_empty() {
        println!("No matching {} found.", schema.plural.to_lowercase());
    }
    println!("Report written to {}", output.display());
    Ok(())
}

fn write_report(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
