mod ops;
mod run;
mod token;

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::core::backend::HttpBackend;
use crate::core::cipher::Cipher;
use crate::core::config::AppConfig;
use crate::core::storage::{KeyValueStore, SqliteStore};
use crate::core::terminal::{self, GuideSection, print_error};
use crate::core::vault::{CredentialVault, SharedVault};
use crate::logging;
use crate::platform::{NativePlatform, Platform, ensure_data_dir};

pub(crate) const VAULT_DB: &str = "vault.db";

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Vault")
        .command("token add <token>", "Store a token and make it active (--label <name>)")
        .command("token list", "Show stored tokens, masked")
        .command("token use <index|token>", "Select the active token")
        .command("token remove <index|token>", "Forget a token")
        .command("token label <index> <label>", "Name a token (empty label removes it)")
        .command("token info [index]", "Fetch and cache the account profile")
        .command("token import <file>", "Merge tokens from a JSON or text file")
        .command("token clear", "Forget every token")
        .print();

    GuideSection::new("Operations")
        .command("ops [operation]", "List operations, or the fields of one")
        .command("run <operation> [--field value]", "Run one operation and stream its log")
        .print();

    GuideSection::new("Flags")
        .command("--verbose, -v", "Debug diagnostics")
        .command("--quiet, -q", "No diagnostics on stderr")
        .print();

    println!(
        "\n {} {} <command> [subcommand]\n",
        style("Usage:").bold(),
        style(NativePlatform::binary_name()).green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GlobalFlags {
    pub verbose: bool,
    pub quiet: bool,
}

/// Strip global flags wherever they appear and return the remaining arguments.
pub(crate) fn parse_global_flags(args: &[String]) -> (GlobalFlags, Vec<String>) {
    let mut flags = GlobalFlags::default();
    let mut rest = Vec::with_capacity(args.len());
    for arg in args {
        match arg.as_str() {
            "--verbose" | "-v" => flags.verbose = true,
            "--quiet" | "-q" => flags.quiet = true,
            _ => rest.push(arg.clone()),
        }
    }
    (flags, rest)
}

/// Vault and configuration shared by every command.
pub(crate) struct App {
    pub config: AppConfig,
    pub vault: SharedVault,
    pub diagnostics: broadcast::Sender<String>,
}

impl App {
    pub fn open(diagnostics: broadcast::Sender<String>) -> Result<Self> {
        let data_dir = ensure_data_dir().context("Failed to create the data directory")?;
        let config = AppConfig::load(&data_dir)?;

        let store: Arc<dyn KeyValueStore> = Arc::new(
            SqliteStore::open(data_dir.join(VAULT_DB)).context("Failed to open the vault")?,
        );
        let cipher = Arc::new(Cipher::resolve(store.as_ref()));
        if !cipher.is_available() {
            warn!("Encryption unavailable, tokens are stored in plain text");
        }
        let vault = SharedVault::new(CredentialVault::hydrate(store, cipher));
        info!("Vault ready at {}", data_dir.display());

        Ok(Self {
            config,
            vault,
            diagnostics,
        })
    }

    pub fn backend(&self) -> Result<HttpBackend> {
        HttpBackend::new(&self.config.api_url, self.config.request_timeout())
            .context("Failed to create the backend client")
    }
}

pub async fn run_main() -> Result<()> {
    let raw: Vec<String> = std::env::args().collect();
    let (flags, args) = parse_global_flags(&raw);
    let diagnostics = logging::init_tracing(flags.verbose, flags.quiet);

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let cmd = args[1].as_str();
    match cmd {
        "token" | "tokens" => {
            let app = App::open(diagnostics)?;
            token::run_token_command(&app, &args).await
        }
        "ops" | "operations" => {
            ops::run_ops_command(&args);
            Ok(())
        }
        "run" => {
            let app = App::open(diagnostics)?;
            run::run_operation(&app, &args, flags.quiet).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
