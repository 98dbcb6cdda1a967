use anyhow::{Context, Result, bail};
use console::style;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::App;
use crate::core::panel::resolve_profile;
use crate::core::terminal::{
    GuideSection, print_credential, print_info, print_status, print_success, print_warn,
};
use crate::core::validation::is_credential_shape;
use crate::core::vault::{Credential, Profile, SharedVault};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenCommand {
    Add { token: String, label: Option<String> },
    List,
    Use(String),
    Remove(String),
    Label { target: String, label: String },
    Info(Option<String>),
    Import(String),
    Clear,
    Help,
}

pub(crate) fn parse_token_command(args: &[String]) -> TokenCommand {
    let sub_cmd = if args.len() > 2 { args[2].as_str() } else { "" };
    let mut positional: Vec<String> = Vec::new();
    let mut label: Option<String> = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--label" | "-l" => {
                if i + 1 < args.len() {
                    label = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => {
                positional.push(args[i].clone());
                i += 1;
            }
        }
    }
    let first = positional.first().cloned();

    match sub_cmd {
        "add" => match first {
            Some(token) => TokenCommand::Add { token, label },
            None => TokenCommand::Help,
        },
        "list" | "ls" => TokenCommand::List,
        "use" | "select" => first.map(TokenCommand::Use).unwrap_or(TokenCommand::Help),
        "remove" | "rm" => first.map(TokenCommand::Remove).unwrap_or(TokenCommand::Help),
        "label" => match first {
            Some(target) => TokenCommand::Label {
                target,
                label: label.unwrap_or_else(|| positional[1..].join(" ")),
            },
            None => TokenCommand::Help,
        },
        "info" => TokenCommand::Info(first),
        "import" => first.map(TokenCommand::Import).unwrap_or(TokenCommand::Help),
        "clear" => TokenCommand::Clear,
        _ => TokenCommand::Help,
    }
}

/// Accepts a list index (as shown by `token list`) or the token itself.
fn resolve_target(vault: &SharedVault, target: &str) -> Result<Credential> {
    if let Ok(index) = target.trim().parse::<usize>() {
        return vault
            .get(index)
            .with_context(|| format!("No token at index {}", index));
    }
    let credential = Credential::parse(target).context("Token is empty")?;
    if !vault.tokens().contains(&credential) {
        bail!("No stored token matches {}", credential.mask());
    }
    Ok(credential)
}

fn print_usage() {
    GuideSection::new("tokendeck token")
        .command("add <token> [--label <name>]", "Store a token and make it active")
        .command("list", "Show stored tokens")
        .command("use <index|token>", "Select the active token")
        .command("remove <index|token>", "Forget a token")
        .command("label <index> <label>", "Name a token")
        .command("info [index]", "Fetch the account profile")
        .command("import <file>", "Merge tokens from a file")
        .command("clear", "Forget every token")
        .blank()
        .hint("tokendeck token add <token> --label main", "")
        .print();
    println!();
}

pub async fn run_token_command(app: &App, args: &[String]) -> Result<()> {
    let vault = &app.vault;
    match parse_token_command(args) {
        TokenCommand::Add { token, label } => {
            if !is_credential_shape(&token) {
                print_warn("This does not look like a complete token. Stored anyway.");
            }
            let credential = vault.add(&token)?;
            if let Some(label) = label {
                vault.set_label(credential.expose(), &label);
            }
            print_success(&format!("Token {} stored and selected.", credential.mask()));
        }
        TokenCommand::List => {
            let entries = vault.entries();
            if entries.is_empty() {
                print_info("No tokens stored. Add one with: tokendeck token add <token>");
                return Ok(());
            }
            println!();
            for entry in entries {
                let marker = if entry.active {
                    style("*").green().bold().to_string()
                } else {
                    " ".to_string()
                };
                let profile = entry
                    .profile
                    .as_ref()
                    .map(|p| format!(" ({})", p.display_name))
                    .unwrap_or_default();
                println!(
                    " {} {}  {}{}",
                    marker,
                    style(format!("[{}]", entry.index)).dim(),
                    entry.display_name(),
                    style(profile).cyan()
                );
            }
            println!();
        }
        TokenCommand::Use(target) => {
            let credential = resolve_target(vault, &target)?;
            vault.select_active(credential.expose());
            print_success(&format!("Active token is now {}.", credential.mask()));
        }
        TokenCommand::Remove(target) => {
            let credential = resolve_target(vault, &target)?;
            vault.remove(credential.expose());
            print_success(&format!("Token {} removed.", credential.mask()));
            match vault.active() {
                Some(active) => print_credential("Active", &active.mask()),
                None => print_info("No tokens left."),
            }
        }
        TokenCommand::Label { target, label } => {
            let credential = resolve_target(vault, &target)?;
            vault.set_label(credential.expose(), &label);
            if label.trim().is_empty() {
                print_success(&format!("Label removed from {}.", credential.mask()));
            } else {
                print_success(&format!("{} is now labelled '{}'.", credential.mask(), label.trim()));
            }
        }
        TokenCommand::Info(target) => {
            let credential = match target {
                Some(target) => resolve_target(vault, &target)?,
                None => vault
                    .active()
                    .context("No active token. Add one with: tokendeck token add <token>")?,
            };
            let backend = app.backend()?;
            let info = resolve_profile(&backend, vault, &credential).await?;
            println!();
            print_credential("Token", &credential.mask());
            print_status("User", &info.username);
            print_status("ID", &info.id);
            print_status("Email", info.email.as_deref().unwrap_or("N/A"));
            print_status("Verified", if info.verified { "yes" } else { "no" });
            print_status("2FA", if info.mfa_enabled { "yes" } else { "no" });
            print_status("Nitro", info.premium_label());
            print_status("Avatar", &info.avatar_url);
            println!();
        }
        TokenCommand::Import(path) => {
            let batch = read_import_file(Path::new(&path))?;
            let added = vault.import(&batch.tokens, &batch.labels, &batch.profiles);
            if added == 0 {
                print_info("Nothing new to import.");
            } else {
                print_success(&format!("Imported {} token(s).", added));
            }
        }
        TokenCommand::Clear => {
            vault.clear();
            print_success("All tokens removed.");
        }
        TokenCommand::Help => print_usage(),
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct ImportBatch {
    pub tokens: Vec<String>,
    pub labels: HashMap<String, String>,
    pub profiles: HashMap<String, Profile>,
}

#[derive(Deserialize)]
struct ImportedProfile {
    username: String,
    #[serde(rename = "avatarUrl", default)]
    avatar_url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    List(Vec<String>),
    Export {
        tokens: Vec<String>,
        #[serde(default)]
        labels: HashMap<String, String>,
        #[serde(default)]
        profiles: HashMap<String, ImportedProfile>,
    },
}

/// JSON list, JSON export object, or one token per line.
pub(crate) fn parse_import(content: &str) -> Result<ImportBatch> {
    let trimmed = content.trim_start();
    if !trimmed.starts_with('[') && !trimmed.starts_with('{') {
        return Ok(ImportBatch {
            tokens: content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from)
                .collect(),
            ..ImportBatch::default()
        });
    }

    let file: ImportFile = serde_json::from_str(content).context("Invalid import file")?;
    Ok(match file {
        ImportFile::List(tokens) => ImportBatch {
            tokens,
            ..ImportBatch::default()
        },
        ImportFile::Export {
            tokens,
            labels,
            profiles,
        } => ImportBatch {
            tokens,
            labels,
            profiles: profiles
                .into_iter()
                .filter(|(_, p)| !p.username.trim().is_empty())
                .map(|(token, p)| {
                    (
                        token,
                        Profile {
                            display_name: p.username,
                            avatar_url: p.avatar_url,
                        },
                    )
                })
                .collect(),
        },
    })
}

fn read_import_file(path: &Path) -> Result<ImportBatch> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_import(&content)
}
