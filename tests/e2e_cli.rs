//! End-to-end tests for the `tokendeck` binary.
//!
//! Every test runs the compiled binary against its own temporary data directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn tokendeck_bin() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_tokendeck")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("target/debug/tokendeck"))
}

fn temp_data_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("temp dir")
}

fn tokendeck(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(tokendeck_bin())
        .args(args)
        .arg("--quiet")
        .env("TOKENDECK_DATA_DIR", data_dir)
        .env("TOKENDECK_API_URL", "http://127.0.0.1:9")
        .env_remove("TOKENDECK_ENCRYPTION_KEY")
        .output()
        .expect("run tokendeck")
}

fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn token(prefix: &str) -> String {
    format!("{}{}", prefix, "Z".repeat(60 - prefix.len()))
}

fn masked(raw: &str) -> String {
    format!("{}...{}", &raw[..6], &raw[raw.len() - 4..])
}

#[test]
fn help_lists_commands() {
    let tmp = temp_data_dir();
    let output = tokendeck(tmp.path(), &["help"]);
    assert!(output.status.success());
    let text = combined(&output);
    assert!(text.contains("token add"));
    assert!(text.contains("run <operation>"));
}

#[test]
fn empty_vault_lists_nothing() {
    let tmp = temp_data_dir();
    let output = tokendeck(tmp.path(), &["token", "list"]);
    assert!(output.status.success(), "{}", combined(&output));
    assert!(combined(&output).contains("No tokens stored"));
}

#[test]
fn added_token_is_listed_masked_and_active() {
    let tmp = temp_data_dir();
    let tok = token("alpha_");

    let add = tokendeck(tmp.path(), &["token", "add", &tok, "--label", "main"]);
    assert!(add.status.success(), "{}", combined(&add));

    let list = tokendeck(tmp.path(), &["token", "list"]);
    let text = combined(&list);
    assert!(text.contains(&masked(&tok)), "{}", text);
    assert!(text.contains("main"));
    assert!(text.contains('*'));
    assert!(!text.contains(&tok), "full token leaked: {}", text);
}

#[test]
fn tokens_are_encrypted_at_rest() {
    let tmp = temp_data_dir();
    let tok = token("secret_");
    assert!(tokendeck(tmp.path(), &["token", "add", &tok]).status.success());

    let db = std::fs::read(tmp.path().join("vault.db")).expect("vault.db written");
    let needle = tok.as_bytes();
    assert!(
        !db.windows(needle.len()).any(|w| w == needle),
        "plaintext token found in vault.db"
    );
}

#[test]
fn use_and_remove_by_index() {
    let tmp = temp_data_dir();
    let first = token("first_");
    let second = token("second");
    assert!(tokendeck(tmp.path(), &["token", "add", &first]).status.success());
    assert!(tokendeck(tmp.path(), &["token", "add", &second]).status.success());

    // Most recent first: [0] second, [1] first.
    let select = tokendeck(tmp.path(), &["token", "use", "1"]);
    assert!(select.status.success(), "{}", combined(&select));
    assert!(combined(&select).contains(&masked(&first)));

    let remove = tokendeck(tmp.path(), &["token", "remove", "0"]);
    assert!(remove.status.success(), "{}", combined(&remove));
    assert!(combined(&remove).contains(&masked(&first)));

    let list = combined(&tokendeck(tmp.path(), &["token", "list"]));
    assert!(list.contains(&masked(&second)));
    assert!(!list.contains(&masked(&first)));
}

#[test]
fn unknown_index_is_an_error() {
    let tmp = temp_data_dir();
    let output = tokendeck(tmp.path(), &["token", "use", "7"]);
    assert!(!output.status.success());
    assert!(combined(&output).contains("No token at index 7"));
}

#[test]
fn clear_forgets_everything() {
    let tmp = temp_data_dir();
    assert!(tokendeck(tmp.path(), &["token", "add", &token("gone__")]).status.success());
    assert!(tokendeck(tmp.path(), &["token", "clear"]).status.success());
    let list = tokendeck(tmp.path(), &["token", "list"]);
    assert!(combined(&list).contains("No tokens stored"));
}

#[test]
fn import_merges_after_existing_tokens() {
    let tmp = temp_data_dir();
    let existing = token("exist_");
    let imported = token("import");
    assert!(tokendeck(tmp.path(), &["token", "add", &existing]).status.success());

    let file = tmp.path().join("tokens.json");
    std::fs::write(
        &file,
        format!(
            r#"{{"tokens":["{}","{}"],"labels":{{"{}":"spare"}}}}"#,
            existing, imported, imported
        ),
    )
    .unwrap();
    let output = tokendeck(tmp.path(), &["token", "import", file.to_str().unwrap()]);
    assert!(output.status.success(), "{}", combined(&output));
    assert!(combined(&output).contains("Imported 1 token(s)"));

    let list = combined(&tokendeck(tmp.path(), &["token", "list"]));
    assert!(list.contains("[1]"));
    assert!(list.contains("spare"));
}

#[test]
fn ops_lists_the_catalog() {
    let tmp = temp_data_dir();
    let all = combined(&tokendeck(tmp.path(), &["ops"]));
    assert!(all.contains("bulk-delete"));
    assert!(all.contains("clone-server"));

    let one = combined(&tokendeck(tmp.path(), &["ops", "bulk-delete"]));
    assert!(one.contains("--channel"));
    assert!(one.contains("bulk-delete-log"));
}

#[test]
fn invalid_form_is_rejected_before_the_backend() {
    let tmp = temp_data_dir();
    assert!(tokendeck(tmp.path(), &["token", "add", &token("runner")]).status.success());

    let output = tokendeck(tmp.path(), &["run", "bulk-delete", "--channel", "123"]);
    assert!(!output.status.success());
    let text = combined(&output);
    assert!(text.contains("Channel ID must be a 17-19 digit numeric id"), "{}", text);
    assert!(!text.contains("Backend unreachable"));
}

#[test]
fn non_ascii_digits_are_not_an_id() {
    let tmp = temp_data_dir();
    assert!(tokendeck(tmp.path(), &["token", "add", &token("runner")]).status.success());

    let output = tokendeck(
        tmp.path(),
        &["run", "purge-channel", "--channel", "١٢٣٤٥٦٧٨٩٠١٢٣٤٥٦٧٨"],
    );
    assert!(!output.status.success());
    let text = combined(&output);
    assert!(text.contains("Channel ID must be a 17-19 digit numeric id"), "{}", text);
    assert!(!text.contains("Backend unreachable"));
}

#[test]
fn session_operations_describe_their_stop_call() {
    let tmp = temp_data_dir();
    let text = combined(&tokendeck(tmp.path(), &["ops", "live-clone"]));
    assert!(text.contains("stop_live_message_cloner"), "{}", text);
    assert!(text.contains("message-clone-log"), "{}", text);
}

#[test]
fn unreachable_backend_fails_the_run() {
    let tmp = temp_data_dir();
    assert!(tokendeck(tmp.path(), &["token", "add", &token("runner")]).status.success());

    let output = tokendeck(tmp.path(), &["run", "token-info"]);
    assert!(!output.status.success());
    let text = combined(&output);
    assert!(text.contains("Backend unreachable"), "{}", text);
    assert!(text.contains("[ERROR]"), "{}", text);
}

#[test]
fn unknown_operation_is_an_error() {
    let tmp = temp_data_dir();
    let output = tokendeck(tmp.path(), &["run", "dm-bomber"]);
    assert!(!output.status.success());
    assert!(combined(&output).contains("Unknown operation"));
}
