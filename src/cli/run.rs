use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use super::App;
use crate::core::job::{JobError, JobStatus, Settlement};
use crate::core::logstream::EventBus;
use crate::core::panel::{ActionPanel, Notifier, OperationKind, PanelContext, catalog};
use crate::core::terminal::{
    print_credential, print_info, print_link, print_step, print_warn, print_goodbye,
};
use crate::interfaces::console::{ConsoleView, drain_notifications};

/// Lines can still arrive after the job settles.
const TRAILING_LOG_GRACE: Duration = Duration::from_millis(200);

/// `--name value` pairs. A flag without a value is `true`; `--no-name` is `false`.
pub(crate) fn parse_form(op: &OperationKind, args: &[String], start: usize) -> Result<HashMap<String, String>> {
    let mut form = HashMap::new();
    let mut i = start;
    while i < args.len() {
        let Some(name) = args[i].strip_prefix("--") else {
            bail!("Unexpected argument '{}'", args[i]);
        };
        if let Some(negated) = name.strip_prefix("no-")
            && op.field(negated).is_some_and(|f| f.is_flag())
        {
            form.insert(negated.to_string(), "false".to_string());
            i += 1;
            continue;
        }
        let field = op
            .field(name)
            .with_context(|| format!("{} has no field --{}", op.name, name))?;
        let next = args.get(i + 1).filter(|v| !v.starts_with("--"));
        match next {
            Some(value) => {
                form.insert(name.to_string(), value.clone());
                i += 2;
            }
            None if field.is_flag() => {
                form.insert(name.to_string(), "true".to_string());
                i += 1;
            }
            None => bail!("--{} needs a value", name),
        }
    }
    Ok(form)
}

fn print_recent_diagnostics(rx: &mut broadcast::Receiver<String>) {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    if lines.is_empty() {
        return;
    }
    print_warn("Recent diagnostics:");
    for line in lines {
        eprintln!("    {}", line);
    }
}

/// Follow the log of a live session until Ctrl+C, then stop it. Returns false when the stop
/// was rejected or abandoned.
async fn follow_session(
    panel: &ActionPanel,
    view: &mut ConsoleView,
    changes: &mut watch::Receiver<usize>,
) -> Result<bool> {
    print_info(&format!("{} is live. Press Ctrl+C to stop.", panel.operation().title));
    loop {
        tokio::select! {
            _ = changes.changed() => view.flush(),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    print_warn("Stopping...");
    let stop = panel.stop();
    tokio::pin!(stop);
    tokio::select! {
        stopped = &mut stop => Ok(stopped),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            print_warn("Interrupted again; leaving the session to the backend.");
            Ok(false)
        }
    }
}

pub async fn run_operation(app: &App, args: &[String], quiet: bool) -> Result<()> {
    let Some(name) = args.get(2) else {
        print_info("Usage: tokendeck run <operation> [--field value ...]. See: tokendeck ops");
        return Ok(());
    };
    let op = catalog::find(name)
        .with_context(|| format!("Unknown operation '{}'. See: tokendeck ops", name))?;
    let form = parse_form(op, args, 3)?;
    let mut diagnostics = app.diagnostics.subscribe();

    let (notifier, mut notifications) = Notifier::channel();
    let ctx = PanelContext {
        vault: app.vault.clone(),
        backend: Arc::new(app.backend()?),
        bus: EventBus::new(app.config.log_capacity),
        notifier,
    };
    let mut panel = ActionPanel::new(op, ctx);
    panel.mount();

    print_step(op.title);
    print_link("Backend", &app.config.api_url);
    if op.uses_credential {
        match panel.active_entry() {
            Some(entry) => print_credential("Token", &entry.display_name()),
            None => print_warn("No active token. Add one with: tokendeck token add <token>"),
        }
    }
    println!();

    let canceller = panel.canceller();
    let mut view = ConsoleView::new(panel.logs().clone());
    let mut changes = panel.logs().watch();
    let mut cancel_task: Option<JoinHandle<bool>> = None;
    let mut abandoned = false;

    let result = {
        let submit = panel.submit(&form);
        tokio::pin!(submit);
        loop {
            tokio::select! {
                result = &mut submit => break result,
                _ = changes.changed() => view.flush(),
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    if cancel_task.is_some() {
                        print_warn("Interrupted again; not waiting for the backend.");
                        abandoned = true;
                        break Ok(Settlement::Cancelled);
                    }
                    print_warn("Cancelling... press Ctrl+C again to leave at once.");
                    let canceller = canceller.clone();
                    cancel_task = Some(tokio::spawn(async move { canceller.cancel().await }));
                }
            }
        }
    };

    // Let the backend hear about the cancel before the process exits.
    if let Some(task) = cancel_task
        && !abandoned
    {
        tokio::select! {
            _ = task => {}
            signal = tokio::signal::ctrl_c() => {
                signal?;
                print_warn("Interrupted again; not waiting for the backend.");
            }
        }
    }

    let mut session_stopped = None;
    if matches!(result, Ok(Settlement::Ok(_))) && panel.is_live() {
        session_stopped = Some(follow_session(&panel, &mut view, &mut changes).await?);
    }

    if !abandoned {
        tokio::time::sleep(TRAILING_LOG_GRACE).await;
    }
    view.flush();
    println!();
    drain_notifications(&mut notifications);
    panel.unmount();

    let status = panel.status();
    info!("'{}' settled with status {}", op.command, status);
    match (result, session_stopped) {
        (Ok(_), Some(true)) => {
            print_goodbye();
            Ok(())
        }
        (Ok(_), Some(false)) => bail!("{} may still be running in the backend", op.title),
        (Ok(Settlement::Cancelled), None) => {
            print_info("Operation cancelled.");
            Ok(())
        }
        (Ok(_), None) if status == JobStatus::Success => {
            print_goodbye();
            Ok(())
        }
        (Ok(_), None) => {
            if quiet {
                print_recent_diagnostics(&mut diagnostics);
            }
            bail!("{} finished with status {}", op.title, status)
        }
        (Err(JobError::Validation(_)), _) => bail!("Fix the input above and try again"),
        (Err(e), _) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_values_and_flags() {
        let op = catalog::find("clone-messages").unwrap();
        let form = parse_form(
            op,
            &args(&[
                "tokendeck",
                "run",
                "clone-messages",
                "--source",
                "123456789012345678",
                "--skip-bots",
                "--no-embeds",
                "--limit",
                "10",
            ]),
            3,
        )
        .unwrap();
        assert_eq!(form["source"], "123456789012345678");
        assert_eq!(form["skip-bots"], "true");
        assert_eq!(form["embeds"], "false");
        assert_eq!(form["limit"], "10");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let op = catalog::find("bulk-delete").unwrap();
        assert!(parse_form(op, &args(&["tokendeck", "run", "bulk-delete", "--nope", "1"]), 3).is_err());
        assert!(parse_form(op, &args(&["tokendeck", "run", "bulk-delete", "stray"]), 3).is_err());
    }

    #[test]
    fn value_fields_need_a_value() {
        let op = catalog::find("bulk-delete").unwrap();
        assert!(parse_form(op, &args(&["tokendeck", "run", "bulk-delete", "--channel"]), 3).is_err());
    }
}
