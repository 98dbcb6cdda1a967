mod cli;
mod core;
mod interfaces;
mod logging;
mod platform;

use crate::core::terminal;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = cli::run_main().await {
        terminal::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
