//! Binary entrypoint for the terminal storefront chat.

use std::process::ExitCode;

use storefront_chat::start_storefront_chat;

/// Run a shopper or support chat session on stdin/stdout.
fn main() -> ExitCode {
    start_storefront_chat::run()
}
