//! Logout command - end the session.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::Context;

/// Arguments for the logout command.
#[derive(Args, Debug)]
pub struct LogoutArgs {}

#[derive(Serialize)]
struct LogoutOutput {
    signed_out: bool,
}

/// Run the logout command.
pub async fn run(_args: LogoutArgs, ctx: &Context) -> Result<()> {
    let portal = ctx.connect()?;
    let state = portal.session.ready().await;
    let had_user = state.current_user().is_some();

    portal.session.logout().await;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&LogoutOutput {
                signed_out: had_user
            })?
        );
    } else if had_user {
        println!("Signed out.");
    } else {
        println!("No active session; local session data cleared.");
    }
    Ok(())
}
