//! Whoami command - show the signed-in user.

use anyhow::Result;
use clap::Args;

use super::{Context, UserOutput, describe_user};

/// Arguments for the whoami command.
#[derive(Args, Debug)]
pub struct WhoamiArgs {}

/// Run the whoami command.
pub async fn run(_args: WhoamiArgs, ctx: &Context) -> Result<()> {
    let portal = ctx.connect()?;
    let state = portal.session.ready().await;

    let user = state.current_user();

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&user.map(UserOutput::from))?
        );
        return Ok(());
    }

    match user {
        Some(user) => {
            println!("{}", describe_user(user));
            if ctx.verbose {
                println!("  id: {}", user.id);
                if let Some(profile) = &user.cadet_profile_id {
                    println!("  cadet profile: {}", profile);
                }
            }
        }
        None if state.should_redirect_to_login() => {
            println!("Session expired. Run 'corps login <email>' to sign in again.");
        }
        None => println!("Not signed in."),
    }
    Ok(())
}
