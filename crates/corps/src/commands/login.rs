//! Login command - password sign-in.

use std::io::BufRead;

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::{Context, UserOutput, describe_user};

/// Arguments for the login command.
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    pub email: String,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Serialize)]
struct LoginOutput<'a> {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserOutput<'a>>,
    redirect_to_login: bool,
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<()> {
    let password = read_password(args.password_stdin)?;
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }

    let portal = ctx.connect()?;
    portal.session.ready().await;

    let authenticated = portal.session.login(&args.email, &password).await;
    let state = portal.session.snapshot();

    if ctx.json_output {
        let output = LoginOutput {
            authenticated,
            user: state.current_user().map(UserOutput::from),
            redirect_to_login: state.should_redirect_to_login(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(user) = state.current_user() {
        let green = Style::new().green();
        println!("{} Signed in as {}", green.apply_to("✓"), describe_user(user));
    }

    if !authenticated {
        anyhow::bail!("Login failed for {}", args.email);
    }
    Ok(())
}

fn read_password(from_stdin: bool) -> Result<String> {
    if from_stdin {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(rpassword::prompt_password("Password: ")?)
}
