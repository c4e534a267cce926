//! Status command - session, backend, and cache overview.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use corps_auth::{AccessDecision, RouteGuard, SessionPhase};

use super::{Context, UserOutput, describe_user};

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Serialize)]
struct StatusOutput<'a> {
    phase: SessionPhase,
    user: Option<UserOutput<'a>>,
    redirect_to_login: bool,
    admin_access: AccessDecision,
    backend_url: &'a str,
    data_dir: String,
    cache: CacheOutput,
}

#[derive(Serialize)]
struct CacheOutput {
    size: usize,
    live: usize,
    expired_pending: usize,
    default_ttl_secs: u64,
}

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let portal = ctx.connect()?;
    let state = portal.session.ready().await;
    let stats = portal.cache.stats();
    let admin_access = portal.session.authorize(RouteGuard::admin());

    if ctx.json_output {
        let output = StatusOutput {
            phase: state.phase(),
            user: state.current_user().map(UserOutput::from),
            redirect_to_login: state.should_redirect_to_login(),
            admin_access,
            backend_url: &portal.backend_url,
            data_dir: portal.data_dir.display().to_string(),
            cache: CacheOutput {
                size: stats.size,
                live: stats.live,
                expired_pending: stats.expired_pending,
                default_ttl_secs: portal.cache.config().default_ttl.as_secs(),
            },
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let yellow = Style::new().yellow();
    let red = Style::new().red();

    let phase = match state.phase() {
        SessionPhase::Authenticated => green.apply_to(state.phase()),
        SessionPhase::TimedOut => red.apply_to(state.phase()),
        _ => yellow.apply_to(state.phase()),
    };

    println!("Session: {}", phase);
    if let Some(user) = state.current_user() {
        println!("  User: {}", describe_user(user));
        println!("  Admin area: {:?}", admin_access);
    }
    if state.should_redirect_to_login() {
        println!("  Sign-in required");
    }
    println!("Backend: {}", portal.backend_url);
    println!("Data dir: {}", portal.data_dir.display());
    println!(
        "Cache: {} entries ({} live, {} expired)",
        stats.size, stats.live, stats.expired_pending
    );
    Ok(())
}
