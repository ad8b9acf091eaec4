use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::cli::output::OutputOptions;
use crate::cli::prompt::TerminalPrompt;
use crate::cli::{build_orchestrator, default_resolver, one_shot_config, one_shot_sinks};
use crate::core::auth::sources::default_candidates;
use crate::core::formatter::display_percent;
use crate::core::orchestrator::RefreshOutcome;

pub async fn login(opts: &OutputOptions) -> Result<()> {
    let resolver = default_resolver();
    let prompt = TerminalPrompt::new(opts.use_color);
    let token = match resolver
        .prompt_for_token(&prompt)
        .context("Could not save token")?
    {
        Some(token) => token,
        None => {
            eprintln!("Sign-in cancelled.");
            return Ok(());
        }
    };
    println!("Token saved (…{}). Fetching usage…", token.suffix());

    let mut orchestrator = build_orchestrator(one_shot_config(), resolver, one_shot_sinks(opts))?;
    match orchestrator.sign_in(token).await {
        RefreshOutcome::Updated(snapshot) => {
            println!(
                "Signed in. 5-hour {}%, weekly {}%.",
                display_percent(snapshot.five_hour.percent),
                display_percent(snapshot.weekly.percent)
            );
            Ok(())
        }
        RefreshOutcome::SignInRequired => {
            bail!("The token was rejected by the API and has been removed.")
        }
        RefreshOutcome::Failed(message) => {
            eprintln!("Token saved, but usage could not be fetched: {}", message);
            Ok(())
        }
        RefreshOutcome::AwaitingSignIn | RefreshOutcome::Debounced => Ok(()),
    }
}

pub fn logout(opts: &OutputOptions) -> Result<()> {
    let mut orchestrator =
        build_orchestrator(one_shot_config(), default_resolver(), one_shot_sinks(opts))?;
    orchestrator
        .sign_out()
        .context("Failed to remove token from the OS keyring")?;
    println!("Signed out. Cached token removed from the OS keyring.");
    Ok(())
}

#[derive(Serialize)]
struct AuthStatus<'a> {
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_suffix: Option<String>,
    has_refresh_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at_epoch_ms: Option<i64>,
    auto_detect: bool,
    sources: Vec<&'a str>,
}

pub fn status(opts: &OutputOptions) -> Result<()> {
    let config = one_shot_config();
    let resolver = default_resolver();
    let cached = resolver.cached();

    let status = AuthStatus {
        cached: cached.is_some(),
        token_suffix: cached.as_ref().map(|t| t.suffix().to_string()),
        has_refresh_token: cached.as_ref().is_some_and(|t| t.refresh_token.is_some()),
        expires_at_epoch_ms: cached.as_ref().and_then(|t| t.expires_at_epoch_ms),
        auto_detect: config.monitor.auto_detect_credentials,
        sources: resolver.source_names(),
    };

    if opts.is_json() {
        println!("{}", opts.to_json(&status)?);
        return Ok(());
    }

    match &status.token_suffix {
        Some(suffix) => {
            println!("Cached token:  …{}", suffix);
            println!(
                "Refresh token: {}",
                if status.has_refresh_token { "yes" } else { "no" }
            );
            if let Some(expires) = status
                .expires_at_epoch_ms
                .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
            {
                println!(
                    "Expires:       {}",
                    expires
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                );
            }
        }
        None => println!("Cached token:  none"),
    }
    println!(
        "Auto-detect:   {}",
        if status.auto_detect { "on" } else { "off" }
    );
    println!("Sources:       {}", status.sources.join(", "));
    if opts.verbose {
        println!("Credential files probed:");
        for path in default_candidates() {
            let marker = if path.exists() { "found" } else { "-" };
            println!("  {:<6} {}", marker, path.display());
        }
    }
    Ok(())
}
