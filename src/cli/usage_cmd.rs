use anyhow::{bail, Result};

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::{build_orchestrator, default_resolver, one_shot_config, one_shot_sinks, renderer};
use crate::core::history::{HistoryStore, PANEL_HISTORY_POINTS};
use crate::core::orchestrator::RefreshOutcome;

pub async fn run(opts: &OutputOptions) -> Result<()> {
    let config = one_shot_config();
    let mut orchestrator = build_orchestrator(config, default_resolver(), one_shot_sinks(opts))?;

    // Show spinner on stderr (text mode only)
    let spinner = if matches!(opts.format, OutputFormat::Text) {
        Some(tokio::spawn(async move {
            let frames = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
            let mut i = 0usize;
            loop {
                eprint!("\r {} Fetching Claude usage...", frames[i % frames.len()]);
                i = i.wrapping_add(1);
                tokio::time::sleep(std::time::Duration::from_millis(80)).await;
            }
        }))
    } else {
        None
    };

    let outcome = orchestrator.refresh(true).await;

    // Stop spinner and clear the line
    if let Some(s) = spinner {
        s.abort();
        eprint!("\r\x1b[2K");
    }

    match outcome {
        RefreshOutcome::Updated(snapshot) => {
            match opts.format {
                OutputFormat::Json => println!("{}", opts.to_json(&snapshot)?),
                OutputFormat::Text => {
                    let history =
                        HistoryStore::open(HistoryStore::default_path()).get_last(PANEL_HISTORY_POINTS);
                    println!(
                        "{}",
                        renderer::render_panel(
                            &snapshot,
                            &history,
                            chrono::Utc::now().timestamp_millis(),
                            opts.use_color
                        )
                    );
                }
            }
            Ok(())
        }
        RefreshOutcome::AwaitingSignIn => {
            bail!("No Claude credentials found. Run `cwatch auth login` to paste a token.")
        }
        RefreshOutcome::SignInRequired => {
            bail!("The stored token was rejected. Run `cwatch auth login` to sign in again.")
        }
        RefreshOutcome::Failed(message) => bail!(message),
        RefreshOutcome::Debounced => bail!("Refresh skipped"),
    }
}
