use anyhow::Result;

use crate::cli::output::OutputOptions;
use crate::core::config::AppConfig;

pub fn init(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match AppConfig::default().save() {
        Ok(path) => {
            println!("Generated config at {}", path.display());
            println!("  Refresh every 60s, notify at 50/75/90/100% of the 5-hour window.");
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `cwatch config init` to create one. Defaults are in effect.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if opts.is_json() {
        println!("{}", opts.to_json(&config)?);
    }

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        println!(
            "  Refresh every {}s, primary window {}, display {}",
            config.refresh_interval().as_secs(),
            config.notifications.primary_metric.long_label(),
            config.display.status_bar_display.as_str()
        );
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

pub fn path(_opts: &OutputOptions) -> Result<()> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
