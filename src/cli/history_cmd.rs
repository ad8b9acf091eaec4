use anyhow::Result;

use crate::cli::output::OutputOptions;
use crate::cli::renderer;
use crate::core::history::{HistoryStore, MAX_HISTORY_POINTS};

pub fn run(limit: Option<usize>, clear: bool, opts: &OutputOptions) -> Result<()> {
    let mut history = HistoryStore::open(HistoryStore::default_path());

    if clear {
        let removed = history.len();
        history.clear();
        match history.path() {
            Some(path) => println!("Cleared {} points from {}", removed, path.display()),
            None => println!("Cleared {} points", removed),
        }
        return Ok(());
    }

    let points = history.get_last(limit.unwrap_or(MAX_HISTORY_POINTS));
    if opts.is_json() {
        println!("{}", opts.to_json(&points)?);
    } else {
        println!("{}", renderer::render_history(&points, opts.use_color));
    }
    Ok(())
}
