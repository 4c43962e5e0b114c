//! Persisted CLI defaults

use anyhow::Result;
use clap::ValueEnum;

use crate::config::Config;
use crate::output::{print_info, print_json, print_success, OutputFormat};

pub fn show(config: &Config) -> Result<()> {
    print_json(config)
}

pub fn set(
    mut config: Config,
    api_url: Option<String>,
    format: Option<OutputFormat>,
    window_secs: Option<u64>,
) -> Result<()> {
    if api_url.is_none() && format.is_none() && window_secs.is_none() {
        print_info("Nothing to change");
        return Ok(());
    }

    if let Some(url) = api_url {
        url::Url::parse(&url)?;
        config.api_url = Some(url);
    }
    if let Some(format) = format.and_then(|f| f.to_possible_value()) {
        config.default_format = Some(format.get_name().to_string());
    }
    if window_secs.is_some() {
        config.window_secs = window_secs;
    }

    let path = config.save()?;
    print_success(&format!("Saved {}", path.display()));
    Ok(())
}
