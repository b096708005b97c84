use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

/// Build the filter: the `directives` if there are any, the configured level
/// otherwise, with dependencies capped at `warn`.
fn filter(settings: &LogSettings, directives: &str) -> Result<EnvFilter> {
	let level = tracing::Level::from_str(settings.level.as_str())
		.with_context(|| format!("invalid log level {:?}", settings.level))?;

	let filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::from_level(level).into())
		.parse(directives)
		.with_context(|| format!("invalid {} directives {directives:?}", EnvFilter::DEFAULT_ENV))?
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	Ok(filter)
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
	let fmt_layer = fmt::layer();

	let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();

	tracing_subscriber::registry().with(filter(settings, &directives)?).with(fmt_layer).try_init()?;

	Ok(())
}
