//! prometheus alertmanager receiver that forwards alerts to a matrix webhook
//! bridge
//!
//! Features:
//! - renders alert groups with a go template loaded at startup
//! - forwards the webhook url token verbatim to the bridge
//! - prometheus metrics about received and forwarded alerts

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use settings::Settings;

use crate::{alert_renderer::AlertRenderer, matrix::HttpForwarder};

mod alert;
mod alert_renderer;
mod alertmanager_webhook_receiver;
mod log;
mod matrix;
mod settings;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let renderer =
		AlertRenderer::load(&settings.template).context("failed to construct alert renderer")?;

	let registry = Registry::new();

	let forwarder = HttpForwarder::new(&settings.upstream_settings(), &registry)
		.context("failed to construct upstream http client")?;

	let state = alertmanager_webhook_receiver::State::new(
		renderer,
		settings.presentation(),
		Arc::new(forwarder),
		&registry,
	)
	.context("failed to construct alertmanager webhook receiver")?;

	if settings.telemetry_endpoint.enabled {
		let telemetry = settings.telemetry_endpoint.clone();
		tokio::spawn(async move {
			#[allow(clippy::expect_used)]
			telemetry_endpoint::run_telemetry_endpoint(&telemetry, registry)
				.await
				.expect("telemetry endpoint failed to start or crashed");
		});
	}

	alertmanager_webhook_receiver::run_prometheus_receiver(settings.to_socket_addr(), Arc::new(state))
		.await
		.context("prometheus alertmanager receiver endpoint failed to start or crashed")?;

	Ok(())
}
