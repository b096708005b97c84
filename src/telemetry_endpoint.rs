//! Here we expose prometheus metrics about hooker
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	extract::State,
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
	pub enabled: bool,
	pub bind_address: IpAddr,
	pub port: u16,
}

impl TelemetryEndpointSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler(State(registry): State<Registry>) -> Response {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();

	if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
		tracing::error!("failed to encode metrics: {:?}", err);
		return StatusCode::INTERNAL_SERVER_ERROR.into_response();
	}

	([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response()
}

fn router(registry: Registry) -> Router {
	Router::new().route("/metrics", get(metrics_handler)).with_state(registry)
}

pub async fn run_telemetry_endpoint(settings: &TelemetryEndpointSettings, registry: Registry) -> Result<()> {
	let listener = tokio::net::TcpListener::bind(settings.to_socket_addr())
		.await
		.with_context(|| format!("could not bind telemetry endpoint to {}", settings.to_socket_addr()))?;

	tracing::info!("serving metrics on {}", settings.to_socket_addr());

	axum::serve(listener, router(registry)).await.context("telemetry endpoint crashed")?;

	Ok(())
}
