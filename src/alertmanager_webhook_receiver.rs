//! receives alertmanager webhooks, renders them and forwards them to the
//! matrix webhook bridge
//!
//! Every request passes decode → render → encode → forward. The first failing
//! stage ends the request, nothing is retried and nothing of an earlier stage
//! is undone.
use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
	body::Bytes,
	extract::Extension,
	http::{StatusCode, Uri},
	response::{IntoResponse, Response},
	routing::{get, post},
	Router,
};
use prometheus::{IntCounterVec, Registry};
use thiserror::Error;

use crate::{
	alert::{self, DecodeError},
	alert_renderer::{AlertRenderer, RenderError},
	matrix::{http_client::HOOK_PATH, EncodeError, Forward, ForwardError, MessagePresentation},
};

/// Error ending the processing of a webhook request
#[derive(Error, Debug)]
pub enum RelayError {
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error(transparent)]
	Render(#[from] RenderError),
	#[error(transparent)]
	Encode(#[from] EncodeError),
	#[error(transparent)]
	Forward(#[from] ForwardError),
}

impl RelayError {
	/// stage of the pipeline the request failed in
	pub fn stage(&self) -> &'static str {
		match self {
			Self::Decode(_) => "decode",
			Self::Render(_) => "render",
			Self::Encode(_) => "encode",
			Self::Forward(_) => "forward",
		}
	}

	/// client errors for what the caller sent, server errors for our own
	/// and the bridge's failures
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::Decode(_) => StatusCode::BAD_REQUEST,
			Self::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Forward(ForwardError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
			Self::Forward(_) => StatusCode::BAD_GATEWAY,
		}
	}
}

impl IntoResponse for RelayError {
	fn into_response(self) -> Response {
		(self.status_code(), format!("{}: {}", self.stage(), self)).into_response()
	}
}

/// the part of `path` following the hook prefix, verbatim
fn extract_token(path: &str) -> Option<&str> {
	path.strip_prefix(HOOK_PATH).filter(|token| !token.is_empty())
}

pub struct State {
	renderer: AlertRenderer,
	presentation: MessagePresentation,
	forwarder: Arc<dyn Forward>,
	metric: IntCounterVec,
}

impl State {
	pub fn new(
		renderer: AlertRenderer,
		presentation: MessagePresentation,
		forwarder: Arc<dyn Forward>,
		registry: &Registry,
	) -> Result<Self> {
		use prometheus::opts;

		let metric = IntCounterVec::new(
			opts!("requests_total", "total number of webhook requests by outcome")
				.namespace("hooker")
				.subsystem("alertmanager_webhook"),
			&["outcome"],
		)?;
		registry.register(Box::new(metric.clone())).context("failed to register prometheus meters")?;

		Ok(Self { renderer, presentation, forwarder, metric })
	}

	/// decode, render, encode and forward a single webhook body
	async fn relay(&self, token: &str, body: &[u8]) -> Result<(), RelayError> {
		let alert = alert::decode(body)?;
		let text = self.renderer.render(&alert)?;
		let message = self.presentation.encode(text)?;
		self.forwarder.forward(token, message).await?;

		Ok(())
	}
}

async fn alertmanager_receiver(
	Extension(state): Extension<Arc<State>>,
	uri: Uri,
	body: Bytes,
) -> Result<StatusCode, RelayError> {
	let token = match extract_token(uri.path()) {
		Some(token) => token,
		None => return Ok(StatusCode::NOT_FOUND),
	};

	match state.relay(token, &body).await {
		Ok(()) => {
			state.metric.with_label_values(&["forwarded"]).inc();
			tracing::debug!("forwarded alert");
			Ok(StatusCode::OK)
		}
		Err(err) => {
			state.metric.with_label_values(&[err.stage()]).inc();
			tracing::warn!(stage = err.stage(), "failed to relay alert: {}", error_chain(&err));
			Err(err)
		}
	}
}

/// `err` followed by all its causes
fn error_chain(err: &dyn std::error::Error) -> String {
	let mut chain = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		chain.push_str(": ");
		chain.push_str(&cause.to_string());
		source = cause.source();
	}

	chain
}

async fn ping() -> &'static str {
	"pong"
}

pub fn router(state: Arc<State>) -> Router {
	Router::new()
		.route("/ping", get(ping))
		.route(&format!("{HOOK_PATH}*token"), post(alertmanager_receiver))
		.layer(Extension(state))
}

pub async fn run_prometheus_receiver(addr: SocketAddr, state: Arc<State>) -> Result<()> {
	let listener = tokio::net::TcpListener::bind(addr)
		.await
		.with_context(|| format!("could not bind webhook receiver to {addr}"))?;

	tracing::info!("receiving alertmanager webhooks on {addr}");

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("prometheus endpoint crashed")?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!("failed to listen for shutdown signal: {:?}", err);
		std::future::pending::<()>().await;
	}

	tracing::info!("shutting down");
}
