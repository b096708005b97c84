//! forwards messages to the matrix webhook bridge and records metrics about
//! the requests
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::StatusCode;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use thiserror::Error;

use super::settings::UpstreamSettings;

/// path on the bridge, the token gets appended to it
pub const HOOK_PATH: &str = "/api/v1/matrix/hook/";

/// Error occuring while forwarding a message
#[derive(Error, Debug)]
pub enum ForwardError {
	/// the bridge didn't answer within the configured timeout
	#[error("upstream didn't respond within {0:?}")]
	Timeout(Duration),
	/// no connection to the bridge could be established
	#[error("could not connect to upstream")]
	Connect(#[source] reqwest::Error),
	/// any other failure while sending the request or receiving the response
	#[error("request to upstream failed")]
	Request(#[source] reqwest::Error),
	/// the bridge answered with a non success status
	#[error("upstream responded with {0}")]
	Status(StatusCode),
}

/// Forwards serialized messages to the bridge. One attempt per call.
#[async_trait]
pub trait Forward: Send + Sync {
	/// post `message` to the bridge under `token`
	async fn forward(&self, token: &str, message: Vec<u8>) -> Result<(), ForwardError>;
}

#[derive(Debug, Clone)]
/// prometheus meters for the upstream http client
struct Metrics {
	/// total number of http requests
	http_requests: IntCounterVec,
	/// total number of failed http requests
	http_requests_failed: IntCounterVec,
	/// time spent by http requests
	http_request_duration: HistogramVec,
}

impl Metrics {
	/// construct and register prometheus meters
	pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		use prometheus::{exponential_buckets, histogram_opts, opts};

		let http_requests = IntCounterVec::new(
			opts!("requests_total", "total number of http requests")
				.namespace("hooker")
				.subsystem("upstream_http_client"),
			&["host"],
		)?;

		let http_requests_failed = IntCounterVec::new(
			opts!("requests_failed", "number of failed http requests")
				.namespace("hooker")
				.subsystem("upstream_http_client"),
			&["host", "status_code"],
		)?;

		let http_request_duration = HistogramVec::new(
			histogram_opts!(
				"request_duration_seconds",
				"total time of a http request in seconds",
				exponential_buckets(0.01, 2., 12)?
			)
			.subsystem("upstream_http_client")
			.namespace("hooker"),
			&["host"],
		)?;

		registry.register(Box::new(http_requests.clone()))?;
		registry.register(Box::new(http_requests_failed.clone()))?;
		registry.register(Box::new(http_request_duration.clone()))?;

		Ok(Self { http_requests, http_requests_failed, http_request_duration })
	}
}

#[derive(Debug, Clone)]
/// [Forward] implementation posting to the configured bridge
pub struct HttpForwarder {
	/// http client
	client: reqwest::Client,
	/// bridge url without trailing slash
	base: String,
	/// host label of the metrics
	host: String,
	/// request timeout
	timeout: Duration,
	/// prometheus meters for http requests
	metrics: Metrics,
}

impl HttpForwarder {
	/// construct http client
	pub fn new(settings: &UpstreamSettings, registry: &Registry) -> Result<Self> {
		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(settings.timeout)
				.connect_timeout(settings.timeout)
				.build()
				.context("failed to build reqwest client")?,
			base: settings.url.as_str().trim_end_matches('/').to_owned(),
			host: settings.url.host_str().unwrap_or_default().to_owned(),
			timeout: settings.timeout,
			metrics: Metrics::new(registry).context("failed to register prometheus meters")?,
		})
	}

	/// destination of messages sent with `token`
	pub fn destination(&self, token: &str) -> String {
		format!("{}{HOOK_PATH}{token}", self.base)
	}

	/// sort a reqwest error into the [ForwardError] it represents
	fn classify(&self, err: reqwest::Error) -> ForwardError {
		if err.is_timeout() {
			ForwardError::Timeout(self.timeout)
		} else if err.is_connect() {
			ForwardError::Connect(err)
		} else {
			ForwardError::Request(err)
		}
	}
}

#[async_trait]
impl Forward for HttpForwarder {
	async fn forward(&self, token: &str, message: Vec<u8>) -> Result<(), ForwardError> {
		let host = self.host.as_str();

		let _timer = self.metrics.http_request_duration.with_label_values(&[host]).start_timer();
		self.metrics.http_requests.with_label_values(&[host]).inc();

		let response = self
			.client
			.post(self.destination(token))
			.header(reqwest::header::CONTENT_TYPE, "application/json")
			.body(message)
			.send()
			.await;

		let response = match response {
			Ok(response) => response,
			Err(err) => {
				self.metrics.http_requests_failed.with_label_values(&[host, ""]).inc();
				return Err(self.classify(err));
			}
		};

		let status = response.status();
		if !status.is_success() {
			self.metrics.http_requests_failed.with_label_values(&[host, status.as_str()]).inc();
			return Err(ForwardError::Status(status));
		}

		tracing::debug!(%status, "upstream accepted message");

		Ok(())
	}
}
