//! where and how long messages are forwarded

use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
/// matrix webhook bridge the messages are posted to
pub struct UpstreamSettings {
	/// base url of the bridge
	pub url: Url,
	/// bound for a single forward, connecting included
	pub timeout: Duration,
}
