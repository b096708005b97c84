//! data structures for deserializing incoming alerts
//!
//! Field names are read in alertmanager's camelCase wire format. Every field
//! is optional and `null` counts as absent, so anything shaped like a JSON
//! object decodes.
use std::collections::BTreeMap;

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};
use thiserror::Error;

/// label or annotation set
pub type Labels = BTreeMap<String, String>;

/// Error occuring when the webhook body isn't an alert group
#[derive(Error, Debug)]
#[error("failed to decode alertmanager webhook payload")]
pub struct DecodeError(#[from] serde_json::Error);

/// Status of an alert group. Unknown values, including an empty status, are
/// kept as they are.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AlertStatus {
	Firing,
	Resolved,
	Other(String),
}

impl Default for AlertStatus {
	fn default() -> Self {
		Self::Other(String::new())
	}
}

impl From<String> for AlertStatus {
	fn from(status: String) -> Self {
		match status.as_str() {
			"firing" => Self::Firing,
			"resolved" => Self::Resolved,
			_ => Self::Other(status),
		}
	}
}

impl From<AlertStatus> for String {
	fn from(status: AlertStatus) -> Self {
		match status {
			AlertStatus::Firing => "firing".to_owned(),
			AlertStatus::Resolved => "resolved".to_owned(),
			AlertStatus::Other(status) => status,
		}
	}
}

/// data from prometheus received by the alertmanager webhook receiver
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct AlertGroup {
	#[serde_as(as = "DefaultOnNull")]
	pub version: String,
	#[serde_as(as = "DefaultOnNull")]
	pub group_key: String,
	#[serde_as(as = "DefaultOnNull")]
	pub status: AlertStatus,
	#[serde_as(as = "DefaultOnNull")]
	pub receiver: String,
	#[serde_as(as = "DefaultOnNull")]
	pub group_labels: Labels,
	#[serde_as(as = "DefaultOnNull")]
	pub common_labels: Labels,
	#[serde_as(as = "DefaultOnNull")]
	pub common_annotations: Labels,
	#[serde(rename = "externalURL")]
	#[serde_as(as = "DefaultOnNull")]
	pub external_url: String,
	#[serde_as(as = "DefaultOnNull")]
	pub alerts: Vec<Alert>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	#[serde_as(as = "DefaultOnNull")]
	pub labels: Labels,
	#[serde_as(as = "DefaultOnNull")]
	pub annotations: Labels,
	pub starts_at: Option<String>,
	pub ends_at: Option<String>,
}

/// Decode a webhook request body. Unknown fields are ignored.
pub fn decode(body: &[u8]) -> Result<AlertGroup, DecodeError> {
	Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// the payload alertmanager sends for two throttled config-reloader containers
	pub(crate) const MOCK_HOOK: &str = r#"
{
  "receiver": "Default",
  "status": "firing",
  "alerts": [
    {
      "status": "firing",
      "labels": {
        "alertname": "CPUThrottlingHigh",
        "container": "config-reloader",
        "namespace": "prometheus",
        "pod": "alertmanager-main-0",
        "prometheus": "prometheus/prometheus",
        "severity": "warning"
      },
      "annotations": {
        "message": "33.37% throttling of CPU in namespace prometheus for container config-reloader in pod alertmanager-main-0.",
        "runbook_url": "https://github.com/kubernetes-monitoring/kubernetes-mixin/tree/master/runbook.md#alert-name-cputhrottlinghigh"
      },
      "startsAt": "2021-04-10T03:31:01.534463406Z",
      "endsAt": "0001-01-01T00:00:00Z",
      "generatorURL": "http://prometheus-prometheus-1:9090/graph?g0.tab=1",
      "fingerprint": "c9ef92cd8b0e0db3"
    },
    {
      "status": "firing",
      "labels": {
        "alertname": "CPUThrottlingHigh",
        "container": "config-reloader",
        "namespace": "prometheus",
        "pod": "alertmanager-main-1",
        "prometheus": "prometheus/prometheus",
        "severity": "warning"
      },
      "annotations": {
        "message": "30% throttling of CPU in namespace prometheus for container config-reloader in pod alertmanager-main-1.",
        "runbook_url": "https://github.com/kubernetes-monitoring/kubernetes-mixin/tree/master/runbook.md#alert-name-cputhrottlinghigh"
      },
      "startsAt": "2020-04-10T03:31:01.534463406Z",
      "endsAt": "0001-01-01T00:00:00Z",
      "generatorURL": "http://prometheus-prometheus-1:9090/graph?g0.tab=1",
      "fingerprint": "aebedebe331b5f7e"
    }
  ],
  "groupLabels": {
    "namespace": "prometheus"
  },
  "commonLabels": {
    "alertname": "CPUThrottlingHigh",
    "container": "config-reloader",
    "namespace": "prometheus",
    "prometheus": "prometheus/prometheus",
    "severity": "warning"
  },
  "commonAnnotations": {
    "runbook_url": "https://github.com/kubernetes-monitoring/kubernetes-mixin/tree/master/runbook.md#alert-name-cputhrottlinghigh"
  },
  "externalURL": "http://alertmanager-main-0:9093",
  "version": "4",
  "groupKey": "{}:{namespace=\"prometheus\"}"
}
"#;

	pub(crate) fn mock_group() -> AlertGroup {
		decode(MOCK_HOOK.as_bytes()).unwrap()
	}

	#[test]
	fn decodes_alertmanager_payload() {
		let group = mock_group();

		assert_eq!(group.status, AlertStatus::Firing);
		assert_eq!(group.receiver, "Default");
		assert_eq!(group.version, "4");
		assert_eq!(group.group_key, "{}:{namespace=\"prometheus\"}");
		assert_eq!(group.external_url, "http://alertmanager-main-0:9093");
		assert_eq!(group.group_labels["namespace"], "prometheus");
		assert_eq!(group.alerts.len(), 2);
		assert_eq!(group.alerts[0].labels["severity"], "warning");
		assert_eq!(group.alerts[0].labels["pod"], "alertmanager-main-0");
		assert_eq!(group.alerts[1].labels["pod"], "alertmanager-main-1");
		assert_eq!(group.alerts[0].starts_at.as_deref(), Some("2021-04-10T03:31:01.534463406Z"));
		assert_eq!(group.alerts[0].ends_at.as_deref(), Some("0001-01-01T00:00:00Z"));
	}

	#[test]
	fn alert_count_survives_decoding() {
		for n in [0usize, 1, 7] {
			let alerts = vec![r#"{"labels":{"alertname":"A"}}"#; n].join(",");
			let body = format!(r#"{{"status":"resolved","alerts":[{alerts}]}}"#);

			let group = decode(body.as_bytes()).unwrap();
			assert_eq!(group.alerts.len(), n);
			assert!(group.alerts.iter().all(|alert| alert.labels["alertname"] == "A"));
		}
	}

	#[test]
	fn absent_fields_default_to_empty() {
		let group = decode(b"{}").unwrap();

		assert_eq!(group.status, AlertStatus::Other(String::new()));
		assert_eq!(String::from(group.status), "");
		assert!(group.receiver.is_empty());
		assert!(group.common_labels.is_empty());
		assert!(group.alerts.is_empty());

		let group = decode(br#"{"status":"firing"}"#).unwrap();
		assert_eq!(group.status, AlertStatus::Firing);
		assert!(group.alerts.is_empty());

		let group = decode(br#"{"alerts":[{"labels":{"alertname":"A"}}]}"#).unwrap();
		assert_eq!(group.status, AlertStatus::default());
		assert_eq!(group.alerts.len(), 1);
	}

	#[test]
	fn null_counts_as_absent() {
		let group = decode(
			br#"{"status":null,"receiver":null,"alerts":null,"groupLabels":null,
			    "commonLabels":null,"commonAnnotations":null,"externalURL":null}"#,
		)
		.unwrap();
		assert_eq!(group.status, AlertStatus::default());
		assert!(group.alerts.is_empty());
		assert!(group.group_labels.is_empty());
		assert!(group.external_url.is_empty());

		let group = decode(
			br#"{"status":"firing","alerts":[{"labels":null,"annotations":null,"startsAt":null}]}"#,
		)
		.unwrap();
		assert!(group.alerts[0].labels.is_empty());
		assert!(group.alerts[0].annotations.is_empty());
		assert!(group.alerts[0].starts_at.is_none());
	}

	#[test]
	fn unknown_status_is_passed_through() {
		let group = decode(br#"{"status":"silenced","alerts":[]}"#).unwrap();

		assert_eq!(group.status, AlertStatus::Other("silenced".to_owned()));
		assert_eq!(String::from(group.status), "silenced");
	}

	#[test]
	fn optional_timestamps_may_be_missing() {
		let group = decode(br#"{"status":"firing","alerts":[{"labels":{}}]}"#).unwrap();

		assert!(group.alerts[0].starts_at.is_none());
		assert!(group.alerts[0].ends_at.is_none());
	}

	#[test]
	fn field_names_are_case_sensitive() {
		let group =
			decode(br#"{"status":"firing","alerts":[],"Receiver":"x","receiver":"y"}"#).unwrap();

		assert_eq!(group.receiver, "y");
	}

	#[test]
	fn rejects_malformed_bodies() {
		let truncated = &MOCK_HOOK.as_bytes()[..MOCK_HOOK.len() / 2];

		assert!(decode(truncated).is_err());
		assert!(decode(b"").is_err());
		assert!(decode(b"not json at all").is_err());
		assert!(decode(br#"{"status":"firing","alerts":{"a":1}}"#).is_err());
		assert!(decode(br#"{"status":"firing","alerts":[],"commonLabels":[1,2]}"#).is_err());
		assert!(decode(b"42").is_err());
		assert!(decode(br#""firing""#).is_err());
	}
}
