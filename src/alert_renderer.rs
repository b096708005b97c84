//! Renders alerts via go templates.
//!
//! The template is compiled once at startup and shared read-only between all
//! requests. Rendering errors are returned to the caller instead of being
//! turned into a message.
//!
//! The alert group is exposed the way alertmanager's webhook struct is: group
//! and alert fields are struct-like (`.Status`, `.Alerts`, `.Labels`, unknown
//! names are an error) while label and annotation sets are maps (a missing
//! key renders `<no value>`).

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use gtmpl::{
	error::{ExecError, ParseError},
	FuncError, Template, Value,
};
use thiserror::Error;

use crate::alert::{Alert, AlertGroup, Labels};

/// Error occuring while compiling or rendering the message template
#[derive(Error, Debug)]
pub enum RenderError {
	/// the template source doesn't compile
	#[error("failed to compile message template")]
	Parse(#[source] ParseError),
	/// the template compiled but can't be rendered with the received alert
	#[error("failed to render alert with message template")]
	Execute(#[source] ExecError),
}

/// Alert renderer
pub struct AlertRenderer {
	template: Template,
}

impl std::fmt::Debug for AlertRenderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AlertRenderer").finish_non_exhaustive()
	}
}

impl AlertRenderer {
	/// Load and compile the template at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let source = std::fs::read_to_string(path)
			.with_context(|| format!("could not read template {:?}", path))?;

		tracing::info!("loaded message template from {:?}", path);

		Self::from_source(&source).with_context(|| format!("could not parse template {:?}", path))
	}

	/// Compile a template from its source.
	pub fn from_source(source: &str) -> Result<Self, RenderError> {
		let mut template = Template::default();
		template.add_func("sortedPairs", sorted_pairs);
		template.parse(source).map_err(RenderError::Parse)?;

		Ok(Self { template })
	}

	/// Renders an alert group into the message text.
	///
	/// # Arguments
	///
	/// * `alert` - decoded alert group, exposed to the template with
	///   capitalized field names (`.Status`, `.Alerts`, ...)
	pub fn render(&self, alert: &AlertGroup) -> Result<String, RenderError> {
		let context = gtmpl::Context::from(group_value(alert));

		self.template.render(&context).map_err(RenderError::Execute)
	}
}

fn labels_value(labels: &Labels) -> Value {
	Value::Map(labels.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect())
}

fn alert_value(alert: &Alert) -> Value {
	let fields = HashMap::from([
		("Labels".to_owned(), labels_value(&alert.labels)),
		("Annotations".to_owned(), labels_value(&alert.annotations)),
		("StartsAt".to_owned(), Value::from(alert.starts_at.as_deref().unwrap_or_default())),
		("EndsAt".to_owned(), Value::from(alert.ends_at.as_deref().unwrap_or_default())),
	]);

	Value::Object(fields)
}

fn group_value(group: &AlertGroup) -> Value {
	let fields = HashMap::from([
		("Version".to_owned(), Value::from(group.version.as_str())),
		("GroupKey".to_owned(), Value::from(group.group_key.as_str())),
		("Status".to_owned(), Value::from(String::from(group.status.clone()))),
		("Receiver".to_owned(), Value::from(group.receiver.as_str())),
		("GroupLabels".to_owned(), labels_value(&group.group_labels)),
		("CommonLabels".to_owned(), labels_value(&group.common_labels)),
		("CommonAnnotations".to_owned(), labels_value(&group.common_annotations)),
		("ExternalURL".to_owned(), Value::from(group.external_url.as_str())),
		("Alerts".to_owned(), Value::Array(group.alerts.iter().map(alert_value).collect())),
	]);

	Value::Object(fields)
}

/// `sortedPairs .Labels` lists a label set as `.Name`/`.Value` pairs ordered
/// by name. Ranging over the map itself has no stable order.
fn sorted_pairs(args: &[Value]) -> Result<Value, FuncError> {
	let [Value::Map(map)] = args else {
		return Err(FuncError::ExactlyXArgs("sortedPairs".to_owned(), 1));
	};

	let mut names: Vec<&String> = map.keys().collect();
	names.sort();

	let pairs = names
		.into_iter()
		.map(|name| {
			Value::Object(HashMap::from([
				("Name".to_owned(), Value::from(name.as_str())),
				("Value".to_owned(), map[name].clone()),
			]))
		})
		.collect();

	Ok(Value::Array(pairs))
}
