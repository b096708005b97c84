use std::{
	net::{IpAddr, SocketAddr},
	path::PathBuf,
	time::Duration,
};

use anyhow::{Context, Result};
use clap::{builder::PossibleValuesParser, value_parser, Arg, ArgMatches, Command};
use config::Config;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use url::Url;

use crate::{
	log::LogSettings,
	matrix::{MessageFormat, MessagePresentation, UpstreamSettings},
	telemetry_endpoint::TelemetryEndpointSettings,
};

/// prefix of environment variables overriding settings, e.g. `HOOKER_PORT`
const ENV_PREFIX: &str = "HOOKER";

/// Process configuration. Loaded once before serving and never modified.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub bind_address: IpAddr,
	pub port: u16,
	/// base url of the matrix webhook bridge
	pub upstream: Url,
	/// path of the message template
	pub template: PathBuf,
	pub avatar: String,
	pub format: MessageFormat,
	/// display name of the bot
	pub name: String,
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub forward_timeout: Duration,
	pub log: LogSettings,
	pub telemetry_endpoint: TelemetryEndpointSettings,
}

impl Settings {
	/// Load settings from defaults, the config file, the environment and the
	/// command line, in ascending precedence. Exits on `--help` or invalid
	/// arguments.
	pub fn load() -> Result<Self> {
		Self::from_matches(&command().get_matches())
	}

	fn from_matches(opts: &ArgMatches) -> Result<Self> {
		let mut builder = Config::builder()
			.set_default("bind_address", "0.0.0.0")?
			.set_default("port", 8080_i64)?
			.set_default("upstream", "http://webhook.chatops.svc.cluster.local:9000")?
			.set_default("template", "message.tmpl")?
			.set_default("avatar", "https://i.imgur.com/IDOBtEJ.png")?
			.set_default("format", "html")?
			.set_default("name", "Alertmanager")?
			.set_default("forward_timeout", 10.0_f64)?
			.set_default("log.level", "info")?
			.set_default("telemetry_endpoint.enabled", true)?
			.set_default("telemetry_endpoint.bind_address", "0.0.0.0")?
			.set_default("telemetry_endpoint.port", 9102_i64)?;

		if let Some(path) = opts.get_one::<String>("config") {
			builder = builder.add_source(config::File::with_name(path));
		}

		let string_opt = |name: &str| opts.get_one::<String>(name).cloned();

		let conf = builder
			.add_source(
				config::Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"),
			)
			.set_override_option("port", opts.get_one::<u16>("port").map(|port| i64::from(*port)))?
			.set_override_option("upstream", string_opt("upstream"))?
			.set_override_option("template", string_opt("template"))?
			.set_override_option("avatar", string_opt("avatar"))?
			.set_override_option("format", string_opt("format"))?
			.set_override_option("name", string_opt("name"))?
			.set_override_option("forward_timeout", opts.get_one::<f64>("forward-timeout").copied())?
			.set_override_option("log.level", string_opt("level"))?
			.build()
			.context("can't load config")?;

		let settings: Self = conf.try_deserialize().context("can't load config")?;

		if settings.forward_timeout.is_zero() {
			anyhow::bail!("forward_timeout must be greater than zero");
		}

		Ok(settings)
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}

	pub fn upstream_settings(&self) -> UpstreamSettings {
		UpstreamSettings { url: self.upstream.clone(), timeout: self.forward_timeout }
	}

	/// display name, avatar and format of forwarded messages
	pub fn presentation(&self) -> MessagePresentation {
		MessagePresentation {
			format: self.format,
			display_name: self.name.clone(),
			avatar_url: self.avatar.clone(),
		}
	}
}

/// command line interface
fn command() -> Command {
	Command::new(clap::crate_name!())
		.version(clap::crate_version!())
		.about(clap::crate_description!())
		.author(clap::crate_authors!())
		.args([
			Arg::new("config").help("path of config file").short('c').long("config"),
			Arg::new("port").help("which port to listen on").long("port").value_parser(value_parser!(u16)),
			Arg::new("upstream").help("base url of the matrix webhook bridge").long("upstream"),
			Arg::new("template").help("path of the message template").long("template"),
			Arg::new("avatar").help("url of the avatar to use").long("avatar"),
			Arg::new("format")
				.help("formatting of messages")
				.long("format")
				.value_parser(PossibleValuesParser::new(["html", "plain"])),
			Arg::new("name").help("display name of the bot").long("name"),
			Arg::new("forward-timeout")
				.help("seconds to wait for the bridge")
				.long("forward-timeout")
				.value_parser(value_parser!(f64)),
			Arg::new("level")
				.help("log level")
				.long("log")
				.value_parser(PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]))
				.ignore_case(true),
		])
}
