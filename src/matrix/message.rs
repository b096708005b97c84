//! The message format of the matrix webhook bridge. Everything besides the
//! text comes from the process configuration, never from the alert.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error occuring while serializing an [OutboundMessage]
#[derive(Error, Debug)]
#[error("failed to serialize matrix message")]
pub struct EncodeError(#[from] serde_json::Error);

/// how the bridge should interpret the message text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MessageFormat {
	#[default]
	Html,
	Plain,
}

impl MessageFormat {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Html => "html",
			Self::Plain => "plain",
		}
	}
}

impl fmt::Display for MessageFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Error, Debug)]
#[error("unknown message format `{0}`, expected `html` or `plain`")]
pub struct UnknownFormat(String);

impl FromStr for MessageFormat {
	type Err = UnknownFormat;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"html" => Ok(Self::Html),
			"plain" => Ok(Self::Plain),
			_ => Err(UnknownFormat(s.to_owned())),
		}
	}
}

impl TryFrom<String> for MessageFormat {
	type Error = UnknownFormat;

	fn try_from(s: String) -> Result<Self, Self::Error> {
		s.parse()
	}
}

/// Static presentation of every message sent by this process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagePresentation {
	pub format: MessageFormat,
	pub display_name: String,
	pub avatar_url: String,
}

impl MessagePresentation {
	/// Wrap rendered text into a message and serialize it.
	pub fn encode(&self, text: String) -> Result<Vec<u8>, EncodeError> {
		let message = OutboundMessage {
			text,
			format: self.format,
			display_name: &self.display_name,
			avatar_url: &self.avatar_url,
		};

		Ok(serde_json::to_vec(&message)?)
	}
}

/// message posted to the matrix webhook bridge
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage<'a> {
	pub text: String,
	pub format: MessageFormat,
	pub display_name: &'a str,
	pub avatar_url: &'a str,
}

#[cfg(test)]
mod tests {
	use serde_json::{json, Value};

	use super::*;

	fn presentation() -> MessagePresentation {
		MessagePresentation {
			format: MessageFormat::Plain,
			display_name: "Omar".to_owned(),
			avatar_url: "http://mock.png".to_owned(),
		}
	}

	#[test]
	fn encodes_message_with_presentation() {
		let encoded = presentation().encode("junk".to_owned()).unwrap();
		let message: Value = serde_json::from_slice(&encoded).unwrap();

		assert_eq!(
			message,
			json!({
				"text": "junk",
				"format": "plain",
				"displayName": "Omar",
				"avatarUrl": "http://mock.png",
			})
		);
	}

	#[test]
	fn text_is_escaped_as_json_string() {
		let text = "<b>\"quoted\"</b>\n\ttabbed \u{1F525}".to_owned();
		let encoded = presentation().encode(text.clone()).unwrap();
		let message: Value = serde_json::from_slice(&encoded).unwrap();

		assert_eq!(message["text"], text);
	}

	#[test]
	fn parses_formats() {
		assert_eq!("html".parse::<MessageFormat>().unwrap(), MessageFormat::Html);
		assert_eq!("plain".parse::<MessageFormat>().unwrap(), MessageFormat::Plain);
		assert!("markdown".parse::<MessageFormat>().is_err());
		assert!("HTML".parse::<MessageFormat>().is_err());

		let format: MessageFormat = serde_json::from_str("\"plain\"").unwrap();
		assert_eq!(format, MessageFormat::Plain);
		assert!(serde_json::from_str::<MessageFormat>("\"test\"").is_err());
		assert_eq!(MessageFormat::default().to_string(), "html");
	}
}
