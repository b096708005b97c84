//! everything facing the matrix webhook bridge: the message format and the
//! http client posting it

pub mod http_client;
pub mod message;
pub mod settings;

pub use http_client::{Forward, ForwardError, HttpForwarder};
pub use message::{EncodeError, MessageFormat, MessagePresentation};
pub use settings::UpstreamSettings;
