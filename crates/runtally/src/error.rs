//! Error taxonomy for the recorder, record stream, and concentrator.

use miette::Diagnostic;
use thiserror::Error;

pub type RecorderResult<T> = Result<T, RecorderError>;

/// Errors surfaced to the owner of a run.
///
/// Forwarding failures never appear here: they are logged and retried on the
/// next interval.
#[derive(Debug, Error, Diagnostic)]
pub enum RecorderError {
    /// Reading or writing the record stream, summary, or config failed.
    #[error("{context}: {source}")]
    #[diagnostic(code(runtally::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be encoded as JSON.
    #[error("{context}: {source}")]
    #[diagnostic(code(runtally::serialize))]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A progress postback or record could not be decoded.
    #[error("protocol error: {message}")]
    #[diagnostic(code(runtally::protocol))]
    Protocol { message: String },

    /// A node does not fit the result tree it is being added to.
    #[error("result tree error: {message}")]
    #[diagnostic(code(runtally::tree))]
    Tree { message: String },

    /// The record stream was already closed by `finalize`.
    #[error("record stream is closed")]
    #[diagnostic(
        code(runtally::stream_closed),
        help("results must be recorded before the recorder is finalized")
    )]
    StreamClosed,

    /// A run configuration file was invalid.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(runtally::config))]
    Config { message: String },

    /// The concentrator could not bind or start.
    #[error("server error: {message}")]
    #[diagnostic(code(runtally::server))]
    Server { message: String },
}

impl RecorderError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn serialize(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            context: context.into(),
            source,
        }
    }

    pub fn protocol(message: impl std::fmt::Display) -> Self {
        Self::Protocol {
            message: message.to_string(),
        }
    }

    pub fn tree(message: impl std::fmt::Display) -> Self {
        Self::Tree {
            message: message.to_string(),
        }
    }

    pub fn config(message: impl std::fmt::Display) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    pub fn server(message: impl std::fmt::Display) -> Self {
        Self::Server {
            message: message.to_string(),
        }
    }
}
