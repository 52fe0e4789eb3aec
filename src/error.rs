//! Defines error types used by this library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

/// A request could not be decoded.
///
/// Decoding is all-or-nothing: every failure, from an unsupported
/// HTTP verb down to a malformed CAML body, surfaces as this one type
/// and never yields a partial call list.
#[derive(Debug)]
pub enum DecodeError {
    /// The HTTP verb is not part of the protocol. The offending verb
    /// is carried in the message.
    UnsupportedMethod(String),

    /// Neither the command field for the request mode nor the
    /// `dialogview` fallback was present.
    MissingCommand,

    /// Reading the request body failed (the vermeer parameter
    /// preamble or a form-encoded body).
    BodyIo(io::Error),

    /// The CAML body could not be parsed. The underlying failure is
    /// retained as the cause.
    Caml(CamlError),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        DecodeError::BodyIo(e)
    }
}

impl From<CamlError> for DecodeError {
    fn from(e: CamlError) -> Self {
        DecodeError::Caml(e)
    }
}

impl Display for DecodeError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            DecodeError::UnsupportedMethod(ref verb) => {
                write!(fmt, "unsupported HTTP method: {}", verb)
            }
            // Fixed legacy message; FrontPage clients match on it.
            DecodeError::MissingCommand => write!(fmt, "No Cmd parameter was found"),
            DecodeError::BodyIo(ref err) => write!(fmt, "unable to read request body: {}", err),
            DecodeError::Caml(ref err) => write!(fmt, "Unable to parse CAML Request: {}", err),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            DecodeError::UnsupportedMethod(_) | DecodeError::MissingCommand => None,
            DecodeError::BodyIo(ref err) => Some(err),
            DecodeError::Caml(ref err) => Some(err),
        }
    }
}

/// Describes possible errors that can occur when parsing a CAML body.
///
/// Positions are byte offsets into the document, as reported by the
/// underlying reader.
#[derive(Debug)]
pub enum CamlError {
    /// Error while parsing (malformed?) XML.
    Xml(quick_xml::Error),

    /// The body declared a DOCTYPE. DTD processing is disabled
    /// wholesale so entity expansion cannot be used against the
    /// parser.
    DoctypeForbidden,

    /// An opening tag arrived in a state that cannot accept it, e.g.
    /// a `SetVar` outside a `Method` block or a nested `Method`.
    UnexpectedOpen {
        tag: String,
        state: &'static str,
        offset: u64,
    },

    /// A closing tag arrived in a state that cannot accept it.
    UnexpectedClose {
        tag: String,
        state: &'static str,
        offset: u64,
    },

    /// A tag is missing an attribute the format requires.
    MissingAttribute {
        tag: &'static str,
        attr: &'static str,
        offset: u64,
    },

    /// A `Method` block closed without a command variable, so the
    /// call has no method name to dispatch on.
    MissingMethodName { offset: u64 },

    /// The document ended with a block still open.
    Truncated { state: &'static str },

    /// The document contained no `Method` block at all.
    EmptyBatch,
}

impl From<quick_xml::Error> for CamlError {
    fn from(e: quick_xml::Error) -> Self {
        CamlError::Xml(e)
    }
}

impl Display for CamlError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            CamlError::Xml(ref err) => write!(fmt, "malformed XML: {}", err),
            CamlError::DoctypeForbidden => {
                write!(fmt, "DOCTYPE declarations are not allowed")
            }
            CamlError::UnexpectedOpen {
                ref tag,
                state,
                offset,
            } => {
                write!(fmt, "unexpected <{}> at byte {} ({})", tag, offset, state)
            }
            CamlError::UnexpectedClose {
                ref tag,
                state,
                offset,
            } => {
                write!(fmt, "unexpected </{}> at byte {} ({})", tag, offset, state)
            }
            CamlError::MissingAttribute { tag, attr, offset } => {
                write!(
                    fmt,
                    "<{}> at byte {} is missing the {} attribute",
                    tag, offset, attr
                )
            }
            CamlError::MissingMethodName { offset } => {
                write!(
                    fmt,
                    "Method block ending at byte {} never named a command",
                    offset
                )
            }
            CamlError::Truncated { state } => {
                write!(fmt, "document ended {}", state)
            }
            CamlError::EmptyBatch => write!(fmt, "no Method blocks found"),
        }
    }
}

impl Error for CamlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            CamlError::Xml(ref err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_method_names_the_verb() {
        let err = DecodeError::UnsupportedMethod("PUT".to_owned());
        assert!(err.to_string().contains("PUT"));
    }

    #[test]
    fn missing_command_uses_the_legacy_message() {
        assert_eq!(
            DecodeError::MissingCommand.to_string(),
            "No Cmd parameter was found"
        );
    }

    #[test]
    fn caml_failures_wrap_uniformly() {
        let err = DecodeError::from(CamlError::EmptyBatch);
        assert!(err.to_string().starts_with("Unable to parse CAML Request"));
        assert!(err.source().is_some());
    }
}
