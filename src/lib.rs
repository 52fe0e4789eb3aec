//! An FP-RPC request decoder in Rust.
//!
//! The `fprpc` crate normalizes the request shapes legacy FrontPage
//! clients send over HTTP (GET query commands, form-encoded POSTs,
//! vermeer-encoded POSTs carrying a binary payload, and CAML XML
//! batches) into one ordered list of [`RpcCall`]s for a dispatcher
//! to execute.
//!
//! The HTTP layer fills in a [`RawRequest`] (method, content type,
//! query string, body reader, authenticated user) and hands it to
//! [`FpRpcRequest::decode`] together with a [`DecoderConfig`].
//! Decoding is all-or-nothing: any failure surfaces as a single
//! [`DecodeError`].

mod call;
mod caml;
mod config;
pub mod conventions;
mod error;
mod form;
mod request;
mod status;
mod vermeer;

pub use call::RpcCall;
pub use config::{DecoderConfig, LegacyCharset};
pub use error::{CamlError, DecodeError};
pub use request::{FpRpcRequest, Method, RawRequest, RequestMode, SubSite};
pub use status::FpStatus;
