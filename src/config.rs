//! Decoder configuration.

/// Byte encoding legacy clients used for URL-encoded parameter
/// values.
///
/// The historical decoder re-interpreted every parameter value
/// through this encoding; see
/// [`DecoderConfig::legacy_charset`](struct.DecoderConfig.html#structfield.legacy_charset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LegacyCharset {
    /// ISO-8859-1, the protocol's historical default.
    #[default]
    Latin1,
    /// Parameter values are already correct UTF-8; disables the
    /// re-decode entirely.
    Utf8,
}

/// Settings for [`FpRpcRequest::decode`].
///
/// The configuration is injected per decode call and read once; there
/// is no process-global state.
///
/// [`FpRpcRequest::decode`]: crate::FpRpcRequest::decode
#[derive(Clone, Copy, Debug, Default)]
pub struct DecoderConfig {
    /// Charset URL-encoded parameter values are re-decoded from.
    ///
    /// Legacy clients URL-encode bytes of their platform charset, so
    /// a container that decoded the query string as Latin-1 hands us
    /// mojibake for anything non-ASCII. Values are re-interpreted
    /// through this charset on a best-effort basis.
    pub legacy_charset: LegacyCharset,
}

impl DecoderConfig {
    pub fn new() -> DecoderConfig {
        DecoderConfig::default()
    }

    /// Sets the charset parameter values are re-decoded from.
    pub fn legacy_charset(mut self, charset: LegacyCharset) -> DecoderConfig {
        self.legacy_charset = charset;
        self
    }
}
