//! The HTTP-facing request model: classification, call assembly, and
//! the decoded request surface.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::io::{self, BufReader, Read};

use mime::Mime;
use tracing::debug;

use crate::call::RpcCall;
use crate::caml::CamlParser;
use crate::config::DecoderConfig;
use crate::conventions::{
    ANONYMOUS, CATALOGS_MARKER, CATALOGS_SUFFIX, DIALOG_VIEW_PARAM, GET_CMD_PARAM,
    LAYOUTS_MARKER, LAYOUTS_SUFFIX, POST_CMD_PARAM, VERMEER_CONTENT_TYPE,
};
use crate::error::DecodeError;
use crate::form;
use crate::vermeer;

/// HTTP verbs as seen by the decoder.
///
/// Only GET, HEAD and POST take part in the protocol; everything else
/// is preserved verbatim so the rejection can name it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other(String),
}

impl Method {
    /// Maps a raw request-line verb onto the decoder's view of it.
    pub fn from_verb(verb: &str) -> Method {
        match verb.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            other => Method::Other(other.to_owned()),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Method::Get => f.write_str("GET"),
            Method::Head => f.write_str("HEAD"),
            Method::Post => f.write_str("POST"),
            Method::Other(ref verb) => f.write_str(verb),
        }
    }
}

/// Parsing strategy selected for a request; fixed once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMode {
    /// GET/HEAD with query-string parameters.
    Get,
    /// POST with form- or vermeer-encoded parameters.
    Post,
    /// POST with a CAML XML batch body.
    Caml,
}

/// Sub-site roots FrontPage clients resolve resources against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubSite {
    Catalogs,
    Layouts,
}

impl SubSite {
    /// Recognizes the path marker legacy clients embed in URLs.
    pub fn from_marker(marker: &str) -> Option<SubSite> {
        if marker.eq_ignore_ascii_case(CATALOGS_MARKER) {
            Some(SubSite::Catalogs)
        } else if marker.eq_ignore_ascii_case(LAYOUTS_MARKER) {
            Some(SubSite::Layouts)
        } else {
            None
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            SubSite::Catalogs => CATALOGS_SUFFIX,
            SubSite::Layouts => LAYOUTS_SUFFIX,
        }
    }
}

/// The inputs the HTTP layer hands to the decoder.
///
/// Built with chained setters; only the method is mandatory. The body
/// reader defaults to an empty stream, which is what GET and HEAD
/// requests use.
pub struct RawRequest<R: Read> {
    method: Method,
    content_type: Option<String>,
    query: Option<String>,
    remote_user: Option<String>,
    base_url: String,
    site_path: String,
    body: R,
}

impl RawRequest<io::Empty> {
    pub fn new(method: Method) -> RawRequest<io::Empty> {
        RawRequest {
            method,
            content_type: None,
            query: None,
            remote_user: None,
            base_url: String::new(),
            site_path: String::new(),
            body: io::empty(),
        }
    }
}

impl<R: Read> RawRequest<R> {
    /// Sets the `Content-Type` header value of a POST request.
    pub fn content_type(mut self, value: &str) -> RawRequest<R> {
        self.content_type = Some(value.to_owned());
        self
    }

    /// Sets the raw (still percent-encoded) query string.
    pub fn query(mut self, value: &str) -> RawRequest<R> {
        self.query = Some(value.to_owned());
        self
    }

    /// Sets the authenticated user of the underlying request.
    pub fn remote_user(mut self, value: &str) -> RawRequest<R> {
        self.remote_user = Some(value.to_owned());
        self
    }

    /// Sets the server base URL requests were addressed to.
    pub fn base_url(mut self, value: &str) -> RawRequest<R> {
        self.base_url = value.to_owned();
        self
    }

    /// Sets the site path the request targets below the base URL.
    pub fn site_path(mut self, value: &str) -> RawRequest<R> {
        self.site_path = value.to_owned();
        self
    }

    /// Attaches the request body reader.
    pub fn body<B: Read>(self, body: B) -> RawRequest<B> {
        RawRequest {
            method: self.method,
            content_type: self.content_type,
            query: self.query,
            remote_user: self.remote_user,
            base_url: self.base_url,
            site_path: self.site_path,
            body,
        }
    }
}

/// A fully decoded FP-RPC request.
///
/// Holds the ordered, never-empty call list plus the ancillary
/// artifacts the dispatcher needs: request mode, protocol version,
/// principal name, resource roots, and (for vermeer uploads) the
/// binary tail reader.
pub struct FpRpcRequest<R: Read> {
    mode: RequestMode,
    calls: Vec<RpcCall>,
    version: Option<String>,
    principal: String,
    base_url: String,
    site_path: String,
    vermeer_tail: Option<R>,
}

impl<R: Read> fmt::Debug for FpRpcRequest<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FpRpcRequest")
            .field("mode", &self.mode)
            .field("calls", &self.calls)
            .field("version", &self.version)
            .field("principal", &self.principal)
            .field("base_url", &self.base_url)
            .field("site_path", &self.site_path)
            .field("vermeer_tail", &self.vermeer_tail.is_some())
            .finish()
    }
}

impl<R: Read> FpRpcRequest<R> {
    /// Decodes a raw HTTP request into its RPC calls.
    ///
    /// Exactly one parsing strategy is selected from the HTTP method
    /// and, for POST, the content type. Decoding is all-or-nothing;
    /// see [`DecodeError`] for the failure surface.
    pub fn decode(raw: RawRequest<R>, config: &DecoderConfig) -> Result<Self, DecodeError> {
        let RawRequest {
            method,
            content_type,
            query,
            remote_user,
            base_url,
            site_path,
            body,
        } = raw;

        let principal = remote_user.unwrap_or_else(|| ANONYMOUS.to_owned());

        let (mode, calls, version, vermeer_tail) = match method {
            Method::Get | Method::Head => {
                debug!(method = %method, "decoding query-string request");
                let mut params = BTreeMap::new();
                if let Some(ref query) = query {
                    form::parse_simple(query.as_bytes(), config.legacy_charset, &mut params);
                }
                let (call, version) = assemble_simple(params, GET_CMD_PARAM)?;
                (RequestMode::Get, vec![call], version, None)
            }

            Method::Post => match PostEncoding::classify(content_type.as_deref()) {
                PostEncoding::Vermeer => {
                    debug!("decoding vermeer-encoded request");
                    let decoded = vermeer::decode(body)?;
                    let (call, version) = assemble_simple(decoded.params, POST_CMD_PARAM)?;
                    (RequestMode::Post, vec![call], version, Some(decoded.tail))
                }
                PostEncoding::Form => {
                    debug!("decoding form-encoded request");
                    let mut params = BTreeMap::new();
                    if let Some(ref query) = query {
                        form::parse_simple(query.as_bytes(), config.legacy_charset, &mut params);
                    }
                    let mut form_body = Vec::new();
                    let mut body = body;
                    body.read_to_end(&mut form_body)?;
                    form::parse_simple(&form_body, config.legacy_charset, &mut params);
                    let (call, version) = assemble_simple(params, POST_CMD_PARAM)?;
                    (RequestMode::Post, vec![call], version, None)
                }
                PostEncoding::Caml => {
                    let calls = CamlParser::new(BufReader::new(body)).parse()?;
                    debug!(calls = calls.len(), "decoded CAML batch");
                    (RequestMode::Caml, calls, None, None)
                }
            },

            Method::Other(verb) => return Err(DecodeError::UnsupportedMethod(verb)),
        };

        Ok(FpRpcRequest {
            mode,
            calls,
            version,
            principal,
            base_url,
            site_path,
            vermeer_tail,
        })
    }

    /// Returns the parsing strategy that was selected.
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// Returns the decoded calls, in request order. Never empty.
    pub fn calls(&self) -> &[RpcCall] {
        &self.calls
    }

    /// Returns the protocol version split off the command value, if
    /// the client sent one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the display name of the authenticated principal, or
    /// `"anonymous"`.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Takes the un-consumed binary tail of a vermeer-encoded body.
    ///
    /// Present only for vermeer requests, and only until taken:
    /// ownership of the reader moves to the caller, who must read or
    /// drop it. The reader is positioned exactly after the preamble's
    /// terminating newline.
    pub fn take_vermeer_tail(&mut self) -> Option<R> {
        self.vermeer_tail.take()
    }

    /// Composes the resource root clients resolve sub-site URLs
    /// against.
    ///
    /// The base URL is normalized to end with a slash, the site path
    /// to `segment/` form; the sub-site marker appends its fixed
    /// suffix.
    pub fn resource_url(&self, sub_site: Option<SubSite>) -> String {
        let mut url = self.base_url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        let site = self.site_path.trim_matches('/');
        if !site.is_empty() {
            url.push_str(site);
            url.push('/');
        }
        if let Some(sub) = sub_site {
            url.push_str(sub.suffix());
        }
        url
    }
}

/// Body encoding of a POST request, from its content type.
enum PostEncoding {
    Vermeer,
    Form,
    Caml,
}

impl PostEncoding {
    /// Compares content-type essences so `; charset=...` parameters
    /// cannot defeat classification. Anything unrecognized (or
    /// absent) is a CAML body.
    fn classify(content_type: Option<&str>) -> PostEncoding {
        let mime = content_type.and_then(|value| value.parse::<Mime>().ok());
        match mime {
            Some(ref m) if m.essence_str().eq_ignore_ascii_case(VERMEER_CONTENT_TYPE) => {
                PostEncoding::Vermeer
            }
            Some(ref m)
                if m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() =>
            {
                PostEncoding::Form
            }
            _ => PostEncoding::Caml,
        }
    }
}

/// Builds the single call of a GET/POST request from its flat
/// parameter map.
fn assemble_simple(
    mut params: BTreeMap<String, String>,
    cmd_field: &str,
) -> Result<(RpcCall, Option<String>), DecodeError> {
    let field = if params.contains_key(cmd_field) {
        cmd_field
    } else {
        DIALOG_VIEW_PARAM
    };
    let raw_cmd = match params.remove(field) {
        Some(value) => value,
        None => return Err(DecodeError::MissingCommand),
    };
    if field == DIALOG_VIEW_PARAM {
        debug!("command taken from the dialogview fallback");
    }

    // Some clients fold long command values across lines.
    let cmd = raw_cmd.replace('\n', "");

    let (name, version) = match cmd.split_once(':') {
        Some((name, version)) => (name.to_owned(), Some(version.to_owned())),
        None => (cmd, None),
    };

    Ok((RpcCall::new(None, name, params), version))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(pairs: &[(&str, &str)], cmd_field: &str) -> Result<(RpcCall, Option<String>), DecodeError> {
        let params = pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        assemble_simple(params, cmd_field)
    }

    #[test]
    fn command_becomes_the_method() {
        let (call, version) = simple(&[("Cmd", "list"), ("url", "/a")], GET_CMD_PARAM).unwrap();
        assert_eq!(call.method(), "list");
        assert_eq!(version, None);
        assert_eq!(call.param("url"), Some("/a"));
        // The command field itself is not a call parameter.
        assert_eq!(call.param("Cmd"), None);
    }

    #[test]
    fn splits_the_version_at_the_first_colon() {
        let (call, version) = simple(&[("Cmd", "foo:3.0")], GET_CMD_PARAM).unwrap();
        assert_eq!(call.method(), "foo");
        assert_eq!(version.as_deref(), Some("3.0"));

        let (call, version) = simple(&[("Cmd", "open service:12.0:beta")], GET_CMD_PARAM).unwrap();
        assert_eq!(call.method(), "open service");
        assert_eq!(version.as_deref(), Some("12.0:beta"));
    }

    #[test]
    fn strips_embedded_newlines() {
        let (call, version) = simple(&[("Cmd", "fo\no")], GET_CMD_PARAM).unwrap();
        assert_eq!(call.method(), "foo");
        assert_eq!(version, None);
    }

    #[test]
    fn falls_back_to_dialogview() {
        let (call, _) = simple(&[("dialogview", "FileOpen")], GET_CMD_PARAM).unwrap();
        assert_eq!(call.method(), "FileOpen");
    }

    #[test]
    fn fails_without_any_command() {
        let err = simple(&[("url", "/a")], GET_CMD_PARAM).unwrap_err();
        assert!(matches!(err, DecodeError::MissingCommand));
    }

    #[test]
    fn classifies_content_types_by_essence() {
        assert!(matches!(
            PostEncoding::classify(Some("application/x-vermeer-urlencoded")),
            PostEncoding::Vermeer
        ));
        assert!(matches!(
            PostEncoding::classify(Some("application/x-www-form-urlencoded; charset=UTF-8")),
            PostEncoding::Form
        ));
        assert!(matches!(
            PostEncoding::classify(Some("text/xml; charset=utf-8")),
            PostEncoding::Caml
        ));
        assert!(matches!(PostEncoding::classify(None), PostEncoding::Caml));
        assert!(matches!(
            PostEncoding::classify(Some("not a content type")),
            PostEncoding::Caml
        ));
    }

    #[test]
    fn recognizes_sub_site_markers() {
        assert_eq!(SubSite::from_marker("catalogs"), Some(SubSite::Catalogs));
        assert_eq!(SubSite::from_marker("Layouts"), Some(SubSite::Layouts));
        assert_eq!(SubSite::from_marker("lists"), None);
    }

    #[test]
    fn maps_verbs() {
        assert_eq!(Method::from_verb("get"), Method::Get);
        assert_eq!(Method::from_verb("POST"), Method::Post);
        assert_eq!(Method::from_verb("put"), Method::Other("PUT".to_owned()));
    }
}
