//! The shared FP-RPC protocol constants table.
//!
//! These are fixed by the wire protocol; none of them are
//! configurable.

/// Command field name for GET (and HEAD) requests.
pub const GET_CMD_PARAM: &str = "Cmd";

/// Command field name for form- and vermeer-encoded POST requests.
pub const POST_CMD_PARAM: &str = "method";

/// Fallback command field consulted when the primary one is absent.
pub const DIALOG_VIEW_PARAM: &str = "dialogview";

/// Reserved CAML variable whose value becomes the call's method name.
pub const CAML_CMD_PARAM: &str = "Cmd";

/// Content type of vermeer-encoded POST bodies.
pub const VERMEER_CONTENT_TYPE: &str = "application/x-vermeer-urlencoded";

/// Byte terminating the vermeer parameter preamble. Everything after
/// it is the opaque binary payload.
pub const VERMEER_PREAMBLE_END: u8 = b'\n';

/// Separator between the outer and inner key of a flattened packed
/// parameter (`b=[x=2]` becomes `b/x=2`).
pub const PACKED_KEY_SEP: char = '/';

/// Path marker clients embed to address the catalogs sub-site.
pub const CATALOGS_MARKER: &str = "catalogs";

/// Path marker clients embed to address the layouts sub-site.
pub const LAYOUTS_MARKER: &str = "layouts";

/// Resource-root suffix for the catalogs sub-site.
pub const CATALOGS_SUFFIX: &str = "_catalogs/";

/// Resource-root suffix for the layouts sub-site.
pub const LAYOUTS_SUFFIX: &str = "_layouts/";

/// Principal name reported when the request carries no
/// authenticated user.
pub const ANONYMOUS: &str = "anonymous";
