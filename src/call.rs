//! The normalized RPC call produced by the decoder.

use std::collections::BTreeMap;

/// A single decoded RPC call.
///
/// A call consists of an optional client-supplied id (present only
/// for CAML batch requests), the method name, and the call
/// parameters. Calls are immutable once produced and compare
/// structurally, so decoding the same body twice yields equal call
/// lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcCall {
    id: Option<String>,
    method: String,
    params: BTreeMap<String, String>,
}

impl RpcCall {
    pub(crate) fn new(
        id: Option<String>,
        method: String,
        params: BTreeMap<String, String>,
    ) -> Self {
        RpcCall { id, method, params }
    }

    /// Returns the client-supplied call id, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the method name the dispatcher should execute.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns all call parameters.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Convenience lookup of a single parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}
