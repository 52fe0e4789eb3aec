//! URL-encoded parameter extraction.

use std::collections::BTreeMap;

use crate::config::LegacyCharset;

/// Collects `key=value` pairs from a query string or form body into
/// `out`.
///
/// The first value seen for a key wins, matching the
/// first-value-per-name view legacy containers exposed; this also
/// lets a form body be layered under query-string parameters by
/// calling this twice with the same map. Values are trimmed and
/// re-decoded from the legacy charset.
pub(crate) fn parse_simple(
    input: &[u8],
    charset: LegacyCharset,
    out: &mut BTreeMap<String, String>,
) {
    for (key, value) in form_urlencoded::parse(input) {
        if out.contains_key(key.as_ref()) {
            continue;
        }
        let decoded = best_effort_decode(value.trim(), charset);
        out.insert(key.into_owned(), decoded);
    }
}

/// Re-decodes a parameter value from the legacy byte encoding into
/// UTF-8.
///
/// Legacy clients URL-encode bytes of their platform charset; a
/// container that decoded those bytes as Latin-1 hands us one char
/// per byte. Mapping the chars back to bytes and re-reading them as
/// UTF-8 undoes that. A value that does not survive the round trip is
/// passed through unchanged; mixed-encoding clients made this
/// lenience part of the protocol, so it is never an error.
pub(crate) fn best_effort_decode(value: &str, charset: LegacyCharset) -> String {
    match charset {
        LegacyCharset::Utf8 => value.to_owned(),
        LegacyCharset::Latin1 => {
            let mut bytes = Vec::with_capacity(value.len());
            for ch in value.chars() {
                match u8::try_from(u32::from(ch)) {
                    Ok(b) => bytes.push(b),
                    // Not representable in Latin-1, so the container
                    // already produced real text.
                    Err(_) => return value.to_owned(),
                }
            }
            match String::from_utf8(bytes) {
                Ok(decoded) => decoded,
                Err(_) => value.to_owned(),
            }
        }
    }
}
