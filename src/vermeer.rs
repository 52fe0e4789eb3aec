//! The vermeer parameter encoding.
//!
//! POST bodies with the `application/x-vermeer-urlencoded` content
//! type start with a URL-encoded parameter preamble terminated by the
//! first newline byte. Everything after the newline is an opaque
//! binary payload (legacy file uploads) that this module never
//! touches.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Read};

use percent_encoding::percent_decode;

use crate::conventions::{PACKED_KEY_SEP, VERMEER_PREAMBLE_END};

/// Decoded vermeer parameters plus the un-consumed binary tail.
pub(crate) struct VermeerBody<R> {
    pub params: BTreeMap<String, String>,
    pub tail: R,
}

/// Reads the parameter preamble from `body`, leaving the reader
/// positioned exactly after the terminating newline (or at EOF if the
/// body has no newline).
///
/// The returned reader is the binary tail; ownership moves to the
/// caller, who must read or drop it.
pub(crate) fn decode<R: Read>(mut body: R) -> io::Result<VermeerBody<R>> {
    let mut preamble = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match body.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                if byte[0] == VERMEER_PREAMBLE_END {
                    break;
                }
                preamble.push(byte[0]);
            }
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(VermeerBody {
        params: parse_preamble(&preamble),
        tail: body,
    })
}

/// Splits the decoded preamble into a flat parameter map.
///
/// The whole line is URL-decoded before any splitting, matching the
/// legacy decoder's ordering: percent-escaped `&` and `=` become
/// literal and take part in the split.
fn parse_preamble(raw: &[u8]) -> BTreeMap<String, String> {
    let unplussed: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    let decoded = percent_decode(&unplussed).decode_utf8_lossy();

    let mut params = BTreeMap::new();
    for pair in decoded.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = split_pair(pair);
        if let Some(packed) = value.strip_prefix('[') {
            let packed = packed.strip_suffix(']').unwrap_or(packed);
            for entry in packed.split(';') {
                if entry.is_empty() {
                    continue;
                }
                let (inner, inner_value) = split_pair(entry);
                params.insert(
                    format!("{}{}{}", key, PACKED_KEY_SEP, inner),
                    inner_value.to_owned(),
                );
            }
        } else {
            params.insert(key.to_owned(), value.to_owned());
        }
    }
    params
}

/// Splits on the first `=` only; a bare key gets an empty value.
fn split_pair(pair: &str) -> (&str, &str) {
    match pair.split_once('=') {
        Some((key, value)) => (key, value),
        None => (pair, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn params_of(body: &[u8]) -> BTreeMap<String, String> {
        decode(Cursor::new(body.to_vec())).unwrap().params
    }

    #[test]
    fn splits_preamble_from_binary_tail() {
        let body = Cursor::new(b"a=1&b=[x=2;y=3]\n\x00\x01binary".to_vec());
        let mut decoded = decode(body).unwrap();

        assert_eq!(decoded.params["a"], "1");
        assert_eq!(decoded.params["b/x"], "2");
        assert_eq!(decoded.params["b/y"], "3");
        assert_eq!(decoded.params.len(), 3);

        // The tail starts exactly after the first newline byte.
        let mut tail = Vec::new();
        decoded.tail.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, b"\x00\x01binary");
    }

    #[test]
    fn url_decodes_the_whole_preamble() {
        let params = params_of(b"method=open+service%3a5.0&url=%2fsite%2fa.txt\n");
        assert_eq!(params["method"], "open service:5.0");
        assert_eq!(params["url"], "/site/a.txt");
    }

    #[test]
    fn bare_keys_get_empty_values() {
        let params = params_of(b"flag&b=[set;x=1]\n");
        assert_eq!(params["flag"], "");
        assert_eq!(params["b/set"], "");
        assert_eq!(params["b/x"], "1");
    }

    #[test]
    fn empty_brackets_produce_nothing() {
        let params = params_of(b"b=[]&a=1\n");
        assert_eq!(params.get("a").map(String::as_str), Some("1"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn missing_newline_consumes_the_whole_body() {
        let body = Cursor::new(b"a=1&b=2".to_vec());
        let mut decoded = decode(body).unwrap();
        assert_eq!(decoded.params["b"], "2");

        let mut tail = Vec::new();
        decoded.tail.read_to_end(&mut tail).unwrap();
        assert!(tail.is_empty());
    }

    #[test]
    fn values_split_on_the_first_equals_only() {
        let params = params_of(b"expr=a=b\n");
        assert_eq!(params["expr"], "a=b");
    }
}
