//! Streaming parser for CAML batch-request bodies.
//!
//! A CAML body is a sequence of `<Method ID="..">` blocks, each
//! holding `<SetVar Name="..">value</SetVar>` elements; the variable
//! named `Cmd` carries the call's method name. Tag and attribute
//! names match case-insensitively, and wrapper elements (batch
//! envelopes) are skipped. The reader never processes DTDs; a body
//! that declares one is rejected outright.
//!
//! Unlike the push-style handlers this format historically got, the
//! parser state is an explicit enum and transitions invalid for the
//! current state fail instead of being silently tolerated.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::mem;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::call::RpcCall;
use crate::conventions::CAML_CMD_PARAM;
use crate::error::CamlError;

const TAG_METHOD: &[u8] = b"method";
const TAG_SETVAR: &[u8] = b"setvar";
const ATTR_ID: &[u8] = b"id";
const ATTR_NAME: &[u8] = b"name";

/// Call under construction while its `Method` block is open.
#[derive(Debug, Default)]
struct CallBuilder {
    id: Option<String>,
    method: Option<String>,
    params: BTreeMap<String, String>,
}

impl CallBuilder {
    fn finish(self, offset: u64) -> Result<RpcCall, CamlError> {
        match self.method {
            Some(method) => Ok(RpcCall::new(self.id, method, self.params)),
            None => Err(CamlError::MissingMethodName { offset }),
        }
    }

    /// Stores a completed variable; the reserved command variable
    /// names the method instead of becoming a parameter.
    fn set_var(mut self, name: String, value: String) -> CallBuilder {
        if name == CAML_CMD_PARAM {
            self.method = Some(value);
        } else {
            self.params.insert(name, value);
        }
        self
    }
}

/// Parser states, one per nesting level the format allows.
enum State {
    Idle,
    InMethod(CallBuilder),
    InSetVar {
        call: CallBuilder,
        name: String,
        value: String,
    },
}

impl State {
    fn describe(&self) -> &'static str {
        match *self {
            State::Idle => "outside any Method block",
            State::InMethod(_) => "inside a Method block",
            State::InSetVar { .. } => "inside a SetVar block",
        }
    }
}

pub(crate) struct CamlParser<R: BufRead> {
    reader: Reader<R>,
    state: State,
    calls: Vec<RpcCall>,
}

impl<R: BufRead> CamlParser<R> {
    pub(crate) fn new(body: R) -> Self {
        CamlParser {
            reader: Reader::from_reader(body),
            state: State::Idle,
            calls: Vec::new(),
        }
    }

    /// Runs the document to completion and returns the batch.
    pub(crate) fn parse(mut self) -> Result<Vec<RpcCall>, CamlError> {
        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => self.open_tag(e, false)?,
                Event::Empty(ref e) => self.open_tag(e, true)?,
                Event::End(ref e) => {
                    let name = e.name();
                    let local = name.local_name();
                    self.close_tag(local.as_ref())?;
                }
                Event::Text(ref t) => {
                    if let State::InSetVar { ref mut value, .. } = self.state {
                        // A single element's text may arrive in
                        // several chunks; append, never replace.
                        value.push_str(&t.unescape()?);
                    }
                }
                Event::CData(t) => {
                    if let State::InSetVar { ref mut value, .. } = self.state {
                        let bytes = t.into_inner();
                        value.push_str(&String::from_utf8_lossy(&bytes));
                    }
                }
                Event::DocType(_) => return Err(CamlError::DoctypeForbidden),
                Event::Eof => break,
                // Declarations, comments, processing instructions.
                _ => {}
            }
            buf.clear();
        }

        if !matches!(self.state, State::Idle) {
            return Err(CamlError::Truncated {
                state: self.state.describe(),
            });
        }
        if self.calls.is_empty() {
            return Err(CamlError::EmptyBatch);
        }
        Ok(self.calls)
    }

    fn open_tag(&mut self, e: &BytesStart<'_>, self_closing: bool) -> Result<(), CamlError> {
        let name = e.name();
        let local = name.local_name();

        if local.as_ref().eq_ignore_ascii_case(TAG_METHOD) {
            match mem::replace(&mut self.state, State::Idle) {
                State::Idle => {
                    if self_closing {
                        // An empty block has no way to name a command.
                        return Err(CamlError::MissingMethodName {
                            offset: self.offset(),
                        });
                    }
                    self.state = State::InMethod(CallBuilder {
                        id: attribute(e, ATTR_ID)?,
                        ..CallBuilder::default()
                    });
                    Ok(())
                }
                state => Err(self.unexpected_open(local.as_ref(), &state)),
            }
        } else if local.as_ref().eq_ignore_ascii_case(TAG_SETVAR) {
            match mem::replace(&mut self.state, State::Idle) {
                State::InMethod(call) => {
                    let var = match attribute(e, ATTR_NAME)? {
                        Some(var) => var,
                        None => {
                            return Err(CamlError::MissingAttribute {
                                tag: "SetVar",
                                attr: "Name",
                                offset: self.offset(),
                            });
                        }
                    };
                    self.state = if self_closing {
                        State::InMethod(call.set_var(var, String::new()))
                    } else {
                        State::InSetVar {
                            call,
                            name: var,
                            value: String::new(),
                        }
                    };
                    Ok(())
                }
                state => Err(self.unexpected_open(local.as_ref(), &state)),
            }
        } else {
            // Unknown elements pass through; character data inside
            // them still accumulates into an open variable.
            Ok(())
        }
    }

    fn close_tag(&mut self, local: &[u8]) -> Result<(), CamlError> {
        if local.eq_ignore_ascii_case(TAG_METHOD) {
            match mem::replace(&mut self.state, State::Idle) {
                State::InMethod(call) => {
                    let offset = self.offset();
                    self.calls.push(call.finish(offset)?);
                    Ok(())
                }
                state => Err(self.unexpected_close(local, &state)),
            }
        } else if local.eq_ignore_ascii_case(TAG_SETVAR) {
            match mem::replace(&mut self.state, State::Idle) {
                State::InSetVar { call, name, value } => {
                    self.state = State::InMethod(call.set_var(name, value));
                    Ok(())
                }
                state => Err(self.unexpected_close(local, &state)),
            }
        } else {
            Ok(())
        }
    }

    fn unexpected_open(&self, tag: &[u8], state: &State) -> CamlError {
        CamlError::UnexpectedOpen {
            tag: String::from_utf8_lossy(tag).into_owned(),
            state: state.describe(),
            offset: self.offset(),
        }
    }

    fn unexpected_close(&self, tag: &[u8], state: &State) -> CamlError {
        CamlError::UnexpectedClose {
            tag: String::from_utf8_lossy(tag).into_owned(),
            state: state.describe(),
            offset: self.offset(),
        }
    }

    fn offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }
}

/// Case-insensitive attribute lookup.
fn attribute(e: &BytesStart<'_>, wanted: &[u8]) -> Result<Option<String>, CamlError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(wanted) {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(xml: &str) -> Result<Vec<RpcCall>, CamlError> {
        CamlParser::new(xml.as_bytes()).parse()
    }

    /// Test helper function that will panic with the `Ok` if a `Result` is not an `Err`.
    fn assert_err<T: std::fmt::Debug>(result: Result<T, CamlError>) {
        match result {
            Ok(t) => panic!("assert_err called on Ok value: {:?}", t),
            Err(_) => {}
        }
    }

    #[test]
    fn parses_a_batch() {
        let calls = parse_str(
            r#"<Method ID="1"><SetVar Name="Cmd">put</SetVar><SetVar Name="file">a.txt</SetVar></Method>
               <Method ID="2"><SetVar Name="Cmd">get</SetVar></Method>"#,
        )
        .unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id(), Some("1"));
        assert_eq!(calls[0].method(), "put");
        assert_eq!(calls[0].param("file"), Some("a.txt"));
        assert_eq!(calls[1].id(), Some("2"));
        assert_eq!(calls[1].method(), "get");
        assert!(calls[1].params().is_empty());
    }

    #[test]
    fn tags_and_attributes_match_case_insensitively() {
        let calls = parse_str(
            r#"<method id="7"><SETVAR NAME="Cmd">checkout</SETVAR></method>"#,
        )
        .unwrap();

        assert_eq!(calls[0].id(), Some("7"));
        assert_eq!(calls[0].method(), "checkout");
    }

    #[test]
    fn skips_wrapper_elements() {
        let calls = parse_str(
            r#"<?xml version="1.0" encoding="utf-8"?>
               <Request>
                 <Method ID="1"><SetVar Name="Cmd">list</SetVar></Method>
               </Request>"#,
        )
        .unwrap();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method(), "list");
    }

    #[test]
    fn accumulates_chunked_character_data() {
        // CDATA splits the element text into multiple callbacks.
        let calls = parse_str(
            r#"<Method ID="1"><SetVar Name="Cmd">put</SetVar><SetVar Name="file">ab<![CDATA[cd]]>ef</SetVar></Method>"#,
        )
        .unwrap();

        assert_eq!(calls[0].param("file"), Some("abcdef"));
    }

    #[test]
    fn unescapes_values() {
        let calls = parse_str(
            r#"<Method ID="1"><SetVar Name="Cmd">put</SetVar><SetVar Name="file">a&amp;b.txt</SetVar></Method>"#,
        )
        .unwrap();

        assert_eq!(calls[0].param("file"), Some("a&b.txt"));
    }

    #[test]
    fn empty_setvar_yields_empty_value() {
        let calls = parse_str(
            r#"<Method ID="1"><SetVar Name="Cmd">put</SetVar><SetVar Name="flag"/></Method>"#,
        )
        .unwrap();

        assert_eq!(calls[0].param("flag"), Some(""));
    }

    #[test]
    fn method_id_is_optional() {
        let calls = parse_str(r#"<Method><SetVar Name="Cmd">get</SetVar></Method>"#).unwrap();
        assert_eq!(calls[0].id(), None);
    }

    #[test]
    fn rejects_doctype_declarations() {
        assert_err(parse_str(
            r#"<!DOCTYPE foo [<!ENTITY bomb "x">]>
               <Method ID="1"><SetVar Name="Cmd">&bomb;</SetVar></Method>"#,
        ));
    }

    #[test]
    fn rejects_setvar_outside_a_method() {
        let err = parse_str(r#"<SetVar Name="Cmd">get</SetVar>"#).unwrap_err();
        assert!(matches!(err, CamlError::UnexpectedOpen { .. }));
    }

    #[test]
    fn rejects_nested_methods() {
        let err = parse_str(
            r#"<Method ID="1"><Method ID="2"><SetVar Name="Cmd">get</SetVar></Method></Method>"#,
        )
        .unwrap_err();
        assert!(matches!(err, CamlError::UnexpectedOpen { .. }));
    }

    #[test]
    fn rejects_a_method_without_a_command() {
        let err = parse_str(r#"<Method ID="1"><SetVar Name="file">a.txt</SetVar></Method>"#)
            .unwrap_err();
        assert!(matches!(err, CamlError::MissingMethodName { .. }));
    }

    #[test]
    fn rejects_a_setvar_without_a_name() {
        let err = parse_str(r#"<Method ID="1"><SetVar>get</SetVar></Method>"#).unwrap_err();
        assert!(matches!(err, CamlError::MissingAttribute { .. }));
    }

    #[test]
    fn rejects_an_empty_batch() {
        let err = parse_str(r#"<Request></Request>"#).unwrap_err();
        assert!(matches!(err, CamlError::EmptyBatch));
    }

    #[test]
    fn rejects_a_truncated_document() {
        assert_err(parse_str(r#"<Method ID="1"><SetVar Name="Cmd">get"#));
    }

    #[test]
    fn rejects_malformed_xml() {
        assert_err(parse_str(r#"<Method ID="1"><SetVar Name="Cmd">get</Wrong></Method>"#));
    }
}
