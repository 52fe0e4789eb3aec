//! The fixed table of protocol statuses returned to FrontPage
//! clients.

use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

/// Protocol failure classes a FrontPage client understands.
///
/// Each status carries a stable numeric code and a message; clients
/// match on the code and show the message. The table is fixed by the
/// protocol, so statuses are plain copyable values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FpStatus {
    /// The requested method name is not part of the protocol.
    UnknownMethod,
    /// The server failed while executing the call.
    ServerFailure,
    /// The principal may not perform the call.
    AccessDenied,
    /// The addressed file does not exist.
    FileNotFound,
    /// The addressed folder does not exist.
    FolderNotFound,
    /// A file already exists where the client wants to create one.
    FileAlreadyExists,
    /// A folder already exists where the client wants to create one.
    FolderAlreadyExists,
    /// The service URL the client supplied cannot be resolved.
    UrlInvalid,
    /// The document changed underneath the client since checkout.
    WriteConflict,
}

impl FpStatus {
    /// Returns the numeric status code sent on the wire.
    pub fn code(&self) -> u32 {
        match *self {
            FpStatus::UnknownMethod => 0x0002_0001,
            FpStatus::ServerFailure => 0x0002_0002,
            FpStatus::AccessDenied => 0x0002_0003,
            FpStatus::FileNotFound => 0x0002_0004,
            FpStatus::FolderNotFound => 0x0002_0005,
            FpStatus::FileAlreadyExists => 0x0002_0006,
            FpStatus::FolderAlreadyExists => 0x0002_0007,
            FpStatus::UrlInvalid => 0x0002_0008,
            FpStatus::WriteConflict => 0x0002_0009,
        }
    }

    /// Returns the message shown by the client.
    pub fn message(&self) -> &'static str {
        match *self {
            FpStatus::UnknownMethod => "The method is not supported by this server",
            FpStatus::ServerFailure => "The server was unable to complete your request",
            FpStatus::AccessDenied => "You do not have permission to perform this operation",
            FpStatus::FileNotFound => "The file does not exist",
            FpStatus::FolderNotFound => "The folder does not exist",
            FpStatus::FileAlreadyExists => "A file of that name already exists",
            FpStatus::FolderAlreadyExists => "A folder of that name already exists",
            FpStatus::UrlInvalid => "The URL is invalid",
            FpStatus::WriteConflict => "The document was changed by another author",
        }
    }

    /// Formats this status as the legacy method-response error body.
    ///
    /// FrontPage clients parse the `<li>` lines of this HTML shell
    /// rather than the HTTP status, so the layout is fixed down to
    /// the line breaks. Status codes render in decimal.
    ///
    /// # Errors
    ///
    /// Any errors reported by the writer will be propagated to the
    /// caller.
    pub fn write_response<W: Write>(&self, method: &str, out: &mut W) -> io::Result<()> {
        writeln!(out, "<html><head><title>vermeer RPC packet</title></head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<p>method={}", method)?;
        writeln!(out, "<p>status=")?;
        writeln!(out, "<ul>")?;
        writeln!(out, "<li>status={}", self.code())?;
        writeln!(out, "<li>osstatus=0")?;
        writeln!(out, "<li>msg={}", self.message())?;
        writeln!(out, "<li>osmsg=")?;
        writeln!(out, "</ul>")?;
        writeln!(out, "</body>")?;
        writeln!(out, "</html>")?;
        Ok(())
    }
}

impl Display for FpStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str;

    #[test]
    fn codes_are_distinct() {
        let all = [
            FpStatus::UnknownMethod,
            FpStatus::ServerFailure,
            FpStatus::AccessDenied,
            FpStatus::FileNotFound,
            FpStatus::FolderNotFound,
            FpStatus::FileAlreadyExists,
            FpStatus::FolderAlreadyExists,
            FpStatus::UrlInvalid,
            FpStatus::WriteConflict,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn renders_the_legacy_error_shape() {
        let mut out: Vec<u8> = Vec::new();
        FpStatus::UnknownMethod
            .write_response("bogus method", &mut out)
            .unwrap();

        let text = str::from_utf8(&out).unwrap();
        assert!(text.contains("<p>method=bogus method"));
        assert!(text.contains(&format!("<li>status={}", FpStatus::UnknownMethod.code())));
        assert!(text.contains("<li>msg=The method is not supported by this server"));
    }
}
