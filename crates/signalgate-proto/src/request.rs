//! Request line contract.
//!
//! The method and path are the first two lines of the canonical signing
//! string, so neither may contain a newline or anything that renders
//! ambiguously. Methods are short uppercase ASCII words; paths start with
//! `/` and hold no whitespace or control characters.

use crate::errors::{ProtocolError, Result};

/// Longest accepted method name.
pub const MAX_METHOD_LEN: usize = 16;

/// Longest accepted path (including query string).
pub const MAX_PATH_LEN: usize = 2048;

/// Validated method and path of a device request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLine<'a> {
    method: &'a str,
    path: &'a str,
}

impl<'a> RequestLine<'a> {
    /// Validate a method and path.
    ///
    /// # Errors
    ///
    /// `InvalidRequestLine` if either violates its grammar.
    pub fn new(method: &'a str, path: &'a str) -> Result<Self> {
        if method.is_empty() || method.len() > MAX_METHOD_LEN {
            return Err(ProtocolError::InvalidRequestLine {
                field: "method",
                reason: "must be 1 to 16 characters",
            });
        }
        if !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ProtocolError::InvalidRequestLine {
                field: "method",
                reason: "must be uppercase ASCII letters",
            });
        }

        if !path.starts_with('/') {
            return Err(ProtocolError::InvalidRequestLine { field: "path", reason: "must start with '/'" });
        }
        if path.len() > MAX_PATH_LEN {
            return Err(ProtocolError::InvalidRequestLine { field: "path", reason: "too long" });
        }
        if path.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ProtocolError::InvalidRequestLine {
                field: "path",
                reason: "must not contain whitespace or control characters",
            });
        }

        Ok(Self { method, path })
    }

    /// HTTP method.
    pub fn method(&self) -> &'a str {
        self.method
    }

    /// Request path as sent.
    pub fn path(&self) -> &'a str {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_requests() {
        let line = RequestLine::new("POST", "/api/v1/signals?since=10").unwrap();
        assert_eq!(line.method(), "POST");
        assert_eq!(line.path(), "/api/v1/signals?since=10");

        assert!(RequestLine::new("GET", "/").is_ok());
    }

    #[test]
    fn rejects_bad_methods() {
        for method in ["", "get", "P0ST", "GET\n", "VERYLONGMETHODNAME"] {
            assert!(
                matches!(
                    RequestLine::new(method, "/"),
                    Err(ProtocolError::InvalidRequestLine { field: "method", .. })
                ),
                "{method:?} must be rejected"
            );
        }
    }

    #[test]
    fn rejects_bad_paths() {
        for path in ["", "api/v1", "/a b", "/a\nX-Forged", "/tab\t", "/del\u{7f}"] {
            assert!(
                matches!(
                    RequestLine::new("GET", path),
                    Err(ProtocolError::InvalidRequestLine { field: "path", .. })
                ),
                "{path:?} must be rejected"
            );
        }
    }
}
