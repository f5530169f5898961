//! Fuzz target for header and request-line parsing
//!
//! Arbitrary header pairs, request lines and timestamps must be accepted or
//! rejected, never panic. Anything accepted must round-trip through
//! `to_pairs`.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use signalgate_core::parse_timestamp;
use signalgate_proto::{RequestLine, SignedHeaders};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    headers: Vec<(String, String)>,
    method: String,
    path: String,
    timestamp: String,
}

fuzz_target!(|input: FuzzInput| {
    let pairs = input.headers.iter().map(|(name, value)| (name.as_str(), value.as_str()));
    if let Ok(headers) = SignedHeaders::from_pairs(pairs) {
        let again = SignedHeaders::from_pairs(headers.to_pairs()).expect("parsed headers must re-parse");
        assert_eq!(headers, again);
    }

    if let Ok(line) = RequestLine::new(&input.method, &input.path) {
        assert_eq!(line.method(), input.method);
        assert!(line.path().starts_with('/'));
    }

    if let Some(value) = parse_timestamp(&input.timestamp) {
        assert_eq!(value.to_string(), input.timestamp);
    }
});
