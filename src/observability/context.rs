//! Trace context: identifiers that correlate spans and log records.
//!
//! Identifiers follow the W3C Trace Context layout so a caller that sends a
//! `traceparent` header sees its own trace continued, and the response
//! carries the context back.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Serialize, Serializer};

/// Incoming/outgoing W3C trace context header.
pub const TRACEPARENT: &str = "traceparent";

/// Response header carrying the bare trace id.
pub const X_TRACE_ID: &str = "x-trace-id";

const TRACEPARENT_VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

/// Error parsing a hex identifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdParseError {
    #[error("expected {expected} hex characters, got {found}")]
    Length { expected: usize, found: usize },
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("all-zero identifier is invalid")]
    Zero,
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Random non-zero identifier.
            pub fn generate() -> Self {
                let mut rng = rand::thread_rng();
                loop {
                    let bytes: [u8; $len] = rng.gen();
                    if bytes != [0u8; $len] {
                        return Self(bytes);
                    }
                }
            }

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != $len * 2 {
                    return Err(IdParseError::Length { expected: $len * 2, found: s.len() });
                }
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes)?;
                if bytes == [0u8; $len] {
                    return Err(IdParseError::Zero);
                }
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

hex_id!(
    /// 16-byte trace identifier, rendered as 32 lowercase hex characters.
    TraceId,
    16
);

hex_id!(
    /// 8-byte span identifier, rendered as 16 lowercase hex characters.
    SpanId,
    8
);

/// Identity of one span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    #[serde(skip)]
    pub sampled: bool,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// A new span in the same trace, parented to this one.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::generate(),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
        }
    }

    /// Parse a `traceparent` header value (`00-<trace>-<span>-<flags>`).
    ///
    /// The result describes the caller's span; use `child()` to continue it.
    /// Unknown versions are accepted as long as the first four fields parse.
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || version.eq_ignore_ascii_case("ff") {
            return None;
        }
        if version == TRACEPARENT_VERSION && parts.next().is_some() {
            return None;
        }
        if flags.len() != 2 {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.parse().ok()?,
            span_id: span_id.parse().ok()?,
            parent_span_id: None,
            sampled: flags & FLAG_SAMPLED != 0,
        })
    }

    /// Render as a `traceparent` header value.
    pub fn traceparent(&self) -> String {
        let flags = if self.sampled { FLAG_SAMPLED } else { 0 };
        format!(
            "{}-{}-{}-{:02x}",
            TRACEPARENT_VERSION, self.trace_id, self.span_id, flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct_hex() {
        let a = TraceContext::new_root();
        let b = TraceContext::new_root();
        assert_ne!(a.trace_id, b.trace_id);
        assert_eq!(a.trace_id.to_string().len(), 32);
        assert_eq!(a.span_id.to_string().len(), 16);
        assert!(a.trace_id.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_child_keeps_trace_and_links_parent() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));
        assert_ne!(child.span_id, root.span_id);
    }

    #[test]
    fn test_traceparent_round_trip() {
        let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
        let ctx = TraceContext::from_traceparent(header).unwrap();
        assert_eq!(ctx.trace_id.to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.span_id.to_string(), "00f067aa0ba902b7");
        assert!(ctx.sampled);
        assert_eq!(ctx.traceparent(), header);
    }

    #[test]
    fn test_invalid_traceparent_rejected() {
        for header in [
            "",
            "garbage",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "00-4bf92f3577b34da6a3ce929d0e0e473-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902bz-01",
        ] {
            assert!(TraceContext::from_traceparent(header).is_none(), "{header}");
        }
    }

    #[test]
    fn test_id_parse_errors() {
        assert_eq!(
            "abc".parse::<SpanId>(),
            Err(IdParseError::Length { expected: 16, found: 3 })
        );
        assert_eq!("0000000000000000".parse::<SpanId>(), Err(IdParseError::Zero));
        assert!(matches!(
            "00f067aa0ba902bz".parse::<SpanId>(),
            Err(IdParseError::Hex(_))
        ));
    }

    #[test]
    fn test_future_version_with_extra_fields_accepted() {
        let header = "01-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00-future";
        let ctx = TraceContext::from_traceparent(header).unwrap();
        assert!(!ctx.sampled);
    }

    #[test]
    fn test_serializes_ids_as_hex_strings() {
        let ctx = TraceContext::new_root();
        let value = serde_json::to_value(ctx).unwrap();
        assert_eq!(value["trace_id"], ctx.trace_id.to_string());
        assert!(value["parent_span_id"].is_null());
    }
}
