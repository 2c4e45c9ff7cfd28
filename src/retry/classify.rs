//! Decide whether a failure is worth retrying.
//!
//! Classification is deliberately conservative: an error is transient only
//! if it looks like a network-level hiccup. Anything unrecognised fails fast,
//! since retrying a bad request or a parse error only burns the retry budget.
//!
//! Two signals are used, checked against every error in the `source()` chain:
//!
//! - a [`std::io::Error`] whose [`ErrorKind`] belongs to the network category,
//! - a case-insensitive match against [`TRANSIENT_PATTERNS`] on the error's
//!   `Display` text.
//!
//! A [`StatusError`] in the chain is judged by its status code alone.

use std::error::Error as StdError;
use std::io::ErrorKind;

use super::error::StatusError;

/// Lower-case phrases that mark an error message as transient.
///
/// A phrase only counts when it stands as whole words, so `"eof"` matches
/// `"unexpected EOF"` but not `"geofence"`. Matching is a heuristic over
/// free-form text; extend the table rather than special-casing call sites.
pub const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "no such host",
    "timeout",
    "timed out",
    "temporary failure",
    "too many open files",
    "network is unreachable",
    "i/o timeout",
    "eof",
    "broken pipe",
];

/// HTTP status codes that signal overload or a temporary upstream fault.
pub const TRANSIENT_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504];

const NETWORK_ERROR_KINDS: &[ErrorKind] = &[
    ErrorKind::ConnectionRefused,
    ErrorKind::ConnectionReset,
    ErrorKind::ConnectionAborted,
    ErrorKind::NotConnected,
    ErrorKind::AddrInUse,
    ErrorKind::AddrNotAvailable,
    ErrorKind::BrokenPipe,
    ErrorKind::TimedOut,
    ErrorKind::UnexpectedEof,
    ErrorKind::Interrupted,
    ErrorKind::WouldBlock,
];

/// Errors that know whether they are worth retrying.
///
/// The executor's default call shapes ([`retry`](super::retry),
/// [`retry_with_result`](super::retry_with_result)) require this. Most
/// implementations delegate to [`is_transient`]:
///
/// ```rust
/// use std::fmt;
/// use undertow::{is_transient, Classify};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Io(std::io::Error),
///     BadPayload,
/// }
///
/// impl fmt::Display for FetchError {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         match self {
///             FetchError::Io(e) => write!(f, "{}", e),
///             FetchError::BadPayload => write!(f, "bad payload"),
///         }
///     }
/// }
///
/// impl std::error::Error for FetchError {}
///
/// impl Classify for FetchError {
///     fn is_transient(&self) -> bool {
///         match self {
///             FetchError::Io(e) => is_transient(e),
///             FetchError::BadPayload => false,
///         }
///     }
/// }
///
/// let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
/// assert!(FetchError::Io(reset).is_transient());
/// assert!(!FetchError::BadPayload.is_transient());
/// ```
pub trait Classify {
    /// Returns true if retrying might succeed.
    fn is_transient(&self) -> bool;
}

impl Classify for std::io::Error {
    fn is_transient(&self) -> bool {
        is_transient(self)
    }
}

impl Classify for StatusError {
    fn is_transient(&self) -> bool {
        is_transient_status(self.status())
    }
}

impl Classify for Box<dyn StdError + Send + Sync> {
    fn is_transient(&self) -> bool {
        is_transient(&**self)
    }
}

impl Classify for String {
    fn is_transient(&self) -> bool {
        matches_transient_pattern(self)
    }
}

impl Classify for &str {
    fn is_transient(&self) -> bool {
        matches_transient_pattern(self)
    }
}

/// Returns true if `error`, or anything in its source chain, looks like a
/// transient network failure.
///
/// ```rust
/// use std::io::{Error, ErrorKind};
/// use undertow::is_transient;
///
/// assert!(is_transient(&Error::from(ErrorKind::TimedOut)));
/// assert!(is_transient(&Error::other("dial tcp: Connection Refused")));
/// assert!(!is_transient(&Error::other("invalid api key")));
/// ```
pub fn is_transient(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(status) = err.downcast_ref::<StatusError>() {
            return is_transient_status(status.status());
        }
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_network_kind(io.kind()) {
                return true;
            }
        }
        if matches_transient_pattern(&err.to_string()) {
            return true;
        }
        current = err.source();
    }
    false
}

/// Returns true for 429, 500, 502, 503 and 504.
///
/// ```rust
/// use undertow::is_transient_status;
///
/// assert!(is_transient_status(503));
/// assert!(!is_transient_status(404));
/// ```
pub fn is_transient_status(code: u16) -> bool {
    TRANSIENT_STATUS_CODES.contains(&code)
}

/// Case-insensitive, whole-word match of `message` against
/// [`TRANSIENT_PATTERNS`].
pub fn matches_transient_pattern(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_PATTERNS
        .iter()
        .any(|pattern| contains_word(&lower, pattern))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn is_network_kind(kind: ErrorKind) -> bool {
    NETWORK_ERROR_KINDS.contains(&kind)
}
