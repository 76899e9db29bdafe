//! HTTP-date formatting (RFC 7231 IMF-fixdate)

use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// Format a timestamp as `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
