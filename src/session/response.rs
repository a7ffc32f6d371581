//! Response header composition
//!
//! ```text
//! HTTP/1.1 200 OK
//! Cache-Control: no-store, no-cache, must-revalidate, max-age=0
//! X-Accel-Buffering: no
//! Content-Type: image/jpeg | multipart/x-mixed-replace;boundary="<b>"
//!
//! per part:
//!   [continuous] \r\n--<b>\r\nContent-Type: image/jpeg\r\n
//!   [single]     Content-Disposition: inline; filename="snapshot <time>.jpg"\r\n
//!                Content-Length: <len>\r\n\r\n
//!                <body>
//! ```

use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};

use super::request::SessionMode;

/// Multipart boundary token used unless configured otherwise
pub const DEFAULT_BOUNDARY: &str = "MJPG_webcam_dynamic_framerate";

const STATUS_LINE: &[u8] = b"HTTP/1.1 200 OK\r\n";
const CACHE_CONTROL: &[u8] = b"Cache-Control: no-store, no-cache, must-revalidate, max-age=0\r\n";
const NO_BUFFERING: &[u8] = b"X-Accel-Buffering: no\r\n";
const JPEG_CONTENT_TYPE: &[u8] = b"Content-Type: image/jpeg\r\n";

/// Header bytes for one session
#[derive(Debug, Clone)]
pub struct ResponseHeaders {
    mode: SessionMode,
    boundary: String,
}

impl ResponseHeaders {
    pub fn new(mode: SessionMode, boundary: impl Into<String>) -> Self {
        Self {
            mode,
            boundary: boundary.into(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Status line and response-wide headers
    pub fn head(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(192);
        buf.put_slice(STATUS_LINE);
        buf.put_slice(CACHE_CONTROL);
        buf.put_slice(NO_BUFFERING);
        match self.mode {
            SessionMode::Single => buf.put_slice(JPEG_CONTENT_TYPE),
            SessionMode::Continuous => {
                buf.put_slice(b"Content-Type: multipart/x-mixed-replace;boundary=\"");
                buf.put_slice(self.boundary.as_bytes());
                buf.put_slice(b"\"\r\n");
            }
        }
        buf.freeze()
    }

    /// Boundary marker opening each part (empty in single mode)
    pub fn part_prefix(&self) -> Bytes {
        match self.mode {
            SessionMode::Single => Bytes::new(),
            SessionMode::Continuous => {
                let mut buf = BytesMut::with_capacity(self.boundary.len() + 32);
                buf.put_slice(b"\r\n--");
                buf.put_slice(self.boundary.as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(JPEG_CONTENT_TYPE);
                buf.freeze()
            }
        }
    }

    /// Per-part fields up to and including the blank line
    pub fn part_fields(&self, len: u64, captured_at: SystemTime) -> Bytes {
        let mut buf = BytesMut::with_capacity(96);
        if self.mode == SessionMode::Single {
            buf.put_slice(
                format!(
                    "Content-Disposition: inline; filename=\"snapshot {}.jpg\"\r\n",
                    snapshot_timestamp(captured_at)
                )
                .as_bytes(),
            );
        }
        buf.put_slice(format!("Content-Length: {}\r\n\r\n", len).as_bytes());
        buf.freeze()
    }
}

/// Local capture time, e.g. `2024-01-02 03:04:05.123456`
pub fn snapshot_timestamp(at: SystemTime) -> String {
    let local: DateTime<Local> = at.into();
    format_timestamp(&local.naive_local())
}

/// Microseconds are omitted when zero
pub fn format_timestamp(at: &NaiveDateTime) -> String {
    if at.nanosecond() / 1_000 == 0 {
        at.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_single_head() {
        let headers = ResponseHeaders::new(SessionMode::Single, DEFAULT_BOUNDARY);
        assert_eq!(
            &headers.head()[..],
            &b"HTTP/1.1 200 OK\r\n\
               Cache-Control: no-store, no-cache, must-revalidate, max-age=0\r\n\
               X-Accel-Buffering: no\r\n\
               Content-Type: image/jpeg\r\n"[..]
        );
        assert!(headers.part_prefix().is_empty());
    }

    #[test]
    fn test_continuous_head_and_prefix() {
        let headers = ResponseHeaders::new(SessionMode::Continuous, "frame");
        let head = headers.head();
        assert!(head.ends_with(b"Content-Type: multipart/x-mixed-replace;boundary=\"frame\"\r\n"));
        assert_eq!(
            &headers.part_prefix()[..],
            &b"\r\n--frame\r\nContent-Type: image/jpeg\r\n"[..]
        );
    }

    #[test]
    fn test_part_fields() {
        let stream = ResponseHeaders::new(SessionMode::Continuous, DEFAULT_BOUNDARY);
        assert_eq!(
            &stream.part_fields(4321, SystemTime::now())[..],
            &b"Content-Length: 4321\r\n\r\n"[..]
        );

        let snapshot = ResponseHeaders::new(SessionMode::Single, DEFAULT_BOUNDARY);
        let fields = snapshot.part_fields(100, SystemTime::now());
        let text = std::str::from_utf8(&fields).unwrap();
        assert!(text.starts_with("Content-Disposition: inline; filename=\"snapshot "));
        assert!(text.ends_with(".jpg\"\r\nContent-Length: 100\r\n\r\n"));
    }

    #[test]
    fn test_format_timestamp() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let with_micros = date.and_hms_micro_opt(3, 4, 5, 123_456).unwrap();
        assert_eq!(format_timestamp(&with_micros), "2024-01-02 03:04:05.123456");

        let whole = date.and_hms_opt(23, 59, 0).unwrap();
        assert_eq!(format_timestamp(&whole), "2024-01-02 23:59:00");
    }
}
