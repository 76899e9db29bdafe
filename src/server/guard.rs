// Request head guard
// Validates every request head before hyper reads it

use hyper::{Method, StatusCode, Uri};
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Largest request head accepted, request line plus header fields.
/// Room for a target up to `MAX_URI_LEN`, so an overlong one answers 414.
const MAX_HEAD_LEN: usize = 96 * 1024;
/// Header field count, same as hyper's default
const MAX_HEADERS: usize = 100;
/// Longest request target hyper parses
const MAX_URI_LEN: usize = (u16::MAX - 1) as usize;
/// Longest chunk-size or trailer line
const MAX_LINE_LEN: usize = 8 * 1024;
const READ_CHUNK: usize = 8 * 1024;

/// Where the next unchecked byte sits in the request stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Head,
    Length(u64),
    Chunked(Chunk),
    /// Body framing was lost; nothing more is passed on
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
}

/// Reader in front of hyper that only releases well-formed request heads.
///
/// hyper answers a head it cannot parse with its own response, written
/// straight to the socket. The guard parses each head first with the same
/// rules. On a malformed head it stops reading and records the status, so the
/// connection task can answer once hyper is done with the requests before it.
/// Writes pass through untouched.
#[derive(Debug)]
pub struct HeadGuard<T> {
    inner: T,
    /// Bytes read from the socket and not yet handed on
    buf: Vec<u8>,
    /// Leading bytes of `buf` already checked
    checked: usize,
    framing: Framing,
    rejection: Option<StatusCode>,
    eof: bool,
}

impl<T> HeadGuard<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            checked: 0,
            framing: Framing::Head,
            rejection: None,
            eof: false,
        }
    }

    /// Status to answer with when a malformed head ended the stream
    pub const fn rejection(&self) -> Option<StatusCode> {
        self.rejection
    }

    /// Check as much of the unchecked input as possible; false means more is needed
    fn advance(&mut self) -> bool {
        let pending = &self.buf[self.checked..];
        if pending.is_empty() {
            return false;
        }

        match self.framing {
            Framing::Head => match check_head(pending) {
                Ok(Some((len, next))) => {
                    self.checked += len;
                    self.framing = next;
                }
                Ok(None) if pending.len() > MAX_HEAD_LEN => {
                    self.rejection = Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
                }
                Ok(None) => return false,
                Err(status) => self.rejection = Some(status),
            },
            Framing::Length(remaining) => {
                let available = u64::try_from(pending.len()).unwrap_or(u64::MAX);
                let take = remaining.min(available);
                // take <= pending.len()
                self.checked += usize::try_from(take).unwrap_or(pending.len());
                self.framing = if take == remaining {
                    Framing::Head
                } else {
                    Framing::Length(remaining - take)
                };
            }
            Framing::Chunked(Chunk::Data(remaining)) => {
                let available = u64::try_from(pending.len()).unwrap_or(u64::MAX);
                let take = remaining.min(available);
                self.checked += usize::try_from(take).unwrap_or(pending.len());
                self.framing = Framing::Chunked(if take == remaining {
                    Chunk::DataEnd
                } else {
                    Chunk::Data(remaining - take)
                });
            }
            Framing::Chunked(state) => {
                let Some(newline) = pending.iter().position(|&b| b == b'\n') else {
                    if pending.len() > MAX_LINE_LEN {
                        self.framing = Framing::Ended;
                        return true;
                    }
                    return false;
                };
                let line = pending[..newline].strip_suffix(b"\r").unwrap_or(&pending[..newline]);
                let next = next_chunk_state(state, line);
                self.checked += newline + 1;
                self.framing = next;
            }
            Framing::Ended => return false,
        }
        true
    }
}

/// Parse one head; `Ok(None)` while it is incomplete
fn check_head(bytes: &[u8]) -> Result<Option<(usize, Framing)>, StatusCode> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let len = match req.parse(bytes) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => {
            return Err(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
        }
        Err(_) => return Err(StatusCode::BAD_REQUEST),
    };

    let (Some(method), Some(path), Some(version)) = (req.method, req.path, req.version) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    if path.len() > MAX_URI_LEN {
        return Err(StatusCode::URI_TOO_LONG);
    }
    Method::from_bytes(method.as_bytes()).map_err(|_| StatusCode::BAD_REQUEST)?;
    Uri::try_from(path).map_err(|_| StatusCode::BAD_REQUEST)?;

    let framing = body_framing(req.headers, version == 1)?;
    Ok(Some((len, framing)))
}

/// Request body length rules (RFC 7230 section 3.3.3), as hyper applies them
fn body_framing(headers: &[httparse::Header<'_>], is_http_11: bool) -> Result<Framing, StatusCode> {
    let mut content_length: Option<u64> = None;
    let mut transfer_encoding = false;
    let mut chunked = false;

    for header in headers {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            if !is_http_11 {
                return Err(StatusCode::BAD_REQUEST);
            }
            transfer_encoding = true;
            content_length = None;
            chunked = is_chunked(header.value);
        } else if header.name.eq_ignore_ascii_case("content-length") {
            if transfer_encoding {
                continue;
            }
            let len = parse_digits(header.value).ok_or(StatusCode::BAD_REQUEST)?;
            match content_length {
                Some(prev) if prev != len => return Err(StatusCode::BAD_REQUEST),
                Some(_) => {}
                None if len >= u64::MAX - 1 => {
                    return Err(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
                }
                None => content_length = Some(len),
            }
        }
    }

    if transfer_encoding {
        return if chunked {
            Ok(Framing::Chunked(Chunk::Size))
        } else {
            Err(StatusCode::BAD_REQUEST)
        };
    }

    Ok(match content_length {
        Some(len) if len > 0 => Framing::Length(len),
        _ => Framing::Head,
    })
}

/// `chunked` must be the final transfer coding
fn is_chunked(value: &[u8]) -> bool {
    let visible = value.iter().all(|&b| b == b'\t' || (0x20..0x7f).contains(&b));
    visible
        && std::str::from_utf8(value)
            .ok()
            .and_then(|s| s.rsplit(',').next())
            .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Decimal digits only, no sign or whitespace
fn parse_digits(value: &[u8]) -> Option<u64> {
    if value.is_empty() {
        return None;
    }
    value.iter().try_fold(0u64, |acc, &b| {
        if b.is_ascii_digit() {
            acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
        } else {
            None
        }
    })
}

/// Step the chunked decoder over one complete line
fn next_chunk_state(state: Chunk, line: &[u8]) -> Framing {
    match state {
        Chunk::Size => {
            let size = line.split(|&b| b == b';').next().unwrap_or_default();
            let size = std::str::from_utf8(size)
                .ok()
                .map(|s| s.trim_matches([' ', '\t']))
                .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|s| u64::from_str_radix(s, 16).ok());
            match size {
                Some(0) => Framing::Chunked(Chunk::Trailer),
                Some(n) => Framing::Chunked(Chunk::Data(n)),
                None => Framing::Ended,
            }
        }
        Chunk::DataEnd if line.is_empty() => Framing::Chunked(Chunk::Size),
        Chunk::Trailer if line.is_empty() => Framing::Head,
        Chunk::Trailer => Framing::Chunked(Chunk::Trailer),
        Chunk::DataEnd | Chunk::Data(_) => Framing::Ended,
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for HeadGuard<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if this.checked > 0 {
                let n = this.checked.min(out.remaining());
                out.put_slice(&this.buf[..n]);
                this.buf.drain(..n);
                this.checked -= n;
                return Poll::Ready(Ok(()));
            }

            // End of input for hyper
            if this.rejection.is_some() || this.eof || this.framing == Framing::Ended {
                return Poll::Ready(Ok(()));
            }

            if this.advance() {
                continue;
            }

            let mut chunk = [0u8; READ_CHUNK];
            let mut read_buf = ReadBuf::new(&mut chunk);
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut read_buf))?;
            if read_buf.filled().is_empty() {
                this.eof = true;
            } else {
                this.buf.extend_from_slice(read_buf.filled());
            }
        }
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for HeadGuard<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
