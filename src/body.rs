//! Response bodies and the streaming gzip transform.
//!
//! A [`Body`] is one of:
//!
//! - empty,
//! - a buffered [`Bytes`] value,
//! - a pull-based reader (a file, a cursor, a [`GzipReader`]...), streamed to
//!   the socket in chunks without loading it in memory,
//! - an opaque boxed [`http_body::Body`], passed through untouched.
//!
//! The first three are *streamable*: middlewares may read them again through
//! [`Body::into_reader`] and wrap them in another transform. The last one is
//! not, and compression skips it.

use std::fmt;
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::GzEncoder;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, ReadBuf};

/// Chunk size used when streaming a reader body to the socket.
pub const READ_CHUNK_SIZE: usize = 65535;

/// Smallest read ever issued to the source of a [`GzipReader`].
///
/// Some gzip encoders corrupt their output when fed one byte at a time, so
/// the reader never asks its source for less than this, whatever the size of
/// the consumer's buffer. Surplus output is kept for the next read.
pub const MIN_GZIP_READ: usize = 2;

/// Gzip level used for response compression.
pub const GZIP_LEVEL: u32 = 5;

/// A type-erased, pinned reader.
pub type BoxReader = Pin<Box<dyn AsyncRead>>;

/// A type-erased body. Not `Send`: bodies never leave the server thread.
type LocalBody = Pin<Box<dyn HttpBody<Data = Bytes, Error = io::Error>>>;

/// An outgoing response body.
#[derive(Default)]
pub struct Body {
    kind: Kind,
}

#[derive(Default)]
enum Kind {
    #[default]
    Empty,
    Full(Option<Bytes>),
    Reader {
        reader: BoxReader,
        size: Option<u64>,
        read: u64,
        chunk: BytesMut,
        done: bool,
    },
    Boxed(LocalBody),
}

impl Body {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    /// A streamed body. `size`, when known, becomes the `content-length`.
    pub fn from_reader(reader: impl AsyncRead + 'static, size: Option<u64>) -> Self {
        Self {
            kind: Kind::Reader {
                reader: Box::pin(reader),
                size,
                read: 0,
                chunk: BytesMut::new(),
                done: false,
            },
        }
    }

    /// Wraps any [`http_body::Body`]. The result is opaque: it is sent as-is
    /// and never compressed.
    pub fn boxed<B>(body: B) -> Self
    where
        B: http_body::Body<Data = Bytes> + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self { kind: Kind::Boxed(Box::pin(body.map_err(io::Error::other))) }
    }

    /// Size in bytes when known up front.
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            Kind::Empty => Some(0),
            Kind::Full(bytes) => Some(bytes.as_ref().map_or(0, |b| b.len() as u64)),
            Kind::Reader { size, .. } => *size,
            Kind::Boxed(body) => HttpBody::size_hint(body).exact(),
        }
    }

    pub fn is_streamable(&self) -> bool {
        !matches!(self.kind, Kind::Boxed(_))
    }

    /// Turns a streamable body back into a reader; opaque bodies are handed
    /// back unchanged in `Err`.
    pub fn into_reader(self) -> Result<BoxReader, Body> {
        match self.kind {
            Kind::Empty => Ok(Box::pin(io::Cursor::new(Bytes::new()))),
            Kind::Full(bytes) => Ok(Box::pin(io::Cursor::new(bytes.unwrap_or_default()))),
            Kind::Reader { reader, .. } => Ok(reader),
            kind @ Kind::Boxed(_) => Err(Body { kind }),
        }
    }

    /// Buffers the whole body. Meant for tests and small payloads.
    pub async fn collect_bytes(self) -> io::Result<Bytes> {
        Ok(BodyExt::collect(self).await?.to_bytes())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self { kind: Kind::Full(Some(bytes)) }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            Kind::Empty => "Empty",
            Kind::Full(_) => "Full",
            Kind::Reader { .. } => "Reader",
            Kind::Boxed(_) => "Boxed",
        };
        f.debug_struct("Body").field("kind", &kind).field("size", &self.size()).finish()
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Full(bytes) => {
                Poll::Ready(bytes.take().filter(|b| !b.is_empty()).map(|b| Ok(Frame::data(b))))
            }
            Kind::Reader { reader, read, chunk, done, .. } => {
                if *done {
                    return Poll::Ready(None);
                }
                if chunk.len() < READ_CHUNK_SIZE {
                    chunk.resize(READ_CHUNK_SIZE, 0);
                }
                let mut buf = ReadBuf::new(&mut chunk[..]);
                match ready!(reader.as_mut().poll_read(cx, &mut buf)) {
                    Err(e) => {
                        *done = true;
                        Poll::Ready(Some(Err(e)))
                    }
                    Ok(()) => {
                        let n = buf.filled().len();
                        if n == 0 {
                            *done = true;
                            return Poll::Ready(None);
                        }
                        *read += n as u64;
                        Poll::Ready(Some(Ok(Frame::data(chunk.split_to(n).freeze()))))
                    }
                }
            }
            Kind::Boxed(body) => body.as_mut().poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Full(bytes) => bytes.as_ref().is_none_or(Bytes::is_empty),
            Kind::Reader { done, .. } => *done,
            Kind::Boxed(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty => SizeHint::with_exact(0),
            Kind::Full(bytes) => SizeHint::with_exact(bytes.as_ref().map_or(0, |b| b.len() as u64)),
            Kind::Reader { size: Some(size), read, .. } => {
                SizeHint::with_exact(size.saturating_sub(*read))
            }
            Kind::Reader { size: None, .. } => SizeHint::default(),
            Kind::Boxed(body) => body.size_hint(),
        }
    }
}

// ── GzipReader ───────────────────────────────────────────────────────────────

/// Gzip-compresses a reader on the fly.
///
/// Each read pulls one chunk from the source, feeds it to a stateful gzip
/// encoder and hands out whatever compressed bytes came out. The final gzip
/// frame is emitted once the source is exhausted: either it returns EOF, or
/// the cumulative count read reaches the declared `size`, in which case the
/// source is not polled again.
pub struct GzipReader<R> {
    source: R,
    encoder: Option<GzEncoder<Vec<u8>>>,
    size: Option<u64>,
    read: u64,
    scratch: Vec<u8>,
    pending: Vec<u8>,
    pos: usize,
}

impl<R> GzipReader<R> {
    pub fn new(source: R, size: Option<u64>) -> Self {
        Self {
            source,
            encoder: Some(GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL))),
            size,
            read: 0,
            scratch: Vec::new(),
            pending: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for GzipReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            if this.pos < this.pending.len() {
                let n = buf.remaining().min(this.pending.len() - this.pos);
                buf.put_slice(&this.pending[this.pos..this.pos + n]);
                this.pos += n;
                return Poll::Ready(Ok(()));
            }

            // Finished and drained.
            let Some(encoder) = this.encoder.as_mut() else {
                return Poll::Ready(Ok(()));
            };

            let mut want = buf.remaining().max(MIN_GZIP_READ);
            if let Some(size) = this.size {
                // Fewer than MIN_GZIP_READ only for the last bytes of the body.
                let left = usize::try_from(size.saturating_sub(this.read)).unwrap_or(usize::MAX);
                want = want.min(left);
            }
            let n = if want == 0 {
                0
            } else {
                this.scratch.resize(want, 0);
                let mut chunk = ReadBuf::new(&mut this.scratch[..want]);
                ready!(Pin::new(&mut this.source).poll_read(cx, &mut chunk))?;
                chunk.filled().len()
            };
            this.read += n as u64;

            encoder.write_all(&this.scratch[..n])?;
            let eof = n == 0 || this.size.is_some_and(|size| this.read >= size);
            this.pending = if eof {
                match this.encoder.take() {
                    Some(encoder) => encoder.finish()?,
                    None => Vec::new(),
                }
            } else {
                std::mem::take(encoder.get_mut())
            };
            this.pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::io::Read;
    use std::rc::Rc;

    use flate2::read::GzDecoder;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        assert!(data.len() >= 18, "too short to be gzip");
        assert_eq!(&data[..2], b"\x1f\x8b", "no gzip id");
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    async fn read_in_chunks<R: AsyncRead + Unpin>(mut reader: R, chunk_size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn gzip_round_trips_for_every_read_size() {
        let body = "0".repeat(1401).into_bytes();
        for chunk_size in [1, 2, 10, 10000, 65535] {
            let reader = GzipReader::new(io::Cursor::new(body.clone()), Some(body.len() as u64));
            let compressed = read_in_chunks(reader, chunk_size).await;
            assert_eq!(gunzip(&compressed), body, "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn gzip_without_declared_size_finishes_on_eof() {
        let body: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let reader = GzipReader::new(io::Cursor::new(body.clone()), None);
        let compressed = read_in_chunks(reader, 4096).await;
        assert_eq!(gunzip(&compressed), body);
    }

    #[tokio::test]
    async fn gzip_stops_at_declared_size() {
        // The source holds more than declared; it is not read past the size.
        for chunk_size in [1, 2, 10, 65535] {
            let reader = GzipReader::new(io::Cursor::new(b"hello world".to_vec()), Some(6));
            let compressed = read_in_chunks(reader, chunk_size).await;
            assert_eq!(gunzip(&compressed), b"hello ", "chunk size {chunk_size}");
        }

        let mut compressed = Vec::new();
        let mut reader = GzipReader::new(io::Cursor::new(b"hello world".to_vec()), Some(6));
        reader.read_to_end(&mut compressed).await.unwrap();
        assert_eq!(gunzip(&compressed), b"hello ");
    }

    #[tokio::test]
    async fn gzip_leaves_the_source_after_declared_size() {
        let mut source = io::Cursor::new(b"hello world".to_vec());
        let compressed = read_in_chunks(GzipReader::new(&mut source, Some(5)), 65535).await;
        assert_eq!(gunzip(&compressed), b"hello");
        assert_eq!(source.position(), 5);
    }

    /// An opaque body holding thread-local state.
    struct LocalFrames(Rc<RefCell<Vec<Bytes>>>);

    impl HttpBody for LocalFrames {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Ready(self.0.borrow_mut().pop().map(|b| Ok(Frame::data(b))))
        }
    }

    #[tokio::test]
    async fn boxed_body_need_not_be_send() {
        let frames = Rc::new(RefCell::new(vec![Bytes::from_static(b"world"), Bytes::from_static(b"hello ")]));
        let body = Body::boxed(LocalFrames(Rc::clone(&frames)));
        assert!(!body.is_streamable());
        assert_eq!(body.collect_bytes().await.unwrap(), "hello world");
        assert!(frames.borrow().is_empty());
    }

    #[tokio::test]
    async fn gzip_of_empty_source_is_valid() {
        let reader = GzipReader::new(io::Cursor::new(Vec::<u8>::new()), None);
        let compressed = read_in_chunks(reader, 1).await;
        assert!(gunzip(&compressed).is_empty());
    }

    #[tokio::test]
    async fn reader_body_streams_everything() {
        let data = vec![7u8; READ_CHUNK_SIZE * 2 + 10];
        let body = Body::from_reader(io::Cursor::new(data.clone()), Some(data.len() as u64));
        assert_eq!(body.size(), Some(data.len() as u64));
        assert_eq!(body.collect_bytes().await.unwrap(), data);
    }

    #[test]
    fn sizes_and_streamability() {
        assert_eq!(Body::empty().size(), Some(0));
        assert_eq!(Body::from("abc").size(), Some(3));
        assert_eq!(Body::from_reader(io::Cursor::new(vec![1u8]), None).size(), None);

        let opaque = Body::boxed(http_body_util::Full::new(Bytes::from_static(b"xyz")));
        assert!(!opaque.is_streamable());
        assert_eq!(opaque.size(), Some(3));
        assert!(opaque.into_reader().is_err());
    }

    #[tokio::test]
    async fn full_body_reads_back() {
        let mut reader = Body::from("payload").into_reader().unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "payload");
    }
}
