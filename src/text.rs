//! Coalesced character runs and the lazy base64 text sequence
//!
//! Connectors deliver exactly one [`Text`] per contiguous run of character
//! data. A run is a sequence of chunks — plain characters or binary payloads
//! viewed through their base64 encoding — concatenated in original document
//! order. Binary payloads are never eagerly encoded; [`Base64Text`] computes
//! characters on demand and only materializes deferred data once.

use std::cell::RefCell;
use std::fmt;
use std::io;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::unsync::OnceCell;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Deferred binary payload collaborator.
///
/// Supplied by binary-XML sources that hand out payload handles instead of
/// inline octets.
pub trait DataHandle {
    /// Read the whole payload
    fn read(&mut self) -> io::Result<Vec<u8>>;
}

/// A binary payload viewed as its base64 text encoding, without eagerly
/// materializing the encoded string.
pub struct Base64Text {
    /// Deferred source, consumed by the first forced read
    handle: RefCell<Option<Box<dyn DataHandle>>>,
    /// Materialized octets
    data: OnceCell<Vec<u8>>,
}

impl Base64Text {
    /// Create from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let data = OnceCell::new();
        let _ = data.set(bytes);
        Self {
            handle: RefCell::new(None),
            data,
        }
    }

    /// Create from a deferred payload handle
    pub fn deferred(handle: Box<dyn DataHandle>) -> Self {
        Self {
            handle: RefCell::new(Some(handle)),
            data: OnceCell::new(),
        }
    }

    /// The raw octets, forcing materialization exactly once.
    ///
    /// An I/O failure during the forced read degrades to empty data; the
    /// content is simply absent rather than failing the document.
    pub fn bytes(&self) -> &[u8] {
        self.data.get_or_init(|| {
            match self.handle.borrow_mut().take() {
                Some(mut handle) => handle.read().unwrap_or_default(),
                None => Vec::new(),
            }
        })
    }

    /// Number of raw octets
    pub fn byte_len(&self) -> usize {
        self.bytes().len()
    }

    /// Length of the base64 encoding: `ceil(n/3) * 4`
    pub fn len(&self) -> usize {
        (self.byte_len() + 2) / 3 * 4
    }

    /// Whether the encoding is empty
    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    /// The base64 symbol at position `index`, computed directly from the
    /// 3-byte group `index / 4` without encoding any other position.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn char_at(&self, index: usize) -> char {
        let data = self.bytes();
        assert!(index < self.len(), "base64 index {} out of range", index);
        let group = index / 4;
        let offset = group * 3;
        let remaining = data.len() - offset;
        let b0 = data[offset];
        let b1 = if remaining > 1 { data[offset + 1] } else { 0 };
        let b2 = if remaining > 2 { data[offset + 2] } else { 0 };
        let symbol = match index % 4 {
            0 => BASE64_ALPHABET[(b0 >> 2) as usize],
            1 => BASE64_ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize],
            2 if remaining > 1 => BASE64_ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize],
            3 if remaining > 2 => BASE64_ALPHABET[(b2 & 0x3f) as usize],
            _ => b'=',
        };
        symbol as char
    }

    /// Bulk path: append the whole base64 encoding to `out` without going
    /// through per-character access.
    pub fn append_to(&self, out: &mut String) {
        STANDARD.encode_string(self.bytes(), out);
    }
}

impl fmt::Debug for Base64Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.get() {
            Some(bytes) => write!(f, "Base64Text({} bytes)", bytes.len()),
            None => write!(f, "Base64Text(deferred)"),
        }
    }
}

impl fmt::Display for Base64Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        self.append_to(&mut buf);
        f.write_str(&buf)
    }
}

/// One chunk of a coalesced text run
#[derive(Debug)]
pub enum TextChunk {
    /// Plain character data
    Chars(String),
    /// Binary payload, viewed as base64 text
    Binary(Base64Text),
}

/// One coalesced run of character data delivered to a Loader
#[derive(Debug, Default)]
pub struct Text {
    chunks: Vec<TextChunk>,
}

impl Text {
    /// An empty run
    pub fn empty() -> Self {
        Self::default()
    }

    /// A run holding one plain string
    pub fn from_str(s: impl Into<String>) -> Self {
        Self {
            chunks: vec![TextChunk::Chars(s.into())],
        }
    }

    /// The chunks in original document order
    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    /// Whether the run carries no characters at all
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|c| match c {
            TextChunk::Chars(s) => s.is_empty(),
            TextChunk::Binary(b) => b.is_empty(),
        })
    }

    /// Whether the run is whitespace-only (binary payloads count as content)
    pub fn is_whitespace(&self) -> bool {
        self.chunks.iter().all(|c| match c {
            TextChunk::Chars(s) => s.chars().all(char::is_whitespace),
            TextChunk::Binary(b) => b.is_empty(),
        })
    }

    /// Materialize the full character content
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            match chunk {
                TextChunk::Chars(s) => out.push_str(s),
                TextChunk::Binary(b) => b.append_to(&mut out),
            }
        }
        out
    }

    /// Fast path for byte-valued leaves: when the run is exactly one binary
    /// chunk, hand back its octets without an encode/decode round trip.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        let mut chunks = self.chunks;
        let only_binary = chunks.len() == 1 && matches!(chunks[0], TextChunk::Binary(_));
        if !only_binary {
            return None;
        }
        match chunks.pop() {
            Some(TextChunk::Binary(b)) => Some(b.bytes().to_vec()),
            _ => None,
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Accumulates adjacent character events into one run.
///
/// Shared by all connector adapters; guarantees two `text()` calls never
/// reach a Loader back-to-back for one contiguous run.
#[derive(Debug, Default)]
pub struct TextBuffer {
    chunks: Vec<TextChunk>,
}

impl TextBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append plain character data, merging into a trailing string chunk
    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(TextChunk::Chars(tail)) = self.chunks.last_mut() {
            tail.push_str(s);
        } else {
            self.chunks.push(TextChunk::Chars(s.to_string()));
        }
    }

    /// Append a binary payload chunk
    pub fn push_binary(&mut self, data: Base64Text) {
        self.chunks.push(TextChunk::Binary(data));
    }

    /// Whether nothing has been buffered since the last take
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether the buffered content is whitespace-only
    pub fn is_whitespace(&self) -> bool {
        self.chunks.iter().all(|c| match c {
            TextChunk::Chars(s) => s.chars().all(char::is_whitespace),
            TextChunk::Binary(b) => b.is_empty(),
        })
    }

    /// Take the buffered run, leaving the buffer empty
    pub fn take(&mut self) -> Text {
        Text {
            chunks: std::mem::take(&mut self.chunks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingHandle;
    impl DataHandle for FailingHandle {
        fn read(&mut self) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
        }
    }

    struct CountingHandle {
        reads: std::rc::Rc<std::cell::Cell<usize>>,
    }
    impl DataHandle for CountingHandle {
        fn read(&mut self) -> io::Result<Vec<u8>> {
            self.reads.set(self.reads.get() + 1);
            Ok(vec![0x00, 0x01, 0x02, 0x03, 0x04])
        }
    }

    #[test]
    fn test_known_encoding() {
        let b64 = Base64Text::from_bytes(vec![0x00, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(b64.len(), 8);
        let chars: String = (0..b64.len()).map(|i| b64.char_at(i)).collect();
        assert_eq!(chars, "AAECAwQ=");
    }

    #[test]
    fn test_char_at_matches_bulk_path() {
        for len in 0..32usize {
            let bytes: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(37)).collect();
            let b64 = Base64Text::from_bytes(bytes.clone());
            let incremental: String = (0..b64.len()).map(|i| b64.char_at(i)).collect();
            let mut bulk = String::new();
            b64.append_to(&mut bulk);
            assert_eq!(incremental, bulk);
            assert_eq!(bulk, STANDARD.encode(&bytes));
        }
    }

    #[test]
    fn test_deferred_reads_once() {
        let reads = std::rc::Rc::new(std::cell::Cell::new(0));
        let b64 = Base64Text::deferred(Box::new(CountingHandle {
            reads: std::rc::Rc::clone(&reads),
        }));
        assert_eq!(b64.len(), 8);
        assert_eq!(b64.char_at(0), 'A');
        let mut out = String::new();
        b64.append_to(&mut out);
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_deferred_failure_degrades_to_empty() {
        let b64 = Base64Text::deferred(Box::new(FailingHandle));
        assert_eq!(b64.byte_len(), 0);
        assert_eq!(b64.len(), 0);
        assert!(b64.is_empty());
    }

    #[test]
    fn test_buffer_coalesces_adjacent_strings() {
        let mut buf = TextBuffer::new();
        buf.push_str("ab");
        buf.push_str("cd");
        let text = buf.take();
        assert_eq!(text.chunks().len(), 1);
        assert_eq!(text.to_text(), "abcd");
    }

    #[test]
    fn test_mixed_chunks_keep_order() {
        let mut buf = TextBuffer::new();
        buf.push_str("pre");
        buf.push_binary(Base64Text::from_bytes(vec![0x00, 0x01, 0x02]));
        buf.push_str("post");
        let text = buf.take();
        assert_eq!(text.to_text(), "preAAECpost");
    }

    #[test]
    fn test_into_bytes_fast_path() {
        let mut buf = TextBuffer::new();
        buf.push_binary(Base64Text::from_bytes(vec![1, 2, 3]));
        assert_eq!(buf.take().into_bytes(), Some(vec![1, 2, 3]));

        let mut buf = TextBuffer::new();
        buf.push_str("AAEC");
        assert_eq!(buf.take().into_bytes(), None);
    }

    #[test]
    fn test_whitespace_detection() {
        let mut buf = TextBuffer::new();
        buf.push_str("  \n\t");
        assert!(buf.is_whitespace());
        buf.push_str("x");
        assert!(!buf.is_whitespace());
    }
}
