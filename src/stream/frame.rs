//! Server-push framing.
//!
//! Each frame is a block of lines terminated by a blank line. Comment lines
//! start with `: `, data lines with `data: `. Line endings are `\n`.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

const COMMENT_PREFIX: &[u8] = b": ";
const DATA_PREFIX: &[u8] = b"data: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Comment(String),
    Data(Bytes),
}

impl Frame {
    pub fn comment(text: impl Into<String>) -> Self {
        Frame::Comment(text.into())
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Comment(text) => encode_lines(dst, COMMENT_PREFIX, text.as_bytes()),
            Frame::Data(payload) => encode_lines(dst, DATA_PREFIX, payload),
        }
        dst.put_u8(b'\n');
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn encode_lines(dst: &mut BytesMut, prefix: &[u8], body: &[u8]) {
    for line in body.split(|b| *b == b'\n') {
        dst.reserve(prefix.len() + line.len() + 1);
        dst.put_slice(prefix);
        dst.put_slice(line);
        dst.put_u8(b'\n');
    }
}

/// Write one frame and flush it straight away.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.to_bytes()).await?;
    writer.flush().await
}

/// Incremental decoder tolerant of arbitrary chunk boundaries.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, if one is buffered. Blocks with neither data nor
    /// comment lines are skipped.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let end = memchr::memmem::find(&self.buf, b"\n\n")?;
            let block = self.buf.split_to(end + 2);
            if let Some(frame) = parse_block(&block[..end]) {
                return Some(frame);
            }
        }
    }
}

fn parse_block(block: &[u8]) -> Option<Frame> {
    let mut data: Option<Vec<u8>> = None;
    let mut comment: Option<String> = None;

    for line in block.split(|b| *b == b'\n') {
        if let Some(rest) = line.strip_prefix(b"data:") {
            let rest = rest.strip_prefix(b" ").unwrap_or(rest);
            let buf = data.get_or_insert_with(Vec::new);
            if !buf.is_empty() {
                buf.push(b'\n');
            }
            buf.extend_from_slice(rest);
        } else if let Some(rest) = line.strip_prefix(b":") {
            let rest = rest.strip_prefix(b" ").unwrap_or(rest);
            let text = String::from_utf8_lossy(rest);
            match comment.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&text);
                }
                None => comment = Some(text.into_owned()),
            }
        }
    }

    match (data, comment) {
        (Some(data), _) => Some(Frame::Data(Bytes::from(data))),
        (None, Some(comment)) => Some(Frame::Comment(comment)),
        (None, None) => None,
    }
}
