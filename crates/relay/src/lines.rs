use std::{io, pin::Pin};

use bytes::{Buf, BytesMut};
use futures::{Stream, StreamExt, stream};

/// Longest upstream line accepted before the stream is treated as broken.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Lines of an upstream body, without their terminators.
pub(crate) type LineStream = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

/// Splits a byte stream into `\n`-terminated lines, dropping a trailing `\r`.
///
/// Chunk boundaries may fall anywhere, including inside a multi-byte
/// character. A final line without terminator is still yielded. A transport
/// error, or a line longer than [`MAX_LINE_BYTES`], is yielded once as an error
/// and ends the stream.
pub(crate) fn split_lines<S, B, E>(body: S) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    split_lines_within(body, MAX_LINE_BYTES)
}

fn split_lines_within<S, B, E>(body: S, max_line: usize) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = (Box::pin(body), BytesMut::new(), false);

    let lines = stream::unfold(state, move |(mut body, mut buffer, mut done)| async move {
        loop {
            if done && buffer.is_empty() {
                return None;
            }

            let newline = buffer.iter().position(|&b| b == b'\n');

            if let Some(position) = newline.filter(|&position| position <= max_line) {
                let line = buffer.split_to(position + 1);
                return Some((Ok(decode(&line)), (body, buffer, done)));
            }

            if buffer.len() > max_line {
                buffer.clear();
                done = true;

                let error = io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("upstream line exceeds {max_line} bytes"),
                );

                return Some((Err(error), (body, buffer, done)));
            }

            if done {
                let line = decode(&buffer);
                buffer.advance(buffer.len());

                return Some((Ok(line), (body, buffer, done)));
            }

            match body.next().await {
                Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    buffer.clear();
                    done = true;

                    return Some((Err(io::Error::other(e)), (body, buffer, done)));
                }
                None => done = true,
            }
        }
    });

    Box::pin(lines)
}

fn decode(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    String::from_utf8_lossy(line).into_owned()
}
