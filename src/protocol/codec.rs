//! Stream reading helpers
//!
//! Header lines and binary bodies share one buffered reader, so bytes that
//! arrived together with a header are not lost when the body is read.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};

use super::constants::{BODY_CHUNK_SIZE, LINE_TERMINATOR};
use crate::error::{ProtocolError, Result, TransferError};

/// Read one header line
///
/// Returns `Ok(None)` on a clean end of stream. The terminator and a
/// trailing `\r` are stripped. A line longer than `max_len` is an error
/// because the stream cannot be resynchronized afterwards.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = max_len as u64 + 1;
    let n = (&mut *reader)
        .take(limit)
        .read_until(LINE_TERMINATOR, &mut buf)
        .await?;

    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&LINE_TERMINATOR) {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_len {
        return Err(ProtocolError::HeaderTooLong(max_len).into());
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read exactly `length` bytes of body
///
/// Partial reads are accumulated until the declared length is reached. If
/// the stream ends first, nothing is returned and the transfer fails. The
/// buffer grows as bytes arrive, never by more than one chunk ahead.
pub async fn read_body<R>(reader: &mut R, length: u64) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut body = BytesMut::with_capacity(next_chunk(length, 0));
    let mut limited = (&mut *reader).take(length);

    while (body.len() as u64) < length {
        if body.len() == body.capacity() {
            body.reserve(next_chunk(length, body.len()));
        }

        let n = limited.read_buf(&mut body).await?;
        if n == 0 {
            return Err(TransferError::Truncated {
                expected: length,
                received: body.len() as u64,
            }
            .into());
        }
    }

    Ok(body.freeze())
}

fn next_chunk(length: u64, received: usize) -> usize {
    let remaining = length.saturating_sub(received as u64);
    remaining.min(BODY_CHUNK_SIZE as u64) as usize
}

/// Read and drop `length` bytes of body, keeping the stream in sync
pub async fn discard_body<R>(reader: &mut R, length: u64) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut limited = (&mut *reader).take(length);
    let copied = tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;

    if copied < length {
        return Err(TransferError::Truncated {
            expected: length,
            received: copied,
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tokio::io::BufReader;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_lines() {
        let mock = Builder::new().read(b"Alice\r\nHello\nlast").build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_line(&mut reader, 64).await.unwrap().unwrap(), "Alice");
        assert_eq!(read_line(&mut reader, 64).await.unwrap().unwrap(), "Hello");
        assert_eq!(read_line(&mut reader, 64).await.unwrap().unwrap(), "last");
        assert!(read_line(&mut reader, 64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_line_across_fragments() {
        let mock = Builder::new()
            .read(b"PRIV")
            .read(b"ATE|Bob")
            .read(b"|Hi\n")
            .build();
        let mut reader = BufReader::new(mock);

        let line = read_line(&mut reader, 64).await.unwrap().unwrap();
        assert_eq!(line, "PRIVATE|Bob|Hi");
        assert!(read_line(&mut reader, 64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_line_too_long() {
        let mock = Builder::new().read(b"0123456789\n").build();
        let mut reader = BufReader::new(mock);

        let err = read_line(&mut reader, 4).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::HeaderTooLong(4))
        ));
    }

    #[tokio::test]
    async fn test_read_body_fragmented() {
        let mock = Builder::new()
            .read(b"FILE|Bob|a.bin|10\n\x01\x02")
            .read(b"\x03")
            .read(b"\x04\x05\x06")
            .read(b"\x07\x08\x09\x0aNEXT\n")
            .build();
        let mut reader = BufReader::new(mock);

        let header = read_line(&mut reader, 64).await.unwrap().unwrap();
        assert_eq!(header, "FILE|Bob|a.bin|10");

        let body = read_body(&mut reader, 10).await.unwrap();
        assert_eq!(&body[..], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

        // Bytes after the body belong to the next header
        let next = read_line(&mut reader, 64).await.unwrap().unwrap();
        assert_eq!(next, "NEXT");
    }

    #[tokio::test]
    async fn test_read_body_truncated() {
        let mock = Builder::new().read(b"abc").build();
        let mut reader = BufReader::new(mock);

        let err = read_body(&mut reader, 8).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::Truncated {
                expected: 8,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_read_body_larger_than_one_chunk() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
        let mock = Builder::new()
            .read(&payload[..70_000])
            .read(&payload[70_000..])
            .build();
        let mut reader = BufReader::new(mock);

        let body = read_body(&mut reader, payload.len() as u64).await.unwrap();
        assert_eq!(&body[..], &payload[..]);
    }

    #[tokio::test]
    async fn test_huge_declared_length_fails_without_reserving_it() {
        let mock = Builder::new().read(b"abc").build();
        let mut reader = BufReader::new(mock);

        let err = read_body(&mut reader, u64::MAX / 2).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransferError::Truncated { received: 3, .. })
        ));
    }

    #[test]
    fn test_next_chunk_is_bounded() {
        assert_eq!(next_chunk(10, 0), 10);
        assert_eq!(next_chunk(u64::MAX, 0), BODY_CHUNK_SIZE);
        assert_eq!(next_chunk(100_000, 70_000), 30_000);
        assert_eq!(next_chunk(5, 5), 0);
    }

    #[tokio::test]
    async fn test_read_empty_body() {
        let mock = Builder::new().build();
        let mut reader = BufReader::new(mock);

        let body = read_body(&mut reader, 0).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_discard_body_keeps_stream_in_sync() {
        let mock = Builder::new().read(b"xxxx").read(b"xxHello\n").build();
        let mut reader = BufReader::new(mock);

        discard_body(&mut reader, 6).await.unwrap();
        assert_eq!(read_line(&mut reader, 64).await.unwrap().unwrap(), "Hello");
    }
}
