//! Length-prefixed control-message framing, used only during rendezvous
//! (spec §4.1). Each frame is a varint length (unsigned LEB128) followed by
//! that many JSON-encoded payload bytes. Once a multiplexer session is
//! attached to a connection this protocol is never used again.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected outright rather than allocating an
/// attacker-controlled amount of memory for `read_msg`. Every real message on
/// this wire (a `HubHeader`, a `ServantId`, an error string) is a few dozen
/// bytes; this is generous headroom, not a tuned limit.
const MAX_FRAME_LEN: usize = 1 << 20;

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("connection closed before a full frame was read")]
    ShortRead,
    #[error("malformed varint length prefix")]
    MalformedVarint,
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),
    #[error("malformed JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Serializes `value` as JSON and writes it as one frame. Per spec §4.1,
/// write failures are swallowed here: the rendezvous layer that uses this
/// function has no retry path, and the peer will simply time out on its
/// subsequent read.
pub async fn write_msg<W, T>(writer: &mut W, value: &T)
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let Ok(payload) = serde_json::to_vec(value) else {
        return;
    };
    let mut len_buf = unsigned_varint::encode::u64_buffer();
    let len_bytes = unsigned_varint::encode::u64(payload.len() as u64, &mut len_buf);
    if writer.write_all(len_bytes).await.is_err() {
        return;
    }
    let _ = writer.write_all(&payload).await;
}

/// Reads one frame and JSON-decodes it into `T`.
pub async fn read_msg<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = read_varint_len(reader).await?;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|_| ProtocolError::ShortRead)?;
    Ok(serde_json::from_slice(&buf)?)
}

async fn read_varint_len<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize, ProtocolError> {
    let mut result: usize = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = reader
            .read_u8()
            .await
            .map_err(|_| ProtocolError::ShortRead)?;
        result |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 63 {
            return Err(ProtocolError::MalformedVarint);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_string() {
        let mut buf = Vec::new();
        write_msg(&mut buf, &"hello".to_owned()).await;

        let mut cursor = Cursor::new(buf);
        let decoded: String = read_msg(&mut cursor).await.unwrap();
        assert_eq!(decoded, "hello");
    }

    #[tokio::test]
    async fn round_trips_empty_ack() {
        let mut buf = Vec::new();
        write_msg(&mut buf, &"".to_owned()).await;

        let mut cursor = Cursor::new(buf);
        let decoded: String = read_msg(&mut cursor).await.unwrap();
        assert_eq!(decoded, "");
    }

    #[tokio::test]
    async fn rejects_short_read() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result: Result<String, _> = read_msg(&mut cursor).await;
        assert!(matches!(result, Err(ProtocolError::ShortRead)));
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let mut buf = Vec::new();
        let mut len_buf = unsigned_varint::encode::u64_buffer();
        let len_bytes = unsigned_varint::encode::u64(3, &mut len_buf);
        buf.extend_from_slice(len_bytes);
        buf.extend_from_slice(b"{!}");

        let mut cursor = Cursor::new(buf);
        let result: Result<String, _> = read_msg(&mut cursor).await;
        assert!(matches!(result, Err(ProtocolError::InvalidJson(_))));
    }
}
