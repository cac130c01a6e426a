//! Display protocol framing
//!
//! A frame is a [`Header`] followed by exactly `payload_len` payload bytes.
//! Async helpers drive the server sessions; [`blocking`] serves clients that
//! use plain `std` sockets.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Error, HEADER_SIZE, Header, MessageType, Result};

/// Encode one frame
///
/// # Format
///
/// ```text
/// [HEADER (7 bytes)] [PAYLOAD (variable)]
/// ```
pub fn encode_frame(msg_type: MessageType, payload: &[u8]) -> Result<Bytes> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut bytes = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    bytes.put_slice(&Header::new(msg_type, len).to_bytes());
    bytes.put_slice(payload);
    Ok(bytes.freeze())
}

/// Open reply: one boolean byte telling the client whether the driver
/// needs regions in scan-line order
#[must_use]
pub fn open_reply(scan_line_order_only: bool) -> [u8; HEADER_SIZE + 1] {
    let mut frame = [0u8; HEADER_SIZE + 1];
    frame[..HEADER_SIZE].copy_from_slice(&Header::new(MessageType::Open, 1).to_bytes());
    frame[HEADER_SIZE] = u8::from(scan_line_order_only);
    frame
}

/// Close reply: header only
#[must_use]
pub fn close_reply() -> [u8; HEADER_SIZE] {
    Header::new(MessageType::Close, 0).to_bytes()
}

/// Exception payload: the text up to its first NUL, then a NUL terminator
#[must_use]
pub fn exception_payload(text: &str) -> Vec<u8> {
    let text = text.split('\0').next().unwrap_or_default();
    let mut payload = Vec::with_capacity(text.len() + 1);
    payload.extend_from_slice(text.as_bytes());
    payload.push(0);
    payload
}

/// Text of an exception payload, without its terminator
#[must_use]
pub fn exception_text(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

/// Interpret the payload of an Open reply
pub fn decode_open_reply(payload: &[u8]) -> Result<bool> {
    match payload {
        [flag] => Ok(*flag != 0),
        _ => Err(Error::BufferTooSmall {
            needed: 1,
            got: payload.len(),
        }),
    }
}

fn check_payload_len(header: &Header, max_payload_size: usize) -> Result<usize> {
    let len = header.payload_len() as usize;
    if len > max_payload_size {
        return Err(Error::PayloadTooLarge {
            size: len,
            max: max_payload_size,
        });
    }
    Ok(len)
}

/// Read one raw header; validation is left to the caller
pub async fn read_header<R>(reader: &mut R) -> Result<Header>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes).await?;
    Ok(Header::from_bytes(bytes))
}

/// Read the payload announced by `header`
pub async fn read_payload<R>(
    reader: &mut R,
    header: &Header,
    max_payload_size: usize,
) -> Result<BytesMut>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = check_payload_len(header, max_payload_size)?;
    let mut payload = BytesMut::zeroed(len);
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one frame and flush it
pub async fn write_frame<W>(writer: &mut W, msg_type: MessageType, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&encode_frame(msg_type, payload)?).await?;
    writer.flush().await?;
    Ok(())
}

/// Framing over blocking `std::io` streams
pub mod blocking {
    use std::io::{Read, Write};

    use super::{HEADER_SIZE, Header, MessageType, Result, check_payload_len, encode_frame};

    /// Read one frame, validating its header
    pub fn read_frame<R: Read + ?Sized>(
        reader: &mut R,
        max_payload_size: usize,
    ) -> Result<(MessageType, Vec<u8>)> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes)?;
        let header = Header::from_bytes(bytes);
        let msg_type = header.validate()?;

        let mut payload = vec![0u8; check_payload_len(&header, max_payload_size)?];
        reader.read_exact(&mut payload)?;
        Ok((msg_type, payload))
    }

    /// Write one frame and flush it
    pub fn write_frame<W: Write + ?Sized>(
        writer: &mut W,
        msg_type: MessageType,
        payload: &[u8],
    ) -> Result<()> {
        writer.write_all(&encode_frame(msg_type, payload)?)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(MessageType::Data, b"abc").unwrap();
        assert_eq!(frame.as_ref(), &[0x42, 1, 2, 3, 0, 0, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn test_replies() {
        assert_eq!(open_reply(true), [0x42, 1, 1, 1, 0, 0, 0, 1]);
        assert_eq!(open_reply(false)[HEADER_SIZE], 0);
        assert_eq!(close_reply(), [0x42, 1, 3, 0, 0, 0, 0]);
        assert!(decode_open_reply(&[1]).unwrap());
        assert!(decode_open_reply(&[]).is_err());
    }

    #[test]
    fn test_exception_payload_terminator() {
        assert_eq!(exception_payload("bad window"), b"bad window\0");
        assert_eq!(exception_payload(""), b"\0");
        assert_eq!(exception_payload("cut\0here"), b"cut\0");
        assert_eq!(exception_text(b"bad window\0"), "bad window");
        assert_eq!(exception_text(b"no terminator"), "no terminator");
    }

    #[tokio::test]
    async fn test_async_frame_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, MessageType::Exception, b"oops\0")
            .await
            .unwrap();

        let header = read_header(&mut server).await.unwrap();
        assert_eq!(header.validate().unwrap(), MessageType::Exception);
        let payload = read_payload(&mut server, &header, 1024).await.unwrap();
        assert_eq!(exception_text(&payload), "oops");
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected_before_reading() {
        let header = Header::new(MessageType::Data, 2048);
        let mut reader: &[u8] = &[];
        let result = read_payload(&mut reader, &header, 1024).await;
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge {
                size: 2048,
                max: 1024
            })
        ));
    }

    #[test]
    fn test_blocking_truncated_payload() {
        let mut frame = encode_frame(MessageType::Data, &[0u8; 16]).unwrap().to_vec();
        frame.truncate(HEADER_SIZE + 4);
        let result = blocking::read_frame(&mut Cursor::new(frame), 1024);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_blocking_rejects_bad_header() {
        let mut frame = encode_frame(MessageType::Close, &[]).unwrap().to_vec();
        frame[2] = 9;
        let result = blocking::read_frame(&mut Cursor::new(frame), 1024);
        assert!(matches!(
            result,
            Err(Error::InvalidMessageType { type_byte: 9 })
        ));
    }

    fn message_type_strategy() -> impl Strategy<Value = MessageType> {
        prop_oneof![
            Just(MessageType::Open),
            Just(MessageType::Data),
            Just(MessageType::Close),
            Just(MessageType::Exception),
        ]
    }

    proptest! {
        #[test]
        fn prop_blocking_frames_roundtrip(
            msg_type in message_type_strategy(),
            payload in prop::collection::vec(any::<u8>(), 0..=4096),
        ) {
            let mut wire = Vec::new();
            blocking::write_frame(&mut wire, msg_type, &payload).unwrap();
            prop_assert_eq!(wire.len(), HEADER_SIZE + payload.len());

            let (decoded_type, decoded) =
                blocking::read_frame(&mut Cursor::new(wire), payload.len()).unwrap();
            prop_assert_eq!(decoded_type, msg_type);
            prop_assert_eq!(decoded, payload);
        }

        #[test]
        fn prop_exception_text_survives(text in "[^\\x00]{0,64}") {
            prop_assert_eq!(exception_text(&exception_payload(&text)), text);
        }
    }
}
