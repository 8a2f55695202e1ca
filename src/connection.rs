// ABOUTME: Provides framed stream I/O for SMPP v3.4 protocol communication
// ABOUTME: Splits the byte stream into PDUs and keeps malformed PDUs from killing the session

use crate::codec::{CodecError, Frame, PduHeader};
use bytes::{Buf, BytesMut};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// SMPP v3.4 connection
///
/// Handles frame-based communication over a byte stream for one SMPP session.
/// The stream is generic so the session can run over a `TcpStream` in
/// production and over an in-memory duplex pipe in tests.
///
/// This `Connection` struct handles the transport layer (frame I/O) but does
/// not track session state. The session drives the state machine and decides
/// which PDUs may be sent when.
#[derive(Debug)]
pub struct Connection<S> {
    // The stream is decorated with a `BufWriter`, which provides write level
    // buffering. Every `write_frame` ends with a flush.
    stream: BufWriter<S>,

    // The buffer for reading frames.
    buffer: BytesMut,

    // Scratch space for encoding outbound frames.
    scratch: BytesMut,
}

/// Errors surfaced while reading or writing frames.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A complete PDU arrived but its body could not be decoded. The PDU has
    /// been consumed and the stream is still aligned on the next header.
    #[error("malformed PDU (command_id {command_id:#010x}, sequence {sequence_number}): {source}")]
    Malformed {
        command_id: u32,
        sequence_number: u32,
        #[source]
        source: CodecError,
    },

    /// The length prefix is impossible; PDU boundaries are lost.
    #[error("framing error: {0}")]
    Framing(#[source] CodecError),

    #[error("connection reset by peer")]
    Reset,

    #[error("failed to encode PDU: {0}")]
    Encode(#[source] CodecError),
}

impl ConnectionError {
    /// Whether the connection can no longer be used after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ConnectionError::Malformed { .. } | ConnectionError::Encode(_)
        )
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new `Connection`, backed by `stream`. Read and write buffers
    /// are initialized.
    pub fn new(stream: S) -> Connection<S> {
        Connection {
            stream: BufWriter::new(stream),
            // Most PDUs an ESME sees are well under 4KB; bigger ones grow the
            // buffer on demand.
            buffer: BytesMut::with_capacity(4 * 1024),
            scratch: BytesMut::with_capacity(512),
        }
    }

    /// Read a single `Frame` value from the underlying stream.
    ///
    /// The function waits until it has retrieved enough data to parse a frame.
    /// Any data remaining in the read buffer after the frame has been parsed is
    /// kept there for the next call to `read_frame`. This makes the call safe
    /// to use as a `select!` branch: if it is cancelled, no bytes are lost.
    ///
    /// # Returns
    ///
    /// On success, the received frame is returned. If the stream is closed in
    /// a way that doesn't break a frame in half, it returns `None`. Otherwise,
    /// an error is returned.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        loop {
            // Attempt to parse a frame from the buffered data. If enough data
            // has been buffered, the frame is returned.
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // There is not enough buffered data to read a frame. Attempt to
            // read more data from the socket.
            //
            // On success, the number of bytes is returned. `0` indicates "end
            // of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // The remote closed the connection. For this to be a clean
                // shutdown, there should be no data in the read buffer. If
                // there is, this means that the peer closed the socket while
                // sending a frame.
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ConnectionError::Reset);
            }
        }
    }

    /// Tries to parse a frame from the buffer. If the buffer contains enough
    /// data, the frame is returned and the data removed from the buffer. If not
    /// enough data has been buffered yet, `Ok(None)` is returned.
    fn parse_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        // Checking the length prefix first avoids allocating anything for a
        // PDU that has only partially arrived.
        let len = match Frame::check(&self.buffer) {
            Ok(len) => len,
            Err(CodecError::Incomplete) => return Ok(None),
            Err(e) => return Err(ConnectionError::Framing(e)),
        };

        let result = Frame::decode(&self.buffer[..len]);
        let header = header_fields(&self.buffer);

        // Discard the PDU whether or not it decoded, so one bad PDU never
        // desynchronizes the stream.
        self.buffer.advance(len);

        match result {
            Ok(frame) => Ok(Some(frame)),
            Err(source) => {
                let (command_id, sequence_number) = header;
                Err(ConnectionError::Malformed {
                    command_id,
                    sequence_number,
                    source,
                })
            }
        }
    }

    /// Write a single `Frame` value to the underlying stream.
    ///
    /// The frame is encoded into a scratch buffer first, so a frame that
    /// fails to encode never puts a partial PDU on the wire.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), ConnectionError> {
        self.scratch.clear();
        frame
            .encode(&mut self.scratch)
            .map_err(ConnectionError::Encode)?;

        self.stream.write_all(&self.scratch).await?;

        // Ensure the encoded frame is written to the socket. The call above is
        // to the buffered stream. Calling `flush` writes the remaining
        // contents of the buffer to the socket.
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush and shut down the write half of the stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

/// command_id and sequence_number straight from the raw header bytes.
fn header_fields(buf: &[u8]) -> (u32, u32) {
    if buf.len() < PduHeader::SIZE {
        return (0, 0);
    }
    let command_id = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let sequence_number = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
    (command_id, sequence_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{CommandId, EnquireLink, SubmitSmResponse};
    use tokio::io::{AsyncWriteExt, duplex};

    #[tokio::test]
    async fn reads_frames_split_across_writes() {
        let (client, mut server) = duplex(1024);
        let mut connection = Connection::new(client);

        let bytes = Frame::EnquireLink(EnquireLink::new(5)).to_bytes().unwrap();
        server.write_all(&bytes[..7]).await.unwrap();

        let reader = tokio::spawn(async move { connection.read_frame().await });
        tokio::task::yield_now().await;
        server.write_all(&bytes[7..]).await.unwrap();

        let frame = reader.await.unwrap().unwrap();
        assert_eq!(frame, Some(Frame::EnquireLink(EnquireLink::new(5))));
    }

    #[tokio::test]
    async fn clean_close_returns_none() {
        let (client, server) = duplex(64);
        let mut connection = Connection::new(client);
        drop(server);

        assert!(connection.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_frame_is_reset() {
        let (client, mut server) = duplex(64);
        let mut connection = Connection::new(client);
        server.write_all(&[0x00, 0x00, 0x00, 0x10, 0x00]).await.unwrap();
        drop(server);

        assert!(matches!(
            connection.read_frame().await,
            Err(ConnectionError::Reset)
        ));
    }

    #[tokio::test]
    async fn malformed_pdu_is_skipped() {
        let (client, mut server) = duplex(1024);
        let mut connection = Connection::new(client);

        // enquire_link carrying a body it must not have
        let bad: &[u8] = &[
            0x00, 0x00, 0x00, 0x14, // command_length
            0x00, 0x00, 0x00, 0x15, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x07, // sequence_number
            0xDE, 0xAD, 0xBE, 0xEF,
        ];
        server.write_all(bad).await.unwrap();
        let good = Frame::SubmitSmResp(SubmitSmResponse::new(8, "id"));
        server.write_all(&good.to_bytes().unwrap()).await.unwrap();

        let err = connection.read_frame().await.unwrap_err();
        assert!(!err.is_fatal());
        match err {
            ConnectionError::Malformed {
                command_id,
                sequence_number,
                ..
            } => {
                assert_eq!(command_id, CommandId::EnquireLink as u32);
                assert_eq!(sequence_number, 7);
            }
            other => panic!("Expected Malformed, got {other:?}"),
        }
        assert_eq!(connection.read_frame().await.unwrap(), Some(good));
    }

    #[tokio::test]
    async fn impossible_length_is_fatal() {
        let (client, mut server) = duplex(64);
        let mut connection = Connection::new(client);
        server
            .write_all(&[0x00, 0x00, 0x00, 0x04, 0, 0, 0, 0x15, 0, 0, 0, 0, 0, 0, 0, 1])
            .await
            .unwrap();

        let err = connection.read_frame().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Framing(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn writes_encoded_frames() {
        let (client, mut server) = duplex(1024);
        let mut connection = Connection::new(client);

        let frame = Frame::EnquireLink(EnquireLink::new(11));
        connection.write_frame(&frame).await.unwrap();

        let mut peer = Connection::new(&mut server);
        assert_eq!(peer.read_frame().await.unwrap(), Some(frame));
    }
}
