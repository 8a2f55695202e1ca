// SMPP v3.4 Codec - Separates parsing/encoding logic from domain models
//
// Each PDU implements Encodable/Decodable rather than having all parsing logic
// in a monolithic frame parser. `Frame` ties them together with an exhaustive
// match on the command_id, so every PDU the session understands is listed in
// exactly one place.

use crate::datatypes::{
    BindTransceiver, BindTransceiverResponse, CommandId, CommandStatus, DeliverSm,
    DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack, NumericPlanIndicator,
    RESPONSE_BIT, SubmitSm, SubmitSmResponse, Tlv, TypeOfNumber, Unbind, UnbindResponse,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Maximum allowed PDU size to prevent memory exhaustion attacks
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// Longest short_message carried in the mandatory field; anything longer
/// belongs in the message_payload TLV.
pub const MAX_SHORT_MESSAGE_LENGTH: usize = 254;

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
///
/// The id and status are kept as raw wire values so PDUs from newer protocol
/// versions or vendor extensions still travel through the codec intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    pub fn new(command_id: CommandId, command_status: CommandStatus, sequence_number: u32) -> Self {
        Self {
            command_length: Self::SIZE as u32,
            command_id: command_id as u32,
            command_status: command_status as u32,
            sequence_number,
        }
    }

    /// Decode PDU header from buffer with validation
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id = buf.get_u32();
        let command_status = buf.get_u32();
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode PDU header to buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    /// The typed command, if this is a PDU defined by SMPP v3.4.
    pub fn command(&self) -> Option<CommandId> {
        CommandId::try_from(self.command_id).ok()
    }

    /// The typed status. Vendor-specific codes collapse to `UnknownError`.
    pub fn status(&self) -> CommandStatus {
        CommandStatus::try_from(self.command_status).unwrap_or_else(|_| {
            debug!(
                command_status = format_args!("{:#010x}", self.command_status),
                sequence_number = self.sequence_number,
                "unrecognised command_status"
            );
            CommandStatus::UnknownError
        })
    }

    pub fn is_response(&self) -> bool {
        self.command_id & RESPONSE_BIT != 0
    }
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU, header included, to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size without keeping the encoding
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Convert this PDU to bytes (convenience method)
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer after header. The buffer holds exactly
    /// the PDU body.
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this PDU type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() as u32 {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Unexpected command_id: expected {expected:?}, got {actual:#010x}")]
    UnexpectedCommandId { expected: CommandId, actual: u32 },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("TLV parsing error: {0}")]
    TlvError(String),

    #[error("UTF-8 decoding error in field '{field}': {source}")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Convert codec errors to appropriate SMPP command_status codes
impl CodecError {
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::InvalidPduLength { .. } => CommandStatus::InvalidCommandLength,
            CodecError::UnexpectedCommandId { .. } => CommandStatus::InvalidCommandId,
            CodecError::FieldValidation { field, .. } => match *field {
                "source_addr" => CommandStatus::InvalidSourceAddress,
                "destination_addr" => CommandStatus::InvalidDestinationAddress,
                "source_addr_ton" => CommandStatus::InvalidSourceAddressTon,
                "source_addr_npi" => CommandStatus::InvalidSourceAddressNpi,
                "dest_addr_ton" => CommandStatus::InvalidDestinationAddressTon,
                "dest_addr_npi" => CommandStatus::InvalidDestinationAddressNpi,
                "service_type" => CommandStatus::InvalidServiceType,
                "short_message" => CommandStatus::InvalidMsgLength,
                f if f.ends_with("_body") => CommandStatus::InvalidCommandLength,
                _ => CommandStatus::SystemError,
            },
            CodecError::TlvError(_) => CommandStatus::ErrorInOptionalPartofPduBody,
            _ => CommandStatus::SystemError,
        }
    }
}

/// Writes a complete PDU: the header, whatever `body` appends, then the final
/// command_length back-patched into the first four bytes.
pub fn encode_pdu<F>(
    buf: &mut BytesMut,
    command_id: CommandId,
    command_status: CommandStatus,
    sequence_number: u32,
    body: F,
) -> Result<(), CodecError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), CodecError>,
{
    let start = buf.len();
    PduHeader::new(command_id, command_status, sequence_number).encode(buf);
    body(buf)?;

    let length = buf.len() - start;
    if length > MAX_PDU_SIZE as usize {
        buf.truncate(start);
        return Err(CodecError::InvalidPduLength {
            length: length as u32,
            min: PduHeader::SIZE as u32,
            max: MAX_PDU_SIZE,
        });
    }
    buf[start..start + 4].copy_from_slice(&(length as u32).to_be_bytes());
    Ok(())
}

/// Decodes a C-Octet String: bytes up to and including a NUL terminator.
/// `max_len` counts the terminator, as the SMPP field tables do.
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field_name: &'static str,
) -> Result<String, CodecError> {
    let chunk = buf.chunk();
    let Some(end) = chunk.iter().take(max_len).position(|&b| b == 0) else {
        let reason = if chunk.len() < max_len {
            "missing NUL terminator".to_string()
        } else {
            format!("longer than {} octets", max_len - 1)
        };
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason,
        });
    };

    let value = chunk[..end].to_vec();
    buf.advance(end + 1);

    String::from_utf8(value).map_err(|e| CodecError::Utf8Error {
        field: field_name,
        source: e,
    })
}

/// Like `decode_cstring`, but an exhausted body yields an empty string. Error
/// responses are allowed to omit their body entirely.
pub fn decode_optional_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field_name: &'static str,
) -> Result<String, CodecError> {
    if !buf.has_remaining() {
        return Ok(String::new());
    }
    decode_cstring(buf, max_len, field_name)
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>, field_name: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: "PDU body ends early".to_string(),
        });
    }
    Ok(buf.get_u8())
}

pub fn decode_ton(buf: &mut Cursor<&[u8]>, field_name: &'static str) -> Result<TypeOfNumber, CodecError> {
    let raw = decode_u8(buf, field_name)?;
    TypeOfNumber::try_from(raw).map_err(|_| CodecError::FieldValidation {
        field: field_name,
        reason: format!("unknown type of number {raw:#04x}"),
    })
}

pub fn decode_npi(
    buf: &mut Cursor<&[u8]>,
    field_name: &'static str,
) -> Result<NumericPlanIndicator, CodecError> {
    let raw = decode_u8(buf, field_name)?;
    NumericPlanIndicator::try_from(raw).map_err(|_| CodecError::FieldValidation {
        field: field_name,
        reason: format!("unknown numbering plan {raw:#04x}"),
    })
}

/// Reads optional parameters until the body is exhausted.
pub fn decode_tlvs(buf: &mut Cursor<&[u8]>) -> Result<Vec<Tlv>, CodecError> {
    let mut tlvs = Vec::new();
    while buf.has_remaining() {
        tlvs.push(Tlv::decode(buf)?);
    }
    Ok(tlvs)
}

/// Encodes a C-Octet String, rejecting values that do not fit the field.
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field_name: &'static str,
) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() >= max_len {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: format!("{} octets exceeds maximum of {}", bytes.len(), max_len - 1),
        });
    }
    if bytes.contains(&0) {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: "embedded NUL".to_string(),
        });
    }
    buf.put_slice(bytes);
    buf.put_u8(0);
    Ok(())
}

/// Encodes sm_length followed by the short_message octets.
pub fn encode_short_message(buf: &mut BytesMut, message: &[u8]) -> Result<(), CodecError> {
    if message.len() > MAX_SHORT_MESSAGE_LENGTH {
        return Err(CodecError::FieldValidation {
            field: "short_message",
            reason: format!(
                "{} octets exceeds maximum of {}",
                message.len(),
                MAX_SHORT_MESSAGE_LENGTH
            ),
        });
    }
    buf.put_u8(message.len() as u8);
    buf.put_slice(message);
    Ok(())
}

/// Every PDU an ESME transceiver sends or receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    BindTransceiver(BindTransceiver),
    BindTransceiverResp(BindTransceiverResponse),

    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),

    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),
    Unbind(Unbind),
    UnbindResp(UnbindResponse),

    GenericNack(GenericNack),

    // For unknown PDUs (forward compatibility)
    Unknown { header: PduHeader, body: Bytes },
}

impl Frame {
    /// Checks whether `buf` starts with a complete PDU and returns its length.
    ///
    /// `Incomplete` means more bytes are needed. `InvalidPduLength` means the
    /// length prefix is impossible and the stream can no longer be framed.
    pub fn check(buf: &[u8]) -> Result<usize, CodecError> {
        if buf.len() < PduHeader::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if command_length < PduHeader::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        if buf.len() < command_length as usize {
            return Err(CodecError::Incomplete);
        }

        Ok(command_length as usize)
    }

    /// Decodes one complete PDU, as delimited by `check`.
    pub fn decode(pdu: &[u8]) -> Result<Frame, CodecError> {
        let mut cursor = Cursor::new(pdu);
        let header = PduHeader::decode(&mut cursor)?;

        let end = header.command_length as usize;
        if pdu.len() < end {
            return Err(CodecError::Incomplete);
        }
        let mut body = Cursor::new(&pdu[PduHeader::SIZE..end]);

        let frame = match header.command() {
            Some(CommandId::BindTransceiver) => {
                Frame::BindTransceiver(BindTransceiver::decode(header, &mut body)?)
            }
            Some(CommandId::BindTransceiverResp) => {
                Frame::BindTransceiverResp(BindTransceiverResponse::decode(header, &mut body)?)
            }
            Some(CommandId::SubmitSm) => {
                Frame::SubmitSm(Box::new(SubmitSm::decode(header, &mut body)?))
            }
            Some(CommandId::SubmitSmResp) => {
                Frame::SubmitSmResp(SubmitSmResponse::decode(header, &mut body)?)
            }
            Some(CommandId::DeliverSm) => {
                Frame::DeliverSm(Box::new(DeliverSm::decode(header, &mut body)?))
            }
            Some(CommandId::DeliverSmResp) => {
                Frame::DeliverSmResp(DeliverSmResponse::decode(header, &mut body)?)
            }
            Some(CommandId::EnquireLink) => Frame::EnquireLink(EnquireLink::decode(header, &mut body)?),
            Some(CommandId::EnquireLinkResp) => {
                Frame::EnquireLinkResp(EnquireLinkResponse::decode(header, &mut body)?)
            }
            Some(CommandId::Unbind) => Frame::Unbind(Unbind::decode(header, &mut body)?),
            Some(CommandId::UnbindResp) => Frame::UnbindResp(UnbindResponse::decode(header, &mut body)?),
            Some(CommandId::GenericNack) => Frame::GenericNack(GenericNack::decode(header, &mut body)?),
            _ => Frame::Unknown {
                header,
                body: Bytes::copy_from_slice(&pdu[PduHeader::SIZE..end]),
            },
        };

        Ok(frame)
    }

    /// Encode this frame, header included, to the buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        match self {
            Frame::BindTransceiver(pdu) => pdu.encode(buf),
            Frame::BindTransceiverResp(pdu) => pdu.encode(buf),
            Frame::SubmitSm(pdu) => pdu.encode(buf),
            Frame::SubmitSmResp(pdu) => pdu.encode(buf),
            Frame::DeliverSm(pdu) => pdu.encode(buf),
            Frame::DeliverSmResp(pdu) => pdu.encode(buf),
            Frame::EnquireLink(pdu) => pdu.encode(buf),
            Frame::EnquireLinkResp(pdu) => pdu.encode(buf),
            Frame::Unbind(pdu) => pdu.encode(buf),
            Frame::UnbindResp(pdu) => pdu.encode(buf),
            Frame::GenericNack(pdu) => pdu.encode(buf),
            Frame::Unknown { header, body } => {
                let length = PduHeader::SIZE + body.len();
                if length > MAX_PDU_SIZE as usize {
                    return Err(CodecError::InvalidPduLength {
                        length: length as u32,
                        min: PduHeader::SIZE as u32,
                        max: MAX_PDU_SIZE,
                    });
                }
                PduHeader {
                    command_length: length as u32,
                    ..*header
                }
                .encode(buf);
                buf.put_slice(body);
                Ok(())
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Get the raw command_id for this frame
    pub fn command_id(&self) -> u32 {
        let id = match self {
            Frame::BindTransceiver(_) => CommandId::BindTransceiver,
            Frame::BindTransceiverResp(_) => CommandId::BindTransceiverResp,
            Frame::SubmitSm(_) => CommandId::SubmitSm,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Frame::DeliverSm(_) => CommandId::DeliverSm,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Frame::EnquireLink(_) => CommandId::EnquireLink,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Frame::Unbind(_) => CommandId::Unbind,
            Frame::UnbindResp(_) => CommandId::UnbindResp,
            Frame::GenericNack(_) => CommandId::GenericNack,
            Frame::Unknown { header, .. } => return header.command_id,
        };
        id as u32
    }

    /// Get the sequence number for this frame
    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::BindTransceiver(pdu) => pdu.sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number,
        }
    }

    /// Overwrite the sequence number, used when a request is handed to a
    /// session and numbered at send time.
    pub fn set_sequence_number(&mut self, sequence_number: u32) {
        match self {
            Frame::BindTransceiver(pdu) => pdu.sequence_number = sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number = sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number = sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number = sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number = sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number = sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number = sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number = sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number = sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number = sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number = sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number = sequence_number,
        }
    }

    /// Check if this frame is a response PDU
    pub fn is_response(&self) -> bool {
        self.command_id() & RESPONSE_BIT != 0
    }
}
