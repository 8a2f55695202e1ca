use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_npi, decode_optional_cstring,
    decode_ton, decode_tlvs, decode_u8, encode_cstring, encode_pdu,
};
use crate::datatypes::{
    ADDRESS_RANGE_LEN, CommandId, CommandStatus, InterfaceVersion, NumericPlanIndicator,
    PASSWORD_LEN, SYSTEM_ID_LEN, SYSTEM_TYPE_LEN, Tlv, TypeOfNumber, tags,
};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// BindTransceiver is used to bind a transceiver ESME to the SMSC.
/// A transceiver ESME can both send and receive messages through a single connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindTransceiver {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    // Body
    /// 5.2.1 system_id: This is the identification of the ESME requesting to
    ///       bind as a transceiver with the SMSC. Up to 15 characters.
    pub system_id: String,

    /// 5.2.2 password: This is the password for authentication. Up to 8
    ///       characters. If no password is required by the SMSC, a NULL
    ///       (i.e. empty) password should be supplied.
    pub password: String,

    /// 5.2.3 system_type: This is used to categorize the type of ESME that is
    ///       binding to the SMSC, e.g. "VMS" or "OTA". Up to 12 characters.
    pub system_type: String,

    /// 5.2.4 interface_version: Interface version level supported by the ESME.
    pub interface_version: InterfaceVersion,

    /// 5.2.5 addr_ton: Type of Number format of the ESME address(es) served
    ///       via this SMPP.
    pub addr_ton: TypeOfNumber,

    /// 5.2.6 addr_npi: Numbering Plan Indicator of the ESME address(es) served
    ///       via this SMPP.
    pub addr_npi: NumericPlanIndicator,

    /// 5.2.7 address_range: This is used to specify a range of SME addresses
    ///       serviced by the ESME. A single address may also be specified.
    pub address_range: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindTransceiverResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    // body
    pub system_id: String,
    pub tlvs: Vec<Tlv>,
}

impl BindTransceiverResponse {
    pub fn new(sequence_number: u32, system_id: impl Into<String>) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            system_id: system_id.into(),
            tlvs: Vec::new(),
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            ..Default::default()
        }
    }

    /// The SMPP version the SMSC reported, when it sent one.
    pub fn sc_interface_version(&self) -> Option<u8> {
        self.tlvs
            .iter()
            .find(|tlv| tlv.tag == tags::SC_INTERFACE_VERSION)
            .and_then(Tlv::as_u8)
    }
}

impl Decodable for BindTransceiver {
    fn command_id() -> CommandId {
        CommandId::BindTransceiver
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let system_id = decode_cstring(buf, SYSTEM_ID_LEN, "system_id")?;
        let password = decode_cstring(buf, PASSWORD_LEN, "password")?;
        let system_type = decode_cstring(buf, SYSTEM_TYPE_LEN, "system_type")?;
        let version = decode_u8(buf, "interface_version")?;
        let interface_version =
            InterfaceVersion::try_from(version).map_err(|_| CodecError::FieldValidation {
                field: "interface_version",
                reason: format!("unsupported interface version {version:#04x}"),
            })?;
        let addr_ton = decode_ton(buf, "addr_ton")?;
        let addr_npi = decode_npi(buf, "addr_npi")?;
        let address_range = decode_cstring(buf, ADDRESS_RANGE_LEN, "address_range")?;

        Ok(BindTransceiver {
            command_status: header.status(),
            sequence_number: header.sequence_number,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }
}

impl Encodable for BindTransceiver {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        encode_pdu(
            buf,
            CommandId::BindTransceiver,
            self.command_status,
            self.sequence_number,
            |body| {
                encode_cstring(body, &self.system_id, SYSTEM_ID_LEN, "system_id")?;
                encode_cstring(body, &self.password, PASSWORD_LEN, "password")?;
                encode_cstring(body, &self.system_type, SYSTEM_TYPE_LEN, "system_type")?;
                body.put_u8(self.interface_version as u8);
                body.put_u8(self.addr_ton as u8);
                body.put_u8(self.addr_npi as u8);
                encode_cstring(body, &self.address_range, ADDRESS_RANGE_LEN, "address_range")
            },
        )
    }
}

impl Decodable for BindTransceiverResponse {
    fn command_id() -> CommandId {
        CommandId::BindTransceiverResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        // SMSCs commonly omit the body of a rejected bind
        let system_id = decode_optional_cstring(buf, SYSTEM_ID_LEN, "system_id")?;
        let tlvs = decode_tlvs(buf)?;

        Ok(BindTransceiverResponse {
            command_status: header.status(),
            sequence_number: header.sequence_number,
            system_id,
            tlvs,
        })
    }
}

impl Encodable for BindTransceiverResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        encode_pdu(
            buf,
            CommandId::BindTransceiverResp,
            self.command_status,
            self.sequence_number,
            |body| {
                encode_cstring(body, &self.system_id, SYSTEM_ID_LEN, "system_id")?;
                for tlv in &self.tlvs {
                    tlv.encode(body)?;
                }
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn bind_transceiver_to_bytes() {
        let bind_transceiver = BindTransceiver {
            command_status: CommandStatus::Ok,
            sequence_number: 1,
            system_id: "SMPP3TEST".to_string(),
            password: "secret08".to_string(),
            system_type: "SUBMIT1".to_string(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::International,
            addr_npi: NumericPlanIndicator::Isdn,
            address_range: String::new(),
        };

        let bt_bytes = bind_transceiver.to_bytes().unwrap();

        // Expected byte representation of a bind transceiver
        let expected: Vec<u8> = vec![
            // Header:
            0x00, 0x00, 0x00, 0x2F, // command_length
            0x00, 0x00, 0x00, 0x09, // command_id (BindTransceiver = 0x00000009)
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            // Body:
            0x53, 0x4D, 0x50, 0x50, 0x33, 0x54, 0x45, 0x53, 0x54, 0x00, // system_id
            0x73, 0x65, 0x63, 0x72, 0x65, 0x74, 0x30, 0x38, 0x00, // password
            0x53, 0x55, 0x42, 0x4D, 0x49, 0x54, 0x31, 0x00, // system_type
            0x34, // interface_version
            0x01, // addr_ton
            0x01, // addr_npi
            0x00, // address_range
        ];

        assert_eq!(bt_bytes.as_ref(), expected.as_slice());
        assert_eq!(bind_transceiver.encoded_size(), expected.len());
    }

    #[test]
    fn bind_transceiver_response_to_bytes_no_tlv() {
        let response = BindTransceiverResponse::new(1, "SMPP3TEST");

        let expected: Vec<u8> = vec![
            // Header:
            0x00, 0x00, 0x00, 0x1A, // command_length (26 bytes total)
            0x80, 0x00, 0x00, 0x09, // command_id (BindTransceiverResp = 0x80000009)
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            // Body:
            0x53, 0x4D, 0x50, 0x50, 0x33, 0x54, 0x45, 0x53, 0x54,
            0x00, // system_id "SMPP3TEST\0"
        ];

        assert_eq!(response.to_bytes().unwrap().as_ref(), expected.as_slice());
    }

    #[test]
    fn rejected_bind_without_body_decodes() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x10, // command_length
            0x80, 0x00, 0x00, 0x09, // command_id
            0x00, 0x00, 0x00, 0x0E, // command_status (invalid password)
            0x00, 0x00, 0x00, 0x00, // sequence_number
        ];

        match Frame::decode(data).unwrap() {
            Frame::BindTransceiverResp(resp) => {
                assert_eq!(resp.command_status, CommandStatus::InvalidPassword);
                assert_eq!(resp.system_id, "");
                assert_eq!(resp.sc_interface_version(), None);
            }
            other => panic!("Expected BindTransceiverResp, got {other:?}"),
        }
    }

    #[test]
    fn bind_response_reports_sc_interface_version() {
        let mut response = BindTransceiverResponse::new(4, "SMSC");
        response
            .tlvs
            .push(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x34));

        let bytes = response.to_bytes().unwrap();
        match Frame::decode(&bytes).unwrap() {
            Frame::BindTransceiverResp(decoded) => {
                assert_eq!(decoded.sc_interface_version(), Some(0x34));
                assert_eq!(decoded, response);
            }
            other => panic!("Expected BindTransceiverResp, got {other:?}"),
        }
    }

    #[test]
    fn password_longer_than_eight_octets_is_rejected() {
        let bind = BindTransceiver {
            system_id: "id".to_string(),
            password: "ninechars".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            bind.to_bytes(),
            Err(CodecError::FieldValidation {
                field: "password",
                ..
            })
        ));
    }
}
