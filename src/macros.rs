// ABOUTME: This module provides macros to reduce boilerplate in SMPP PDU implementations
// ABOUTME: Includes macros for header-only PDUs, message_id responses and the submit/deliver body

/// Macro for implementing codec traits on header-only PDUs (no body)
///
/// # Arguments
/// * `$pdu_type` - The PDU struct name (e.g., EnquireLink)
/// * `$command_id` - The CommandId variant (e.g., CommandId::EnquireLink)
///
/// # Generated code
/// - Decodable implementation with header validation
/// - Encodable implementation for header-only encoding
macro_rules! impl_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                // Header-only PDUs should have no body
                if buf.has_remaining() {
                    return Err($crate::codec::CodecError::FieldValidation {
                        field: concat!(stringify!($pdu_type), "_body"),
                        reason: concat!(stringify!($pdu_type), " PDU should have no body")
                            .to_string(),
                    });
                }

                Ok($pdu_type {
                    command_status: header.status(),
                    sequence_number: header.sequence_number,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                $crate::codec::encode_pdu(
                    buf,
                    $command_id,
                    self.command_status,
                    self.sequence_number,
                    |_| Ok(()),
                )
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE
            }
        }
    };
}

/// Macro for generating constructor methods for header-only PDUs
///
/// # Generated code
/// - `new(sequence_number: u32)` - Creates PDU with Ok status
/// - `error(sequence_number: u32, status: CommandStatus)` - Creates PDU with error status
macro_rules! impl_header_only_constructors {
    ($pdu_type:ident) => {
        impl $pdu_type {
            /// Create a new PDU with Ok status
            pub fn new(sequence_number: u32) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                }
            }

            /// Create a PDU with error status
            pub fn error(sequence_number: u32, status: $crate::datatypes::CommandStatus) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                }
            }
        }
    };
}

/// Macro for implementing the complete header-only PDU pattern
macro_rules! impl_complete_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        $crate::macros::impl_header_only_pdu!($pdu_type, $command_id);
        $crate::macros::impl_header_only_constructors!($pdu_type);
    };
}

/// Macro for responses whose body is a single message_id C-Octet String
/// (submit_sm_resp, deliver_sm_resp).
///
/// An error response may arrive without a body at all; that decodes to an
/// empty message_id.
macro_rules! impl_message_id_response_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $pdu_type {
            /// Create a new response with Ok status
            pub fn new(sequence_number: u32, message_id: impl Into<String>) -> Self {
                Self {
                    command_status: $crate::datatypes::CommandStatus::Ok,
                    sequence_number,
                    message_id: message_id.into(),
                }
            }

            /// Create a response with error status and no message_id
            pub fn error(sequence_number: u32, status: $crate::datatypes::CommandStatus) -> Self {
                Self {
                    command_status: status,
                    sequence_number,
                    message_id: String::new(),
                }
            }
        }

        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                Self::validate_header(&header)?;

                let message_id = $crate::codec::decode_optional_cstring(
                    buf,
                    $crate::datatypes::MESSAGE_ID_LEN,
                    "message_id",
                )?;

                Ok($pdu_type {
                    command_status: header.status(),
                    sequence_number: header.sequence_number,
                    message_id,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                $crate::codec::encode_pdu(
                    buf,
                    $command_id,
                    self.command_status,
                    self.sequence_number,
                    |body| {
                        $crate::codec::encode_cstring(
                            body,
                            &self.message_id,
                            $crate::datatypes::MESSAGE_ID_LEN,
                            "message_id",
                        )
                    },
                )
            }
        }
    };
}

/// Macro for the body shared by submit_sm and deliver_sm
///
/// Both PDUs carry the same mandatory parameters in the same order, followed
/// by sm_length, the short_message octets and any number of TLVs. The struct
/// must declare exactly those fields.
///
/// # Generated code
/// - `tlv()` and `message_body()` accessors
/// - Complete Encodable/Decodable trait implementations
macro_rules! impl_short_message_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $pdu_type {
            /// Looks up an optional parameter by tag
            pub fn tlv(&self, tag: u16) -> Option<&$crate::datatypes::Tlv> {
                self.tlvs.iter().find(|tlv| tlv.tag == tag)
            }

            /// The user data: `short_message`, or the `message_payload` TLV
            /// when the mandatory field is empty.
            pub fn message_body(&self) -> &[u8] {
                if self.short_message.is_empty() {
                    if let Some(payload) = self.tlv($crate::datatypes::tags::MESSAGE_PAYLOAD) {
                        return &payload.value;
                    }
                }
                &self.short_message
            }
        }

        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use $crate::codec::{decode_cstring, decode_npi, decode_ton, decode_u8};
                use $crate::datatypes::{ADDRESS_LEN, SERVICE_TYPE_LEN, TIME_LEN};
                use bytes::Buf;

                Self::validate_header(&header)?;

                let service_type = decode_cstring(buf, SERVICE_TYPE_LEN, "service_type")?;
                let source_addr_ton = decode_ton(buf, "source_addr_ton")?;
                let source_addr_npi = decode_npi(buf, "source_addr_npi")?;
                let source_addr = decode_cstring(buf, ADDRESS_LEN, "source_addr")?;
                let dest_addr_ton = decode_ton(buf, "dest_addr_ton")?;
                let dest_addr_npi = decode_npi(buf, "dest_addr_npi")?;
                let destination_addr = decode_cstring(buf, ADDRESS_LEN, "destination_addr")?;
                let esm_class = decode_u8(buf, "esm_class")?;
                let protocol_id = decode_u8(buf, "protocol_id")?;
                let priority_flag = decode_u8(buf, "priority_flag")?;
                let schedule_delivery_time =
                    decode_cstring(buf, TIME_LEN, "schedule_delivery_time")?;
                let validity_period = decode_cstring(buf, TIME_LEN, "validity_period")?;
                let registered_delivery = decode_u8(buf, "registered_delivery")?;
                let replace_if_present_flag = decode_u8(buf, "replace_if_present_flag")?;
                let data_coding = decode_u8(buf, "data_coding")?;
                let sm_default_msg_id = decode_u8(buf, "sm_default_msg_id")?;

                let sm_length = decode_u8(buf, "sm_length")? as usize;
                if buf.remaining() < sm_length {
                    return Err($crate::codec::CodecError::FieldValidation {
                        field: "short_message",
                        reason: format!(
                            "sm_length {} but only {} octets remain",
                            sm_length,
                            buf.remaining()
                        ),
                    });
                }
                let short_message = buf.copy_to_bytes(sm_length);
                let tlvs = $crate::codec::decode_tlvs(buf)?;

                Ok($pdu_type {
                    command_status: header.status(),
                    sequence_number: header.sequence_number,
                    service_type,
                    source_addr_ton,
                    source_addr_npi,
                    source_addr,
                    dest_addr_ton,
                    dest_addr_npi,
                    destination_addr,
                    esm_class,
                    protocol_id,
                    priority_flag,
                    schedule_delivery_time,
                    validity_period,
                    registered_delivery,
                    replace_if_present_flag,
                    data_coding,
                    sm_default_msg_id,
                    short_message,
                    tlvs,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                use $crate::codec::encode_cstring;
                use $crate::datatypes::{ADDRESS_LEN, SERVICE_TYPE_LEN, TIME_LEN};
                use bytes::BufMut;

                $crate::codec::encode_pdu(
                    buf,
                    $command_id,
                    self.command_status,
                    self.sequence_number,
                    |body| {
                        encode_cstring(body, &self.service_type, SERVICE_TYPE_LEN, "service_type")?;
                        body.put_u8(self.source_addr_ton as u8);
                        body.put_u8(self.source_addr_npi as u8);
                        encode_cstring(body, &self.source_addr, ADDRESS_LEN, "source_addr")?;
                        body.put_u8(self.dest_addr_ton as u8);
                        body.put_u8(self.dest_addr_npi as u8);
                        encode_cstring(body, &self.destination_addr, ADDRESS_LEN, "destination_addr")?;
                        body.put_u8(self.esm_class);
                        body.put_u8(self.protocol_id);
                        body.put_u8(self.priority_flag);
                        encode_cstring(
                            body,
                            &self.schedule_delivery_time,
                            TIME_LEN,
                            "schedule_delivery_time",
                        )?;
                        encode_cstring(body, &self.validity_period, TIME_LEN, "validity_period")?;
                        body.put_u8(self.registered_delivery);
                        body.put_u8(self.replace_if_present_flag);
                        body.put_u8(self.data_coding);
                        body.put_u8(self.sm_default_msg_id);
                        $crate::codec::encode_short_message(body, &self.short_message)?;
                        for tlv in &self.tlvs {
                            tlv.encode(body)?;
                        }
                        Ok(())
                    },
                )
            }
        }
    };
}

// Make macros available to the rest of the crate
pub(crate) use {
    impl_complete_header_only_pdu, impl_header_only_constructors, impl_header_only_pdu,
    impl_message_id_response_pdu, impl_short_message_pdu,
};
