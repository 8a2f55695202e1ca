use crate::datatypes::{CommandId, CommandStatus, NumericPlanIndicator, Tlv, TypeOfNumber};
use bytes::Bytes;

/// This operation is used by an ESME to submit a short message to the SMSC for onward transmission
/// to a specified short message entity (SME).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmitSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    // Mandatory parameters
    /// 4.1.1 service_type: The SMS Application service associated with the
    ///       message. Set to NULL if not applicable. Max 5 octets.
    pub service_type: String,

    /// 4.1.2 source_addr_ton: Type of Number for source address.
    pub source_addr_ton: TypeOfNumber,

    /// 4.1.3 source_addr_npi: Numbering Plan Indicator for source address.
    pub source_addr_npi: NumericPlanIndicator,

    /// 4.1.4 source_addr: Address of SME which originated this message. Max 20 octets.
    pub source_addr: String,

    /// 4.1.5 dest_addr_ton: Type of Number for destination address.
    pub dest_addr_ton: TypeOfNumber,

    /// 4.1.6 dest_addr_npi: Numbering Plan Indicator for destination address.
    pub dest_addr_npi: NumericPlanIndicator,

    /// 4.1.7 destination_addr: Destination address of this short message. Max 20 octets.
    pub destination_addr: String,

    /// 4.1.8 esm_class: Indicates Message Mode and Message Type.
    pub esm_class: u8,

    /// 4.1.9 protocol_id: Protocol Identifier. Network specific field.
    pub protocol_id: u8,

    /// 4.1.10 priority_flag: Designates the priority level of the message.
    pub priority_flag: u8,

    /// 4.1.11 schedule_delivery_time: NULL for immediate delivery.
    pub schedule_delivery_time: String,

    /// 4.1.12 validity_period: NULL to request the SMSC default.
    pub validity_period: String,

    /// 4.1.13 registered_delivery: Indicator to signify if an SMSC delivery
    ///        receipt or an SME acknowledgement is required.
    pub registered_delivery: u8,

    /// 4.1.14 replace_if_present_flag
    pub replace_if_present_flag: u8,

    /// 4.1.15 data_coding: Defines the encoding scheme of the short message user data.
    pub data_coding: u8,

    /// 4.1.16 sm_default_msg_id: Index of a predefined ('canned') short message.
    pub sm_default_msg_id: u8,

    /// 4.1.18 short_message: Up to 254 octets of user data. sm_length is
    ///        derived from it when encoding.
    pub short_message: Bytes,

    /// Optional parameters, in wire order
    pub tlvs: Vec<Tlv>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    // Body
    /// This field contains the SMSC message ID of the submitted message. It
    /// may be used at a later stage to query the status of a message, cancel
    /// or replace the message.
    pub message_id: String,
}

impl SubmitSm {
    /// Request an SMSC delivery receipt on success or failure
    pub const REGISTERED_DELIVERY_RECEIPT: u8 = 0x01;
}

crate::macros::impl_short_message_pdu!(SubmitSm, CommandId::SubmitSm);
crate::macros::impl_message_id_response_pdu!(SubmitSmResponse, CommandId::SubmitSmResp);
