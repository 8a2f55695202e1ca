use crate::datatypes::{
    CommandId, CommandStatus, DeliveryReceipt, MessageState, NumericPlanIndicator, Tlv,
    TypeOfNumber, tags,
};
use bytes::Bytes;

/// esm_class bits 5-2 carry the message type on a deliver_sm.
const ESM_CLASS_MESSAGE_TYPE_MASK: u8 = 0b0011_1100;
const ESM_CLASS_SMSC_DELIVERY_RECEIPT: u8 = 0b0000_0100;
const ESM_CLASS_INTERMEDIATE_NOTIFICATION: u8 = 0b0010_0000;

/// The deliver_sm is issued by the SMSC to send a message to an ESME. Using
/// this command, the SMSC may route a short message to the ESME for delivery,
/// or deliver an SMSC delivery receipt.
///
/// The body layout is identical to submit_sm.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliverSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    pub service_type: String,
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    pub source_addr: String,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    pub destination_addr: String,

    /// Indicates Message Type. For receipts, bits 5-2 hold the receipt kind.
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,

    /// Unused for deliver_sm, always NULL
    pub schedule_delivery_time: String,
    /// Unused for deliver_sm, always NULL
    pub validity_period: String,
    pub registered_delivery: u8,
    /// Unused for deliver_sm, always NULL
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    /// Unused for deliver_sm, always NULL
    pub sm_default_msg_id: u8,

    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// This field is unused and is set to NULL.
    pub message_id: String,
}

crate::macros::impl_short_message_pdu!(DeliverSm, CommandId::DeliverSm);
crate::macros::impl_message_id_response_pdu!(DeliverSmResponse, CommandId::DeliverSmResp);

impl DeliverSm {
    /// True when the SMSC marked this PDU as a delivery receipt or an
    /// intermediate notification, or attached a `receipted_message_id`.
    pub fn is_delivery_receipt(&self) -> bool {
        let message_type = self.esm_class & ESM_CLASS_MESSAGE_TYPE_MASK;
        message_type == ESM_CLASS_SMSC_DELIVERY_RECEIPT
            || message_type == ESM_CLASS_INTERMEDIATE_NOTIFICATION
            || self.tlv(tags::RECEIPTED_MESSAGE_ID).is_some()
    }

    /// Extracts the receipt carried by this PDU.
    ///
    /// The `receipted_message_id` and `message_state` TLVs win over whatever
    /// the text body says, since SMSCs fill the TLVs from their own records.
    pub fn delivery_receipt(&self) -> Option<DeliveryReceipt> {
        let parsed = std::str::from_utf8(self.message_body())
            .ok()
            .and_then(DeliveryReceipt::parse);
        let receipted_id = self
            .tlv(tags::RECEIPTED_MESSAGE_ID)
            .and_then(Tlv::as_cstring);
        let state = self
            .tlv(tags::MESSAGE_STATE)
            .and_then(Tlv::as_u8)
            .and_then(|value| MessageState::try_from(value).ok());

        let receipt = match (parsed, receipted_id) {
            (Some(mut receipt), Some(id)) => {
                receipt.id = id;
                Some(receipt)
            }
            (None, Some(id)) => Some(DeliveryReceipt {
                id,
                ..Default::default()
            }),
            (parsed, None) => parsed,
        };

        receipt.map(|mut receipt| {
            if let Some(state) = state {
                receipt.state = state;
            }
            receipt
        })
    }
}
