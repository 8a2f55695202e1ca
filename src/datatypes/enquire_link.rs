use crate::datatypes::{CommandId, CommandStatus};

/// enquire_link is used to provide a confidence-check of the communication
/// path between an ESME and an SMSC. Either side may originate it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnquireLink {
    // EnquireLink always sets the command status to NULL
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnquireLinkResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

crate::macros::impl_complete_header_only_pdu!(EnquireLink, CommandId::EnquireLink);
crate::macros::impl_complete_header_only_pdu!(EnquireLinkResponse, CommandId::EnquireLinkResp);
