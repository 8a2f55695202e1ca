use crate::datatypes::{CommandId, CommandStatus};

/// The purpose of the unbind operation is to deregister an instance of an
/// ESME from the SMSC and inform the SMSC that the ESME no longer wishes to
/// use this network connection for the submission or delivery of messages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Unbind {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnbindResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
}

crate::macros::impl_complete_header_only_pdu!(Unbind, CommandId::Unbind);
crate::macros::impl_complete_header_only_pdu!(UnbindResponse, CommandId::UnbindResp);
