// ABOUTME: Supporting types for SMPP client operations including bind credentials and SMS messages
// ABOUTME: Provides simplified interfaces for common SMPP operations with sensible defaults

use crate::datatypes::{
    BindTransceiver, CommandStatus, InterfaceVersion, NumericPlanIndicator, SubmitSm,
    TypeOfNumber,
};
use bytes::Bytes;

/// SMPP bind operation credentials
///
/// Contains authentication information for establishing a transceiver session
/// with the SMSC.
#[derive(Debug, Clone, PartialEq)]
pub struct BindCredentials {
    /// System identifier for authentication
    pub system_id: String,
    /// Password for authentication
    pub password: String,
    /// System type, empty unless the SMSC asks for one
    pub system_type: String,
    /// SMPP interface version to use
    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,
    pub address_range: String,
}

impl BindCredentials {
    /// Create new bind credentials for a transceiver session (SMPP v3.4)
    pub fn transceiver(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: String::new(),
        }
    }

    /// Set system type
    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    /// Set the address range served by this ESME
    pub fn with_address_range(
        mut self,
        ton: TypeOfNumber,
        npi: NumericPlanIndicator,
        address_range: impl Into<String>,
    ) -> Self {
        self.addr_ton = ton;
        self.addr_npi = npi;
        self.address_range = address_range.into();
        self
    }

    /// The bind_transceiver PDU for these credentials
    pub fn to_bind(&self, sequence_number: u32) -> BindTransceiver {
        BindTransceiver {
            command_status: CommandStatus::Ok,
            sequence_number,
            system_id: self.system_id.clone(),
            password: self.password.clone(),
            system_type: self.system_type.clone(),
            interface_version: self.interface_version,
            addr_ton: self.addr_ton,
            addr_npi: self.addr_npi,
            address_range: self.address_range.clone(),
        }
    }
}

/// Simplified SMS message for easy client usage
///
/// Provides a high-level interface for SMS messages with sensible defaults,
/// hiding the complexity of the underlying SubmitSm PDU structure.
#[derive(Debug, Clone, PartialEq)]
pub struct SmsMessage {
    /// Destination phone number
    pub to: String,
    /// Source phone number
    pub from: String,
    /// Message text content
    pub text: String,
    /// Request an SMSC delivery receipt
    pub registered_delivery: bool,
    /// Data coding scheme, 0 for the SMSC default alphabet
    pub data_coding: u8,
    pub source_ton: TypeOfNumber,
    pub source_npi: NumericPlanIndicator,
    pub dest_ton: TypeOfNumber,
    pub dest_npi: NumericPlanIndicator,
}

impl SmsMessage {
    /// Create a new SMS message with default options
    pub fn new(to: impl Into<String>, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            text: text.into(),
            registered_delivery: false,
            data_coding: 0,
            source_ton: TypeOfNumber::Unknown,
            source_npi: NumericPlanIndicator::Unknown,
            dest_ton: TypeOfNumber::Unknown,
            dest_npi: NumericPlanIndicator::Unknown,
        }
    }

    /// Request delivery receipt
    pub fn with_delivery_receipt(mut self) -> Self {
        self.registered_delivery = true;
        self
    }

    /// Set data coding scheme
    pub fn with_data_coding(mut self, data_coding: u8) -> Self {
        self.data_coding = data_coding;
        self
    }

    /// Set source address numbering
    pub fn source_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.source_ton = ton;
        self.source_npi = npi;
        self
    }

    /// Set destination address numbering
    pub fn dest_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.dest_ton = ton;
        self.dest_npi = npi;
        self
    }
}

impl From<&SmsMessage> for SubmitSm {
    fn from(message: &SmsMessage) -> Self {
        SubmitSm {
            source_addr_ton: message.source_ton,
            source_addr_npi: message.source_npi,
            source_addr: message.from.clone(),
            dest_addr_ton: message.dest_ton,
            dest_addr_npi: message.dest_npi,
            destination_addr: message.to.clone(),
            registered_delivery: if message.registered_delivery {
                SubmitSm::REGISTERED_DELIVERY_RECEIPT
            } else {
                0
            },
            data_coding: message.data_coding,
            short_message: Bytes::copy_from_slice(message.text.as_bytes()),
            ..Default::default()
        }
    }
}
