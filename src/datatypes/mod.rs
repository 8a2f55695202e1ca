mod bind_transceiver;
mod command_id;
mod command_status;
mod deliver_sm;
mod delivery_receipt;
mod enquire_link;
mod generic_nack;
mod interface_version;
mod numeric_plan_indicator;
mod submit_sm;
mod tlv;
mod type_of_number;
mod unbind;

pub use bind_transceiver::{BindTransceiver, BindTransceiverResponse};
pub use command_id::{CommandId, RESPONSE_BIT};
pub use command_status::CommandStatus;
pub use deliver_sm::{DeliverSm, DeliverSmResponse};
pub use delivery_receipt::{DeliveryReceipt, MessageState};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use generic_nack::GenericNack;
pub use interface_version::InterfaceVersion;
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use submit_sm::{SubmitSm, SubmitSmResponse};
pub use tlv::{Tlv, tags};
pub use type_of_number::TypeOfNumber;
pub use unbind::{Unbind, UnbindResponse};

// SMPP v3.4 C-Octet String field sizes, NUL terminator included.
pub const SYSTEM_ID_LEN: usize = 16;
pub const PASSWORD_LEN: usize = 9;
pub const SYSTEM_TYPE_LEN: usize = 13;
pub const ADDRESS_RANGE_LEN: usize = 41;
pub const SERVICE_TYPE_LEN: usize = 6;
pub const ADDRESS_LEN: usize = 21;
pub const TIME_LEN: usize = 17;
pub const MESSAGE_ID_LEN: usize = 65;
