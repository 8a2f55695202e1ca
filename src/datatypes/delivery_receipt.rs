use num_enum::TryFromPrimitive;

/// message_state TLV values (SMPP v3.4 section 5.3.2.35)
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageState {
    Enroute = 1,
    Delivered = 2,
    Expired = 3,
    Deleted = 4,
    Undeliverable = 5,
    Accepted = 6,
    Unknown = 7,
    Rejected = 8,
}

impl Default for MessageState {
    fn default() -> Self {
        MessageState::Unknown
    }
}

impl MessageState {
    /// Maps the `stat:` abbreviation of a receipt text.
    pub fn from_stat(stat: &str) -> Self {
        match stat.to_ascii_uppercase().as_str() {
            "ENROUTE" => MessageState::Enroute,
            "DELIVRD" | "DELIVERED" => MessageState::Delivered,
            "EXPIRED" => MessageState::Expired,
            "DELETED" => MessageState::Deleted,
            "UNDELIV" | "UNDELIVERABLE" => MessageState::Undeliverable,
            "ACCEPTD" | "ACCEPTED" => MessageState::Accepted,
            "REJECTD" | "REJECTED" => MessageState::Rejected,
            _ => MessageState::Unknown,
        }
    }

    /// No further receipts follow a message in this state.
    pub fn is_final(&self) -> bool {
        !matches!(self, MessageState::Enroute | MessageState::Accepted)
    }
}

/// A delivery receipt in the SMSC text format of SMPP v3.4 Appendix B:
///
/// ```text
/// id:IIIIIIIIII sub:SSS dlvrd:DDD submit date:YYMMDDhhmm done date:YYMMDDhhmm stat:DDDDDDD err:E text:...
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliveryReceipt {
    /// SMSC message id of the original submit_sm
    pub id: String,
    pub submitted: Option<u32>,
    pub delivered: Option<u32>,
    pub submit_date: Option<String>,
    pub done_date: Option<String>,
    pub state: MessageState,
    pub error: Option<String>,
    pub text: Option<String>,
}

impl DeliveryReceipt {
    /// Parses receipt text. Returns `None` when there is no `id:` field.
    /// Keys are matched case-insensitively and fields may appear in any order.
    pub fn parse(content: &str) -> Option<Self> {
        let lower = content.to_ascii_lowercase();
        let field = |key: &str| -> Option<String> {
            let start = find_key(&lower, key)? + key.len();
            let token = content[start..].split_whitespace().next()?;
            (!token.ends_with(':')).then(|| token.to_string())
        };

        let id = field("id:")?;
        Some(DeliveryReceipt {
            id,
            submitted: field("sub:").and_then(|v| v.parse().ok()),
            delivered: field("dlvrd:").and_then(|v| v.parse().ok()),
            submit_date: field("submit date:"),
            done_date: field("done date:"),
            state: field("stat:")
                .map(|stat| MessageState::from_stat(&stat))
                .unwrap_or_default(),
            error: field("err:"),
            text: find_key(&lower, "text:").map(|i| content[i + "text:".len()..].trim().to_string()),
        })
    }
}

/// Position of `key` where it starts a field: at the beginning of the text
/// or right after whitespace.
fn find_key(haystack: &str, key: &str) -> Option<usize> {
    haystack
        .match_indices(key)
        .map(|(index, _)| index)
        .find(|&index| index == 0 || haystack[..index].ends_with(char::is_whitespace))
}
