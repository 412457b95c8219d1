//! Command identifiers and protocol status codes.

use std::fmt;

const RESPONSE_MASK: u32 = 0x8000_0000;

/// SMPP command identifier.
///
/// Commands outside the supported subset decode as `Other` so that the
/// session layer decides what to do with them instead of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    GenericNack,
    BindReceiver,
    BindReceiverResp,
    BindTransmitter,
    BindTransmitterResp,
    SubmitSm,
    SubmitSmResp,
    Unbind,
    UnbindResp,
    BindTransceiver,
    BindTransceiverResp,
    EnquireLink,
    EnquireLinkResp,
    Other(u32),
}

impl CommandId {
    /// Wire value.
    pub fn code(self) -> u32 {
        match self {
            Self::GenericNack => 0x8000_0000,
            Self::BindReceiver => 0x0000_0001,
            Self::BindReceiverResp => 0x8000_0001,
            Self::BindTransmitter => 0x0000_0002,
            Self::BindTransmitterResp => 0x8000_0002,
            Self::SubmitSm => 0x0000_0004,
            Self::SubmitSmResp => 0x8000_0004,
            Self::Unbind => 0x0000_0006,
            Self::UnbindResp => 0x8000_0006,
            Self::BindTransceiver => 0x0000_0009,
            Self::BindTransceiverResp => 0x8000_0009,
            Self::EnquireLink => 0x0000_0015,
            Self::EnquireLinkResp => 0x8000_0015,
            Self::Other(code) => code,
        }
    }

    /// Check if this command is a response.
    pub fn is_response(self) -> bool {
        self.code() & RESPONSE_MASK != 0
    }

    /// Check if this command is one of the three bind requests.
    pub fn is_bind(self) -> bool {
        matches!(
            self,
            Self::BindTransmitter | Self::BindReceiver | Self::BindTransceiver
        )
    }

    /// Response command paired with this request.
    ///
    /// Responses map to themselves, and `GenericNack` has no request form.
    /// Unknown requests get the response bit set.
    pub fn response(self) -> CommandId {
        match self {
            Self::BindReceiver => Self::BindReceiverResp,
            Self::BindTransmitter => Self::BindTransmitterResp,
            Self::BindTransceiver => Self::BindTransceiverResp,
            Self::SubmitSm => Self::SubmitSmResp,
            Self::Unbind => Self::UnbindResp,
            Self::EnquireLink => Self::EnquireLinkResp,
            Self::Other(code) => Self::Other(code | RESPONSE_MASK),
            other => other,
        }
    }
}

impl From<u32> for CommandId {
    fn from(value: u32) -> Self {
        match value {
            0x8000_0000 => Self::GenericNack,
            0x0000_0001 => Self::BindReceiver,
            0x8000_0001 => Self::BindReceiverResp,
            0x0000_0002 => Self::BindTransmitter,
            0x8000_0002 => Self::BindTransmitterResp,
            0x0000_0004 => Self::SubmitSm,
            0x8000_0004 => Self::SubmitSmResp,
            0x0000_0006 => Self::Unbind,
            0x8000_0006 => Self::UnbindResp,
            0x0000_0009 => Self::BindTransceiver,
            0x8000_0009 => Self::BindTransceiverResp,
            0x0000_0015 => Self::EnquireLink,
            0x8000_0015 => Self::EnquireLinkResp,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GenericNack => "generic_nack",
            Self::BindReceiver => "bind_receiver",
            Self::BindReceiverResp => "bind_receiver_resp",
            Self::BindTransmitter => "bind_transmitter",
            Self::BindTransmitterResp => "bind_transmitter_resp",
            Self::SubmitSm => "submit_sm",
            Self::SubmitSmResp => "submit_sm_resp",
            Self::Unbind => "unbind",
            Self::UnbindResp => "unbind_resp",
            Self::BindTransceiver => "bind_transceiver",
            Self::BindTransceiverResp => "bind_transceiver_resp",
            Self::EnquireLink => "enquire_link",
            Self::EnquireLinkResp => "enquire_link_resp",
            Self::Other(code) => return write!(f, "command({code:#010x})"),
        };
        f.write_str(name)
    }
}

/// Protocol-level `command_status` value.
///
/// Kept open-ended: peers may send codes outside the named set and those
/// must survive a round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandStatus(pub u32);

impl CommandStatus {
    pub const OK: Self = Self(0x0000_0000);
    pub const INVALID_MSG_LENGTH: Self = Self(0x0000_0001);
    pub const INVALID_COMMAND_LENGTH: Self = Self(0x0000_0002);
    pub const INVALID_COMMAND_ID: Self = Self(0x0000_0003);
    pub const INVALID_BIND_STATUS: Self = Self(0x0000_0004);
    pub const ALREADY_BOUND: Self = Self(0x0000_0005);
    pub const SYSTEM_ERROR: Self = Self(0x0000_0008);
    pub const BIND_FAILED: Self = Self(0x0000_000D);
    pub const INVALID_PASSWORD: Self = Self(0x0000_000E);
    pub const INVALID_SYSTEM_ID: Self = Self(0x0000_000F);
    pub const THROTTLED: Self = Self(0x0000_0058);
    pub const UNKNOWN_ERROR: Self = Self(0x0000_00FF);

    /// Check if the status signals success.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_pairs() {
        assert_eq!(CommandId::BindTransmitter.response(), CommandId::BindTransmitterResp);
        assert_eq!(CommandId::EnquireLink.response(), CommandId::EnquireLinkResp);
        assert_eq!(CommandId::SubmitSm.response().code(), 0x8000_0004);
        assert!(CommandId::SubmitSmResp.is_response());
        assert!(!CommandId::Unbind.is_response());
    }

    #[test]
    fn test_unknown_command() {
        let query = CommandId::from(0x0000_0003);
        assert_eq!(query, CommandId::Other(0x0000_0003));
        assert_eq!(query.code(), 0x0000_0003);
        assert_eq!(query.response().code(), 0x8000_0003);
        assert_eq!(query.to_string(), "command(0x00000003)");
        assert_eq!(CommandId::from(0x0000_0009), CommandId::BindTransceiver);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CommandStatus::UNKNOWN_ERROR.to_string(), "0x000000ff");
        assert!(CommandStatus::default().is_ok());
    }
}
