//! Mandatory field names, their wire kinds and per-command body layouts.

use std::fmt;

use bytes::Bytes;

use super::command::CommandId;

/// Wire representation of a mandatory field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// NUL-terminated octet string; `max` includes the terminator.
    CString { max: usize },
    /// Single octet integer.
    Int,
    /// Octets preceded by a one-octet length (`sm_length` + `short_message`).
    Octets { max: usize },
}

/// Mandatory field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    SystemId,
    Password,
    SystemType,
    InterfaceVersion,
    AddrTon,
    AddrNpi,
    AddressRange,
    ServiceType,
    SourceAddrTon,
    SourceAddrNpi,
    SourceAddr,
    DestAddrTon,
    DestAddrNpi,
    DestinationAddr,
    EsmClass,
    ProtocolId,
    PriorityFlag,
    ScheduleDeliveryTime,
    ValidityPeriod,
    RegisteredDelivery,
    ReplaceIfPresentFlag,
    DataCoding,
    SmDefaultMsgId,
    ShortMessage,
    MessageId,
}

impl Field {
    /// Wire kind of this field.
    pub fn kind(self) -> FieldKind {
        use Field::*;
        match self {
            SystemId => FieldKind::CString { max: 16 },
            Password => FieldKind::CString { max: 9 },
            SystemType => FieldKind::CString { max: 13 },
            AddressRange => FieldKind::CString { max: 41 },
            ServiceType => FieldKind::CString { max: 6 },
            SourceAddr | DestinationAddr => FieldKind::CString { max: 21 },
            ScheduleDeliveryTime | ValidityPeriod => FieldKind::CString { max: 17 },
            MessageId => FieldKind::CString { max: 65 },
            ShortMessage => FieldKind::Octets { max: 254 },
            InterfaceVersion | AddrTon | AddrNpi | SourceAddrTon | SourceAddrNpi
            | DestAddrTon | DestAddrNpi | EsmClass | ProtocolId | PriorityFlag
            | RegisteredDelivery | ReplaceIfPresentFlag | DataCoding | SmDefaultMsgId => {
                FieldKind::Int
            }
        }
    }

    /// Protocol name of the field.
    pub fn name(self) -> &'static str {
        use Field::*;
        match self {
            SystemId => "system_id",
            Password => "password",
            SystemType => "system_type",
            InterfaceVersion => "interface_version",
            AddrTon => "addr_ton",
            AddrNpi => "addr_npi",
            AddressRange => "address_range",
            ServiceType => "service_type",
            SourceAddrTon => "source_addr_ton",
            SourceAddrNpi => "source_addr_npi",
            SourceAddr => "source_addr",
            DestAddrTon => "dest_addr_ton",
            DestAddrNpi => "dest_addr_npi",
            DestinationAddr => "destination_addr",
            EsmClass => "esm_class",
            ProtocolId => "protocol_id",
            PriorityFlag => "priority_flag",
            ScheduleDeliveryTime => "schedule_delivery_time",
            ValidityPeriod => "validity_period",
            RegisteredDelivery => "registered_delivery",
            ReplaceIfPresentFlag => "replace_if_present_flag",
            DataCoding => "data_coding",
            SmDefaultMsgId => "sm_default_msg_id",
            ShortMessage => "short_message",
            MessageId => "message_id",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const BIND_LAYOUT: &[Field] = &[
    Field::SystemId,
    Field::Password,
    Field::SystemType,
    Field::InterfaceVersion,
    Field::AddrTon,
    Field::AddrNpi,
    Field::AddressRange,
];

const BIND_RESP_LAYOUT: &[Field] = &[Field::SystemId];

const SUBMIT_SM_LAYOUT: &[Field] = &[
    Field::ServiceType,
    Field::SourceAddrTon,
    Field::SourceAddrNpi,
    Field::SourceAddr,
    Field::DestAddrTon,
    Field::DestAddrNpi,
    Field::DestinationAddr,
    Field::EsmClass,
    Field::ProtocolId,
    Field::PriorityFlag,
    Field::ScheduleDeliveryTime,
    Field::ValidityPeriod,
    Field::RegisteredDelivery,
    Field::ReplaceIfPresentFlag,
    Field::DataCoding,
    Field::SmDefaultMsgId,
    Field::ShortMessage,
];

const SUBMIT_SM_RESP_LAYOUT: &[Field] = &[Field::MessageId];

/// Ordered mandatory fields of a command body.
pub fn layout(command: CommandId) -> &'static [Field] {
    match command {
        CommandId::BindTransmitter | CommandId::BindReceiver | CommandId::BindTransceiver => {
            BIND_LAYOUT
        }
        CommandId::BindTransmitterResp
        | CommandId::BindReceiverResp
        | CommandId::BindTransceiverResp => BIND_RESP_LAYOUT,
        CommandId::SubmitSm => SUBMIT_SM_LAYOUT,
        CommandId::SubmitSmResp => SUBMIT_SM_RESP_LAYOUT,
        CommandId::GenericNack
        | CommandId::Unbind
        | CommandId::UnbindResp
        | CommandId::EnquireLink
        | CommandId::EnquireLinkResp
        | CommandId::Other(_) => &[],
    }
}

/// Value held by a mandatory field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Int(u8),
    Octets(Bytes),
}

impl FieldValue {
    /// String form, if this is a text field.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer form, if this is an integer field.
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Raw octets of the value.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FieldValue::Text(s) => s.as_bytes(),
            FieldValue::Int(v) => std::slice::from_ref(v),
            FieldValue::Octets(b) => b,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Octets(b) => write!(f, "{} octets", b.len()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        FieldValue::Int(value)
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        FieldValue::Octets(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Octets(Bytes::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(layout(CommandId::BindTransceiver)[0], Field::SystemId);
        assert_eq!(layout(CommandId::SubmitSm).last(), Some(&Field::ShortMessage));
        assert!(layout(CommandId::EnquireLink).is_empty());
    }

    #[test]
    fn test_value_accessors() {
        let text = FieldValue::from("client");
        assert_eq!(text.as_str(), Some("client"));
        assert_eq!(text.as_u8(), None);
        assert_eq!(FieldValue::from(8u8).as_bytes(), &[8]);
    }
}
