//! Application-level message model.
//!
//! [`ShortMessage`] and [`ShortMessageResp`] are what handlers and client
//! callers see. This module owns the complete mapping between them and the
//! `submit_sm` / `submit_sm_resp` wire fields.

mod status;
mod tag;
pub mod text;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

use crate::pdu::{CommandId, Field, Pdu};

pub use status::Status;
pub use tag::Tag;

/// Short message payloads above this size travel in the `message_payload` TLV.
pub const MAX_SHORT_MESSAGE_LEN: usize = 254;

/// Kind of short message operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortMessageType {
    #[default]
    SubmitSm,
}

/// Text coding declared in `data_coding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataCoding {
    /// SMSC default alphabet (GSM 03.38)
    #[default]
    Default,
    /// ISO-8859-1
    Latin1,
    /// ISO-8859-5 (Cyrillic)
    Iso88595,
    /// UCS2 (ISO/IEC-10646), big endian
    Ucs2,
    /// Any other scheme, payload passed through as raw octets
    Other(u8),
}

impl DataCoding {
    pub fn code(self) -> u8 {
        match self {
            DataCoding::Default => 0x00,
            DataCoding::Latin1 => 0x03,
            DataCoding::Iso88595 => 0x06,
            DataCoding::Ucs2 => 0x08,
            DataCoding::Other(code) => code,
        }
    }

    /// Whether the payload is text this crate knows how to transcode.
    pub fn is_text(self) -> bool {
        !matches!(self, DataCoding::Other(_))
    }
}

impl From<u8> for DataCoding {
    fn from(code: u8) -> Self {
        match code {
            0x00 => DataCoding::Default,
            0x03 => DataCoding::Latin1,
            0x06 => DataCoding::Iso88595,
            0x08 => DataCoding::Ucs2,
            other => DataCoding::Other(other),
        }
    }
}

/// Registered delivery setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliverySetting {
    #[default]
    NoDeliveryReceipt,
    FinalDeliveryReceipt,
    FailureDeliveryReceipt,
}

impl DeliverySetting {
    pub fn code(self) -> u8 {
        match self {
            DeliverySetting::NoDeliveryReceipt => 0x00,
            DeliverySetting::FinalDeliveryReceipt => 0x01,
            DeliverySetting::FailureDeliveryReceipt => 0x02,
        }
    }

    /// Decode the receipt bits of `registered_delivery`.
    pub fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0x01 => DeliverySetting::FinalDeliveryReceipt,
            0x02 => DeliverySetting::FailureDeliveryReceipt,
            _ => DeliverySetting::NoDeliveryReceipt,
        }
    }
}

/// A short message as submitted by a client or forwarded to a handler.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortMessage {
    pub message_type: ShortMessageType,
    pub src: String,
    pub dst: String,
    /// UTF-8 text for text codings, raw octets for `DataCoding::Other`.
    pub text: Vec<u8>,
    pub data_coding: DataCoding,
    pub validity: Option<Duration>,
    pub register: DeliverySetting,

    pub tlv_fields: BTreeMap<Tag, Bytes>,
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub replace_if_present_flag: u8,
    pub sm_default_msg_id: u8,
}

impl ShortMessage {
    /// Create a message in the default alphabet.
    pub fn new(src: impl Into<String>, dst: impl Into<String>, text: impl Into<Vec<u8>>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_data_coding(mut self, data_coding: DataCoding) -> Self {
        self.data_coding = data_coding;
        self
    }

    pub fn with_register(mut self, register: DeliverySetting) -> Self {
        self.register = register;
        self
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    pub fn with_tlv(mut self, tag: Tag, value: impl Into<Bytes>) -> Self {
        self.tlv_fields.insert(tag, value.into());
        self
    }

    /// Message text, lossily decoded as UTF-8.
    pub fn text_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }

    /// Build the `submit_sm` PDU for this message.
    ///
    /// The text is transcoded according to `data_coding`. Payloads that do
    /// not fit `short_message` are carried in the `message_payload` TLV.
    pub fn to_submit_pdu(&self, sequence: u32) -> Pdu {
        let payload = if self.data_coding.is_text() {
            text::encode(self.data_coding, &self.text_str())
        } else {
            self.text.clone()
        };

        let mut pdu = Pdu::new(CommandId::SubmitSm, sequence)
            .with(Field::ServiceType, self.service_type.as_str())
            .with(Field::SourceAddrTon, self.source_addr_ton)
            .with(Field::SourceAddrNpi, self.source_addr_npi)
            .with(Field::SourceAddr, self.src.as_str())
            .with(Field::DestAddrTon, self.dest_addr_ton)
            .with(Field::DestAddrNpi, self.dest_addr_npi)
            .with(Field::DestinationAddr, self.dst.as_str())
            .with(Field::EsmClass, self.esm_class)
            .with(Field::ProtocolId, self.protocol_id)
            .with(Field::PriorityFlag, self.priority_flag)
            .with(Field::ScheduleDeliveryTime, self.schedule_delivery_time.as_str())
            .with(
                Field::ValidityPeriod,
                self.validity.map(relative_time).unwrap_or_default(),
            )
            .with(Field::RegisteredDelivery, self.register.code())
            .with(Field::ReplaceIfPresentFlag, self.replace_if_present_flag)
            .with(Field::DataCoding, self.data_coding.code())
            .with(Field::SmDefaultMsgId, self.sm_default_msg_id);

        for (tag, value) in &self.tlv_fields {
            pdu.set_tlv(tag.code(), value.clone());
        }

        if payload.len() > MAX_SHORT_MESSAGE_LEN {
            pdu.set(Field::ShortMessage, Bytes::new());
            pdu.set_tlv(Tag::MessagePayload.code(), payload);
        } else {
            pdu.set(Field::ShortMessage, payload);
        }

        pdu
    }

    /// Rebuild a message from a received `submit_sm` PDU.
    ///
    /// The payload comes from `short_message`, or from the
    /// `message_payload` TLV when `short_message` is empty.
    pub fn from_submit_pdu(pdu: &Pdu) -> Self {
        let text_field = |field: Field| pdu.field_str(field).unwrap_or_default().to_string();
        let int_field = |field: Field| pdu.field_u8(field).unwrap_or_default();

        let data_coding = DataCoding::from(int_field(Field::DataCoding));
        let mut tlv_fields: BTreeMap<Tag, Bytes> = pdu
            .tlvs()
            .iter()
            .map(|(&code, value)| (Tag::from(code), value.clone()))
            .collect();

        let short_message = pdu.field_bytes(Field::ShortMessage).unwrap_or_default();
        let raw = if short_message.is_empty() {
            tlv_fields.remove(&Tag::MessagePayload).unwrap_or_default()
        } else {
            Bytes::copy_from_slice(short_message)
        };

        let text = if data_coding.is_text() {
            text::decode(data_coding, &raw).into_bytes()
        } else {
            raw.to_vec()
        };

        Self {
            message_type: ShortMessageType::SubmitSm,
            src: text_field(Field::SourceAddr),
            dst: text_field(Field::DestinationAddr),
            text,
            data_coding,
            validity: pdu.field_str(Field::ValidityPeriod).and_then(parse_relative_time),
            register: DeliverySetting::from_code(int_field(Field::RegisteredDelivery)),
            tlv_fields,
            service_type: text_field(Field::ServiceType),
            source_addr_ton: int_field(Field::SourceAddrTon),
            source_addr_npi: int_field(Field::SourceAddrNpi),
            dest_addr_ton: int_field(Field::DestAddrTon),
            dest_addr_npi: int_field(Field::DestAddrNpi),
            esm_class: int_field(Field::EsmClass),
            protocol_id: int_field(Field::ProtocolId),
            priority_flag: int_field(Field::PriorityFlag),
            schedule_delivery_time: text_field(Field::ScheduleDeliveryTime),
            replace_if_present_flag: int_field(Field::ReplaceIfPresentFlag),
            sm_default_msg_id: int_field(Field::SmDefaultMsgId),
        }
    }
}

/// Outcome of one submitted message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortMessageResp {
    pub message_type: ShortMessageType,
    pub status: Status,
    /// Empty when the peer did not return one (error responses).
    pub message_id: String,
}

impl ShortMessageResp {
    /// Successful response carrying a message id.
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            message_type: ShortMessageType::SubmitSm,
            status: Status::Ok,
            message_id: message_id.into(),
        }
    }

    /// Response with the given status and no message id.
    pub fn with_status(status: Status) -> Self {
        Self {
            message_type: ShortMessageType::SubmitSm,
            status,
            message_id: String::new(),
        }
    }

    /// Read a `submit_sm_resp` PDU.
    pub fn from_submit_resp_pdu(pdu: &Pdu) -> Self {
        Self {
            message_type: ShortMessageType::SubmitSm,
            status: Status::from(pdu.status()),
            message_id: pdu.field_str(Field::MessageId).unwrap_or_default().to_string(),
        }
    }
}

/// Render a duration in SMPP relative time format (`YYMMDDhhmmss000R`).
pub fn relative_time(validity: Duration) -> String {
    let total = validity.as_secs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let years = (days / 365).min(99);
    let months = (days % 365) / 30;
    let days = (days % 365) % 30;
    format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}000R",
        years,
        months,
        days,
        rest / 3600,
        (rest % 3600) / 60,
        rest % 60
    )
}

/// Parse an SMPP relative time. Absolute times and malformed values yield `None`.
pub fn parse_relative_time(value: &str) -> Option<Duration> {
    let digits = value.strip_suffix('R')?;
    if digits.len() != 15 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let part = |i: usize| digits[i..i + 2].parse::<u64>().ok();
    let days = part(0)? * 365 + part(2)? * 30 + part(4)?;
    let secs = days * 86_400 + part(6)? * 3600 + part(8)? * 60 + part(10)?;
    Some(Duration::from_secs(secs))
}
