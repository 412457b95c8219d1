//! SMPP protocol data units.
//!
//! A PDU is a header (command id, status, sequence number) plus a map of
//! mandatory fields and a map of optional TLV parameters. Byte layout is
//! owned by [`PduCodec`]; everything above the codec works with parsed
//! [`Pdu`] values only.

mod codec;
mod command;
mod field;

use std::collections::BTreeMap;

use bytes::Bytes;

pub use codec::{PduCodec, PduError, HEADER_LEN, MAX_PDU_SIZE};
pub use command::{CommandId, CommandStatus};
pub use field::{layout, Field, FieldKind, FieldValue};

/// Optional parameters keyed by TLV tag.
pub type TlvMap = BTreeMap<u16, Bytes>;

/// SMPP interface version advertised in bind requests (3.4).
pub const INTERFACE_VERSION: u8 = 0x34;

/// PDU header. `command_length` is computed by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command_id: CommandId,
    pub status: CommandStatus,
    pub sequence: u32,
}

impl Header {
    /// Create a header with OK status.
    pub fn new(command_id: CommandId, sequence: u32) -> Self {
        Self::with_status(command_id, sequence, CommandStatus::OK)
    }

    /// Create a header with an explicit status.
    pub fn with_status(command_id: CommandId, sequence: u32, status: CommandStatus) -> Self {
        Self {
            command_id,
            status,
            sequence,
        }
    }
}

/// A parsed PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub header: Header,
    fields: BTreeMap<Field, FieldValue>,
    tlvs: TlvMap,
}

impl Pdu {
    /// Create a PDU with an empty body.
    pub fn new(command_id: CommandId, sequence: u32) -> Self {
        Self::from_header(Header::new(command_id, sequence))
    }

    /// Create a PDU with an empty body from a header.
    pub fn from_header(header: Header) -> Self {
        Self {
            header,
            fields: BTreeMap::new(),
            tlvs: TlvMap::new(),
        }
    }

    /// Build the response paired with this request, reusing its sequence number.
    pub fn response(&self, status: CommandStatus) -> Self {
        Self::from_header(Header::with_status(
            self.header.command_id.response(),
            self.header.sequence,
            status,
        ))
    }

    /// Bind request of the given kind.
    pub fn bind(command_id: CommandId, sequence: u32, system_id: &str, password: &str) -> Self {
        Self::new(command_id, sequence)
            .with(Field::SystemId, system_id)
            .with(Field::Password, password)
            .with(Field::InterfaceVersion, INTERFACE_VERSION)
    }

    /// `enquire_link` request.
    pub fn enquire_link(sequence: u32) -> Self {
        Self::new(CommandId::EnquireLink, sequence)
    }

    /// `unbind` request.
    pub fn unbind(sequence: u32) -> Self {
        Self::new(CommandId::Unbind, sequence)
    }

    /// `generic_nack` with the given status.
    pub fn generic_nack(sequence: u32, status: CommandStatus) -> Self {
        Self::from_header(Header::with_status(CommandId::GenericNack, sequence, status))
    }

    pub fn command_id(&self) -> CommandId {
        self.header.command_id
    }

    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    pub fn status(&self) -> CommandStatus {
        self.header.status
    }

    /// Set a mandatory field.
    pub fn set(&mut self, field: Field, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Builder form of [`Pdu::set`].
    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Get a mandatory field, if present.
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn field_str(&self, field: Field) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn field_u8(&self, field: Field) -> Option<u8> {
        self.get(field).and_then(FieldValue::as_u8)
    }

    pub fn field_bytes(&self, field: Field) -> Option<&[u8]> {
        self.get(field).map(FieldValue::as_bytes)
    }

    /// Iterate over present mandatory fields.
    pub fn fields(&self) -> impl Iterator<Item = (&Field, &FieldValue)> {
        self.fields.iter()
    }

    pub fn tlvs(&self) -> &TlvMap {
        &self.tlvs
    }

    pub fn set_tlv(&mut self, tag: u16, value: impl Into<Bytes>) -> &mut Self {
        self.tlvs.insert(tag, value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_keeps_sequence() {
        let req = Pdu::new(CommandId::SubmitSm, 42);
        let resp = req.response(CommandStatus::THROTTLED);

        assert_eq!(resp.command_id(), CommandId::SubmitSmResp);
        assert_eq!(resp.sequence(), 42);
        assert_eq!(resp.status(), CommandStatus::THROTTLED);
    }

    #[test]
    fn test_bind_fields() {
        let bind = Pdu::bind(CommandId::BindTransmitter, 1, "client", "pw");

        assert_eq!(bind.field_str(Field::SystemId), Some("client"));
        assert_eq!(bind.field_str(Field::Password), Some("pw"));
        assert_eq!(bind.field_u8(Field::InterfaceVersion), Some(INTERFACE_VERSION));
        assert!(bind.get(Field::SystemType).is_none());
    }
}
