//! Length-prefixed PDU framing for `tokio_util::codec`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::command::{CommandId, CommandStatus};
use super::field::{layout, Field, FieldKind, FieldValue};
use super::{Header, Pdu};

/// Size of the fixed PDU header.
pub const HEADER_LEN: usize = 16;

/// Default upper bound on `command_length`.
pub const MAX_PDU_SIZE: usize = 64 * 1024;

const TLV_HEADER_LEN: usize = 4;

/// Codec errors.
#[derive(Debug, Error)]
pub enum PduError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid command_length {length}, must be {min}..={max}")]
    InvalidLength { length: usize, min: usize, max: usize },

    #[error("{command}: body truncated in field '{field}'")]
    Truncated { command: CommandId, field: &'static str },

    #[error("{command}: field '{field}' not terminated within {max} octets")]
    Unterminated {
        command: CommandId,
        field: &'static str,
        max: usize,
    },

    #[error("{command}: field '{field}' is not valid UTF-8")]
    Utf8 { command: CommandId, field: &'static str },

    #[error("{command}: invalid value for field '{field}': {reason}")]
    InvalidField {
        command: CommandId,
        field: &'static str,
        reason: &'static str,
    },

    #[error("{command}: TLV {tag:#06x} is {len} octets, above the 65535 limit")]
    TlvTooLong { command: CommandId, tag: u16, len: usize },
}

/// SMPP framing codec.
#[derive(Debug, Clone)]
pub struct PduCodec {
    max_size: usize,
}

impl PduCodec {
    /// Create a codec with the default maximum PDU size.
    pub fn new() -> Self {
        Self::with_max_size(MAX_PDU_SIZE)
    }

    /// Create a codec with a custom maximum PDU size.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(HEADER_LEN),
        }
    }

    fn check_length(&self, length: usize) -> Result<(), PduError> {
        if length < HEADER_LEN || length > self.max_size {
            return Err(PduError::InvalidLength {
                length,
                min: HEADER_LEN,
                max: self.max_size,
            });
        }
        Ok(())
    }
}

impl Default for PduCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PduCodec {
    type Item = Pdu;
    type Error = PduError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Pdu>, PduError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        self.check_length(length)?;

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(length).freeze();
        frame.advance(4);
        let command_id = CommandId::from(frame.get_u32());
        let status = CommandStatus(frame.get_u32());
        let sequence = frame.get_u32();

        decode_body(Header::with_status(command_id, sequence, status), frame).map(Some)
    }
}

impl Encoder<Pdu> for PduCodec {
    type Error = PduError;

    fn encode(&mut self, pdu: Pdu, dst: &mut BytesMut) -> Result<(), PduError> {
        let start = dst.len();
        let header = pdu.header;

        dst.put_u32(0);
        dst.put_u32(header.command_id.code());
        dst.put_u32(header.status.0);
        dst.put_u32(header.sequence);

        if let Err(e) = encode_body(&pdu, dst) {
            dst.truncate(start);
            return Err(e);
        }

        let length = dst.len() - start;
        if let Err(e) = self.check_length(length) {
            dst.truncate(start);
            return Err(e);
        }
        dst[start..start + 4].copy_from_slice(&(length as u32).to_be_bytes());

        Ok(())
    }
}

/// Append mandatory fields and TLVs. May leave a partial body on error.
fn encode_body(pdu: &Pdu, dst: &mut BytesMut) -> Result<(), PduError> {
    let command = pdu.header.command_id;

    // Error responses go out bodiless unless the caller filled fields in.
    let bodiless =
        command.is_response() && !pdu.header.status.is_ok() && pdu.fields().next().is_none();

    if !bodiless {
        for &field in layout(command) {
            encode_field(command, field, pdu.get(field), dst)?;
        }
    }

    for (&tag, value) in pdu.tlvs() {
        let len = u16::try_from(value.len()).map_err(|_| PduError::TlvTooLong {
            command,
            tag,
            len: value.len(),
        })?;
        dst.put_u16(tag);
        dst.put_u16(len);
        dst.put_slice(value);
    }

    Ok(())
}

fn decode_body(header: Header, mut body: Bytes) -> Result<Pdu, PduError> {
    let command = header.command_id;
    let mut pdu = Pdu::from_header(header);

    // Unsupported commands carry an opaque body; the session layer only
    // needs the header to decide how to answer.
    if let CommandId::Other(_) = command {
        return Ok(pdu);
    }

    for &field in layout(command) {
        // Responses may omit the body entirely (error responses do).
        if !body.has_remaining() && command.is_response() {
            return Ok(pdu);
        }
        let value = decode_field(command, field, &mut body)?;
        pdu.set(field, value);
    }

    while body.has_remaining() {
        if body.remaining() < TLV_HEADER_LEN {
            return Err(PduError::Truncated {
                command,
                field: "tlv",
            });
        }
        let tag = body.get_u16();
        let len = body.get_u16() as usize;
        if body.remaining() < len {
            return Err(PduError::Truncated {
                command,
                field: "tlv",
            });
        }
        pdu.set_tlv(tag, body.split_to(len));
    }

    Ok(pdu)
}

fn decode_field(command: CommandId, field: Field, body: &mut Bytes) -> Result<FieldValue, PduError> {
    let name = field.name();
    let truncated = || PduError::Truncated { command, field: name };

    match field.kind() {
        FieldKind::CString { max } => {
            let window = body.remaining().min(max);
            let end = match body[..window].iter().position(|&b| b == 0) {
                Some(end) => end,
                None if window < max => return Err(truncated()),
                None => {
                    return Err(PduError::Unterminated {
                        command,
                        field: name,
                        max,
                    })
                }
            };
            let raw = body.split_to(end);
            body.advance(1);
            let text = String::from_utf8(raw.to_vec())
                .map_err(|_| PduError::Utf8 { command, field: name })?;
            Ok(FieldValue::Text(text))
        }
        FieldKind::Int => {
            if !body.has_remaining() {
                return Err(truncated());
            }
            Ok(FieldValue::Int(body.get_u8()))
        }
        FieldKind::Octets { .. } => {
            if !body.has_remaining() {
                return Err(truncated());
            }
            let len = body.get_u8() as usize;
            if body.remaining() < len {
                return Err(truncated());
            }
            Ok(FieldValue::Octets(body.split_to(len)))
        }
    }
}

fn encode_field(
    command: CommandId,
    field: Field,
    value: Option<&FieldValue>,
    dst: &mut BytesMut,
) -> Result<(), PduError> {
    let invalid = |reason| PduError::InvalidField {
        command,
        field: field.name(),
        reason,
    };

    match (field.kind(), value) {
        // Absent fields encode as NULL strings, zero integers or empty payloads.
        (_, None) => dst.put_u8(0),
        (FieldKind::CString { max }, Some(FieldValue::Text(s))) => {
            if s.len() >= max {
                return Err(invalid("string too long"));
            }
            if s.as_bytes().contains(&0) {
                return Err(invalid("embedded NUL"));
            }
            dst.put_slice(s.as_bytes());
            dst.put_u8(0);
        }
        (FieldKind::Int, Some(FieldValue::Int(v))) => dst.put_u8(*v),
        (FieldKind::Octets { max }, Some(value @ (FieldValue::Octets(_) | FieldValue::Text(_)))) => {
            let raw = value.as_bytes();
            if raw.len() > max {
                return Err(invalid("payload too long"));
            }
            dst.put_u8(raw.len() as u8);
            dst.put_slice(raw);
        }
        _ => return Err(invalid("wrong value type")),
    }

    Ok(())
}
