//! Frame layout of the update channel.
//!
//! ```text
//! [sender u8][tick u8][type u8][payload ...]
//! ```
//!
//! Ids are little-endian `u16`. Payloads per type:
//!
//! | type              | payload                         | frame length |
//! |-------------------|---------------------------------|--------------|
//! | `ParameterUpdate` | object, parameter, value bytes  | >= 7         |
//! | `Lock`            | object, pad, state              | 7            |
//! | `Sync`            | tick                            | 4            |
//! | `UndoRedoAdd`     | object, parameter               | 7            |
//! | `ResetObject`     | object, parameter (ignored)     | 7            |
//! | `Ping`, `ResendUpdate`, `DataHub` | not interpreted | >= 3         |

use bytes::{BufMut, Bytes, BytesMut};
use scene::ParameterValue;
use thiserror::Error;

use crate::ClientId;

pub const HEADER_LEN: usize = 3;
const ADDRESSED_LEN: usize = HEADER_LEN + 4;
const LOCK_LEN: usize = 7;
const SYNC_LEN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed {kind:?} frame: {reason}")]
    MalformedFrame {
        kind: Option<MessageType>,
        reason: &'static str,
    },

    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
}

impl FrameError {
    fn malformed(kind: Option<MessageType>, reason: &'static str) -> Self {
        FrameError::MalformedFrame { kind, reason }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    ParameterUpdate = 0,
    Lock = 1,
    Sync = 2,
    Ping = 3,
    ResendUpdate = 4,
    UndoRedoAdd = 5,
    ResetObject = 6,
    DataHub = 7,
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => MessageType::ParameterUpdate,
            1 => MessageType::Lock,
            2 => MessageType::Sync,
            3 => MessageType::Ping,
            4 => MessageType::ResendUpdate,
            5 => MessageType::UndoRedoAdd,
            6 => MessageType::ResetObject,
            7 => MessageType::DataHub,
            other => return Err(FrameError::UnknownMessageType(other)),
        })
    }
}

impl MessageType {
    pub fn label(self) -> &'static str {
        match self {
            MessageType::ParameterUpdate => "PARAMETERUPDATE",
            MessageType::Lock => "LOCK",
            MessageType::Sync => "SYNC",
            MessageType::Ping => "PING",
            MessageType::ResendUpdate => "RESENDUPDATE",
            MessageType::UndoRedoAdd => "UNDOREDOADD",
            MessageType::ResetObject => "RESETOBJECT",
            MessageType::DataHub => "DATAHUB",
        }
    }
}

/// The three header bytes, readable without validating the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sender: ClientId,
    pub tick: u8,
    pub kind: MessageType,
}

impl FrameHeader {
    pub fn peek(frame: &[u8]) -> Result<Self, FrameError> {
        let [sender, tick, kind, ..] = *frame else {
            return Err(FrameError::malformed(None, "shorter than header"));
        };
        Ok(Self {
            sender,
            tick,
            kind: MessageType::try_from(kind)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    ParameterUpdate {
        object_id: u16,
        parameter_id: u16,
        /// Encoded value; its layout is given by the addressed parameter.
        value: &'a [u8],
    },
    Lock {
        object_id: u16,
        locked: bool,
    },
    Sync {
        tick: u8,
    },
    UndoRedoAdd {
        object_id: u16,
        parameter_id: u16,
    },
    ResetObject {
        object_id: u16,
    },
    Ping,
    ResendUpdate,
    DataHub,
}

impl Message<'_> {
    pub fn kind(&self) -> MessageType {
        match self {
            Message::ParameterUpdate { .. } => MessageType::ParameterUpdate,
            Message::Lock { .. } => MessageType::Lock,
            Message::Sync { .. } => MessageType::Sync,
            Message::UndoRedoAdd { .. } => MessageType::UndoRedoAdd,
            Message::ResetObject { .. } => MessageType::ResetObject,
            Message::Ping => MessageType::Ping,
            Message::ResendUpdate => MessageType::ResendUpdate,
            Message::DataHub => MessageType::DataHub,
        }
    }
}

/// A decoded frame borrowing its payload from the received bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub sender: ClientId,
    pub tick: u8,
    pub message: Message<'a>,
}

fn id_at(frame: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([frame[at], frame[at + 1]])
}

impl<'a> Frame<'a> {
    pub fn new(sender: ClientId, tick: u8, message: Message<'a>) -> Self {
        Self {
            sender,
            tick,
            message,
        }
    }

    pub fn decode(frame: &'a [u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::peek(frame)?;
        let kind = Some(header.kind);
        let exact = |len: usize| {
            if frame.len() == len {
                Ok(())
            } else {
                Err(FrameError::malformed(kind, "unexpected length"))
            }
        };

        let message = match header.kind {
            MessageType::ParameterUpdate => {
                if frame.len() < ADDRESSED_LEN {
                    return Err(FrameError::malformed(kind, "missing parameter address"));
                }
                Message::ParameterUpdate {
                    object_id: id_at(frame, 3),
                    parameter_id: id_at(frame, 5),
                    value: &frame[ADDRESSED_LEN..],
                }
            }
            MessageType::Lock => {
                exact(LOCK_LEN)?;
                Message::Lock {
                    object_id: id_at(frame, 3),
                    locked: frame[6] != 0,
                }
            }
            MessageType::Sync => {
                exact(SYNC_LEN)?;
                Message::Sync { tick: frame[3] }
            }
            MessageType::UndoRedoAdd => {
                exact(ADDRESSED_LEN)?;
                Message::UndoRedoAdd {
                    object_id: id_at(frame, 3),
                    parameter_id: id_at(frame, 5),
                }
            }
            MessageType::ResetObject => {
                exact(ADDRESSED_LEN)?;
                Message::ResetObject {
                    object_id: id_at(frame, 3),
                }
            }
            MessageType::Ping => Message::Ping,
            MessageType::ResendUpdate => Message::ResendUpdate,
            MessageType::DataHub => Message::DataHub,
        };

        Ok(Self {
            sender: header.sender,
            tick: header.tick,
            message,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ADDRESSED_LEN);
        buf.put_u8(self.sender);
        buf.put_u8(match self.message {
            Message::Sync { tick } => tick,
            _ => self.tick,
        });
        buf.put_u8(self.message.kind() as u8);

        match &self.message {
            Message::ParameterUpdate {
                object_id,
                parameter_id,
                value,
            } => {
                buf.put_u16_le(*object_id);
                buf.put_u16_le(*parameter_id);
                buf.put_slice(value);
            }
            Message::Lock { object_id, locked } => {
                buf.put_u16_le(*object_id);
                buf.put_u8(0);
                buf.put_u8(u8::from(*locked));
            }
            Message::Sync { tick } => buf.put_u8(*tick),
            Message::UndoRedoAdd {
                object_id,
                parameter_id,
            } => {
                buf.put_u16_le(*object_id);
                buf.put_u16_le(*parameter_id);
            }
            Message::ResetObject { object_id } => {
                buf.put_u16_le(*object_id);
                buf.put_u16_le(0);
            }
            Message::Ping | Message::ResendUpdate | Message::DataHub => {}
        }
        buf.freeze()
    }
}

/// Encodes a PARAMETERUPDATE frame straight from a typed value.
pub fn encode_parameter_update(
    sender: ClientId,
    tick: u8,
    object_id: u16,
    parameter_id: u16,
    value: &ParameterValue,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(ADDRESSED_LEN + value.encoded_len());
    buf.put_u8(sender);
    buf.put_u8(tick);
    buf.put_u8(MessageType::ParameterUpdate as u8);
    buf.put_u16_le(object_id);
    buf.put_u16_le(parameter_id);
    value.encode_into(&mut buf);
    buf.freeze()
}

/// Splits a PARAMETERUPDATE frame into `(object id, parameter id, value span)`.
pub fn decode_parameter_update(frame: &[u8]) -> Result<(u16, u16, &[u8]), FrameError> {
    match Frame::decode(frame)?.message {
        Message::ParameterUpdate {
            object_id,
            parameter_id,
            value,
        } => Ok((object_id, parameter_id, value)),
        other => Err(FrameError::malformed(
            Some(other.kind()),
            "not a parameter update",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::ParameterType;

    #[test]
    fn parameter_updates_carry_every_value_type() {
        let values = [
            ParameterValue::Bool(false),
            ParameterValue::Int(i32::MIN),
            ParameterValue::Float(-0.25),
            ParameterValue::Vector2([3.0, 4.0]),
            ParameterValue::Vector3([1.0, 2.0, 3.0]),
            ParameterValue::Vector4([0.0; 4]),
            ParameterValue::Quaternion([0.0, 0.0, 0.0, 1.0]),
            ParameterValue::Color([1.0, 0.0, 0.0, 0.5]),
            ParameterValue::String("Kamera 2".into()),
            ParameterValue::Action,
        ];
        for value in values {
            let frame = encode_parameter_update(12, 200, 513, 6, &value);
            let header = FrameHeader::peek(&frame).unwrap();
            assert_eq!((header.sender, header.tick), (12, 200));

            let (object_id, parameter_id, span) = decode_parameter_update(&frame).unwrap();
            assert_eq!((object_id, parameter_id), (513, 6));
            let decoded = ParameterValue::decode(value.parameter_type(), span).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn lock_frame_layout() {
        let frame = Frame::new(
            4,
            9,
            Message::Lock {
                object_id: 0x0102,
                locked: true,
            },
        )
        .encode();
        assert_eq!(&frame[..], &[4, 9, 1, 0x02, 0x01, 0, 1]);
        assert_eq!(
            Frame::decode(&frame).unwrap().message,
            Message::Lock {
                object_id: 0x0102,
                locked: true
            }
        );
    }

    #[test]
    fn sync_reads_tick_from_payload() {
        let frame = Frame::new(254, 0, Message::Sync { tick: 77 }).encode();
        assert_eq!(&frame[..], &[254, 77, 2, 77]);
        assert_eq!(Frame::decode(&[254, 3, 2, 77]).unwrap().message, Message::Sync { tick: 77 });
    }

    #[test]
    fn reset_object_ignores_parameter() {
        let decoded = Frame::decode(&[1, 0, 6, 7, 0, 9, 9]).unwrap();
        assert_eq!(decoded.message, Message::ResetObject { object_id: 7 });
        let encoded = Frame::new(1, 0, Message::ResetObject { object_id: 7 }).encode();
        assert_eq!(&encoded[..], &[1, 0, 6, 7, 0, 0, 0]);
    }

    #[test]
    fn bad_frames_are_classified() {
        assert_eq!(
            Frame::decode(&[1, 0, 42]),
            Err(FrameError::UnknownMessageType(42))
        );
        assert!(matches!(
            Frame::decode(&[1, 0]),
            Err(FrameError::MalformedFrame { kind: None, .. })
        ));
        assert!(matches!(
            Frame::decode(&[1, 0, 1, 3, 0, 0]),
            Err(FrameError::MalformedFrame {
                kind: Some(MessageType::Lock),
                ..
            })
        ));
        assert!(matches!(
            Frame::decode(&[1, 0, 0, 3, 0, 1]),
            Err(FrameError::MalformedFrame {
                kind: Some(MessageType::ParameterUpdate),
                ..
            })
        ));
        assert!(matches!(
            Frame::decode(&[1, 0, 2, 5, 5]),
            Err(FrameError::MalformedFrame { .. })
        ));
        assert_eq!(Frame::decode(&[1, 0, 3]).unwrap().message, Message::Ping);
        assert!(ParameterValue::decode(ParameterType::Float, &[0; 3]).is_err());
    }
}
