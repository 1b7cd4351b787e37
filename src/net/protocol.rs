//! Wire framing: a 1-byte message type id followed by a MessagePack body.
//! The id space lives in `msg::id`; this module owns the byte-level rules
//! the connection pump and the room dispatch share.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Single-byte frame a connection task sends the room when its socket dies.
/// Never a valid message id.
pub const DISCONNECT_SENTINEL: u8 = 0xFF;

/// Inbound frames larger than this are dropped before decoding. Clients only
/// send input packets and weapon requests; anything bigger is garbage.
pub const MAX_INBOUND_FRAME_BYTES: usize = 1024;

#[derive(Debug)]
pub enum ProtocolError {
    TooShort(usize),
    SerializeError(rmp_serde::encode::Error),
    DeserializeError(rmp_serde::decode::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "message too short: {len} bytes"),
            Self::SerializeError(e) => write!(f, "serialize: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a frame: 1-byte type ID + MessagePack body (named keys for wire
/// compatibility with the web client).
pub fn encode_message<T: Serialize>(type_id: u8, payload: &T) -> Result<Vec<u8>, ProtocolError> {
    let body = rmp_serde::to_vec_named(payload).map_err(ProtocolError::SerializeError)?;
    let mut frame = Vec::with_capacity(1 + body.len());
    frame.push(type_id);
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Split a frame into (type_id, payload_bytes). The caller picks the struct
/// for the body via `decode_payload`.
pub fn decode_message(data: &[u8]) -> Result<(u8, &[u8]), ProtocolError> {
    if data.len() < 2 {
        return Err(ProtocolError::TooShort(data.len()));
    }
    Ok((data[0], &data[1..]))
}

/// Deserialize a frame body into its payload struct.
pub fn decode_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    rmp_serde::from_slice(body).map_err(ProtocolError::DeserializeError)
}

pub fn is_disconnect_sentinel(data: &[u8]) -> bool {
    data.len() == 1 && data[0] == DISCONNECT_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Probe {
        value: u32,
    }

    #[test]
    fn frame_round_trip() {
        let frame = encode_message(0x42, &Probe { value: 7 }).unwrap();
        let (type_id, body) = decode_message(&frame).unwrap();
        assert_eq!(type_id, 0x42);
        assert_eq!(decode_payload::<Probe>(body).unwrap(), Probe { value: 7 });
    }

    #[test]
    fn short_frames_are_rejected() {
        assert!(decode_message(&[]).is_err());
        assert!(decode_message(&[0x01]).is_err());
    }

    #[test]
    fn wrong_shape_body_is_a_deserialize_error() {
        let frame = encode_message(0x42, &"not a probe").unwrap();
        let (_, body) = decode_message(&frame).unwrap();
        assert!(matches!(
            decode_payload::<Probe>(body),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn sentinel_is_only_the_exact_single_byte() {
        assert!(is_disconnect_sentinel(&[DISCONNECT_SENTINEL]));
        assert!(!is_disconnect_sentinel(&[DISCONNECT_SENTINEL, 0x00]));
        assert!(!is_disconnect_sentinel(&[0x01]));
        assert!(!is_disconnect_sentinel(&[]));
    }
}
