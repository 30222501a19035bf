//! Wire codec for link messages.
//!
//! # Frame layout
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ JSON payload (variable)  │
//! │ Big-endian u32   │                          │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! The payload is a self-describing JSON document, one per frame. Decoding
//! is tolerant across minor versions: unknown fields are ignored, missing
//! optional fields take their documented defaults. A required field that is
//! absent or mistyped fails with [`CodecError::SchemaMismatch`]; truncated
//! or syntactically invalid frames fail with [`CodecError::Malformed`].
//! Both are non-fatal: the receiver logs a warning, drops the message and
//! keeps the channel open.

use crate::error::CodecError;
use crate::messages::{CommandMessage, ObservationMessage};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Length prefix size in bytes
const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on a single frame, length prefix excluded. Matches the
/// datagram limit of the transport.
const MAX_PAYLOAD_SIZE: usize = 65503;

fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(msg).map_err(|e| CodecError::Malformed(e.to_string()))?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::Malformed(format!(
            "payload of {} bytes exceeds frame limit",
            payload.len()
        )));
    }
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(CodecError::Malformed(format!(
            "frame of {} bytes is shorter than the length prefix",
            bytes.len()
        )));
    }
    let (prefix, payload) = bytes.split_at(LENGTH_PREFIX_SIZE);
    let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if declared > MAX_PAYLOAD_SIZE {
        return Err(CodecError::Malformed(format!(
            "declared payload of {declared} bytes exceeds frame limit"
        )));
    }
    if declared != payload.len() {
        return Err(CodecError::Malformed(format!(
            "declared {declared} payload bytes, got {}",
            payload.len()
        )));
    }
    serde_json::from_slice(payload).map_err(classify)
}

/// Map a serde_json failure onto the codec taxonomy: semantic errors
/// (missing required field, wrong type) are schema mismatches, everything
/// else is a malformed frame.
fn classify(e: serde_json::Error) -> CodecError {
    match e.classify() {
        serde_json::error::Category::Data => CodecError::SchemaMismatch(e.to_string()),
        _ => CodecError::Malformed(e.to_string()),
    }
}

/// Encode a command message into one wire frame
pub fn encode_command(msg: &CommandMessage) -> Result<Vec<u8>, CodecError> {
    encode(msg)
}

/// Decode a command message from one wire frame
pub fn decode_command(bytes: &[u8]) -> Result<CommandMessage, CodecError> {
    decode(bytes)
}

/// Encode an observation message into one wire frame
pub fn encode_observation(msg: &ObservationMessage) -> Result<Vec<u8>, CodecError> {
    encode(msg)
}

/// Decode an observation message from one wire frame
pub fn decode_observation(bytes: &[u8]) -> Result<ObservationMessage, CodecError> {
    decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ControlMode, Health, MotionTarget, Pose, SensorFrame};

    fn sample_command() -> CommandMessage {
        CommandMessage {
            sequence_id: 1,
            timestamp_us: 1_700_000_000_000_000,
            target: MotionTarget {
                vx: 0.5,
                vy: 0.0,
                vyaw: -0.25,
            },
            mode: ControlMode::Walk,
        }
    }

    fn sample_observation() -> ObservationMessage {
        ObservationMessage {
            sequence_id: 99,
            timestamp_us: 1_700_000_000_100_000,
            pose: Pose {
                x: 1.25,
                y: -0.5,
                yaw: 0.7,
            },
            joint_positions: vec![0.0, 0.3, -0.6, 0.0, 0.3, -0.6],
            sensor_payload: Some(SensorFrame {
                camera: "front".into(),
                encoding: "jpeg".into(),
                data: vec![0xff, 0xd8, 0xff],
            }),
            health: Health::Nominal,
        }
    }

    #[test]
    fn command_roundtrip() {
        let msg = sample_command();
        let decoded = decode_command(&encode_command(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn observation_roundtrip() {
        let msg = sample_observation();
        let decoded = decode_observation(&encode_observation(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let frame = encode_command(&sample_command()).unwrap();
        let truncated = &frame[..frame.len() - 5];
        assert!(matches!(
            decode_command(truncated),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn short_frame_is_malformed() {
        assert!(matches!(
            decode_command(&[0x00, 0x01]),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_payload_is_malformed() {
        let mut frame = 5u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"{oops");
        assert!(matches!(
            decode_command(&frame),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn missing_required_field_is_schema_mismatch() {
        // Well-formed JSON, but no sequence_id
        let payload = br#"{"timestamp_us":0,"target":{"vx":0.0,"vy":0.0,"vyaw":0.0}}"#;
        let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(payload);
        assert!(matches!(
            decode_command(&frame),
            Err(CodecError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let payload = br#"{"sequence_id":3,"timestamp_us":10,"target":{"vx":0.1,"vy":0.0,"vyaw":0.0},"mode":"Walk","future_field":true}"#;
        let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(payload);
        let decoded = decode_command(&frame).unwrap();
        assert_eq!(decoded.sequence_id, 3);
        assert_eq!(decoded.mode, ControlMode::Walk);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        // No mode, no joint_positions, no sensor_payload, no health
        let payload = br#"{"sequence_id":1,"timestamp_us":2,"target":{"vx":0.0,"vy":0.0,"vyaw":0.0}}"#;
        let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(payload);
        let cmd = decode_command(&frame).unwrap();
        assert_eq!(cmd.mode, ControlMode::Idle);

        let payload = br#"{"sequence_id":1,"timestamp_us":2,"pose":{"x":0.0,"y":0.0,"yaw":0.0}}"#;
        let mut frame = (payload.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(payload);
        let obs = decode_observation(&frame).unwrap();
        assert!(obs.joint_positions.is_empty());
        assert!(obs.sensor_payload.is_none());
        assert_eq!(obs.health, Health::Nominal);
    }
}
