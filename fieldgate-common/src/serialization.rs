//! Payload encoding for events, metrics and commands.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Serialization format for payloads crossing the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable, good while commissioning a deployment.
    #[default]
    Json,

    /// Compact binary, preferred for high-volume variable streams.
    Cbor,
}

/// Encode a value using the given format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode a value using the given format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::Cbor(e.to_string())),
    }
}

/// Guess the format from the payload's first byte.
///
/// Module firmware is not uniform about encoding, so inbound payloads are
/// sniffed: JSON documents start with `{` or `[`, anything else is CBOR.
pub fn detect_format(data: &[u8]) -> Format {
    match data.first() {
        Some(b'{') | Some(b'[') => Format::Json,
        _ => Format::Cbor,
    }
}

/// Decode a payload, sniffing the format first.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    decode(data, detect_format(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{VariableEvent, BatchValue};
    use crate::value::{ValueKind, VarValue};

    fn sample_event() -> VariableEvent {
        VariableEvent::Batch {
            module: "plc1".to_string(),
            scope: "line2".to_string(),
            timestamp: 1_700_000_000_000,
            values: vec![BatchValue {
                variable: "temp".to_string(),
                value: VarValue::Number(21.5),
                declared_kind: ValueKind::Number,
                policy: None,
            }],
        }
    }

    #[test]
    fn json_round_trip() {
        let event = sample_event();
        let bytes = encode(&event, Format::Json).unwrap();
        let decoded: VariableEvent = decode(&bytes, Format::Json).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn cbor_round_trip() {
        let event = sample_event();
        let bytes = encode(&event, Format::Cbor).unwrap();
        let decoded: VariableEvent = decode(&bytes, Format::Cbor).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn auto_detection() {
        let event = sample_event();

        let json = encode(&event, Format::Json).unwrap();
        assert_eq!(detect_format(&json), Format::Json);
        let decoded: VariableEvent = decode_auto(&json).unwrap();
        assert_eq!(decoded, event);

        let cbor = encode(&event, Format::Cbor).unwrap();
        assert_eq!(detect_format(&cbor), Format::Cbor);
        let decoded: VariableEvent = decode_auto(&cbor).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(decode::<VariableEvent>(b"{not json", Format::Json).is_err());
        assert!(decode_auto::<VariableEvent>(b"").is_err());
    }
}
