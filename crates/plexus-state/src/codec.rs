//! Payload codec
//!
//! Values cross contexts as serialized bytes, never by reference.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use plexus_core::{PlexusError, PlexusResult};

/// Anything that can be fired on an event channel
pub trait EventPayload: Serialize + DeserializeOwned + Send + 'static {}

impl<T> EventPayload for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// Anything that can be held by a state channel
pub trait StateValue: EventPayload + Clone + PartialEq + fmt::Debug + Sync {}

impl<T> StateValue for T where T: EventPayload + Clone + PartialEq + fmt::Debug + Sync {}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> PlexusResult<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| PlexusError::Codec(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> PlexusResult<T> {
    serde_json::from_slice(bytes).map_err(|e| PlexusError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_payload() {
        let bytes = encode(&("hit", 3u32)).unwrap();
        let decoded: (String, u32) = decode(&bytes).unwrap();
        assert_eq!(decoded, ("hit".to_string(), 3));
    }

    #[test]
    fn test_type_mismatch_is_codec_error() {
        let bytes = encode(&"not a number").unwrap();
        assert!(matches!(decode::<u64>(&bytes), Err(PlexusError::Codec(_))));
    }
}
