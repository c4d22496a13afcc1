//! Failures of encoding, identifiers and signatures.

use thiserror::Error;

/// Everything that can go wrong below the client layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A value could not be turned into JSON.
    #[error("cannot encode: {0}")]
    Serialization(String),

    /// Bytes or JSON did not decode into the expected shape.
    #[error("cannot decode: {0}")]
    Deserialization(String),

    #[error("signature rejected: {0}")]
    InvalidSignature(String),

    #[error("bad public key: {0}")]
    InvalidPublicKey(String),

    /// Not a `did:<method>:<id>` string, or not a `did:key` we can decode.
    #[error("malformed DID: {0}")]
    InvalidDid(String),

    #[error("malformed CID: {0}")]
    InvalidCid(String),

    /// Decodes as JSON, but the interface, method or fields are wrong.
    #[error("malformed message: {0}")]
    InvalidMessage(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Io => ProtocolError::Serialization(err.to_string()),
            _ => ProtocolError::Deserialization(err.to_string()),
        }
    }
}

impl From<ed25519_dalek::SignatureError> for ProtocolError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        ProtocolError::InvalidSignature(err.to_string())
    }
}

impl From<base64::DecodeError> for ProtocolError {
    fn from(err: base64::DecodeError) -> Self {
        ProtocolError::Deserialization(format!("invalid base64url: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failure() {
        let cases = [
            (ProtocolError::Serialization("map key".into()), "cannot encode: map key"),
            (ProtocolError::InvalidDid("no method".into()), "malformed DID: no method"),
            (
                ProtocolError::InvalidCid("unsupported multibase prefix 'z'".into()),
                "malformed CID: unsupported multibase prefix 'z'",
            ),
            (
                ProtocolError::InvalidMessage("unknown method Records.Subscribe".into()),
                "malformed message: unknown method Records.Subscribe",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_json_syntax_error_is_decode_failure() {
        let err: ProtocolError = serde_json::from_str::<i32>("not a number").unwrap_err().into();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }

    #[test]
    fn test_json_shape_error_is_decode_failure() {
        let err: ProtocolError = serde_json::from_str::<Vec<u8>>(r#"{"a":1}"#).unwrap_err().into();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }

    #[test]
    fn test_bad_base64_is_decode_failure() {
        use base64::Engine;
        let err: ProtocolError = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode("***")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProtocolError::Deserialization(_)));
    }
}
