//! JSON bodies exchanged between `login` and the vending server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// POST /credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRequest {
    #[serde(with = "base64_bytes")]
    pub credential_file: Vec<u8>,
}

impl fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRequest")
            .field("credential_file", &format_args!("<{} bytes>", self.credential_file.len()))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub credential_file_path: String,
    #[serde(with = "base64_bytes")]
    pub credential_file: Vec<u8>,
}

impl fmt::Debug for CredentialResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResponse")
            .field("credential_file_path", &self.credential_file_path)
            .field("credential_file", &format_args!("<{} bytes>", self.credential_file.len()))
            .finish()
    }
}

/// GET /auth/callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub email: String,
}

/// Byte fields travel as standard padded base64, the way JSON byte-array
/// encoders emit them.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|_| D::Error::custom("field is not valid base64"))
    }
}
