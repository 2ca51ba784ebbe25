//! Short run identifiers used to namespace every artifact of a folding run.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{FoldError, Result};

pub const RUN_ID_LEN: usize = 8;

/// Eight lowercase hex characters taken from SHA-256 over random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(short_token())
    }

    /// Validate an identifier supplied by a caller.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let valid = raw.len() == RUN_ID_LEN
            && raw.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'));
        if !valid {
            return Err(FoldError::InvalidInput(format!(
                "run id must be {RUN_ID_LEN} lowercase hex characters, got {raw:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fresh 8-character token; also used for generated input file names.
pub fn short_token() -> String {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    let mut token = hex::encode(digest);
    token.truncate(RUN_ID_LEN);
    token
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = FoldError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}
