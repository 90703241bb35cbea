//! Human-friendly room codes.
//!
//! A room code is the last six characters of a document id, uppercased and
//! split 3-3 (`abc123` -> `ABC-123`). It is a display convenience only: the
//! transform drops everything but the tail of the id, so two distinct
//! documents can share a code and decoding a code does not, in general,
//! give back the document id it came from. Rooms are always stored and
//! addressed by their canonical document id.

use thiserror::Error;

use crate::constants::{ROOM_CODE_LEN, ROOM_CODE_SEPARATOR};

/// Encode a document id as a display code.
pub fn encode(document_id: &str) -> String {
    let chars: Vec<char> = document_id.trim().chars().collect();
    let tail_start = chars.len().saturating_sub(ROOM_CODE_LEN);
    let code: String = chars[tail_start..].iter().collect::<String>().to_uppercase();

    let split = code
        .char_indices()
        .nth(ROOM_CODE_LEN / 2)
        .map(|(i, _)| i)
        .unwrap_or(code.len());
    format!("{}{}{}", &code[..split], ROOM_CODE_SEPARATOR, &code[split..])
}

/// Decode a display code: strip separators and lowercase.
///
/// The result is only a document id if the document id was itself six
/// lowercase characters long. See the module docs.
pub fn decode(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| *c != ROOM_CODE_SEPARATOR)
        .collect::<String>()
        .to_lowercase()
}

/// What the user typed to join a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomRef {
    /// A canonical document id, used verbatim.
    DocumentId(String),
    /// A display code, decoded through the lossy transform.
    HumanCode { code: String, decoded: String },
}

impl RoomRef {
    /// Classify user input. Anything shaped like a room code (six
    /// alphanumerics with an optional separator) is treated as one;
    /// everything else is taken as a document id.
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RoomCodeError::Empty);
        }

        if looks_like_code(input) {
            return Ok(Self::HumanCode {
                code: input.to_uppercase(),
                decoded: decode(input),
            });
        }

        if input.chars().any(char::is_whitespace) {
            return Err(RoomCodeError::InvalidFormat(input.to_string()));
        }

        Ok(Self::DocumentId(input.to_string()))
    }

    /// The id to fetch from the document store.
    pub fn document_id(&self) -> &str {
        match self {
            Self::DocumentId(id) => id,
            Self::HumanCode { decoded, .. } => decoded,
        }
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::HumanCode { .. })
    }
}

fn looks_like_code(input: &str) -> bool {
    let stripped: Vec<char> = input.chars().filter(|c| *c != ROOM_CODE_SEPARATOR).collect();
    let separators = input.chars().filter(|c| *c == ROOM_CODE_SEPARATOR).count();
    stripped.len() == ROOM_CODE_LEN
        && separators <= 1
        && stripped.iter().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Error)]
pub enum RoomCodeError {
    #[error("Room reference is empty")]
    Empty,

    #[error("Invalid room reference: {0}")]
    InvalidFormat(String),
}
