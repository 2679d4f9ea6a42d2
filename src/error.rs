//! Errors raised while turning text into wire messages and back.

/// Failure to build a wire message from a record or from flow text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A value does not fit the width of its wire field.
    #[error("{field} value {value:#x} exceeds the maximum of {max:#x}")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },
    /// The text names an action, instruction or match field nobody recognizes.
    #[error("unknown token `{token}`")]
    UnknownToken { token: String },
    /// A known field was given a value that could not be parsed.
    #[error("invalid value `{value}` for {field}")]
    InvalidValue { field: &'static str, value: String },
    /// A token appeared where the flow grammar does not allow it.
    #[error("unexpected token `{token}`: {reason}")]
    Syntax { token: String, reason: &'static str },
    /// A single multipart entry is larger than one message body can carry.
    #[error("multipart entry of {length} bytes cannot fit in a single message")]
    EntryTooLarge { length: usize },
}

/// Failure to interpret a wire message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ends before a declared length is satisfied.
    #[error("truncated at offset {offset}: need {expected} bytes, have {found}")]
    Truncated {
        offset: usize,
        expected: usize,
        found: usize,
    },
    /// The `ofp_match` header carries a type other than OXM.
    #[error("unsupported match type {found} at offset {offset}")]
    UnsupportedMatchType { offset: usize, found: u16 },
    /// A length field violates its minimum or alignment.
    #[error("malformed {what} at offset {offset}: length {length}")]
    Malformed {
        offset: usize,
        what: &'static str,
        length: usize,
    },
    /// The message header announces a protocol version other than 1.3.
    #[error("unsupported OpenFlow version {found:#04x}")]
    UnsupportedVersion { found: u8 },
    /// A message or multipart type code differs from the one expected.
    #[error("unexpected {what} {found} at offset {offset}, expected {expected}")]
    UnexpectedType {
        offset: usize,
        what: &'static str,
        expected: u16,
        found: u16,
    },
    /// An enumerated field holds a code outside its defined range.
    #[error("invalid {what} {value} at offset {offset}")]
    InvalidValue {
        offset: usize,
        what: &'static str,
        value: u64,
    },
}
