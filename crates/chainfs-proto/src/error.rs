//! Error types for the wire codec

/// Failure while decoding or validating a single message payload.
///
/// Always scoped to one message: the dispatcher logs it and moves on to the
/// next receive, it never terminates the daemon.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("malformed attribute payload: {0}")]
    Malformed(&'static str),
    #[error("unexpected attribute id {got}, wanted {want}")]
    UnexpectedAttribute { want: u16, got: u16 },
}
