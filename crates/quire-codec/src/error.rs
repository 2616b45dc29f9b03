/// Errors produced while parsing the structured property block.
///
/// These never escape [`crate::deserialize_resource`]; a malformed block is
/// recovered as an empty property set. The error type exists so the parser
/// itself stays an honest `Result` function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed property line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}

pub type CodecResult<T> = Result<T, CodecError>;
