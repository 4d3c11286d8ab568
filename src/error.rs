/// Structural misuse of the CPU compositor.
///
/// Misconfiguration and missing inputs are not errors; they make the pass skip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineError {
    #[error("{buffer} buffer has {actual} pixels, expected {expected}")]
    BufferSizeMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("render target is empty ({width}x{height})")]
    EmptyTarget { width: u32, height: u32 },
}

pub type OutlineResult<T> = Result<T, OutlineError>;
