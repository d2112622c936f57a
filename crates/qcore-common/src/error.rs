// error.rs -- fatal error conditions
//
// Only unrecoverable conditions live here. Anything recoverable is reported
// to the console where it is detected and never travels as an `Err`.

use thiserror::Error;

pub type QResult<T> = Result<T, QError>;

#[derive(Debug, Error)]
pub enum QError {
    #[error("SZ_GetSpace: overflow without allowoverflow set")]
    Overflow,

    #[error("SZ_GetSpace: {0} is > full buffer size")]
    OversizedWrite(usize),

    #[error("Demo message > MAX_MSGLEN ({0})")]
    DemoMessageTooLong(i32),

    #[error("Demo message has negative length ({0})")]
    DemoCorrupt(i32),

    #[error("VCR mismatch: {0}")]
    VcrMismatch(String),

    #[error("VCR_ReadNext: bad op {0}")]
    VcrBadOp(i32),

    #[error("=== END OF PLAYBACK ===")]
    VcrEndOfPlayback,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl QError {
    pub fn vcr_mismatch(msg: impl Into<String>) -> Self {
        QError::VcrMismatch(msg.into())
    }
}
