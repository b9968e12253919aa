use thiserror::Error;

#[derive(Debug, Error)]
pub enum KhllError {
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("incompatible sketches: (k={k1}, b={b1}) != (k={k2}, b={b2})")]
    IncompatibleSketches { k1: u8, b1: u8, k2: u8, b2: u8 },

    #[error("truncated sketch: expected {expected} bytes, found {found}")]
    TruncatedSketch { expected: usize, found: usize },

    #[error("sketch files are only supported on little-endian hosts")]
    UnsupportedEndianness,

    #[error("sketch does not exist: {path}")]
    MissingSketch { path: String },

    #[error("no sketches to merge")]
    NothingToMerge,

    #[error(transparent)]
    SequenceParse(#[from] needletail::errors::ParseError),

    #[error(transparent)]
    IoFailure(#[from] std::io::Error),
}

impl KhllError {
    pub(crate) fn invalid<S: Into<String>>(message: S) -> Self {
        KhllError::InvalidParameter {
            message: message.into(),
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KhllErrorCode {
    // no error
    NoError = 0,
    // parameter errors
    InvalidParameter = 1_01,
    // compatibility errors
    IncompatibleSketches = 2_01,
    NothingToMerge = 2_02,
    // sketch file errors
    TruncatedSketch = 3_01,
    UnsupportedEndianness = 3_02,
    MissingSketch = 3_03,
    // external errors
    Io = 100_001,
    SequenceParse = 100_002,
}

impl KhllErrorCode {
    pub fn from_error(error: &KhllError) -> KhllErrorCode {
        match error {
            KhllError::InvalidParameter { .. } => KhllErrorCode::InvalidParameter,
            KhllError::IncompatibleSketches { .. } => KhllErrorCode::IncompatibleSketches,
            KhllError::NothingToMerge => KhllErrorCode::NothingToMerge,
            KhllError::TruncatedSketch { .. } => KhllErrorCode::TruncatedSketch,
            KhllError::UnsupportedEndianness => KhllErrorCode::UnsupportedEndianness,
            KhllError::MissingSketch { .. } => KhllErrorCode::MissingSketch,
            KhllError::IoFailure { .. } => KhllErrorCode::Io,
            KhllError::SequenceParse { .. } => KhllErrorCode::SequenceParse,
        }
    }
}
