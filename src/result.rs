use thiserror::Error;

pub type VdsResult<T> = Result<T, VdsError>;

#[derive(Debug, Error)]
pub enum VdsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crc16 mismatch")]
    Crc,

    #[error("frame shorter than header")]
    ShortFrame,

    #[error("unknown key_id {0}")]
    UnknownKeyId(u16),

    #[error("unknown identity {0:?}")]
    UnknownIdentity(String),

    #[error("protocol kind mismatch: {0}")]
    ProtocolKindMismatch(u8),

    #[error("retry timer exhausted")]
    RetryExhausted,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("config error: {0}")]
    Config(String),
}

pub fn require(cond: bool, msg: impl Into<String>) -> VdsResult<()> {
    if !cond {
        return Err(VdsError::Config(msg.into()));
    }
    Ok(())
}
