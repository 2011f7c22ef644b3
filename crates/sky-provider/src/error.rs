use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("sector not found")]
    NotFound,
    #[error("provider did not respond before the deadline")]
    Timeout,
    #[error("provider ran out of storage")]
    OutOfStorage,
    #[error("payment failed")]
    PaymentFailed,
    #[error("price table expired mid-request")]
    PriceExpired,
    #[error("registry revision matches the stored entry")]
    SameRevNum,
    #[error("registry revision is lower than the stored entry")]
    LowerRevNum,
    #[error("registry proof-of-work does not dominate the stored entry")]
    InsufficientWork,
    #[error("registry entry signature is invalid")]
    InvalidSignature,
    #[error("handshake with provider failed")]
    HandshakeFailed,
    #[error("provider session closed")]
    SessionClosed,
}

pub type ProviderResult<T> = Result<T, ProviderError>;
