use thiserror::Error;

/// The error taxonomy surfaced by every public operation.
///
/// Every surfaced error carries a `SkyError` kind and a context string
/// identifying the originating component, so callers can branch on kind
/// without string-matching.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SkyError {
    // --- Input ---
    #[error("[{context}] invalid skylink")]
    InvalidSkylink { context: &'static str },
    #[error("[{context}] invalid path")]
    InvalidPath { context: &'static str },
    #[error("[{context}] default path resolves to something other than a file")]
    DefaultPathInvalid { context: &'static str },
    #[error("[{context}] default path set on a single-file upload")]
    DefaultPathOnSingleFile { context: &'static str },
    #[error("[{context}] default_path and disable_default_path both set")]
    DefaultPathAndDisableBothSet { context: &'static str },
    #[error("[{context}] default path must be root-relative")]
    DefaultPathNonRoot { context: &'static str },
    #[error("[{context}] metadata does not fit in the base sector")]
    MetadataTooBig { context: &'static str },
    #[error("[{context}] registry entry data exceeds REGISTRY_DATA_SIZE")]
    DataTooLarge { context: &'static str },
    #[error("[{context}] encryption is not supported on this conversion")]
    EncryptionNotSupportedOnConvert { context: &'static str },

    // --- Access ---
    #[error("[{context}] root is blocklisted")]
    Blocked { context: &'static str },
    #[error("[{context}] path already exists")]
    AlreadyExists { context: &'static str },
    #[error("[{context}] not found")]
    NotFound { context: &'static str },

    // --- Capacity / timing ---
    #[error("[{context}] not enough healthy workers for the requested redundancy")]
    NotEnoughWorkers { context: &'static str },
    #[error("[{context}] deadline elapsed")]
    Timeout { context: &'static str },
    #[error("[{context}] operation cancelled")]
    Cancelled { context: &'static str },
    #[error("[{context}] budget exhausted for this operation")]
    InsufficientBudget { context: &'static str },

    // --- Integrity ---
    #[error("[{context}] signature verification failed")]
    SignatureInvalid { context: &'static str },
    #[error("[{context}] merkle proof verification failed")]
    MerkleProofInvalid { context: &'static str },
    #[error("[{context}] decryption failed")]
    DecryptionFailed { context: &'static str },

    // --- Registry conflict ---
    #[error("[{context}] revision number matches the stored entry")]
    SameRevNum { context: &'static str },
    #[error("[{context}] revision number is lower than the stored entry")]
    LowerRevNum { context: &'static str },
    #[error("[{context}] proof-of-work does not dominate the stored entry")]
    InsufficientWork { context: &'static str },
    #[error("[{context}] no provider accepted the update")]
    NoSuccessfulUpdates { context: &'static str },

    // --- Transport ---
    #[error("[{context}] provider unavailable")]
    ProviderUnavailable { context: &'static str },
    #[error("[{context}] price table expired mid-request")]
    PriceExpired { context: &'static str },
    #[error("[{context}] payment failed")]
    PaymentFailed { context: &'static str },
}

impl SkyError {
    /// A short, stable tag for the error kind, independent of the context string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSkylink { .. } => "InvalidSkylink",
            Self::InvalidPath { .. } => "InvalidPath",
            Self::DefaultPathInvalid { .. } => "DefaultPathInvalid",
            Self::DefaultPathOnSingleFile { .. } => "DefaultPathOnSingleFile",
            Self::DefaultPathAndDisableBothSet { .. } => "DefaultPathAndDisableBothSet",
            Self::DefaultPathNonRoot { .. } => "DefaultPathNonRoot",
            Self::MetadataTooBig { .. } => "MetadataTooBig",
            Self::DataTooLarge { .. } => "DataTooLarge",
            Self::EncryptionNotSupportedOnConvert { .. } => "EncryptionNotSupportedOnConvert",
            Self::Blocked { .. } => "Blocked",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::NotFound { .. } => "NotFound",
            Self::NotEnoughWorkers { .. } => "NotEnoughWorkers",
            Self::Timeout { .. } => "Timeout",
            Self::Cancelled { .. } => "Cancelled",
            Self::InsufficientBudget { .. } => "InsufficientBudget",
            Self::SignatureInvalid { .. } => "SignatureInvalid",
            Self::MerkleProofInvalid { .. } => "MerkleProofInvalid",
            Self::DecryptionFailed { .. } => "DecryptionFailed",
            Self::SameRevNum { .. } => "SameRevNum",
            Self::LowerRevNum { .. } => "LowerRevNum",
            Self::InsufficientWork { .. } => "InsufficientWork",
            Self::NoSuccessfulUpdates { .. } => "NoSuccessfulUpdates",
            Self::ProviderUnavailable { .. } => "ProviderUnavailable",
            Self::PriceExpired { .. } => "PriceExpired",
            Self::PaymentFailed { .. } => "PaymentFailed",
        }
    }
}

pub type SkyResult<T> = Result<T, SkyError>;
