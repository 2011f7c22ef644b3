use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormatError {
    #[error("skylink must decode to exactly 34 bytes")]
    InvalidSkylinkLength,
    #[error("skylink must encode to exactly 46 base64url characters")]
    InvalidSkylinkEncoding,
    #[error("unknown skylink version {0}")]
    UnknownSkylinkVersion(u8),
    #[error("offset + fetch_size exceeds SECTOR_SIZE")]
    RangeExceedsSector,
    #[error("offset/length pair isn't representable by the bitfield's power-of-two granularity")]
    UnrepresentableRange,
    #[error("layout + fanout + metadata exceeds SECTOR_SIZE")]
    MetadataTooBig,
    #[error("unknown base sector layout version {0}")]
    UnknownLayoutVersion(u8),
    #[error("unknown cipher type {0}")]
    UnknownCipherType(u8),
    #[error("fanout byte length isn't a multiple of the per-chunk roots size")]
    MisalignedFanout,
    #[error("fanout chunk {0} has an all-zero roots table")]
    EmptyFanoutChunk(usize),
    #[error("metadata failed to deserialize: {0}")]
    MetadataDecode(String),
    #[error("path is not root-relative")]
    InvalidPath,
    #[error("default_path does not resolve to a file")]
    DefaultPathInvalid,
    #[error("default_path set on a single-file upload")]
    DefaultPathOnSingleFile,
    #[error("default_path and disable_default_path are both set")]
    DefaultPathAndDisableBothSet,
    #[error("default_path must be root-relative")]
    DefaultPathNonRoot,
}

pub type FormatResult<T> = Result<T, FormatError>;
