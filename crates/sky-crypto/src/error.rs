use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CryptoError {
    #[error("no known skykey matches the base sector's preamble")]
    UnknownSkykey,
    #[error("preamble authentication failed")]
    PreambleAuthFailed,
    #[error("key derivation failed")]
    DerivationFailed,
}
