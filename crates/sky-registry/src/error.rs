use sky_primitives::SkyError;

pub type RegistryResult<T> = Result<T, SkyError>;
