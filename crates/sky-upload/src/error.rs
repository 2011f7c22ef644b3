use sky_primitives::SkyError;

pub type UploadResult<T> = Result<T, SkyError>;
