use sky_primitives::SkyError;

/// The error type every `Portal` operation surfaces. Re-exported rather than
/// wrapped: `SkyError` is already the workspace-wide taxonomy every other
/// crate's `Result` alias resolves to, so the facade boundary doesn't need
/// its own variant set.
pub type CoreResult<T> = Result<T, SkyError>;
