//! Public API facade: composes the provider, worker, download, upload and
//! registry crates into one `Portal`, plus the config and logging glue a
//! collaborator embedding this core needs.

pub mod config;
pub mod error;
pub mod logging;
pub mod portal;

pub use config::Config;
pub use error::CoreResult;
pub use logging::init_tracing;
pub use portal::{sign_registry_entry, Portal};

// Re-exported so a collaborator can name every public type through this
// crate alone, without reaching into each subcrate for one struct.
pub use sky_crypto::Skykey;
pub use sky_download::SkyfileContents;
pub use sky_format::Skylink;
pub use sky_primitives::{Blocklist, Hash, NoBlocklist, PrivateKey, PublicKey, RequestBudget, SkyError};
pub use sky_registry::{EntryType, RegistryEntry, RegistryResolver, Subscription};
pub use sky_upload::{PathBinder, UploadOutcome, UploadParams};
pub use sky_worker::{StatEvent, StatsAggregator};
