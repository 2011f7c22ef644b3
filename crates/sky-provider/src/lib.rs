//! The provider collaborator interface: an authenticated session trait, its
//! in-memory test/local backend, and price table caching.

pub mod client;
pub mod error;
pub mod price;

pub use client::{memory::MemoryProvider, ProviderClient, RegistryStream};
pub use error::{ProviderError, ProviderResult};
pub use price::{PriceCache, PriceTable};
