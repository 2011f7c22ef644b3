//! Skyfile binary layout: the skylink content address, the base sector's
//! fixed header, its fanout table of piece Merkle roots, and its JSON
//! metadata section.

pub mod base_sector;
pub mod content_type;
pub mod error;
pub mod fanout;
pub mod layout;
pub mod metadata;
pub mod skylink;

pub use base_sector::{
    decrypt_base_sector, encode_base_sector, encrypt_base_sector, is_encrypted_base_sector, parse_base_sector,
    BaseSector,
};
pub use content_type::sniff as sniff_content_type;
pub use error::{FormatError, FormatResult};
pub use fanout::Fanout;
pub use layout::{CipherType, Layout, LAYOUT_LEN};
pub use metadata::{Metadata, SubfileMetadata};
pub use skylink::{Skylink, SKYLINK_ENCODED_LEN, SKYLINK_LEN};
