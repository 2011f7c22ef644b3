use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sky_primitives::{Hash, SECTOR_SIZE};

use crate::error::{FormatError, FormatResult};

/// Wire length of a skylink: `version_bits || bitfield || merkle_root`.
pub const SKYLINK_LEN: usize = 34;
/// A skylink always base64url-encodes (no padding) to exactly this many characters.
pub const SKYLINK_ENCODED_LEN: usize = 46;

const MAX_MULTIPLIER: u64 = 8; // 3-bit mantissa field, values 1..=8
const MAX_EXPONENT: u32 = 63; // 6-bit exponent field

/// A 34-byte content address: a base sector's Merkle root plus a byte range
/// within it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Skylink {
    version: u8,
    offset: u64,
    fetch_size: u64,
    merkle_root: Hash,
}

impl Skylink {
    /// Builds a skylink addressing `[0, SECTOR_SIZE)` of `merkle_root` — the
    /// shape produced for every freshly uploaded base sector.
    pub fn whole_sector(version: u8, merkle_root: Hash) -> FormatResult<Self> {
        Self::new(version, 0, SECTOR_SIZE as u64, merkle_root)
    }

    pub fn new(version: u8, offset: u64, fetch_size: u64, merkle_root: Hash) -> FormatResult<Self> {
        if version != 1 && version != 2 {
            return Err(FormatError::UnknownSkylinkVersion(version));
        }
        if offset + fetch_size > SECTOR_SIZE as u64 {
            return Err(FormatError::RangeExceedsSector);
        }
        // Validate representability eagerly so construction fails loudly
        // rather than at encode time.
        let _ = Bitfield::encode(version, offset, fetch_size)?;
        Ok(Self {
            version,
            offset,
            fetch_size,
            merkle_root,
        })
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn fetch_size(&self) -> u64 {
        self.fetch_size
    }

    #[must_use]
    pub fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    #[must_use]
    pub fn is_registry_link(&self) -> bool {
        self.version == 2
    }

    /// Encodes to the 34-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SKYLINK_LEN] {
        let bitfield = Bitfield::encode(self.version, self.offset, self.fetch_size)
            .expect("constructed Skylinks always have a representable range");
        let mut out = [0u8; SKYLINK_LEN];
        out[..2].copy_from_slice(&bitfield.0.to_le_bytes());
        out[2..].copy_from_slice(self.merkle_root.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> FormatResult<Self> {
        if bytes.len() != SKYLINK_LEN {
            return Err(FormatError::InvalidSkylinkLength);
        }
        let bitfield = Bitfield(u16::from_le_bytes([bytes[0], bytes[1]]));
        let (version, offset, fetch_size) = bitfield.decode()?;
        let mut root = [0u8; 32];
        root.copy_from_slice(&bytes[2..34]);
        Ok(Self {
            version,
            offset,
            fetch_size,
            merkle_root: Hash::new(root),
        })
    }

    /// Base64url (no padding), exactly [`SKYLINK_ENCODED_LEN`] characters.
    #[must_use]
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    pub fn parse(s: &str) -> FormatResult<Self> {
        if s.len() != SKYLINK_ENCODED_LEN {
            return Err(FormatError::InvalidSkylinkEncoding);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| FormatError::InvalidSkylinkEncoding)?;
        Self::from_bytes(&bytes)
    }
}

/// The 16-bit `version_bits || offset/length` field packed ahead of the
/// Merkle root, using an exponent-mantissa encoding.
///
/// Layout, MSB to LSB:
/// - bits `[15:13]`: version
/// - bit `[12]`: `offset_is_zero`
/// - bits `[11:9]`: length mantissa minus one (`0..=7` => multiplier `1..=8`)
/// - bits `[8:3]`: shared exponent for offset and length
/// - bits `[2:0]`: offset mantissa minus one (ignored when `offset_is_zero`)
struct Bitfield(u16);

impl Bitfield {
    fn encode(version: u8, offset: u64, fetch_size: u64) -> FormatResult<Self> {
        let exponent = shared_exponent(offset, fetch_size)?;

        let length_multiplier = fetch_size >> exponent;
        if length_multiplier == 0 || length_multiplier > MAX_MULTIPLIER {
            return Err(FormatError::UnrepresentableRange);
        }

        let (offset_is_zero, offset_multiplier) = if offset == 0 {
            (true, 1)
        } else {
            let m = offset >> exponent;
            if m == 0 || m > MAX_MULTIPLIER {
                return Err(FormatError::UnrepresentableRange);
            }
            (false, m)
        };

        let mut bits: u16 = u16::from(version) << 13;
        bits |= u16::from(offset_is_zero) << 12;
        bits |= ((length_multiplier - 1) as u16) << 9;
        bits |= (exponent as u16) << 3;
        bits |= (offset_multiplier - 1) as u16;

        Ok(Self(bits))
    }

    fn decode(&self) -> FormatResult<(u8, u64, u64)> {
        let version = (self.0 >> 13) as u8;
        if version != 1 && version != 2 {
            return Err(FormatError::UnknownSkylinkVersion(version));
        }
        let offset_is_zero = (self.0 >> 12) & 0b1 == 1;
        let length_multiplier = u64::from((self.0 >> 9) & 0b111) + 1;
        let exponent = u32::from((self.0 >> 3) & 0b11_1111);
        let offset_multiplier = u64::from(self.0 & 0b111) + 1;

        let fetch_size = length_multiplier << exponent;
        let offset = if offset_is_zero {
            0
        } else {
            offset_multiplier << exponent
        };

        if offset + fetch_size > SECTOR_SIZE as u64 {
            return Err(FormatError::RangeExceedsSector);
        }

        Ok((version, offset, fetch_size))
    }
}

/// Finds the largest shared power-of-two granularity under which both
/// `offset` and `fetch_size` are small integer multiples.
fn shared_exponent(offset: u64, fetch_size: u64) -> FormatResult<u32> {
    if fetch_size == 0 {
        return Err(FormatError::UnrepresentableRange);
    }

    for exponent in (0..=MAX_EXPONENT).rev() {
        let unit = 1u64 << exponent;
        if fetch_size % unit != 0 {
            continue;
        }
        let length_multiplier = fetch_size / unit;
        if length_multiplier == 0 || length_multiplier > MAX_MULTIPLIER {
            continue;
        }
        if offset == 0 {
            return Ok(exponent);
        }
        if offset % unit != 0 {
            continue;
        }
        let offset_multiplier = offset / unit;
        if offset_multiplier >= 1 && offset_multiplier <= MAX_MULTIPLIER {
            return Ok(exponent);
        }
    }
    Err(FormatError::UnrepresentableRange)
}
