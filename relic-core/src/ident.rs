use serde::Serialize;

use crate::error::{ElfError, Result};
use crate::flags::{
    Class, Data, EI_ABIVERSION, EI_CLASS, EI_DATA, EI_NIDENT, EI_OSABI, EI_VERSION, ELFMAG,
    EV_CURRENT,
};

/// Validated identification block, the fixed 16-byte prologue of every
/// ELF file. Immutable once accepted: every later decode dispatches on
/// the class and byte order recorded here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ident {
    pub magic: [u8; 4],
    pub class: Class,
    pub data: Data,
    pub version: u8,
    pub os_abi: u8,
    pub abi_version: u8,
}

impl Ident {
    /// Validates field by field, in on-disk order. The first failing
    /// field wins; nothing past the identification block has been read
    /// at this point.
    pub fn parse(raw: &[u8; EI_NIDENT]) -> Result<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&raw[..4]);
        if magic != ELFMAG {
            return Err(ElfError::MalformedMagic(magic));
        }
        let class = Class::try_from(raw[EI_CLASS])?;
        if !class.is_valid() {
            return Err(ElfError::InvalidClass(raw[EI_CLASS]));
        }
        let data = Data::try_from(raw[EI_DATA])?;
        if !data.is_valid() {
            return Err(ElfError::InvalidByteOrder(raw[EI_DATA]));
        }
        if raw[EI_VERSION] != EV_CURRENT {
            return Err(ElfError::InvalidVersion(raw[EI_VERSION]));
        }
        Ok(Self {
            magic,
            class,
            data,
            version: raw[EI_VERSION],
            os_abi: raw[EI_OSABI],
            abi_version: raw[EI_ABIVERSION],
        })
    }
}
