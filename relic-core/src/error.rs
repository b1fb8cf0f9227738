use std::io;
use thiserror::Error;

/// Decode failures surfaced by the parsing engine.
///
/// Every failure is an ordinary value returned to the immediate caller;
/// a malformed or truncated input is terminal for the stage that hit it
/// but leaves earlier, already-decoded stages intact.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("bad magic number {0:02x?}")]
    MalformedMagic([u8; 4]),
    #[error("bad ELF class {0:#04x}")]
    InvalidClass(u8),
    #[error("bad ELF byte order {0:#04x}")]
    InvalidByteOrder(u8),
    #[error("bad ELF version {0}")]
    InvalidVersion(u8),
    #[error("short read at offset {offset:#x}: wanted {expected} bytes, got {got}")]
    TruncatedRead {
        offset: u64,
        expected: usize,
        got: usize,
    },
    #[error("cannot seek to offset {offset:#x} in a stream of {len} bytes")]
    SeekFailure { offset: i64, len: u64 },
    #[error("unknown ELF class")]
    UnknownClass,
    #[error("ELF header has not been parsed yet")]
    HeaderNotParsed,
    #[error("{0} must be decoded first")]
    OrderingViolation(&'static str),
    #[error("no {0} table present")]
    NoTable(&'static str),
    #[error("section name string table index {index} out of range ({count} sections)")]
    InvalidStringTableLink { index: usize, count: usize },
    #[error("symbol table size {size:#x} is not a multiple of the {entry_size}-byte entry size")]
    MisalignedSymbolTable { size: u64, entry_size: u64 },
    #[error("unsupported section compression type {0:#x}")]
    UnsupportedCompression(u32),
    #[error("decompressed section holds {got} bytes, compression header recorded {expected}")]
    TruncatedDecompression { expected: u64, got: u64 },
    #[error("ELF header size field does not match its class")]
    MalformedHeader,
    #[error("segment file size {filesz:#x} exceeds its memory size {memsz:#x}")]
    MalformedSegment { filesz: u64, memsz: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ElfError>;
