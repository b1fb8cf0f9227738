use std::fs::File;
use std::io::SeekFrom;
use std::path::Path;

use byteorder::{ByteOrder, BigEndian, LittleEndian};
use memmap2::Mmap;

use crate::error::{ElfError, Result};
use crate::flags::{Class, Data};

#[derive(Debug)]
enum Backing {
    Mmap(Mmap),
    Bytes(Vec<u8>),
}

/// Random-access byte source feeding the decoder.
///
/// Files are memory-mapped; the mapping (or the owned buffer) is released
/// when the stream drops, on every exit path. The explicit cursor mirrors
/// the seek-then-read access pattern of the decode stages; positioned reads
/// (`read_at`, `slice_at`) do not touch it and are safe to call from shared
/// references once decoding is done.
#[derive(Debug)]
pub struct FileStream {
    backing: Backing,
    pos: u64,
}

impl FileStream {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            backing: Backing::Mmap(mmap),
            pos: 0,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            backing: Backing::Bytes(bytes),
            pos: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Mmap(m) => m,
            Backing::Bytes(b) => b,
        }
    }

    pub fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Positioned read; copies as many bytes as are available and returns
    /// the count, without moving the cursor.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let data = self.as_slice();
        if offset >= data.len() as u64 {
            return 0;
        }
        let avail = &data[offset as usize..];
        let n = buf.len().min(avail.len());
        buf[..n].copy_from_slice(&avail[..n]);
        n
    }

    /// Positioned exact read; fails with `TruncatedRead` when the stream
    /// ends early.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let n = self.read_at(buf, offset);
        if n < buf.len() {
            return Err(ElfError::TruncatedRead {
                offset,
                expected: buf.len(),
                got: n,
            });
        }
        Ok(())
    }

    /// Borrow `[offset, offset + len)` out of the backing store.
    pub fn slice_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let data = self.as_slice();
        let end = offset.checked_add(len).filter(|e| *e <= data.len() as u64);
        match end {
            Some(end) => Ok(&data[offset as usize..end as usize]),
            None => Err(ElfError::TruncatedRead {
                offset,
                expected: len as usize,
                got: data.len().saturating_sub(offset as usize),
            }),
        }
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.len();
        let target = match pos {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::End(off) => len as i64 + off,
            SeekFrom::Current(off) => self.pos as i64 + off,
        };
        if target < 0 || target as u64 > len {
            return Err(ElfError::SeekFailure {
                offset: target,
                len,
            });
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    /// Exact read at the cursor, advancing it.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.read_exact_at(buf, self.pos)?;
        self.pos += buf.len() as u64;
        Ok(())
    }
}

/// Cursor over a decoded record's bytes that routes every multi-byte read
/// through the byte order recorded in the identification block.
pub struct EndianReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
    data: Data,
}

impl<'a> EndianReader<'a> {
    /// `base` is the file offset of `buf`, used only to annotate errors.
    pub fn new(buf: &'a [u8], base: u64, data: Data) -> Self {
        Self {
            buf,
            pos: 0,
            base,
            data,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(ElfError::TruncatedRead {
                offset: self.base + self.pos as u64,
                expected: n,
                got: self.buf.len() - self.pos,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(match self.data {
            Data::Msb => BigEndian::read_u16(b),
            _ => LittleEndian::read_u16(b),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(match self.data {
            Data::Msb => BigEndian::read_u32(b),
            _ => LittleEndian::read_u32(b),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(match self.data {
            Data::Msb => BigEndian::read_u64(b),
            _ => LittleEndian::read_u64(b),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Address/offset-sized read: 4 bytes widened to `u64` for Class32,
    /// 8 bytes for Class64.
    pub fn read_word(&mut self, class: Class) -> Result<u64> {
        match class {
            Class::Elf64 => self.read_u64(),
            _ => Ok(u64::from(self.read_u32()?)),
        }
    }

    /// Signed counterpart of `read_word`, for relocation addends.
    pub fn read_sword(&mut self, class: Class) -> Result<i64> {
        match class {
            Class::Elf64 => self.read_i64(),
            _ => Ok(i64::from(self.read_i32()?)),
        }
    }
}
