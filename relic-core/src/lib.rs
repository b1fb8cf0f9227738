//! Decoding engine for the ELF object file format.
//!
//! Turns the on-disk binary layout into a validated, queryable
//! [`Binary`] model: identification block, class-dispatched file
//! header, section and program header tables, resolved section names,
//! lazily materialized (and transparently decompressed) section
//! payloads, symbol tables and relocation entries.

pub mod binary;
pub mod error;
pub mod flags;
pub mod header;
pub mod ident;
pub mod parser;
pub mod program;
pub mod reloc;
pub mod sections;
pub mod stream;
pub mod strtab;
pub mod symbols;

pub use binary::*;
pub use error::*;
pub use header::*;
pub use ident::*;
pub use parser::*;
pub use program::*;
pub use reloc::*;
pub use sections::*;
pub use stream::*;
pub use symbols::*;
