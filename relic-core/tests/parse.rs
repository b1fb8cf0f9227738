//! End-to-end decoding tests over synthetic ELF images assembled in
//! memory.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use relic_core::flags::{
    Data, ELFMAG, EM_X86_64, ET_DYN, ET_EXEC, SHT_NULL, SHT_PROGBITS, SHT_RELA, SHT_STRTAB,
    SHT_SYMTAB,
};
use relic_core::{reloc, Binary, Elf64SectionHeader, ElfError, SectionHeader};

/// Encodes one 64-bit little-endian section header.
#[allow(clippy::too_many_arguments)]
fn shdr64(
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    addralign: u64,
    entsize: u64,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&name.to_le_bytes());
    buf.extend_from_slice(&sh_type.to_le_bytes());
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&addr.to_le_bytes());
    buf.extend_from_slice(&offset.to_le_bytes());
    buf.extend_from_slice(&size.to_le_bytes());
    buf.extend_from_slice(&link.to_le_bytes());
    buf.extend_from_slice(&info.to_le_bytes());
    buf.extend_from_slice(&addralign.to_le_bytes());
    buf.extend_from_slice(&entsize.to_le_bytes());
    buf
}

fn ehdr64(
    e_type: u16,
    entry: u64,
    phoff: u64,
    shoff: u64,
    phnum: u16,
    shnum: u16,
    shstrndx: u16,
) -> Vec<u8> {
    let mut buf = vec![0u8; 64];
    buf[..4].copy_from_slice(&ELFMAG);
    buf[4] = 2; // ELFCLASS64
    buf[5] = 1; // little endian
    buf[6] = 1; // EV_CURRENT
    buf[16..18].copy_from_slice(&e_type.to_le_bytes());
    buf[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
    buf[20..24].copy_from_slice(&1u32.to_le_bytes());
    buf[24..32].copy_from_slice(&entry.to_le_bytes());
    buf[32..40].copy_from_slice(&phoff.to_le_bytes());
    buf[40..48].copy_from_slice(&shoff.to_le_bytes());
    buf[52..54].copy_from_slice(&64u16.to_le_bytes());
    buf[54..56].copy_from_slice(&56u16.to_le_bytes());
    buf[56..58].copy_from_slice(&phnum.to_le_bytes());
    buf[58..60].copy_from_slice(&64u16.to_le_bytes());
    buf[60..62].copy_from_slice(&shnum.to_le_bytes());
    buf[62..64].copy_from_slice(&shstrndx.to_le_bytes());
    buf
}

/// Section name blob and the name indices used by `sample_image`.
const SHSTRTAB: &[u8] = b"\0.text\0.symtab\0.strtab\0.rela.text\0.debug_str\0.shstrtab\0";
const N_TEXT: u32 = 1;
const N_SYMTAB: u32 = 7;
const N_STRTAB: u32 = 15;
const N_RELA: u32 = 23;
const N_DEBUG_STR: u32 = 34;
const N_SHSTRTAB: u32 = 45;

const DEBUG_PAYLOAD: &[u8] = b"string section stored deflated";

/// A small but complete 64-bit LE executable image: code, symbols,
/// relocations and a ZLIB-compressed section. `chdr_size` lets tests
/// lie about the uncompressed size.
fn sample_image(chdr_size: u64) -> Vec<u8> {
    let text: Vec<u8> = vec![0x90; 16];

    let mut symtab = vec![0u8; 24]; // null symbol
    symtab.extend_from_slice(&1u32.to_le_bytes()); // name -> "main"
    symtab.push(0x12); // GLOBAL | FUNC
    symtab.push(0);
    symtab.extend_from_slice(&1u16.to_le_bytes()); // defined in .text
    symtab.extend_from_slice(&0x401000u64.to_le_bytes());
    symtab.extend_from_slice(&0x10u64.to_le_bytes());

    let strtab = b"\0main\0".to_vec();

    let mut rela = Vec::new();
    rela.extend_from_slice(&0x401004u64.to_le_bytes());
    rela.extend_from_slice(&reloc::r_info64(1, 2).to_le_bytes());
    rela.extend_from_slice(&(-4i64).to_le_bytes());

    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(DEBUG_PAYLOAD).unwrap();
    let compressed = enc.finish().unwrap();
    let mut debug_str = Vec::new();
    debug_str.extend_from_slice(&1u32.to_le_bytes()); // ELFCOMPRESS_ZLIB
    debug_str.extend_from_slice(&0u32.to_le_bytes()); // reserved
    debug_str.extend_from_slice(&chdr_size.to_le_bytes());
    debug_str.extend_from_slice(&1u64.to_le_bytes()); // addralign
    debug_str.extend_from_slice(&compressed);

    let text_off = 64u64;
    let symtab_off = text_off + text.len() as u64;
    let strtab_off = symtab_off + symtab.len() as u64;
    let rela_off = strtab_off + strtab.len() as u64;
    let debug_off = rela_off + rela.len() as u64;
    let shstrtab_off = debug_off + debug_str.len() as u64;
    let shoff = shstrtab_off + SHSTRTAB.len() as u64;

    let mut image = ehdr64(ET_EXEC, 0x401000, 0, shoff, 0, 7, 6);
    image.extend_from_slice(&text);
    image.extend_from_slice(&symtab);
    image.extend_from_slice(&strtab);
    image.extend_from_slice(&rela);
    image.extend_from_slice(&debug_str);
    image.extend_from_slice(SHSTRTAB);

    image.extend(shdr64(0, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0));
    image.extend(shdr64(
        N_TEXT,
        SHT_PROGBITS,
        0x6, // ALLOC | EXECINSTR
        0x401000,
        text_off,
        text.len() as u64,
        0,
        0,
        16,
        0,
    ));
    image.extend(shdr64(
        N_SYMTAB,
        SHT_SYMTAB,
        0,
        0,
        symtab_off,
        symtab.len() as u64,
        3, // names in .strtab
        1,
        8,
        24,
    ));
    image.extend(shdr64(
        N_STRTAB,
        SHT_STRTAB,
        0,
        0,
        strtab_off,
        strtab.len() as u64,
        0,
        0,
        1,
        0,
    ));
    image.extend(shdr64(
        N_RELA,
        SHT_RELA,
        0,
        0,
        rela_off,
        rela.len() as u64,
        2, // symbols in .symtab
        1,
        8,
        24,
    ));
    image.extend(shdr64(
        N_DEBUG_STR,
        SHT_PROGBITS,
        0x800, // SHF_COMPRESSED
        0,
        debug_off,
        debug_str.len() as u64,
        0,
        0,
        1,
        0,
    ));
    image.extend(shdr64(
        N_SHSTRTAB,
        SHT_STRTAB,
        0,
        0,
        shstrtab_off,
        SHSTRTAB.len() as u64,
        0,
        0,
        1,
        0,
    ));
    image
}

#[test]
fn decodes_a_complete_image() {
    let binary = Binary::from_bytes(sample_image(DEBUG_PAYLOAD.len() as u64)).unwrap();

    assert!(binary.is_64());
    assert_eq!(binary.data(), Data::Lsb);
    assert_eq!(binary.entry_point(), 0x401000);
    assert!(!binary.is_stripped);

    let names: Vec<&str> = binary.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["", ".text", ".symtab", ".strtab", ".rela.text", ".debug_str", ".shstrtab"]
    );

    let text = binary.section_by_name(".text").unwrap();
    assert_eq!(&*binary.section_data(text).unwrap(), &[0x90; 16][..]);

    assert_eq!(binary.symbols.len(), 2);
    let main = &binary.symbols[1];
    assert_eq!(main.name, "main");
    assert_eq!(main.value, 0x401000);
    assert_eq!(main.shndx, 1);
    assert_eq!(main.bind(), 1);
    assert_eq!(main.sym_type(), 2);

    assert_eq!(binary.relocations.len(), 1);
    let table = &binary.relocations[0];
    assert_eq!(table.section_name, ".rela.text");
    match &table.entries {
        relic_core::RelocationEntries::Rela64(v) => {
            assert_eq!(v.len(), 1);
            assert_eq!(v[0].r_offset, 0x401004);
            assert_eq!(v[0].sym(), 1);
            assert_eq!(v[0].rel_type(), 2);
            assert_eq!(v[0].r_addend, -4);
        }
        other => panic!("wrong relocation shape: {other:?}"),
    }
}

#[test]
fn compressed_section_inflates_to_the_recorded_size() {
    let binary = Binary::from_bytes(sample_image(DEBUG_PAYLOAD.len() as u64)).unwrap();
    let section = binary.section_by_name(".debug_str").unwrap();
    let meta = section.compression.expect("compression metadata");
    assert_eq!(meta.ch_type, 1);
    assert_eq!(meta.uncompressed_size, DEBUG_PAYLOAD.len() as u64);

    let data = binary.section_data(section).unwrap();
    assert_eq!(data.len() as u64, meta.uncompressed_size);
    assert_eq!(&*data, DEBUG_PAYLOAD);
}

#[test]
fn lying_compression_header_is_a_truncated_decompression() {
    let binary = Binary::from_bytes(sample_image(100)).unwrap();
    let section = binary.section_by_name(".debug_str").unwrap();
    assert!(matches!(
        binary.section_data(section),
        Err(ElfError::TruncatedDecompression {
            expected: 100,
            got
        }) if got == DEBUG_PAYLOAD.len() as u64
    ));
}

#[test]
fn decoding_twice_yields_identical_models() {
    let image = sample_image(DEBUG_PAYLOAD.len() as u64);
    let first = Binary::from_bytes(image.clone()).unwrap();
    let second = Binary::from_bytes(image).unwrap();

    assert_eq!(first.ident, second.ident);
    assert_eq!(first.header, second.header);
    assert_eq!(first.sections, second.sections);
    assert_eq!(first.segments, second.segments);
    assert_eq!(first.symbols, second.symbols);
    assert_eq!(first.dynamic_symbols, second.dynamic_symbols);
    assert_eq!(first.relocations, second.relocations);
}

#[test]
fn serializes_the_decoded_model() {
    let binary = Binary::from_bytes(sample_image(DEBUG_PAYLOAD.len() as u64)).unwrap();
    let value = serde_json::to_value(&binary).unwrap();
    assert_eq!(value["header"]["e_machine"], u64::from(EM_X86_64));
    assert_eq!(value["sections"][1]["name"], ".text");
    assert_eq!(value["symbols"][1]["name"], "main");
    assert_eq!(value["ident"]["class"], "Elf64");
}

/// Field-for-field scenario lifted from a real 64-bit little-endian
/// dynamic executable: header values and the first two section table
/// entries.
#[test]
fn decodes_a_dynamic_executable_header_and_section_table() {
    let shoff = 140_224u64;
    let shnum = 30u16;
    let mut image = ehdr64(ET_DYN, 0x67d0, 64, shoff, 13, shnum, 29);
    // 13 zeroed program headers decode as PT_NULL entries.
    image.resize(shoff as usize, 0);
    image.extend(shdr64(0, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0));
    image.extend(shdr64(
        11,
        SHT_PROGBITS,
        0x2, // SHF_ALLOC
        0x318,
        0x318,
        0x1c,
        0,
        0,
        1,
        0,
    ));
    for _ in 2..shnum {
        image.extend(shdr64(0, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0));
    }

    let binary = Binary::from_bytes(image).unwrap();
    assert_eq!(binary.header.etype(), ET_DYN);
    assert_eq!(binary.header.machine(), EM_X86_64);
    assert_eq!(binary.entry_point(), 0x67d0);
    assert_eq!(binary.header.phoff(), 64);
    assert_eq!(binary.header.shoff(), shoff);
    assert_eq!(binary.header.phnum(), 13);
    assert_eq!(binary.header.shnum(), 30);
    assert_eq!(binary.header.shstrndx(), 29);

    assert_eq!(binary.sections.len(), 30);
    assert_eq!(binary.segments.len(), 13);

    let null_entry = &binary.sections[0].header;
    assert_eq!(
        *null_entry,
        SectionHeader::Elf64(Elf64SectionHeader {
            sh_name: 0,
            sh_type: 0,
            sh_flags: 0,
            sh_addr: 0,
            sh_offset: 0,
            sh_size: 0,
            sh_link: 0,
            sh_info: 0,
            sh_addralign: 0,
            sh_entsize: 0,
        })
    );

    let first = &binary.sections[1].header;
    assert_eq!(first.sh_type(), SHT_PROGBITS);
    assert_eq!(first.flags_raw(), 0x2);
    assert_eq!(first.addr(), 0x318);
    assert_eq!(first.size(), 0x1c);
}

#[test]
fn section_extent_past_the_stream_end_is_rejected() {
    // One section whose size runs past the end of the image.
    let shoff = 64u64;
    let mut image = ehdr64(ET_EXEC, 0, 0, shoff, 0, 2, 0);
    image.extend(shdr64(0, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0));
    image.extend(shdr64(0, SHT_PROGBITS, 0, 0, 0x40, 0x10000, 0, 0, 1, 0));
    assert!(matches!(
        Binary::from_bytes(image),
        Err(ElfError::TruncatedRead { offset: 0x40, .. })
    ));
}

#[test]
fn out_of_range_string_table_link_is_rejected() {
    // shstrndx = 9 with only 2 sections present.
    let shoff = 64u64;
    let mut image = ehdr64(ET_EXEC, 0, 0, shoff, 0, 2, 9);
    image.extend(shdr64(0, SHT_NULL, 0, 0, 0, 0, 0, 0, 0, 0));
    image.extend(shdr64(0, SHT_STRTAB, 0, 0, 0, 0, 0, 0, 1, 0));
    assert!(matches!(
        Binary::from_bytes(image),
        Err(ElfError::InvalidStringTableLink { index: 9, count: 2 })
    ));
}
