use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use relic_core::flags;
use relic_core::{Binary, RelocationEntries, Section, Symbol};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// ELF inspection CLI
#[derive(Parser)]
#[command(
    name = "relic",
    about = "Inspect ELF binaries (header, sections, segments, symbols, relocations)",
    version,
    author
)]
struct Cli {
    /// Path to an ELF file
    #[arg(required = true)]
    path: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the identification block and file header
    Header,
    /// List all sections
    Sections,
    /// List all segments (program headers)
    Segments,
    /// List static and dynamic symbols
    Symbols,
    /// List relocation entries per relocation section
    Relocs,
    /// Dump the full decoded model as JSON
    Json,
}

#[derive(Tabled)]
struct SectionRow {
    #[tabled(rename = "Idx")]
    idx: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Address")]
    addr: String,
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Link")]
    link: u32,
}

impl SectionRow {
    fn new(idx: usize, section: &Section) -> Self {
        let header = &section.header;
        Self {
            idx,
            name: section.name.clone(),
            kind: flags::section_type_name(header.sh_type()),
            flags: format!("{:#x}", header.flags_raw()),
            addr: format!("{:#010x}", header.addr()),
            offset: format!("{:#08x}", header.offset()),
            size: format!("{:#08x}", header.size()),
            link: header.link(),
        }
    }
}

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "VirtAddr")]
    vaddr: String,
    #[tabled(rename = "FileSize")]
    filesz: String,
    #[tabled(rename = "MemSize")]
    memsz: String,
    #[tabled(rename = "Align")]
    align: String,
}

#[derive(Tabled)]
struct SymbolRow {
    #[tabled(rename = "Num")]
    num: usize,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Size")]
    size: u64,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Bind")]
    bind: String,
    #[tabled(rename = "Ndx")]
    ndx: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl SymbolRow {
    fn new(num: usize, symbol: &Symbol) -> Self {
        let ndx = match symbol.shndx {
            0 => "UND".to_string(),
            n if n >= flags::SHN_LORESERVE => format!("{n:#x}"),
            n => n.to_string(),
        };
        let name = match (&symbol.version, &symbol.library) {
            (Some(version), Some(library)) => {
                format!("{}@{} ({})", symbol.name, version, library)
            }
            (Some(version), None) => format!("{}@{}", symbol.name, version),
            _ => symbol.name.clone(),
        };
        Self {
            num,
            value: format!("{:#014x}", symbol.value),
            size: symbol.size,
            kind: flags::symbol_type_name(symbol.sym_type()),
            bind: flags::symbol_bind_name(symbol.bind()),
            ndx,
            name,
        }
    }
}

#[derive(Tabled)]
struct RelocRow {
    #[tabled(rename = "Offset")]
    offset: String,
    #[tabled(rename = "Info")]
    info: String,
    #[tabled(rename = "Type")]
    kind: u32,
    #[tabled(rename = "Sym")]
    sym: u32,
    #[tabled(rename = "Addend")]
    addend: String,
}

fn reloc_rows(entries: &RelocationEntries) -> Vec<RelocRow> {
    match entries {
        RelocationEntries::Rel32(v) => v
            .iter()
            .map(|r| RelocRow {
                offset: format!("{:#010x}", r.r_offset),
                info: format!("{:#010x}", r.r_info),
                kind: r.rel_type(),
                sym: r.sym(),
                addend: String::new(),
            })
            .collect(),
        RelocationEntries::Rela32(v) => v
            .iter()
            .map(|r| RelocRow {
                offset: format!("{:#010x}", r.r_offset),
                info: format!("{:#010x}", r.r_info),
                kind: r.rel_type(),
                sym: r.sym(),
                addend: r.r_addend.to_string(),
            })
            .collect(),
        RelocationEntries::Rel64(v) => v
            .iter()
            .map(|r| RelocRow {
                offset: format!("{:#014x}", r.r_offset),
                info: format!("{:#018x}", r.r_info),
                kind: r.rel_type(),
                sym: r.sym(),
                addend: String::new(),
            })
            .collect(),
        RelocationEntries::Rela64(v) => v
            .iter()
            .map(|r| RelocRow {
                offset: format!("{:#014x}", r.r_offset),
                info: format!("{:#018x}", r.r_info),
                kind: r.rel_type(),
                sym: r.sym(),
                addend: r.r_addend.to_string(),
            })
            .collect(),
    }
}

fn print_header(bin: &Binary) {
    let ident = &bin.ident;
    let header = &bin.header;
    println!("{}", "ELF Header".bold());
    println!("  {:<36} {:02x?}", "Magic:", ident.magic);
    println!("  {:<36} {}", "Class:", ident.class.name());
    println!("  {:<36} {}", "Data:", ident.data.name());
    println!("  {:<36} {}", "Version:", ident.version);
    println!("  {:<36} {}", "OS/ABI:", flags::osabi_name(ident.os_abi));
    println!("  {:<36} {}", "ABI version:", ident.abi_version);
    println!("  {:<36} {}", "Type:", flags::type_name(header.etype()));
    println!("  {:<36} {}", "Machine:", flags::machine_name(header.machine()));
    println!("  {:<36} {:#x}", "Entry point address:", header.entry());
    println!("  {:<36} {}", "Start of program headers:", header.phoff());
    println!("  {:<36} {}", "Start of section headers:", header.shoff());
    println!("  {:<36} {:#x}", "Flags:", header.flags());
    println!("  {:<36} {}", "Size of this header:", header.ehsize());
    println!("  {:<36} {}", "Size of program headers:", header.phentsize());
    println!("  {:<36} {}", "Number of program headers:", header.phnum());
    println!("  {:<36} {}", "Size of section headers:", header.shentsize());
    println!("  {:<36} {}", "Number of section headers:", header.shnum());
    println!("  {:<36} {}", "String table index:", header.shstrndx());
}

fn print_symbol_table(title: &str, symbols: &[Symbol]) {
    if symbols.is_empty() {
        println!("{title}: none");
        return;
    }
    println!("{} ({} entries)", title.bold(), symbols.len());
    let rows: Vec<SymbolRow> = symbols
        .iter()
        .enumerate()
        .map(|(num, s)| SymbolRow::new(num, s))
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    log::debug!("decoding {}", cli.path.display());
    let bin = Binary::open(&cli.path)?;

    match cli.command {
        Command::Header => print_header(&bin),

        Command::Sections => {
            if bin.sections.is_empty() {
                println!("No section headers (stripped or header-only binary).");
            } else {
                let rows: Vec<SectionRow> = bin
                    .sections
                    .iter()
                    .enumerate()
                    .map(|(idx, s)| SectionRow::new(idx, s))
                    .collect();
                println!("{}", Table::new(rows).with(Style::psql()));
            }
        }

        Command::Segments => {
            if bin.segments.is_empty() {
                println!("No program headers.");
            } else {
                let rows: Vec<SegmentRow> = bin
                    .segments
                    .iter()
                    .map(|ph| SegmentRow {
                        kind: flags::segment_type_name(ph.p_type()),
                        flags: format!("{:#x}", ph.flags_raw()),
                        offset: format!("{:#08x}", ph.offset()),
                        vaddr: format!("{:#010x}", ph.vaddr()),
                        filesz: format!("{:#x}", ph.filesz()),
                        memsz: format!("{:#x}", ph.memsz()),
                        align: format!("{:#x}", ph.align()),
                    })
                    .collect();
                println!("{}", Table::new(rows).with(Style::psql()));
            }
        }

        Command::Symbols => {
            print_symbol_table("Symbol table", &bin.symbols);
            print_symbol_table("Dynamic symbol table", &bin.dynamic_symbols);
        }

        Command::Relocs => {
            if bin.relocations.is_empty() {
                println!("No relocation sections.");
            } else {
                for table in &bin.relocations {
                    println!(
                        "{} ({} entries)",
                        table.section_name.bold(),
                        table.entries.len()
                    );
                    println!("{}", Table::new(reloc_rows(&table.entries)).with(Style::psql()));
                }
            }
        }

        Command::Json => println!("{}", serde_json::to_string_pretty(&bin)?),
    }

    Ok(())
}
