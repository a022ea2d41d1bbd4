//! ELF program loading
//!
//! Reads an AArch64 ELF image from disk and loads the alloc sections
//! (the ones meant to be present during program execution) into the
//! simulated memory at their link addresses. The byte stream of each
//! section is placed with byte-lane writes, so the little-endian
//! instruction words come out of `read32` exactly as an assembler
//! produced them.

use elf::abi::{SHF_ALLOC, SHT_NOBITS};
use elf::endian::AnyEndian;
use elf::section::SectionHeader;
use elf::string_table::StringTable;
use elf::ElfBytes;
use thiserror::Error;

use crate::cpu::memory::Memory;

#[derive(Debug, Error)]
pub enum ElfError {
    #[error("could not read ELF file: {0}")]
    CouldNotRead(String),
    #[error("could not parse ELF file: {0}")]
    ParseFailed(String),
    #[error("found unexpected compression in section {0}")]
    CompressedSection(String),
}

impl From<elf::ParseError> for ElfError {
    fn from(e: elf::ParseError) -> Self {
        Self::ParseFailed(e.to_string())
    }
}

/// Get the section header name for this section
fn section_name<'a>(header: &SectionHeader, strtab: &'a StringTable) -> &'a str {
    strtab
        .get(header.sh_name as usize)
        .unwrap_or("<unnamed section>")
}

/// Read an ELF file from disk and load every alloc section into
/// memory at its link address. Returns the entry point.
pub fn load_elf(memory: &mut Memory, elf_file_path: &str) -> Result<u64, ElfError> {
    let file_data =
        std::fs::read(elf_file_path).map_err(|e| ElfError::CouldNotRead(e.to_string()))?;
    let file = ElfBytes::<AnyEndian>::minimal_parse(file_data.as_slice())?;
    let entry = file.ehdr.e_entry;

    let (section_headers, strtab) = file.section_headers_with_strtab()?;
    let (Some(section_headers), Some(strtab)) = (section_headers, strtab) else {
        // Nothing to load from a header-only image
        return Ok(entry);
    };

    for header in section_headers.iter() {
        // Only sections with file contents are loaded; .bss is
        // SHT_NOBITS and the memory is zero-initialised anyway
        if header.sh_flags & u64::from(SHF_ALLOC) == 0 || header.sh_type == SHT_NOBITS {
            continue;
        }
        let (data, compression) = file.section_data(&header)?;
        if compression.is_some() {
            let name = section_name(&header, &strtab).to_string();
            return Err(ElfError::CompressedSection(name));
        }
        for (offset, byte) in data.iter().enumerate() {
            let addr = header.sh_addr.wrapping_add(offset as u64);
            memory.write8(addr, *byte);
        }
    }
    Ok(entry)
}
