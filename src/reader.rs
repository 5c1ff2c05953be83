//! The boundary function spec.md §6.3 calls "read corpus from ELF path":
//! composes the ELF access layer and the DWARF-to-IR builder, which belong
//! to separate crates with their own typed errors, into one fallible
//! top-level call a driver program can use directly.

use std::borrow::Cow;
use std::path::Path;

use abg_dwarf::{Builder, BuilderOptions};
use abg_elf::{ElfReader, ReadStatus};
use abg_ir::{Corpus, Environment};
use anyhow::Context;

/// Reads `path` as an ELF object, locates its DWARF sections, and builds a
/// [`Corpus`] into `env`. Missing debug info or a missing symbol table are
/// not fatal (spec.md §7): they're folded into the returned [`ReadStatus`]
/// and the corpus is built from whatever the binary actually has.
pub fn read_corpus_from_elf(env: &mut Environment, path: impl AsRef<Path>) -> anyhow::Result<(Corpus, ReadStatus)> {
    let path = path.as_ref();
    let elf = ElfReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let status = elf.status;

    let file_data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let object_file =
        object::File::parse(&*file_data).with_context(|| format!("failed to parse {} as an object file", path.display()))?;

    let load_section = |id: gimli::SectionId| -> Result<Cow<[u8]>, gimli::Error> {
        use object::{Object, ObjectSection};
        match object_file.section_by_name(id.name()) {
            Some(section) => Ok(section.uncompressed_data().unwrap_or_default()),
            None => Ok(Cow::Borrowed(&[][..])),
        }
    };
    let dwarf_cow = gimli::Dwarf::load(load_section).context("failed to load DWARF sections")?;
    let endian = gimli::RunTimeEndian::Little;
    let dwarf = dwarf_cow.borrow(|section| gimli::EndianSlice::new(section, endian));

    let builder = Builder::new(env, &elf, &dwarf, None, BuilderOptions::default());
    let corpus = builder
        .read_debug_info_into_corpus()
        .with_context(|| format!("failed to build corpus from debug info in {}", path.display()))?;

    Ok((corpus, status))
}
