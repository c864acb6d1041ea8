//! Minimal reader for the import table of PE32 / PE32+ images.
//!
//! Only what is needed to list imported symbols is parsed: the DOS stub
//! pointer, the COFF header, the optional header's data directories, the
//! section table (to map RVAs to file offsets) and the import descriptors.

use thiserror::Error;

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const E_LFANEW_OFFSET: usize = 0x3c;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;
const IMPORT_DESCRIPTOR_SIZE: usize = 20;

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;

/// Index of the import table in the data directory array.
const IMPORT_DIRECTORY: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeError {
    #[error("missing MZ signature")]
    NotDos,
    #[error("missing PE signature at offset {0:#x}")]
    NotPe(usize),
    #[error("unsupported optional header magic {0:#x}")]
    UnknownMagic(u16),
    #[error("image truncated at offset {0:#x}")]
    Truncated(usize),
    #[error("RVA {0:#x} is not mapped by any section")]
    UnmappedRva(u32),
    #[error("unterminated string at offset {0:#x}")]
    UnterminatedString(usize),
}

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_pointer: u32,
    raw_size: u32,
}

struct Image<'a> {
    data: &'a [u8],
    wide: bool,
    sections: Vec<Section>,
}

fn bytes_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8], PeError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(PeError::Truncated(offset))
}

fn u16_at(data: &[u8], offset: usize) -> Result<u16, PeError> {
    let b = bytes_at(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(data: &[u8], offset: usize) -> Result<u32, PeError> {
    let b = bytes_at(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn u64_at(data: &[u8], offset: usize) -> Result<u64, PeError> {
    let b = bytes_at(data, offset, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    Ok(u64::from_le_bytes(buf))
}

fn cstr_at(data: &[u8], offset: usize) -> Result<String, PeError> {
    let tail = data.get(offset..).ok_or(PeError::Truncated(offset))?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(PeError::UnterminatedString(offset))?;
    Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
}

impl<'a> Image<'a> {
    /// Parse headers and return the image plus the import directory RVA,
    /// if the image has one.
    fn parse(data: &'a [u8]) -> Result<(Self, Option<u32>), PeError> {
        if bytes_at(data, 0, 2).map_err(|_| PeError::NotDos)? != DOS_MAGIC {
            return Err(PeError::NotDos);
        }
        let pe_offset = u32_at(data, E_LFANEW_OFFSET)? as usize;
        if bytes_at(data, pe_offset, 4)? != PE_SIGNATURE {
            return Err(PeError::NotPe(pe_offset));
        }

        let coff = pe_offset + 4;
        let section_count = u16_at(data, coff + 2)? as usize;
        let optional_size = u16_at(data, coff + 16)? as usize;

        let optional = coff + COFF_HEADER_SIZE;
        let (wide, dirs_count_offset) = match u16_at(data, optional)? {
            PE32_MAGIC => (false, 92),
            PE32_PLUS_MAGIC => (true, 108),
            other => return Err(PeError::UnknownMagic(other)),
        };
        let dir_count = u32_at(data, optional + dirs_count_offset)?;
        let import_rva = if dir_count > IMPORT_DIRECTORY {
            let entry = optional + dirs_count_offset + 4 + 8 * IMPORT_DIRECTORY as usize;
            let rva = u32_at(data, entry)?;
            let size = u32_at(data, entry + 4)?;
            (rva != 0 && size != 0).then_some(rva)
        } else {
            None
        };

        let table = optional + optional_size;
        let sections = (0..section_count)
            .map(|i| {
                let header = table + i * SECTION_HEADER_SIZE;
                Ok(Section {
                    virtual_size: u32_at(data, header + 8)?,
                    virtual_address: u32_at(data, header + 12)?,
                    raw_size: u32_at(data, header + 16)?,
                    raw_pointer: u32_at(data, header + 20)?,
                })
            })
            .collect::<Result<Vec<_>, PeError>>()?;

        Ok((
            Self {
                data,
                wide,
                sections,
            },
            import_rva,
        ))
    }

    fn offset_of(&self, rva: u32) -> Result<usize, PeError> {
        self.sections
            .iter()
            .find(|s| {
                let span = s.virtual_size.max(s.raw_size);
                rva >= s.virtual_address && rva - s.virtual_address < span
            })
            .map(|s| (rva - s.virtual_address) as usize + s.raw_pointer as usize)
            .ok_or(PeError::UnmappedRva(rva))
    }

    /// Walk one thunk table, returning a symbol name per entry.
    fn thunk_symbols(&self, rva: u32) -> Result<Vec<String>, PeError> {
        let mut offset = self.offset_of(rva)?;
        let mut symbols = Vec::new();
        loop {
            let (value, ordinal_flag, step) = if self.wide {
                (u64_at(self.data, offset)?, 1u64 << 63, 8)
            } else {
                (u32_at(self.data, offset)? as u64, 1u64 << 31, 4)
            };
            if value == 0 {
                break;
            }
            if value & ordinal_flag != 0 {
                // Kept so a library imported only by ordinal is still required.
                symbols.push(format!("#{}", value & 0xffff));
            } else {
                // Skip the two-byte hint before the name.
                let name_offset = self.offset_of((value & 0x7fff_ffff) as u32)? + 2;
                symbols.push(cstr_at(self.data, name_offset)?);
            }
            offset += step;
        }
        Ok(symbols)
    }
}

/// List every imported symbol as `symbol:library`.
///
/// Ordinal-only imports are reported as `#<ordinal>:library`. An image
/// without an import directory has no symbols.
pub fn imported_symbols(data: &[u8]) -> Result<Vec<String>, PeError> {
    let (image, import_rva) = Image::parse(data)?;
    let Some(import_rva) = import_rva else {
        return Ok(Vec::new());
    };

    let mut symbols = Vec::new();
    let mut descriptor = image.offset_of(import_rva)?;
    loop {
        let original_first_thunk = u32_at(data, descriptor)?;
        let name_rva = u32_at(data, descriptor + 12)?;
        let first_thunk = u32_at(data, descriptor + 16)?;
        if original_first_thunk == 0 && name_rva == 0 && first_thunk == 0 {
            break;
        }

        let library = cstr_at(data, image.offset_of(name_rva)?)?;
        let thunks = if original_first_thunk != 0 {
            original_first_thunk
        } else {
            first_thunk
        };
        for symbol in image.thunk_symbols(thunks)? {
            symbols.push(format!("{}:{}", symbol, library));
        }
        descriptor += IMPORT_DESCRIPTOR_SIZE;
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_dos_image() {
        assert_eq!(imported_symbols(b"\x7fELF\x02\x01\x01"), Err(PeError::NotDos));
        assert_eq!(imported_symbols(b""), Err(PeError::NotDos));
    }

    #[test]
    fn test_rejects_missing_pe_signature() {
        let mut data = vec![0u8; 0x80];
        data[..2].copy_from_slice(b"MZ");
        data[0x3c] = 0x40;
        assert_eq!(imported_symbols(&data), Err(PeError::NotPe(0x40)));
    }

    #[test]
    fn test_rejects_truncated_headers() {
        let mut data = vec![0u8; 0x48];
        data[..2].copy_from_slice(b"MZ");
        data[0x3c] = 0x40;
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        assert!(matches!(imported_symbols(&data), Err(PeError::Truncated(_))));
    }

    #[test]
    fn test_rejects_unknown_optional_magic() {
        let mut data = vec![0u8; 0x200];
        data[..2].copy_from_slice(b"MZ");
        data[0x3c] = 0x40;
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        data[0x58..0x5a].copy_from_slice(&0x107u16.to_le_bytes());
        assert_eq!(imported_symbols(&data), Err(PeError::UnknownMagic(0x107)));
    }

    #[test]
    fn test_image_without_import_directory_has_no_symbols() {
        let mut data = vec![0u8; 0x200];
        data[..2].copy_from_slice(b"MZ");
        data[0x3c] = 0x40;
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        // PE32+ optional header with zero data directories.
        data[0x58..0x5a].copy_from_slice(&PE32_PLUS_MAGIC.to_le_bytes());
        assert_eq!(imported_symbols(&data), Ok(Vec::new()));
    }

    #[test]
    fn test_cstr_requires_terminator() {
        assert_eq!(cstr_at(b"user32.dll\0rest", 0), Ok("user32.dll".to_string()));
        assert_eq!(cstr_at(b"abc", 0), Err(PeError::UnterminatedString(0)));
    }
}
