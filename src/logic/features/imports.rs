//! PE Import Table Parser
//!
//! Hand parser for the import directory of Windows PE binaries. Counts
//! import descriptors until the zero-filled terminator. Both PE32 (magic
//! 0x10B) and PE32+ (magic 0x20B) optional-header layouts are supported.
//!
//! Every multi-byte read is bounds-checked first; any malformed offset,
//! missing signature or truncated header aborts parsing and yields 0.
//! This function must never panic on hostile input.

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";

/// Offset of e_lfanew in the DOS header
const E_LFANEW_OFFSET: usize = 0x3C;

/// COFF file header size (follows the PE signature)
const COFF_HEADER_SIZE: usize = 20;

/// PE32 / PE32+ optional-header magic values
const MAGIC_PE32: u16 = 0x10B;
const MAGIC_PE32_PLUS: u16 = 0x20B;

/// Data-directory table offset inside the optional header
const DATA_DIR_OFFSET_PE32: usize = 96;
const DATA_DIR_OFFSET_PE32_PLUS: usize = 112;

/// One import descriptor (IMAGE_IMPORT_DESCRIPTOR) is 20 bytes
const IMPORT_DESCRIPTOR_SIZE: usize = 20;

/// Section header size and field offsets
const SECTION_HEADER_SIZE: usize = 40;

/// Count entries in the import directory table.
///
/// Returns 0 for anything that is not a well-formed PE with an import
/// directory: wrong magic, truncated headers, out-of-bounds offsets,
/// missing directory, or a descriptor walk that runs past the buffer.
pub fn count_imports(data: &[u8]) -> u32 {
    parse_import_count(data).unwrap_or(0)
}

fn parse_import_count(data: &[u8]) -> Option<u32> {
    // DOS header
    if data.len() < E_LFANEW_OFFSET + 4 || &data[0..2] != DOS_MAGIC {
        return None;
    }
    let pe_offset = read_u32(data, E_LFANEW_OFFSET)? as usize;

    // PE signature
    if data.get(pe_offset..pe_offset + 4)? != PE_SIGNATURE {
        return None;
    }

    // COFF header
    let coff = pe_offset + 4;
    let section_count = read_u16(data, coff + 2)? as usize;
    let opt_header_size = read_u16(data, coff + 16)? as usize;

    // Optional header: the magic discriminates PE32 from PE32+
    let opt = coff + COFF_HEADER_SIZE;
    let data_dir = match read_u16(data, opt)? {
        MAGIC_PE32 => opt + DATA_DIR_OFFSET_PE32,
        MAGIC_PE32_PLUS => opt + DATA_DIR_OFFSET_PE32_PLUS,
        _ => return None,
    };

    // Import directory is the second data-directory entry
    let import_rva = read_u32(data, data_dir + 8)?;
    if import_rva == 0 {
        return None;
    }

    // Section table follows the optional header
    let section_table = opt + opt_header_size;
    let import_offset = rva_to_offset(data, section_table, section_count, import_rva)?;

    // Walk descriptors until the zero-filled terminator
    let mut count = 0u32;
    let mut cursor = import_offset;
    loop {
        let descriptor = data.get(cursor..cursor + IMPORT_DESCRIPTOR_SIZE)?;
        if descriptor.iter().all(|&b| b == 0) {
            return Some(count);
        }
        count += 1;
        cursor += IMPORT_DESCRIPTOR_SIZE;
    }
}

/// Translate an RVA to a file offset through the section table.
fn rva_to_offset(data: &[u8], section_table: usize, section_count: usize, rva: u32) -> Option<usize> {
    for i in 0..section_count {
        let header = section_table + i * SECTION_HEADER_SIZE;
        let virtual_size = read_u32(data, header + 8)?;
        let virtual_address = read_u32(data, header + 12)?;
        let raw_size = read_u32(data, header + 16)?;
        let raw_pointer = read_u32(data, header + 20)?;

        let span = virtual_size.max(raw_size);
        if rva >= virtual_address && rva < virtual_address.checked_add(span)? {
            let offset = raw_pointer.checked_add(rva - virtual_address)? as usize;
            if offset < data.len() {
                return Some(offset);
            }
            return None;
        }
    }
    None
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// ============================================================================
// TESTS
// ============================================================================
