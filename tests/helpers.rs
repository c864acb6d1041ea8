//! Shared test utilities for zeropack tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use zeropack::PathScope;

/// Test environment with temporary source and target trees.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Mock installation (read-only input)
    pub source: PathBuf,
    /// Staging directory (deployment destination)
    pub target: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");

        fs::create_dir_all(&source).expect("Failed to create source dir");
        fs::create_dir_all(&target).expect("Failed to create target dir");

        Self {
            _temp_dir: temp_dir,
            source,
            target,
        }
    }

    pub fn source_scope(&self) -> PathScope {
        PathScope::new(&self.source).expect("Failed to create source scope")
    }

    pub fn target_scope(&self) -> PathScope {
        PathScope::new(&self.target).expect("Failed to create target scope")
    }
}

/// Write `content` to `root/rel` with `mode`, creating parents as needed.
pub fn write_file(root: &Path, rel: &str, content: &[u8], mode: u32) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&path, content).expect("Failed to write file");
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("Failed to set permissions");
    path
}

/// Create a mock Ghosts installation.
///
/// The server executable imports `user32.dll` (provided by the platform) and
/// `mydll.dll`, which is only written when `with_mydll` is set.
pub fn create_mock_installation(root: &Path, with_mydll: bool) {
    write_file(root, "main/fileSysCheck.cfg", b"// file system check\n", 0o644);
    write_file(root, "zone/common.ff", b"common fastfile", 0o644);
    write_file(root, "zone/mp_prisonbreak.ff", b"map fastfile", 0o644);
    write_file(root, "zone/readme.txt", b"not a fastfile", 0o644);
    write_file(root, "video/intro.bik", b"unneeded", 0o644);
    let exe = build_pe(&[
        ("USER32.dll", &["MessageBoxA"]),
        ("mydll.dll", &["Init", "Shutdown"]),
        ("user32.dll", &["GetCursorPos"]),
    ]);
    write_file(root, "iw6mp64_ship.exe", &exe, 0o755);
    if with_mydll {
        write_file(root, "mydll.dll", b"library", 0o755);
    }
}

/// Shape of an image produced by [`build_pe_with`].
#[derive(Debug, Clone, Copy)]
pub struct PeLayout {
    /// PE32+ (64-bit thunks) instead of PE32.
    pub wide: bool,
    /// Fill `OriginalFirstThunk`; when false only `FirstThunk` is set.
    pub original_thunks: bool,
}

impl Default for PeLayout {
    fn default() -> Self {
        Self {
            wide: true,
            original_thunks: true,
        }
    }
}

/// Build a minimal PE32+ image whose import table lists `imports` as
/// `(library, symbols)`. A symbol of the form `#N` is imported by ordinal.
pub fn build_pe(imports: &[(&str, &[&str])]) -> Vec<u8> {
    build_pe_with(imports, PeLayout::default())
}

/// Like [`build_pe`], with control over the image layout.
pub fn build_pe_with(imports: &[(&str, &[&str])], layout: PeLayout) -> Vec<u8> {
    const SECTION_RVA: u32 = 0x1000;
    const SECTION_OFFSET: usize = 0x200;
    const OPTIONAL_HEADER: usize = 0x58;

    // (magic, optional header size, offset of NumberOfRvaAndSizes, thunk size)
    let (magic, optional_size, dir_count_offset, thunk_size): (u16, u16, usize, usize) =
        if layout.wide {
            (0x20b, 240, 108, 8)
        } else {
            (0x10b, 224, 92, 4)
        };
    let ordinal_flag: u64 = if layout.wide { 1 << 63 } else { 1 << 31 };

    let descriptors_size = (imports.len() + 1) * 20;
    let mut section = vec![0u8; descriptors_size];

    for (i, (library, symbols)) in imports.iter().enumerate() {
        let mut entries = Vec::new();
        for symbol in symbols.iter() {
            if let Some(ordinal) = symbol.strip_prefix('#') {
                let ordinal: u64 = ordinal.parse().expect("ordinal must be numeric");
                entries.push(ordinal_flag | ordinal);
                continue;
            }
            let rva = SECTION_RVA + section.len() as u32;
            section.extend_from_slice(&[0, 0]);
            section.extend_from_slice(symbol.as_bytes());
            section.push(0);
            if section.len() % 2 == 1 {
                section.push(0);
            }
            entries.push(rva as u64);
        }

        while section.len() % thunk_size != 0 {
            section.push(0);
        }
        let thunks_rva = SECTION_RVA + section.len() as u32;
        for entry in entries.iter().chain(std::iter::once(&0u64)) {
            section.extend_from_slice(&entry.to_le_bytes()[..thunk_size]);
        }

        let name_rva = SECTION_RVA + section.len() as u32;
        section.extend_from_slice(library.as_bytes());
        section.push(0);

        let d = i * 20;
        if layout.original_thunks {
            section[d..d + 4].copy_from_slice(&thunks_rva.to_le_bytes());
        }
        section[d + 12..d + 16].copy_from_slice(&name_rva.to_le_bytes());
        section[d + 16..d + 20].copy_from_slice(&thunks_rva.to_le_bytes());
    }

    let mut image = vec![0u8; SECTION_OFFSET];
    image[0..2].copy_from_slice(b"MZ");
    image[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    image[0x40..0x44].copy_from_slice(b"PE\0\0");
    // COFF header: one section.
    let machine: u16 = if layout.wide { 0x8664 } else { 0x14c };
    image[0x44..0x46].copy_from_slice(&machine.to_le_bytes());
    image[0x46..0x48].copy_from_slice(&1u16.to_le_bytes());
    image[0x54..0x56].copy_from_slice(&optional_size.to_le_bytes());
    // Optional header with 16 data directories, #1 is imports.
    image[OPTIONAL_HEADER..OPTIONAL_HEADER + 2].copy_from_slice(&magic.to_le_bytes());
    let count = OPTIONAL_HEADER + dir_count_offset;
    image[count..count + 4].copy_from_slice(&16u32.to_le_bytes());
    let import_dir = count + 4 + 8;
    image[import_dir..import_dir + 4].copy_from_slice(&SECTION_RVA.to_le_bytes());
    image[import_dir + 4..import_dir + 8].copy_from_slice(&(descriptors_size as u32).to_le_bytes());
    // Section table right after the optional header.
    let header = OPTIONAL_HEADER + optional_size as usize;
    image[header..header + 8].copy_from_slice(b".idata\0\0");
    image[header + 8..header + 12].copy_from_slice(&(section.len() as u32).to_le_bytes());
    image[header + 12..header + 16].copy_from_slice(&SECTION_RVA.to_le_bytes());
    image[header + 16..header + 20].copy_from_slice(&(section.len() as u32).to_le_bytes());
    image[header + 20..header + 24].copy_from_slice(&(SECTION_OFFSET as u32).to_le_bytes());

    image.extend_from_slice(&section);
    image
}

/// Collect paths as `PathBuf`s.
pub fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &Path) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );

    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        target,
        expected_target,
        "Symlink {} points to {:?}, expected {:?}",
        path.display(),
        target,
        expected_target
    );
}

/// Assert that a path is a regular file (not a symlink) with `mode`.
pub fn assert_regular_file(path: &Path, mode: u32) {
    let meta = fs::symlink_metadata(path)
        .unwrap_or_else(|e| panic!("Expected file at {}: {}", path.display(), e));
    assert!(meta.is_file(), "Expected regular file at {}", path.display());
    assert_eq!(
        meta.permissions().mode() & 0o777,
        mode,
        "Unexpected mode for {}",
        path.display()
    );
}

/// Assert that a path does not exist (not even as a dangling symlink).
pub fn assert_missing(path: &Path) {
    assert!(
        fs::symlink_metadata(path).is_err(),
        "Expected nothing at {}",
        path.display()
    );
}
