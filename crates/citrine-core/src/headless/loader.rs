//! Raw headless program images.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "CTRH"
//! 4       1     flags (see HeadlessImage::*)
//! 5       1     system mode
//! 6       1     new-hardware mode
//! 7       1     reserved
//! 8       8     program id, little endian (0 = none)
//! ```
//!
//! Anything after the header is ignored.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use super::{HeadlessState, JournalGuard, Subsystem};
use crate::collab::{Loader, LoaderError, Process};

pub const IMAGE_MAGIC: [u8; 4] = *b"CTRH";
pub const IMAGE_HEADER_LEN: usize = 16;

/// Contents of a headless image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlessImage {
    pub flags: u8,
    pub system_mode: u8,
    pub n3ds_mode: u8,
    pub program_id: u64,
}

impl HeadlessImage {
    /// System mode detection reports an encrypted file.
    pub const ENCRYPTED: u8 = 1 << 0;
    /// System mode detection fails with a generic error.
    pub const SYSTEM_MODE_UNKNOWN: u8 = 1 << 1;
    /// Loading the process fails with a generic error.
    pub const LOAD_FAILS: u8 = 1 << 2;
    /// Loading the process reports an invalid format.
    pub const LOAD_INVALID: u8 = 1 << 3;
    /// Loading the process reports an encrypted file.
    pub const LOAD_ENCRYPTED: u8 = 1 << 4;

    pub fn new(program_id: u64) -> Self {
        Self {
            program_id,
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags |= flags;
        self
    }

    pub fn to_bytes(&self) -> [u8; IMAGE_HEADER_LEN] {
        let mut bytes = [0u8; IMAGE_HEADER_LEN];
        bytes[..4].copy_from_slice(&IMAGE_MAGIC);
        bytes[4] = self.flags;
        bytes[5] = self.system_mode;
        bytes[6] = self.n3ds_mode;
        bytes[8..].copy_from_slice(&self.program_id.to_le_bytes());
        bytes
    }

    fn parse(bytes: &[u8]) -> Result<Self, LoaderError> {
        let header = bytes
            .get(..IMAGE_HEADER_LEN)
            .ok_or(LoaderError::InvalidFormat)?;
        if header[..4] != IMAGE_MAGIC {
            return Err(LoaderError::InvalidFormat);
        }
        let mut program_id = [0u8; 8];
        program_id.copy_from_slice(&header[8..16]);
        Ok(Self {
            flags: header[4],
            system_mode: header[5],
            n3ds_mode: header[6],
            program_id: u64::from_le_bytes(program_id),
        })
    }

    fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

pub struct HeadlessLoader {
    name: String,
    image: Result<HeadlessImage, LoaderError>,
    _guard: JournalGuard,
}

impl HeadlessLoader {
    /// Opens `path` if it starts with the image magic. A truncated header is accepted here and
    /// reported as an invalid format by the loader calls.
    pub(crate) fn open(path: &Path, state: &Rc<HeadlessState>) -> Option<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %path.display(), %err, "cannot read program image");
                return None;
            }
        };
        if !bytes.starts_with(&IMAGE_MAGIC) {
            return None;
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(Self {
            name,
            image: HeadlessImage::parse(&bytes),
            _guard: JournalGuard::new(state, Subsystem::Loader),
        })
    }
}

impl Loader for HeadlessLoader {
    fn file_type(&self) -> &str {
        "headless"
    }

    fn load_kernel_system_mode(&mut self) -> Result<Option<u32>, LoaderError> {
        let image = self.image.clone()?;
        if image.has(HeadlessImage::ENCRYPTED) {
            return Err(LoaderError::Encrypted);
        }
        if image.has(HeadlessImage::SYSTEM_MODE_UNKNOWN) {
            return Err(LoaderError::Other(1));
        }
        Ok(Some(u32::from(image.system_mode)))
    }

    fn load_kernel_n3ds_mode(&mut self) -> Result<Option<u8>, LoaderError> {
        let image = self.image.clone()?;
        Ok(Some(image.n3ds_mode))
    }

    fn load(&mut self) -> Result<Process, LoaderError> {
        let image = self.image.clone()?;
        if image.has(HeadlessImage::LOAD_ENCRYPTED) {
            return Err(LoaderError::Encrypted);
        }
        if image.has(HeadlessImage::LOAD_INVALID) {
            return Err(LoaderError::InvalidFormat);
        }
        if image.has(HeadlessImage::LOAD_FAILS) {
            return Err(LoaderError::Other(2));
        }
        Ok(Process {
            name: self.name.clone(),
            program_id: image.program_id,
        })
    }

    fn read_program_id(&self) -> Result<u64, LoaderError> {
        match self.image.clone()? {
            HeadlessImage { program_id: 0, .. } => Err(LoaderError::Other(3)),
            image => Ok(image.program_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_layout() {
        let image = HeadlessImage {
            flags: HeadlessImage::LOAD_FAILS,
            system_mode: 2,
            n3ds_mode: 1,
            program_id: 0x0004_0000_0006_8B00,
        };
        let bytes = image.to_bytes();
        assert_eq!(&bytes[..4], b"CTRH");
        assert_eq!(bytes[4], 0b100);
        assert_eq!(&bytes[8..], &[0x00, 0x8B, 0x06, 0x00, 0x00, 0x00, 0x04, 0x00]);
        assert_eq!(HeadlessImage::parse(&bytes), Ok(image));
    }

    #[test]
    fn truncated_header_is_invalid() {
        assert_eq!(
            HeadlessImage::parse(b"CTRH\0\0"),
            Err(LoaderError::InvalidFormat)
        );
    }
}
