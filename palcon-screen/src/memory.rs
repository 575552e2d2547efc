//! Guest linear-memory access for upload marshaling.
//!
//! The sandbox host owns the memory; the screen only ever reads from it, at
//! caller-supplied offsets. The trait is deliberately small so it can be
//! backed by a wasm linear-memory data view on the host side and by a plain
//! byte vector in tests.

/// Out-of-range guest memory access.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("guest memory access out of bounds: offset=0x{offset:x}, len=0x{len:x}")]
pub struct MemoryAccessError {
    /// Requested start offset in guest memory.
    pub offset: u32,
    /// Requested span in bytes.
    pub len: usize,
}

/// Read-only view of the sandbox's linear memory.
pub trait GuestMemory {
    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Errors
    /// Fails if any part of the range lies outside the memory.
    fn read(&self, offset: u32, dst: &mut [u8]) -> Result<(), MemoryAccessError>;

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Fails if any part of the range lies outside the memory.
    fn read_vec(&self, offset: u32, len: usize) -> Result<Vec<u8>, MemoryAccessError> {
        let mut buf = vec![0u8; len];
        self.read(offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads `count` little-endian 32-bit floats starting at `offset`.
    ///
    /// # Errors
    /// Fails if the byte range lies outside the memory.
    fn read_f32s(&self, offset: u32, count: u32) -> Result<Vec<f32>, MemoryAccessError> {
        let len = (count as usize)
            .checked_mul(size_of::<f32>())
            .ok_or(MemoryAccessError { offset, len: usize::MAX })?;
        let bytes = self.read_vec(offset, len)?;

        Ok(bytes
            .chunks_exact(size_of::<f32>())
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Reads a NUL-terminated byte string starting at `offset`, without the
    /// terminator.
    ///
    /// # Errors
    /// Fails if the string runs off the end of the memory before a NUL.
    fn read_cstr(&self, offset: u32) -> Result<Vec<u8>, MemoryAccessError> {
        let mut bytes = Vec::new();
        let mut at = offset;
        loop {
            let mut b = [0u8; 1];
            self.read(at, &mut b)?;
            if b[0] == 0 {
                return Ok(bytes);
            }
            bytes.push(b[0]);
            at = at.checked_add(1).ok_or(MemoryAccessError {
                offset,
                len: bytes.len() + 1,
            })?;
        }
    }
}

impl GuestMemory for [u8] {
    fn read(&self, offset: u32, dst: &mut [u8]) -> Result<(), MemoryAccessError> {
        let err = MemoryAccessError { offset, len: dst.len() };
        let start = offset as usize;
        let end = start.checked_add(dst.len()).ok_or(err.clone())?;
        let src = self.get(start..end).ok_or(err)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Contiguous in-memory guest RAM for tests.
#[derive(Clone, Debug)]
pub struct VecGuestMemory {
    mem: Vec<u8>,
}

impl VecGuestMemory {
    /// Allocates `size_bytes` of zeroed guest memory.
    pub fn new(size_bytes: usize) -> Self {
        Self { mem: vec![0u8; size_bytes] }
    }

    /// Copies `data` into the memory at `offset`.
    ///
    /// # Errors
    /// Fails if any part of the range lies outside the memory.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), MemoryAccessError> {
        let err = MemoryAccessError { offset, len: data.len() };
        let start = offset as usize;
        let end = start.checked_add(data.len()).ok_or(err.clone())?;
        let dst = self.mem.get_mut(start..end).ok_or(err)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    /// Writes `values` as little-endian 32-bit floats at `offset`.
    ///
    /// # Errors
    /// Fails if the byte range lies outside the memory.
    pub fn write_f32s(&mut self, offset: u32, values: &[f32]) -> Result<(), MemoryAccessError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write(offset, &bytes)
    }
}

impl GuestMemory for VecGuestMemory {
    fn read(&self, offset: u32, dst: &mut [u8]) -> Result<(), MemoryAccessError> {
        self.mem.as_slice().read(offset, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_within_bounds() {
        let mut mem = VecGuestMemory::new(16);
        mem.write(4, &[1, 2, 3, 4]).unwrap();

        let mut out = [0u8; 4];
        mem.read(4, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn read_past_end_fails() {
        let mem = VecGuestMemory::new(8);
        let mut out = [0u8; 4];

        let err = mem.read(6, &mut out).unwrap_err();
        assert_eq!(err, MemoryAccessError { offset: 6, len: 4 });
    }

    #[test]
    fn read_offset_overflow_fails() {
        let mem = VecGuestMemory::new(8);
        let mut out = [0u8; 2];
        assert!(mem.read(u32::MAX, &mut out).is_err());
    }

    #[test]
    fn f32_round_trip_little_endian() {
        let mut mem = VecGuestMemory::new(64);
        let values = [-1.0f32, 0.0, 0.5, 1.0, 123.456];
        mem.write_f32s(8, &values).unwrap();

        assert_eq!(mem.read_f32s(8, values.len() as u32).unwrap(), values);
    }

    #[test]
    fn f32_reads_are_byte_exact() {
        let mut mem = VecGuestMemory::new(8);
        // 1.0f32 in little-endian
        mem.write(0, &[0x00, 0x00, 0x80, 0x3f]).unwrap();
        assert_eq!(mem.read_f32s(0, 1).unwrap(), vec![1.0]);
    }

    #[test]
    fn cstr_stops_at_nul() {
        let mut mem = VecGuestMemory::new(16);
        mem.write(2, b"SONG.M2\0junk").unwrap();

        assert_eq!(mem.read_cstr(2).unwrap(), b"SONG.M2");
    }

    #[test]
    fn cstr_without_terminator_fails() {
        let mut mem = VecGuestMemory::new(4);
        mem.write(0, &[b'a'; 4]).unwrap();
        assert!(mem.read_cstr(0).is_err());
    }
}
