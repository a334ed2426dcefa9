use crate::error::CodecError;

/// Bit-addressed buffer with independent read and write cursors.
///
/// Bits are stored most-significant first inside each byte, so bit offset `p`
/// lives in byte `p / 8` at position `7 - p % 8`. Fields may start and end at
/// any bit, which is how the client packs sub-byte values across byte
/// boundaries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitCursor {
    data: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
}

impl BitCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            write_pos: 0,
            read_pos: 0,
        }
    }

    /// Wraps received bytes; the write cursor sits at the end of `data`.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let write_pos = data.len() * 8;
        Self {
            data,
            write_pos,
            read_pos: 0,
        }
    }

    pub fn bit_len(&self) -> usize {
        self.write_pos
    }

    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    pub fn remaining_bits(&self) -> usize {
        self.write_pos.saturating_sub(self.read_pos)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn reset(&mut self) {
        self.read_pos = 0;
    }

    pub fn write_bit(&mut self, bit: bool) {
        let byte = self.write_pos / 8;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.write_pos % 8);
        }
        self.write_pos += 1;
    }

    /// Writes the low `bits` of `value`, most significant bit first. Upper
    /// bits of `value` are dropped without complaint.
    pub fn write_int(&mut self, value: u64, bits: u32) {
        assert!(
            (1..=64).contains(&bits),
            "bit width must be within 1..=64, got {bits}"
        );
        for shift in (0..bits).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.write_pos % 8 == 0 {
            self.data.extend_from_slice(bytes);
            self.write_pos += bytes.len() * 8;
            return;
        }
        for &byte in bytes {
            self.write_int(u64::from(byte), 8);
        }
    }

    /// Zero-fills up to the next byte boundary.
    pub fn pad_to_byte(&mut self) {
        while self.write_pos % 8 != 0 {
            self.write_bit(false);
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, CodecError> {
        self.ensure_available(1)?;
        let byte = self.data[self.read_pos / 8];
        let bit = byte & (0x80 >> (self.read_pos % 8)) != 0;
        self.read_pos += 1;
        Ok(bit)
    }

    pub fn read_int(&mut self, bits: u32) -> Result<u64, CodecError> {
        assert!(
            (1..=64).contains(&bits),
            "bit width must be within 1..=64, got {bits}"
        );
        self.ensure_available(bits as usize)?;
        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_int(8)? as u8)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        self.ensure_available(len * 8)?;
        if self.read_pos % 8 == 0 {
            let start = self.read_pos / 8;
            self.read_pos += len * 8;
            return Ok(self.data[start..start + len].to_vec());
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_u8()?);
        }
        Ok(out)
    }

    pub fn skip_bits(&mut self, bits: usize) -> Result<(), CodecError> {
        self.ensure_available(bits)?;
        self.read_pos += bits;
        Ok(())
    }

    fn ensure_available(&self, needed: usize) -> Result<(), CodecError> {
        let available = self.remaining_bits();
        if needed > available {
            return Err(CodecError::UnexpectedEnd { needed, available });
        }
        Ok(())
    }
}
