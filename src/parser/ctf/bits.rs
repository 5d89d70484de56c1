//! Bit-addressed reader over a CTF stream buffer.

use super::metadata::ByteOrder;

/// Cursor over a byte buffer with bit granularity
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position in bits from the start of the buffer
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, bit: u64) {
        self.pos = bit;
    }

    pub fn len_bits(&self) -> u64 {
        self.data.len() as u64 * 8
    }

    pub fn remaining_bits(&self) -> u64 {
        self.len_bits().saturating_sub(self.pos)
    }

    /// Advance to the next multiple of `align` bits
    pub fn align_to(&mut self, align: u32) {
        let align = u64::from(align.max(1));
        let rem = self.pos % align;
        if rem != 0 {
            self.pos += align - rem;
        }
    }

    /// Read an unsigned integer of `size` bits (1..=64)
    pub fn read_bits(&mut self, size: u32, order: ByteOrder) -> Option<u64> {
        if size == 0 || size > 64 || self.remaining_bits() < u64::from(size) {
            return None;
        }

        let value = if self.pos % 8 == 0 && size % 8 == 0 {
            let start = (self.pos / 8) as usize;
            let bytes = &self.data[start..start + (size / 8) as usize];
            match order {
                ByteOrder::Little => bytes
                    .iter()
                    .rev()
                    .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
                ByteOrder::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
            }
        } else {
            let mut value = 0u64;
            for i in 0..u64::from(size) {
                let bit_index = self.pos + i;
                let byte = self.data[(bit_index / 8) as usize];
                let shift = bit_index % 8;
                match order {
                    // Little endian bitfields fill each byte from its least significant bit
                    ByteOrder::Little => value |= u64::from((byte >> shift) & 1) << i,
                    ByteOrder::Big => value = (value << 1) | u64::from((byte >> (7 - shift)) & 1),
                }
            }
            value
        };

        self.pos += u64::from(size);
        Some(value)
    }

    /// Read a NUL-terminated string starting on a byte boundary
    pub fn read_cstring(&mut self) -> Option<String> {
        self.align_to(8);
        let start = (self.pos / 8) as usize;
        let rest = self.data.get(start..)?;
        let len = rest.iter().position(|&b| b == 0)?;
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += (len as u64 + 1) * 8;
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_reads() {
        let data = [0x78, 0x56, 0x34, 0x12, 0x12, 0x34];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(32, ByteOrder::Little), Some(0x1234_5678));
        assert_eq!(reader.read_bits(16, ByteOrder::Big), Some(0x1234));
        assert_eq!(reader.read_bits(8, ByteOrder::Little), None);
    }

    #[test]
    fn test_compact_header_bitfields() {
        // id = 3 in the low 5 bits, timestamp = 0x12345 in the next 27 bits
        let word: u32 = 3 | (0x12345 << 5);
        let data = word.to_le_bytes();
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(5, ByteOrder::Little), Some(3));
        assert_eq!(reader.read_bits(27, ByteOrder::Little), Some(0x12345));
        assert_eq!(reader.position(), 32);
    }

    #[test]
    fn test_big_endian_bitfields() {
        let data = [0b1010_0000];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3, ByteOrder::Big), Some(0b101));
    }

    #[test]
    fn test_alignment_and_strings() {
        let data = [0x01, b'h', b'i', 0x00, 0xAA];
        let mut reader = BitReader::new(&data);
        reader.read_bits(3, ByteOrder::Little);
        assert_eq!(reader.read_cstring(), Some("hi".to_string()));
        assert_eq!(reader.position(), 32);
        reader.align_to(8);
        assert_eq!(reader.read_bits(8, ByteOrder::Little), Some(0xAA));
    }
}
