//! Ordinary TON cells: up to 1023 data bits and 4 references, addressed by the
//! SHA-256 of their standard representation.

use sha2::{Digest as _, Sha256};
use std::sync::Arc;

use super::address::TonAddress;

pub const MAX_CELL_BITS: usize = 1023;
pub const MAX_CELL_REFS: usize = 4;

/// Largest value `Grams`/`Coins` (`VarUInteger 16`) can carry: 15 bytes.
const MAX_COINS_BYTES: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    /// Build a cell from packed bits (MSB first, unused tail bits zero) and children.
    pub fn new(data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Self>>) -> eyre::Result<Self> {
        if bit_len > MAX_CELL_BITS {
            eyre::bail!("cell overflow: {bit_len} bits");
        }
        if refs.len() > MAX_CELL_REFS {
            eyre::bail!("cell overflow: {} refs", refs.len());
        }
        if data.len() != bit_len.div_ceil(8) {
            eyre::bail!("cell data length does not match bit length");
        }

        let depth = match refs.iter().map(|r| r.depth).max() {
            None => 0,
            Some(d) => d
                .checked_add(1)
                .ok_or_else(|| eyre::eyre!("cell depth overflow"))?,
        };

        let mut cell = Self {
            data,
            bit_len,
            refs,
            hash: [0_u8; 32],
            depth,
        };
        cell.hash = Sha256::digest(cell.representation()).into();
        Ok(cell)
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Self>] {
        &self.refs
    }

    pub const fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub const fn depth(&self) -> u16 {
        self.depth
    }

    /// Refs descriptor byte (ordinary cell, level 0).
    pub fn d1(&self) -> u8 {
        // refs.len() <= 4 is enforced in `new`.
        u8::try_from(self.refs.len()).unwrap_or(0)
    }

    /// Bits descriptor byte: floor(bits/8) + ceil(bits/8).
    pub fn d2(&self) -> u8 {
        let v = self.bit_len / 8 + self.bit_len.div_ceil(8);
        // bit_len <= 1023 keeps this <= 255.
        u8::try_from(v).unwrap_or(u8::MAX)
    }

    /// Data bytes with the completion tag appended when the bit length is not byte aligned.
    pub fn data_with_completion_tag(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        let rem = self.bit_len % 8;
        if rem != 0 {
            if let Some(last) = out.last_mut() {
                *last |= 0x80 >> rem;
            }
        }
        out
    }

    fn representation(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.data.len() + self.refs.len() * 34);
        out.push(self.d1());
        out.push(self.d2());
        out.extend_from_slice(&self.data_with_completion_tag());
        for r in &self.refs {
            out.extend_from_slice(&r.depth().to_be_bytes());
        }
        for r in &self.refs {
            out.extend_from_slice(&r.hash);
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_bit(&mut self, bit: bool) -> eyre::Result<&mut Self> {
        if self.bit_len >= MAX_CELL_BITS {
            eyre::bail!("cell overflow: more than {MAX_CELL_BITS} bits");
        }
        let byte_idx = self.bit_len / 8;
        if byte_idx == self.data.len() {
            self.data.push(0);
        }
        if bit {
            if let Some(b) = self.data.get_mut(byte_idx) {
                *b |= 0x80 >> (self.bit_len % 8);
            }
        }
        self.bit_len += 1;
        Ok(self)
    }

    /// Store the low `bits` bits of `value`, most significant first.
    pub fn store_uint(&mut self, value: u128, bits: usize) -> eyre::Result<&mut Self> {
        if bits > 128 {
            eyre::bail!("store_uint supports at most 128 bits (got {bits})");
        }
        if bits < 128 && value >> bits != 0 {
            eyre::bail!("value {value} does not fit in {bits} bits");
        }
        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }
        Ok(self)
    }

    pub fn store_u8(&mut self, value: u8) -> eyre::Result<&mut Self> {
        self.store_uint(u128::from(value), 8)
    }

    pub fn store_u32(&mut self, value: u32) -> eyre::Result<&mut Self> {
        self.store_uint(u128::from(value), 32)
    }

    pub fn store_u64(&mut self, value: u64) -> eyre::Result<&mut Self> {
        self.store_uint(u128::from(value), 64)
    }

    pub fn store_i8(&mut self, value: i8) -> eyre::Result<&mut Self> {
        self.store_u8(value.to_be_bytes()[0])
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> eyre::Result<&mut Self> {
        for &b in bytes {
            self.store_u8(b)?;
        }
        Ok(self)
    }

    /// `VarUInteger 16`: 4-bit byte length followed by the big-endian value.
    pub fn store_coins(&mut self, amount: u128) -> eyre::Result<&mut Self> {
        if amount == 0 {
            return self.store_uint(0, 4);
        }
        let be = amount.to_be_bytes();
        let skip = be.iter().take_while(|&&b| b == 0).count();
        let len = be.len() - skip;
        if len > MAX_COINS_BYTES {
            eyre::bail!("coin amount too large: {amount}");
        }
        // len <= 15 fits the 4-bit length prefix.
        self.store_uint(len as u128, 4)?;
        self.store_bytes(be.get(skip..).unwrap_or_default())
    }

    /// `MsgAddress`: `addr_none$00` or `addr_std$10` without anycast.
    pub fn store_address(&mut self, addr: Option<&TonAddress>) -> eyre::Result<&mut Self> {
        match addr {
            None => self.store_uint(0, 2),
            Some(a) => {
                self.store_uint(0b10, 2)?;
                self.store_bit(false)?;
                self.store_i8(a.workchain)?;
                self.store_bytes(&a.hash)
            }
        }
    }

    pub fn store_ref(&mut self, cell: Arc<Cell>) -> eyre::Result<&mut Self> {
        if self.refs.len() >= MAX_CELL_REFS {
            eyre::bail!("cell overflow: more than {MAX_CELL_REFS} refs");
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// Append all bits and refs of `cell`.
    pub fn store_cell(&mut self, cell: &Cell) -> eyre::Result<&mut Self> {
        for i in 0..cell.bit_len() {
            let byte = cell.data().get(i / 8).copied().unwrap_or(0);
            self.store_bit(byte & (0x80 >> (i % 8)) != 0)?;
        }
        for r in cell.refs() {
            self.store_ref(Arc::clone(r))?;
        }
        Ok(self)
    }

    pub fn build(&self) -> eyre::Result<Arc<Cell>> {
        Ok(Arc::new(Cell::new(
            self.data.clone(),
            self.bit_len,
            self.refs.clone(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_hash_is_stable() -> eyre::Result<()> {
        let c = CellBuilder::new().build()?;
        // sha256(0x00 0x00)
        assert_eq!(
            hex::encode(c.hash()),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
        assert_eq!(c.depth(), 0);
        Ok(())
    }

    #[test]
    fn completion_tag_marks_unaligned_data() -> eyre::Result<()> {
        let mut b = CellBuilder::new();
        b.store_uint(0b00110, 5)?;
        let c = b.build()?;
        assert_eq!(c.bit_len(), 5);
        assert_eq!(c.d2(), 1);
        assert_eq!(c.data_with_completion_tag(), vec![0b0011_0100]);
        Ok(())
    }

    #[test]
    fn depth_grows_with_refs() -> eyre::Result<()> {
        let leaf = CellBuilder::new().build()?;
        let mut mid = CellBuilder::new();
        mid.store_ref(Arc::clone(&leaf))?;
        let mid = mid.build()?;
        let mut top = CellBuilder::new();
        top.store_ref(Arc::clone(&mid))?.store_ref(leaf)?;
        let top = top.build()?;
        assert_eq!(mid.depth(), 1);
        assert_eq!(top.depth(), 2);
        assert_eq!(top.d1(), 2);
        Ok(())
    }

    #[test]
    fn rejects_overflow() -> eyre::Result<()> {
        let mut b = CellBuilder::new();
        for _ in 0..MAX_CELL_BITS {
            b.store_bit(true)?;
        }
        assert!(b.store_bit(false).is_err());

        let leaf = CellBuilder::new().build()?;
        let mut r = CellBuilder::new();
        for _ in 0..MAX_CELL_REFS {
            r.store_ref(Arc::clone(&leaf))?;
        }
        assert!(r.store_ref(leaf).is_err());

        assert!(CellBuilder::new().store_uint(4, 2).is_err());
        Ok(())
    }

    #[test]
    fn coins_use_minimal_length_prefix() -> eyre::Result<()> {
        let mut b = CellBuilder::new();
        b.store_coins(0)?;
        assert_eq!(b.build()?.bit_len(), 4);

        let mut b = CellBuilder::new();
        b.store_coins(500_000_000)?; // 0x1DCD6500 -> 4 bytes
        let c = b.build()?;
        assert_eq!(c.bit_len(), 4 + 32);
        assert_eq!(c.data(), &[0x41, 0xDC, 0xD6, 0x50, 0x00]);
        Ok(())
    }

    #[test]
    fn store_cell_appends_bits_and_refs() -> eyre::Result<()> {
        let leaf = CellBuilder::new().build()?;
        let mut inner = CellBuilder::new();
        inner.store_uint(0b101, 3)?.store_ref(leaf)?;
        let inner = inner.build()?;

        let mut outer = CellBuilder::new();
        outer.store_bit(true)?.store_cell(&inner)?;
        let outer = outer.build()?;
        assert_eq!(outer.bit_len(), 4);
        assert_eq!(outer.data(), &[0b1101_0000]);
        assert_eq!(outer.refs().len(), 1);
        Ok(())
    }
}
