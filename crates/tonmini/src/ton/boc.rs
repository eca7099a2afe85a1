//! Bag-of-cells container (`serialized_boc#b5ee9c72`), single root.

use crc::{Crc, CRC_32_ISCSI};
use std::collections::HashMap;
use std::sync::Arc;

use super::cell::Cell;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const FLAG_HAS_IDX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;
const FLAG_HAS_CACHE_BITS: u8 = 0x20;

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> eyre::Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| eyre::eyre!("boc offset overflow"))?;
        let out = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| eyre::eyre!("boc truncated at byte {}", self.pos))?;
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> eyre::Result<u8> {
        Ok(self.take(1)?.first().copied().unwrap_or(0))
    }

    fn uint(&mut self, n: usize) -> eyre::Result<usize> {
        let mut v = 0_usize;
        for &b in self.take(n)? {
            v = v
                .checked_mul(256)
                .and_then(|x| x.checked_add(usize::from(b)))
                .ok_or_else(|| eyre::eyre!("boc integer overflow"))?;
        }
        Ok(v)
    }
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
}

fn read_raw_cell(r: &mut Reader<'_>, ref_size: usize) -> eyre::Result<RawCell> {
    let d1 = r.u8()?;
    let d2 = r.u8()?;
    if d1 & 0x08 != 0 {
        eyre::bail!("exotic cells are not supported");
    }
    if d1 & 0x10 != 0 || d1 >> 5 != 0 {
        eyre::bail!("cells with stored hashes or non-zero level are not supported");
    }
    let ref_count = usize::from(d1 & 0x07);
    if ref_count > super::cell::MAX_CELL_REFS {
        eyre::bail!("cell declares {ref_count} refs");
    }

    let byte_len = usize::from(d2).div_ceil(2);
    let mut data = r.take(byte_len)?.to_vec();
    let bit_len = if d2 % 2 == 0 {
        byte_len * 8
    } else {
        let Some(last) = data.last_mut() else {
            eyre::bail!("unaligned cell without data");
        };
        if *last == 0 {
            eyre::bail!("missing completion tag");
        }
        let tz = last.trailing_zeros() as usize;
        *last &= !(1_u8 << tz);
        byte_len * 8 - tz - 1
    };

    let mut refs = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        refs.push(r.uint(ref_size)?);
    }
    Ok(RawCell {
        data,
        bit_len,
        refs,
    })
}

pub fn parse_boc(bytes: &[u8]) -> eyre::Result<Arc<Cell>> {
    let mut r = Reader::new(bytes);
    if r.take(4)? != BOC_MAGIC {
        eyre::bail!("not a bag of cells (bad magic)");
    }
    let flags = r.u8()?;
    let has_idx = flags & FLAG_HAS_IDX != 0;
    let has_crc = flags & FLAG_HAS_CRC32C != 0;
    if flags & FLAG_HAS_CACHE_BITS != 0 {
        eyre::bail!("boc cache bits are not supported");
    }
    let ref_size = usize::from(flags & 0x07);
    if !(1..=4).contains(&ref_size) {
        eyre::bail!("invalid boc ref size {ref_size}");
    }
    let off_size = usize::from(r.u8()?);
    if !(1..=8).contains(&off_size) {
        eyre::bail!("invalid boc offset size {off_size}");
    }

    let cell_count = r.uint(ref_size)?;
    let root_count = r.uint(ref_size)?;
    let _absent = r.uint(ref_size)?;
    let _total_size = r.uint(off_size)?;
    if root_count != 1 {
        eyre::bail!("expected exactly one root cell (got {root_count})");
    }
    let root_idx = r.uint(ref_size)?;
    if has_idx {
        r.take(
            cell_count
                .checked_mul(off_size)
                .ok_or_else(|| eyre::eyre!("boc index overflow"))?,
        )?;
    }

    let mut raw = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        raw.push(read_raw_cell(&mut r, ref_size)?);
    }

    if has_crc {
        let body_end = r.pos;
        let stored = r.take(4)?;
        let expected = CRC32C.checksum(bytes.get(..body_end).unwrap_or_default());
        if stored != expected.to_le_bytes() {
            eyre::bail!("boc crc32c mismatch");
        }
    }

    // Children always follow their parents, so build from the tail.
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (idx, rc) in raw.into_iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(rc.refs.len());
        for ri in rc.refs {
            if ri <= idx {
                eyre::bail!("cell {idx} references non-descendant cell {ri}");
            }
            let child = built
                .get(ri)
                .and_then(Option::as_ref)
                .ok_or_else(|| eyre::eyre!("cell {idx} references missing cell {ri}"))?;
            refs.push(Arc::clone(child));
        }
        let cell = Cell::new(rc.data, rc.bit_len, refs)?;
        if let Some(slot) = built.get_mut(idx) {
            *slot = Some(Arc::new(cell));
        }
    }

    built
        .get(root_idx)
        .and_then(Option::as_ref)
        .map(Arc::clone)
        .ok_or_else(|| eyre::eyre!("boc root index {root_idx} out of range"))
}

/// Reverse post-order with deduplication by hash, so every parent precedes its children.
fn topological_order(root: &Arc<Cell>) -> Vec<Arc<Cell>> {
    fn visit(
        cell: &Arc<Cell>,
        seen: &mut HashMap<[u8; 32], ()>,
        post: &mut Vec<Arc<Cell>>,
    ) {
        if seen.insert(*cell.hash(), ()).is_some() {
            return;
        }
        for r in cell.refs().iter().rev() {
            visit(r, seen, post);
        }
        post.push(Arc::clone(cell));
    }

    let mut seen = HashMap::new();
    let mut post = vec![];
    visit(root, &mut seen, &mut post);
    post.reverse();
    post
}

fn bytes_needed(v: usize) -> usize {
    let bits = usize::BITS - v.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

fn push_be(out: &mut Vec<u8>, v: usize, width: usize) {
    let be = v.to_be_bytes();
    let start = be.len().saturating_sub(width);
    out.extend_from_slice(be.get(start..).unwrap_or_default());
}

pub fn serialize_boc(root: &Arc<Cell>, with_crc: bool) -> eyre::Result<Vec<u8>> {
    let order = topological_order(root);
    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, c)| (*c.hash(), i))
        .collect();

    let ref_size = bytes_needed(order.len());
    if ref_size > 4 {
        eyre::bail!("too many cells for a boc");
    }

    let mut cells_data = vec![];
    for cell in &order {
        cells_data.push(cell.d1());
        cells_data.push(cell.d2());
        cells_data.extend_from_slice(&cell.data_with_completion_tag());
        for r in cell.refs() {
            let i = index
                .get(r.hash())
                .copied()
                .ok_or_else(|| eyre::eyre!("unindexed child cell"))?;
            push_be(&mut cells_data, i, ref_size);
        }
    }
    let off_size = bytes_needed(cells_data.len());

    let mut out = Vec::with_capacity(16 + cells_data.len());
    out.extend_from_slice(&BOC_MAGIC);
    let mut flags = u8::try_from(ref_size)?;
    if with_crc {
        flags |= FLAG_HAS_CRC32C;
    }
    out.push(flags);
    out.push(u8::try_from(off_size)?);
    push_be(&mut out, order.len(), ref_size);
    push_be(&mut out, 1, ref_size);
    push_be(&mut out, 0, ref_size);
    push_be(&mut out, cells_data.len(), off_size);
    push_be(&mut out, 0, ref_size);
    out.extend_from_slice(&cells_data);
    if with_crc {
        let crc = CRC32C.checksum(&out);
        out.extend_from_slice(&crc.to_le_bytes());
    }
    Ok(out)
}
