use crate::block_store::BlockStore;
use crate::BLOCK_BITS;
use crate::{FsError, Result};

/// 位图块内部按 u64 分组
const GROUPS_PER_BLOCK: usize = BLOCK_BITS / 64;

/// 位图区域，每个块 ID 对应一位，1 表示已分配
///
/// 位图覆盖整个设备，但只有 `[first_data_block, total_blocks)` 参与分配与释放；
/// 保留区域（超级块、位图、inode 表）的位永远不会被置上。
#[derive(Debug)]
pub struct Bitmap {
    /// 位图的起始块
    start_block_id: u32,
    /// 位图占用块数
    blocks: u32,
    /// 第一个可分配的块
    first_data_block: u32,
    /// 设备总块数
    total_blocks: u32,
}

/// 块编号
struct BlockID(u32);

impl Bitmap {
    #[inline]
    pub fn new(start_block_id: u32, blocks: u32, first_data_block: u32, total_blocks: u32) -> Self {
        Self {
            start_block_id,
            blocks,
            first_data_block,
            total_blocks,
        }
    }

    /// 可分配的总块数
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.total_blocks - self.first_data_block
    }

    /// 分配编号最小的空闲块，返回其ID；空间用尽时返回 [`FsError::OutOfSpace`]
    pub fn alloc(&self, store: &BlockStore) -> Result<u32> {
        let first_index = self.first_data_block / BLOCK_BITS as u32;

        // 起始块ID + 块索引 = 位图块的实际ID
        for block_index in first_index..self.blocks {
            let bitmap_block_id = self.start_block_id + block_index;
            let mut data_block = store.read(bitmap_block_id)?;

            let found = (0..GROUPS_PER_BLOCK).find_map(|group_index| {
                let base = BlockID::encode(block_index, group_index, 0);
                let bits = group(&data_block, group_index) | self.unusable(base);
                (bits != u64::MAX).then_some((group_index, bits.trailing_ones()))
            });
            let Some((group_index, ingroup_index)) = found else {
                continue;
            };

            // 追加新位
            let bits = group(&data_block, group_index) | 1 << ingroup_index;
            set_group(&mut data_block, group_index, bits);
            store.write(bitmap_block_id, &data_block)?;

            let block_id = BlockID::encode(block_index, group_index, ingroup_index as usize);
            log::trace!("alloc block {block_id}");
            return Ok(block_id);
        }

        log::warn!("cannot find free block");
        Err(FsError::OutOfSpace)
    }

    /// 释放块并将其清零；保留区域内或本就空闲的块不做处理
    pub fn dealloc(&self, store: &BlockStore, block_id: u32) -> Result<()> {
        if block_id >= self.total_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }
        if block_id < self.first_data_block || !self.is_allocated(store, block_id)? {
            return Ok(());
        }

        let (block_index, group_index, ingroup_index) = BlockID(block_id).decode();
        store.map_mut(self.start_block_id + block_index, |data_block| {
            let bits = group(data_block, group_index) & !(1 << ingroup_index);
            set_group(data_block, group_index, bits);
        })?;
        store.zero(block_id)?;

        log::trace!("free block {block_id}");
        Ok(())
    }

    pub fn is_allocated(&self, store: &BlockStore, block_id: u32) -> Result<bool> {
        if block_id >= self.total_blocks {
            return Err(FsError::InvalidBlockId(block_id));
        }

        let (block_index, group_index, ingroup_index) = BlockID(block_id).decode();
        store.map(self.start_block_id + block_index, |data_block| {
            group(data_block, group_index) & (1 << ingroup_index) != 0
        })
    }

    /// 可分配区域内的空闲块数
    pub fn count_free(&self, store: &BlockStore) -> Result<u32> {
        let mut free = 0;
        for block_index in 0..self.blocks {
            store.map(self.start_block_id + block_index, |data_block| {
                for group_index in 0..GROUPS_PER_BLOCK {
                    let base = BlockID::encode(block_index, group_index, 0);
                    free += (group(data_block, group_index) | self.unusable(base)).count_zeros();
                }
            })?;
        }

        Ok(free)
    }

    /// 以 `base` 为首位的一组 64 位中，不参与分配的位（保留区域或越过设备末尾）
    fn unusable(&self, base: u32) -> u64 {
        let mut mask = 0;
        if base < self.first_data_block {
            mask |= low_bits(self.first_data_block - base);
        }
        if base.saturating_add(64) > self.total_blocks {
            mask |= !low_bits(self.total_blocks.saturating_sub(base));
        }

        mask
    }
}

/// 低 `n` 位全为 1
#[inline]
fn low_bits(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1 << n) - 1
    }
}

#[inline]
fn group(data_block: &[u8], group_index: usize) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&data_block[group_index * 8..group_index * 8 + 8]);
    u64::from_le_bytes(bytes)
}

#[inline]
fn set_group(data_block: &mut [u8], group_index: usize, bits: u64) {
    data_block[group_index * 8..group_index * 8 + 8].copy_from_slice(&bits.to_le_bytes());
}

impl BlockID {
    /// 线性映射编码得到块ID
    #[inline]
    fn encode(block_index: u32, group_index: usize, ingroup_index: usize) -> u32 {
        block_index * BLOCK_BITS as u32 + (group_index * 64 + ingroup_index) as u32
    }

    fn decode(self) -> (u32, usize, usize) {
        let block_index = self.0 / BLOCK_BITS as u32;
        let block_id = (self.0 % BLOCK_BITS as u32) as usize;
        (block_index, block_id / 64, block_id % 64)
    }
}
