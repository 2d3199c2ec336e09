//! inode 记录与扩展表
//!
//! 槽位 `[0, K)` 直接存放数据块ID；槽位 K 存放**扩展表**所在块的ID。
//! 扩展表整块连续存储 **inode ID**（而非块ID），每个子 inode 都是完整独立的
//! inode 记录，再以同样的方式寻址至多 K 个块，最后一个表项还可以继续扩展。
//!
//! `size` 不是字节数：0..=K 表示已使用的直接槽位数，K+1 表示扩展表已启用。

use alloc::vec;
use alloc::vec::Vec;

use crate::layout::{get_u32, put_u32};
use crate::{DataBlock, FsError, Result, EXT_TABLE_LEN};

/// 槽位数组之前的记录头字节数：type, 保留, size, atime, mtime, ctime, len
const HEADER_SIZE: usize = 24;

/// inode 类型，`Free` 表示槽位空闲
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum InodeType {
    #[default]
    Free = 0,
    Dir = 1,
    File = 2,
    Symlink = 3,
}

impl TryFrom<u32> for InodeType {
    type Error = FsError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Free),
            1 => Ok(Self::Dir),
            2 => Ok(Self::File),
            3 => Ok(Self::Symlink),
            _ => Err(FsError::InvalidType(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskInode {
    pub kind: InodeType,
    /// 寻址用的块计数，见模块文档
    pub size: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    /// 内容字节数
    pub len: u32,
    /// K 个直接槽位 + 1 个扩展表槽位
    pub blocks: Vec<u32>,
}

impl DiskInode {
    /// 全零记录，即空闲槽位
    #[inline]
    pub fn free(direct_slots: usize) -> Self {
        Self {
            kind: InodeType::Free,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            len: 0,
            blocks: vec![0; direct_slots + 1],
        }
    }

    pub fn new(kind: InodeType, now: u32, direct_slots: usize) -> Self {
        Self {
            kind,
            atime: now,
            mtime: now,
            ctime: now,
            ..Self::free(direct_slots)
        }
    }

    /// K 个直接槽位时记录的编码长度
    #[inline]
    pub const fn encoded_len(direct_slots: usize) -> usize {
        HEADER_SIZE + 4 * (direct_slots + 1)
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.kind == InodeType::Free
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == InodeType::Dir
    }

    /// 直接槽位数 K
    #[inline]
    pub fn direct_slots(&self) -> usize {
        self.blocks.len() - 1
    }

    /// 已使用的直接槽位数
    #[inline]
    pub fn direct_used(&self) -> usize {
        (self.size as usize).min(self.direct_slots())
    }

    /// 是否启用了扩展表
    #[inline]
    pub fn has_ext_table(&self) -> bool {
        self.size as usize > self.direct_slots()
    }

    #[inline]
    pub fn ext_table(&self) -> u32 {
        self.blocks[self.direct_slots()]
    }

    #[inline]
    pub fn set_ext_table(&mut self, block_id: u32) {
        let k = self.direct_slots();
        self.blocks[k] = block_id;
    }

    pub fn encode(&self, data_block: &mut DataBlock) {
        data_block.fill(0);
        data_block[0..2].copy_from_slice(&(self.kind as u16).to_le_bytes());
        put_u32(data_block, 4, self.size);
        put_u32(data_block, 8, self.atime);
        put_u32(data_block, 12, self.mtime);
        put_u32(data_block, 16, self.ctime);
        put_u32(data_block, 20, self.len);
        for (slot, &block_id) in self.blocks.iter().enumerate() {
            put_u32(data_block, HEADER_SIZE + slot * 4, block_id);
        }
    }

    pub fn decode(data_block: &DataBlock, direct_slots: usize) -> Result<Self> {
        let kind = u16::from_le_bytes([data_block[0], data_block[1]]);

        Ok(Self {
            kind: InodeType::try_from(kind as u32)?,
            size: get_u32(data_block, 4),
            atime: get_u32(data_block, 8),
            mtime: get_u32(data_block, 12),
            ctime: get_u32(data_block, 16),
            len: get_u32(data_block, 20),
            blocks: (0..=direct_slots)
                .map(|slot| get_u32(data_block, HEADER_SIZE + slot * 4))
                .collect(),
        })
    }
}

/// 扩展表：整块连续存储子 inode 的ID，0 表示空项，已用项总是从头连续排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtTable([u32; EXT_TABLE_LEN]);

impl Default for ExtTable {
    fn default() -> Self {
        Self([0; EXT_TABLE_LEN])
    }
}

impl ExtTable {
    pub fn decode(data_block: &DataBlock) -> Self {
        let mut table = Self::default();
        for (slot, inode_id) in table.0.iter_mut().enumerate() {
            *inode_id = get_u32(data_block, slot * 4);
        }

        table
    }

    pub fn encode(&self) -> DataBlock {
        let mut data_block = [0; crate::BLOCK_SIZE];
        for (slot, &inode_id) in self.0.iter().enumerate() {
            put_u32(&mut data_block, slot * 4, inode_id);
        }

        data_block
    }

    #[inline]
    pub fn get(&self, slot: usize) -> u32 {
        self.0[slot]
    }

    #[inline]
    pub fn set(&mut self, slot: usize, inode_id: u32) {
        self.0[slot] = inode_id;
    }

    /// 按表序遍历已用项，遇到第一个空项即停止
    pub fn entries(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.0
            .iter()
            .copied()
            .enumerate()
            .take_while(|&(_, inode_id)| inode_id != 0)
    }

    /// 最后一个已用项
    pub fn last(&self) -> Option<(usize, u32)> {
        self.entries().last()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}
