//! 设备几何参数
//!
//! blockfs 的磁盘布局（每个 inode 独占一块）：
//! 引导块 | 超级块 | 位图 | inode 表 | 数据块

use crate::layout::DiskInode;
use crate::{FsError, Result};
use crate::{BLOCK_BITS, BLOCK_SIZE};

/// 超级块所在块
pub const SUPER_BLOCK_ID: u32 = 1;
/// 位图区域的起始块
pub const BITMAP_START_BLOCK: u32 = 2;

/// 设备初始化时确定、此后不再改变的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// 设备总块数
    pub total_blocks: u32,
    /// inode 表容量，ID 取值 `1..=inode_count`
    pub inode_count: u32,
    /// 每个 inode 的直接索引槽位数 K，槽位 K 留给扩展表
    pub direct_slots: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            total_blocks: 32 * 1024,
            inode_count: 1024,
            direct_slots: 100,
        }
    }
}

impl Geometry {
    pub fn validate(&self) -> Result<()> {
        if self.direct_slots == 0 {
            return Err(FsError::InvalidGeometry("direct slot count must be non-zero"));
        }
        if DiskInode::encoded_len(self.direct_slots as usize) > BLOCK_SIZE {
            return Err(FsError::InvalidGeometry("inode record does not fit in one block"));
        }
        if self.inode_count == 0 {
            return Err(FsError::InvalidGeometry("inode capacity must be non-zero"));
        }
        match self.data_start_block() {
            Some(start) if start < self.total_blocks => Ok(()),
            _ => Err(FsError::InvalidGeometry("no room left for data blocks")),
        }
    }

    /// 设备字节数
    #[inline]
    pub fn device_size(&self) -> u64 {
        self.total_blocks as u64 * BLOCK_SIZE as u64
    }

    /// 位图占用块数
    #[inline]
    pub fn bitmap_blocks(&self) -> u32 {
        self.total_blocks.div_ceil(BLOCK_BITS as u32)
    }

    #[inline]
    pub fn inode_area_start_block(&self) -> u32 {
        BITMAP_START_BLOCK + self.bitmap_blocks()
    }

    /// 第一个可分配的数据块，其之前的块均为保留区域
    pub fn data_start_block(&self) -> Option<u32> {
        self.inode_area_start_block().checked_add(self.inode_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let geometry = Geometry::default();
        geometry.validate().unwrap();
        assert_eq!(geometry.bitmap_blocks(), 8);
        assert_eq!(geometry.inode_area_start_block(), 10);
        assert_eq!(geometry.data_start_block(), Some(10 + 1024));
    }

    #[test]
    fn rejects_degenerate_geometry() {
        let zero_k = Geometry {
            direct_slots: 0,
            ..Default::default()
        };
        assert!(matches!(zero_k.validate(), Err(FsError::InvalidGeometry(_))));

        let huge_k = Geometry {
            direct_slots: 200,
            ..Default::default()
        };
        assert!(matches!(huge_k.validate(), Err(FsError::InvalidGeometry(_))));

        let no_data = Geometry {
            total_blocks: 64,
            inode_count: 64,
            direct_slots: 4,
        };
        assert!(matches!(no_data.validate(), Err(FsError::InvalidGeometry(_))));
    }
}
