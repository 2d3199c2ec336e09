use crate::layout::{get_u32, put_u32};
use crate::{DataBlock, Geometry, BLOCK_SIZE, MAGIC};

/// 超级块：
/// - 提供设备合法性校验；
/// - 记录初始化后不再改变的几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    /// 魔数：用于校验合法性
    magic: u32,
    /// 设备字节数
    pub size: u64,
    /// 设备总块数
    pub nblocks: u32,
    /// inode 表容量
    pub ninodes: u32,
    /// 每个 inode 的直接索引槽位数
    pub direct_slots: u32,
}

impl SuperBlock {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            magic: MAGIC,
            size: geometry.device_size(),
            nblocks: geometry.total_blocks,
            ninodes: geometry.inode_count,
            direct_slots: geometry.direct_slots,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC && self.size == self.nblocks as u64 * BLOCK_SIZE as u64
    }

    pub fn encode(&self, data_block: &mut DataBlock) {
        data_block.fill(0);
        put_u32(data_block, 0, self.magic);
        data_block[4..12].copy_from_slice(&self.size.to_le_bytes());
        put_u32(data_block, 12, self.nblocks);
        put_u32(data_block, 16, self.ninodes);
        put_u32(data_block, 20, self.direct_slots);
    }

    pub fn decode(data_block: &DataBlock) -> Self {
        let mut size = [0; 8];
        size.copy_from_slice(&data_block[4..12]);

        Self {
            magic: get_u32(data_block, 0),
            size: u64::from_le_bytes(size),
            nblocks: get_u32(data_block, 12),
            ninodes: get_u32(data_block, 16),
            direct_slots: get_u32(data_block, 20),
        }
    }
}
