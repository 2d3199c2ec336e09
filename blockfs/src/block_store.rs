//! # 块存储层
//!
//! 对块设备驱动的薄封装：所有块读写都经过这里，并在此处做越界检查，
//! 越界的块编号以 [`FsError::InvalidBlockId`] 返回而非交给驱动。

use alloc::sync::Arc;
use block_dev::BlockDevice;

use crate::{DataBlock, FsError, Result, BLOCK_SIZE};

#[derive(Clone)]
pub struct BlockStore {
    block_device: Arc<dyn BlockDevice>,
    num_blocks: u32,
}

impl core::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockStore")
            .field("num_blocks", &self.num_blocks)
            .finish_non_exhaustive()
    }
}

impl BlockStore {
    pub fn new(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        if block_device.block_size() != BLOCK_SIZE {
            return Err(FsError::InvalidGeometry("device block size mismatch"));
        }
        let num_blocks = u32::try_from(block_device.num_blocks())
            .map_err(|_| FsError::InvalidGeometry("device has too many blocks"))?;

        Ok(Self {
            block_device,
            num_blocks,
        })
    }

    #[inline]
    pub fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    #[inline]
    fn check(&self, block_id: u32) -> Result<usize> {
        if block_id < self.num_blocks {
            Ok(block_id as usize)
        } else {
            Err(FsError::InvalidBlockId(block_id))
        }
    }

    pub fn read(&self, block_id: u32) -> Result<DataBlock> {
        let mut data_block = [0; BLOCK_SIZE];
        self.block_device
            .read_block(self.check(block_id)?, &mut data_block);
        Ok(data_block)
    }

    pub fn write(&self, block_id: u32, data_block: &DataBlock) -> Result<()> {
        self.block_device
            .write_block(self.check(block_id)?, data_block);
        Ok(())
    }

    #[inline]
    pub fn map<V>(&self, block_id: u32, f: impl FnOnce(&DataBlock) -> V) -> Result<V> {
        Ok(f(&self.read(block_id)?))
    }

    /// 读出整块、修改后写回
    pub fn map_mut<V>(&self, block_id: u32, f: impl FnOnce(&mut DataBlock) -> V) -> Result<V> {
        let mut data_block = self.read(block_id)?;
        let v = f(&mut data_block);
        self.write(block_id, &data_block)?;
        Ok(v)
    }

    #[inline]
    pub fn zero(&self, block_id: u32) -> Result<()> {
        self.write(block_id, &[0; BLOCK_SIZE])
    }
}
