//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备；[`BlockDevice`] 是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! [`MemDisk`] 是常驻内存的模拟磁盘，存活时间与进程相同。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use core::any::Any;

use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

/// 块设备驱动特质
///
/// 块编号越界属于调用者的错误，驱动可以直接 panic；
/// 上层应在调用前用 [`BlockDevice::num_blocks`] 校验。
pub trait BlockDevice: Send + Sync + Any {
    /// 每块字节数
    fn block_size(&self) -> usize;
    /// 设备总块数
    fn num_blocks(&self) -> usize;
    fn read_block(&self, block_id: usize, buf: &mut [u8]);
    fn write_block(&self, block_id: usize, buf: &[u8]);
}

/// 内存中的模拟磁盘：连续存放 `num_blocks` 个大小为 `block_size` 的块，初始全零
#[derive(Debug)]
pub struct MemDisk {
    block_size: usize,
    num_blocks: usize,
    data: Mutex<Vec<u8>>,
}

impl MemDisk {
    pub fn new(block_size: usize, num_blocks: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");

        Self {
            block_size,
            num_blocks,
            data: Mutex::new(vec![0; block_size * num_blocks]),
        }
    }

    /// 块在底层缓冲区中的字节范围
    #[inline]
    fn range(&self, block_id: usize) -> core::ops::Range<usize> {
        assert!(
            block_id < self.num_blocks,
            "block {block_id} out of range (device has {} blocks)",
            self.num_blocks
        );
        let start = block_id * self.block_size;
        start..start + self.block_size
    }
}

impl BlockDevice for MemDisk {
    #[inline]
    fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), self.block_size, "not a complete block!");
        let range = self.range(block_id);
        buf.copy_from_slice(&self.data.lock()[range]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        assert_eq!(buf.len(), self.block_size, "not a complete block!");
        let range = self.range(block_id);
        self.data.lock()[range].copy_from_slice(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_disk_is_zeroed() {
        let disk = MemDisk::new(64, 4);
        let mut buf = [0xff; 64];
        disk.read_block(3, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn blocks_are_independent() {
        let disk = MemDisk::new(16, 3);
        disk.write_block(1, &[7; 16]);

        let mut buf = [0; 16];
        disk.read_block(0, &mut buf);
        assert_eq!(buf, [0; 16]);
        disk.read_block(1, &mut buf);
        assert_eq!(buf, [7; 16]);
        disk.read_block(2, &mut buf);
        assert_eq!(buf, [0; 16]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_block_panics() {
        let disk = MemDisk::new(16, 2);
        disk.write_block(2, &[0; 16]);
    }
}
