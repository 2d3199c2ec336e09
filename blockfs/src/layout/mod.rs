//! # 磁盘数据结构层
//!
//! blockfs 的磁盘布局：
//! 引导块 | 超级块 | 位图 | inode 表（一块一个 inode） | 数据块
//!
//! 各结构以小端序显式编解码到整块中。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, ExtTable, InodeType};

/// 目录项，一块只放一个
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_MAX_LEN};

#[inline]
pub(crate) fn get_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
