#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* blockfs 的整体架构，自上而下 */

// 文件系统层：对外提供 extent 操作（create/get/put/getattr/remove/目录操作）
mod fs;

// 目录层：一块一个目录项的追加、遍历与删除
mod dir;

// 文件数据映射层：逻辑块索引到块ID的寻址，以及读写、截断、填充
mod mapper;

// 索引节点表：inode 记录的分配、读取、写回与释放
mod inode_table;

// 磁盘数据结构层：表示磁盘上的数据结构
mod layout;

// 块存储层：带越界检查的原始块读写
mod block_store;

mod clock;
mod config;
mod error;

pub use self::{
    clock::Clock,
    config::Geometry,
    error::{FsError, Result},
    fs::{Attr, BlockFileSystem},
    layout::{DirEntry, InodeType, SuperBlock, NAME_MAX_LEN},
};

pub const MAGIC: u32 = 0x3b800001;
pub const BLOCK_SIZE: usize = 512;
pub const BLOCK_BITS: usize = BLOCK_SIZE * 8;
/// 扩展表可容纳的 inode ID 个数
pub const EXT_TABLE_LEN: usize = BLOCK_SIZE / 4;
/// 根目录的 inode ID
pub const ROOT_INODE: u32 = 1;

pub type DataBlock = [u8; BLOCK_SIZE];
