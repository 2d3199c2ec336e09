#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use block_dev::MemDisk;
use blockfs::{BlockFileSystem, Clock, Geometry, BLOCK_SIZE, EXT_TABLE_LEN};

/// 直接槽位取 4，方便用少量数据触发扩展表
pub const K: usize = 4;

pub fn small() -> Geometry {
    Geometry {
        total_blocks: 4096,
        inode_count: 256,
        direct_slots: K as u32,
    }
}

/// 只有几十个数据块与 16 个 inode 的设备
pub fn tiny() -> Geometry {
    Geometry {
        total_blocks: 80,
        inode_count: 16,
        direct_slots: K as u32,
    }
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(|| 42u32)
}

/// 每次取时间都加一
pub fn ticking_clock() -> Arc<dyn Clock> {
    let tick = AtomicU32::new(0);
    Arc::new(move || tick.fetch_add(1, Ordering::Relaxed) + 1)
}

pub fn format_with(geometry: Geometry, clock: Arc<dyn Clock>) -> BlockFileSystem {
    let disk = Arc::new(MemDisk::new(BLOCK_SIZE, geometry.total_blocks as usize));
    BlockFileSystem::new(disk, geometry, clock).unwrap()
}

pub fn format(geometry: Geometry) -> BlockFileSystem {
    format_with(geometry, fixed_clock())
}

/// 可辨认的测试内容，不含 NUL
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}

/// 保存 `blocks` 个数据块所需的 inode 数（含顶层 inode）
pub fn inodes_for(blocks: usize) -> usize {
    if blocks <= K {
        return 1;
    }
    let rest = blocks - K;
    if rest <= EXT_TABLE_LEN * K {
        1 + rest.div_ceil(K)
    } else {
        EXT_TABLE_LEN + inodes_for(rest - (EXT_TABLE_LEN - 1) * K)
    }
}

/// 保存 `blocks` 个数据块所需的扩展表块数
pub fn tables_for(blocks: usize) -> usize {
    if blocks <= K {
        return 0;
    }
    let rest = blocks - K;
    if rest <= EXT_TABLE_LEN * K {
        1
    } else {
        1 + tables_for(rest - (EXT_TABLE_LEN - 1) * K)
    }
}

/// 占住空闲块，直到只剩 `left` 块可用，返回被占住的块
pub fn hold_blocks(fs: &mut BlockFileSystem, left: u32) -> Vec<u32> {
    let mut held = Vec::new();
    while fs.free_blocks().unwrap() > left {
        held.push(fs.alloc_block().unwrap());
    }
    held
}

pub fn release_blocks(fs: &mut BlockFileSystem, held: Vec<u32>) {
    for block_id in held {
        fs.free_block(block_id).unwrap();
    }
}

/// 当前已用的 (数据块, inode)
pub fn usage(fs: &BlockFileSystem) -> (u32, u32) {
    (
        fs.data_blocks() - fs.free_blocks().unwrap(),
        fs.inode_capacity() - fs.free_inodes().unwrap(),
    )
}
