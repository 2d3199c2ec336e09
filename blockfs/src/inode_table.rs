//! # 索引节点表
//!
//! 容量固定的 inode 记录数组，每条记录独占 inode 区域中的一块。
//! ID 从 1 开始，ID 为 `id` 的记录位于 `inode_area_start_block + id - 1`。

use crate::block_store::BlockStore;
use crate::layout::{DiskInode, InodeType};
use crate::{FsError, Result};

#[derive(Debug)]
pub struct InodeTable {
    inode_area_start_block: u32,
    capacity: u32,
    direct_slots: usize,
}

impl InodeTable {
    #[inline]
    pub fn new(inode_area_start_block: u32, capacity: u32, direct_slots: usize) -> Self {
        Self {
            inode_area_start_block,
            capacity,
            direct_slots,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn direct_slots(&self) -> usize {
        self.direct_slots
    }

    /// 通过ID获取 inode 所在块
    pub fn disk_inode_pos(&self, inode_id: u32) -> Result<u32> {
        if (1..=self.capacity).contains(&inode_id) {
            Ok(self.inode_area_start_block + inode_id - 1)
        } else {
            Err(FsError::InvalidInodeId(inode_id))
        }
    }

    /// 读出记录，空闲槽位同样返回（类型为 [`InodeType::Free`]）
    pub fn get(&self, store: &BlockStore, inode_id: u32) -> Result<DiskInode> {
        let block_id = self.disk_inode_pos(inode_id)?;
        DiskInode::decode(&store.read(block_id)?, self.direct_slots)
    }

    /// 读出记录，空闲槽位视为不存在
    pub fn get_live(&self, store: &BlockStore, inode_id: u32) -> Result<DiskInode> {
        let disk_inode = self.get(store, inode_id)?;
        if disk_inode.is_free() {
            return Err(FsError::NotFound(inode_id));
        }

        Ok(disk_inode)
    }

    pub fn put(&self, store: &BlockStore, inode_id: u32, disk_inode: &DiskInode) -> Result<()> {
        let block_id = self.disk_inode_pos(inode_id)?;
        debug_assert_eq!(disk_inode.direct_slots(), self.direct_slots);
        store.map_mut(block_id, |data_block| disk_inode.encode(data_block))
    }

    /// 线性扫描找到第一个空闲槽位
    fn find_free(&self, store: &BlockStore) -> Result<u32> {
        for inode_id in 1..=self.capacity {
            if self.get(store, inode_id)?.is_free() {
                return Ok(inode_id);
            }
        }

        log::warn!("inode table is full");
        Err(FsError::OutOfSpace)
    }

    /// 分配新的 inode 并返回其ID
    pub fn alloc(&self, store: &BlockStore, kind: InodeType, now: u32) -> Result<u32> {
        if kind == InodeType::Free {
            return Err(FsError::InvalidType(kind as u32));
        }

        let inode_id = self.find_free(store)?;
        self.put(
            store,
            inode_id,
            &DiskInode::new(kind, now, self.direct_slots),
        )?;

        log::trace!("alloc inode {inode_id} ({kind:?})");
        Ok(inode_id)
    }

    /// 清空记录；已空闲的槽位不做处理，重复释放是安全的
    pub fn free(&self, store: &BlockStore, inode_id: u32) -> Result<()> {
        if self.get(store, inode_id)?.is_free() {
            return Ok(());
        }

        let block_id = self.disk_inode_pos(inode_id)?;
        store.zero(block_id)?;

        log::trace!("free inode {inode_id}");
        Ok(())
    }

    pub fn count_free(&self, store: &BlockStore) -> Result<u32> {
        let mut free = 0;
        for inode_id in 1..=self.capacity {
            if self.get(store, inode_id)?.is_free() {
                free += 1;
            }
        }

        Ok(free)
    }
}
