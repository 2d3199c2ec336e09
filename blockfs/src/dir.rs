//! # 目录层
//!
//! 目录的内容是一串目录项，每项独占一块，寻址方式与文件数据相同：
//! 先直接槽位，再经扩展表展开到子目录 inode。
//!
//! 删除采用“与末项交换再收缩”，目录项的顺序在删除后**不保证**保持不变。
//! 除最后一个子 inode 外，扩展表中的子 inode 总是装满 K 项，
//! 因此按逻辑索引寻址始终成立。

use alloc::vec::Vec;

use crate::layout::{DirEntry, DiskInode, ExtTable, InodeType};
use crate::BlockFileSystem;
use crate::{FsError, Result, EXT_TABLE_LEN};

impl BlockFileSystem {
    /// 读出存在且为目录的 inode
    fn live_dir(&self, inode_id: u32) -> Result<DiskInode> {
        let disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        if !disk_inode.is_dir() {
            return Err(FsError::NotADirectory(inode_id));
        }

        Ok(disk_inode)
    }

    /// 在目录 `parent` 末尾追加目录项 `(child, name)`
    pub fn add_to_dir(&mut self, parent: u32, child: u32, name: &str) -> Result<()> {
        let dir_entry = DirEntry::new(name, child)?;
        self.inodes.get_live(&self.store, child)?;

        log::debug!("add {child} ({name:?}) to dir {parent}");
        self.append_entry(parent, &dir_entry)
    }

    fn append_entry(&self, inode_id: u32, dir_entry: &DirEntry) -> Result<()> {
        let mut disk_inode = self.live_dir(inode_id)?;
        self.push_entry(&mut disk_inode, dir_entry)?;

        let now = self.clock.now();
        disk_inode.mtime = now;
        disk_inode.ctime = now;
        self.inodes.put(&self.store, inode_id, &disk_inode)
    }

    fn push_entry(&self, disk_inode: &mut DiskInode, dir_entry: &DirEntry) -> Result<()> {
        let k = self.direct_slots();
        let size = disk_inode.size as usize;

        if size < k {
            let block_id = self.bitmap.alloc(&self.store)?;
            self.store.write(block_id, &dir_entry.encode())?;
            disk_inode.blocks[size] = block_id;
            disk_inode.size += 1;
            return Ok(());
        }

        // 直接槽位刚好用满：创建扩展表，目录项放进第一个子 inode
        if size == k {
            let table_block = self.bitmap.alloc(&self.store)?;
            let result = self.new_sub_dir(dir_entry).and_then(|sub| {
                let mut table = ExtTable::default();
                table.set(0, sub);
                self.write_ext_table(table_block, &table)
            });
            if let Err(err) = result {
                if let Err(cleanup) = self.bitmap.dealloc(&self.store, table_block) {
                    log::warn!("cannot free extension table {table_block}: {cleanup}");
                }
                return Err(err);
            }

            disk_inode.set_ext_table(table_block);
            disk_inode.size += 1;
            return Ok(());
        }

        let table_block = disk_inode.ext_table();
        let mut table = self.read_ext_table(disk_inode)?;

        // 首次适配：第一个还有空位的子 inode，最后一项总是接收
        for slot in 0..EXT_TABLE_LEN {
            let sub = table.get(slot);
            if sub == 0 {
                table.set(slot, self.new_sub_dir(dir_entry)?);
                return self.write_ext_table(table_block, &table);
            }

            if (self.inodes.get(&self.store, sub)?.size as usize) < k || slot == EXT_TABLE_LEN - 1
            {
                return self.append_entry(sub, dir_entry);
            }
        }

        unreachable!("the last extension slot always accepts an entry")
    }

    /// 分配一个子目录 inode 并放入首个目录项；失败时释放该 inode
    fn new_sub_dir(&self, dir_entry: &DirEntry) -> Result<u32> {
        let sub = self
            .inodes
            .alloc(&self.store, InodeType::Dir, self.clock.now())?;
        if let Err(err) = self.append_entry(sub, dir_entry) {
            if let Err(cleanup) = self.release_inode(sub) {
                log::warn!("cannot release sub-directory inode {sub}: {cleanup}");
            }
            return Err(err);
        }

        Ok(sub)
    }

    /// 按逻辑顺序列出目录中的全部目录项
    pub fn read_dir(&self, inode_id: u32) -> Result<Vec<DirEntry>> {
        self.live_dir(inode_id)?;

        self.block_ids(inode_id)?
            .into_iter()
            .map(|block_id| self.store.map(block_id, DirEntry::decode))
            .collect()
    }

    /// 删除目录 `parent` 中 inode ID 为 `child` 的目录项
    ///
    /// 被删项的块被释放，逻辑上的最后一块移入空出的位置，随后目录收缩一项。
    pub fn remove_from_dir(&mut self, parent: u32, child: u32) -> Result<()> {
        self.live_dir(parent)?;

        let block_ids = self.block_ids(parent)?;
        let mut index = None;
        for (i, &block_id) in block_ids.iter().enumerate() {
            if self.store.map(block_id, DirEntry::peek_inode_id)? == child {
                index = Some(i);
                break;
            }
        }
        let index = index.ok_or(FsError::NotFound(child))?;

        log::debug!("remove {child} from dir {parent} (slot {index})");
        self.bitmap.dealloc(&self.store, block_ids[index])?;
        let last = block_ids.len() - 1;
        if index != last {
            self.set_slot(parent, index, block_ids[last])?;
        }
        self.pop_slot(parent)?;

        let mut disk_inode = self.inodes.get_live(&self.store, parent)?;
        let now = self.clock.now();
        disk_inode.mtime = now;
        disk_inode.ctime = now;
        self.inodes.put(&self.store, parent, &disk_inode)
    }

    /// 把逻辑索引 `index` 处的块ID改为 `block_id`
    fn set_slot(&self, inode_id: u32, index: usize, block_id: u32) -> Result<()> {
        let mut disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        let k = self.direct_slots();

        if index < k {
            disk_inode.blocks[index] = block_id;
            return self.inodes.put(&self.store, inode_id, &disk_inode);
        }

        let slot = ((index - k) / k).min(EXT_TABLE_LEN - 1);
        match self.read_ext_table(&disk_inode)?.get(slot) {
            0 => Err(FsError::NotFound(inode_id)),
            sub => self.set_slot(sub, index - (slot + 1) * k, block_id),
        }
    }

    /// 去掉逻辑上的最后一块（不回收该块），返回收缩后此 inode 是否为空
    ///
    /// 变空的子 inode 被释放并移出扩展表，扩展表变空时一并释放。
    fn pop_slot(&self, inode_id: u32) -> Result<bool> {
        let mut disk_inode = self.inodes.get_live(&self.store, inode_id)?;

        if disk_inode.has_ext_table() {
            let table_block = disk_inode.ext_table();
            let mut table = self.read_ext_table(&disk_inode)?;
            let (slot, sub) = table.last().ok_or(FsError::NotFound(inode_id))?;

            if self.pop_slot(sub)? {
                self.inodes.free(&self.store, sub)?;
                table.set(slot, 0);

                if table.is_empty() {
                    self.bitmap.dealloc(&self.store, table_block)?;
                    disk_inode.set_ext_table(0);
                    disk_inode.size = self.direct_slots() as u32;
                    self.inodes.put(&self.store, inode_id, &disk_inode)?;
                } else {
                    self.write_ext_table(table_block, &table)?;
                }
            }
        } else if let Some(size) = disk_inode.size.checked_sub(1) {
            disk_inode.blocks[size as usize] = 0;
            disk_inode.size = size;
            self.inodes.put(&self.store, inode_id, &disk_inode)?;
        }

        Ok(disk_inode.size == 0)
    }
}
