//! # 文件数据映射层
//!
//! 把文件的逻辑块索引映射为块ID，并实现读、写、截断与零填充。
//!
//! ## 逻辑块寻址
//!
//! - 索引 `i < K`：直接取 `blocks[i]`
//! - 索引 `i >= K`：`j = min((i - K) / K, EXT_TABLE_LEN - 1)`，
//!   取扩展表第 `j` 项的子 inode，以 `i - (j + 1) * K` 在其中递归寻址
//!
//! 扩展表前 `EXT_TABLE_LEN - 1` 项各自恰好承载 K 块，超出部分全部折叠进最后一项，
//! 由它继续扩展。

use alloc::vec::Vec;

use crate::layout::{DiskInode, ExtTable, InodeType};
use crate::BlockFileSystem;
use crate::{DataBlock, FsError, Result};
use crate::{BLOCK_SIZE, EXT_TABLE_LEN};

impl BlockFileSystem {
    /// 直接槽位数 K
    #[inline]
    pub(crate) fn direct_slots(&self) -> usize {
        self.inodes.direct_slots()
    }

    /// 一个 inode 的直接槽位可承载的字节数
    #[inline]
    pub(crate) fn direct_bytes(&self) -> usize {
        self.direct_slots() * BLOCK_SIZE
    }

    #[inline]
    pub(crate) fn read_ext_table(&self, disk_inode: &DiskInode) -> Result<ExtTable> {
        self.store.map(disk_inode.ext_table(), ExtTable::decode)
    }

    #[inline]
    pub(crate) fn write_ext_table(&self, block_id: u32, table: &ExtTable) -> Result<()> {
        self.store.write(block_id, &table.encode())
    }

    /// 读出存在且不是目录的 inode
    pub(crate) fn live_file(&self, inode_id: u32) -> Result<DiskInode> {
        let disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        if disk_inode.is_dir() {
            return Err(FsError::IsADirectory(inode_id));
        }

        Ok(disk_inode)
    }

    /// 逻辑上 inode 指向一系列块，此处传入的是这些块的索引（逻辑索引），
    /// 返回其在设备上的块ID
    pub fn block_id(&self, inode_id: u32, block_index: usize) -> Result<u32> {
        let disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        let k = self.direct_slots();

        if block_index < k {
            return if block_index < disk_inode.direct_used() {
                Ok(disk_inode.blocks[block_index])
            } else {
                Err(FsError::NotFound(inode_id))
            };
        }
        if !disk_inode.has_ext_table() {
            return Err(FsError::NotFound(inode_id));
        }

        let slot = ((block_index - k) / k).min(EXT_TABLE_LEN - 1);
        match self.read_ext_table(&disk_inode)?.get(slot) {
            0 => Err(FsError::NotFound(inode_id)),
            sub => self.block_id(sub, block_index - (slot + 1) * k),
        }
    }

    /// 按逻辑顺序列出 inode 的全部块ID：先直接槽位，再按表序展开各子 inode
    pub fn block_ids(&self, inode_id: u32) -> Result<Vec<u32>> {
        let mut block_ids = Vec::new();
        self.collect_block_ids(inode_id, &mut block_ids)?;
        Ok(block_ids)
    }

    fn collect_block_ids(&self, inode_id: u32, block_ids: &mut Vec<u32>) -> Result<()> {
        let disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        block_ids.extend_from_slice(&disk_inode.blocks[..disk_inode.direct_used()]);

        if disk_inode.has_ext_table() {
            for (_, sub) in self.read_ext_table(&disk_inode)?.entries() {
                self.collect_block_ids(sub, block_ids)?;
            }
        }

        Ok(())
    }

    /// inode 拥有的数据块数（不含扩展表块）
    pub fn block_count(&self, inode_id: u32) -> Result<usize> {
        let disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        let mut count = disk_inode.direct_used();

        if disk_inode.has_ext_table() {
            for (_, sub) in self.read_ext_table(&disk_inode)?.entries() {
                count += self.block_count(sub)?;
            }
        }

        Ok(count)
    }

    /// 读出文件的全部内容，长度恰为记录中的字节数
    pub fn read(&self, inode_id: u32) -> Result<Vec<u8>> {
        let disk_inode = self.live_file(inode_id)?;
        let block_ids = self.block_ids(inode_id)?;

        let mut content = Vec::with_capacity(block_ids.len() * BLOCK_SIZE);
        for block_id in block_ids {
            content.extend_from_slice(&self.store.read(block_id)?);
        }
        content.truncate(disk_inode.len as usize);

        Ok(content)
    }

    /// 先回收旧内容，再为新内容分配全新的块
    pub(crate) fn write_file(&self, inode_id: u32, content: &[u8]) -> Result<()> {
        let mut disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        self.release_content(&mut disk_inode)?;

        // 分配失败时不回滚：记录的长度只覆盖已写入的部分，已分配的块仍可被回收
        let result = self.fill_content(&mut disk_inode, content);
        disk_inode.mtime = self.clock.now();
        self.inodes.put(&self.store, inode_id, &disk_inode)?;

        result
    }

    fn fill_content(&self, disk_inode: &mut DiskInode, content: &[u8]) -> Result<()> {
        let direct_bytes = self.direct_bytes();

        for (slot, chunk) in content
            .chunks(BLOCK_SIZE)
            .take(self.direct_slots())
            .enumerate()
        {
            let block_id = self.bitmap.alloc(&self.store)?;
            let mut data_block: DataBlock = [0; BLOCK_SIZE];
            data_block[..chunk.len()].copy_from_slice(chunk);
            self.store.write(block_id, &data_block)?;

            disk_inode.blocks[slot] = block_id;
            disk_inode.size = slot as u32 + 1;
            disk_inode.len = (slot * BLOCK_SIZE + chunk.len()) as u32;
        }

        if content.len() <= direct_bytes {
            return Ok(());
        }

        let table_block = self.bitmap.alloc(&self.store)?;
        disk_inode.set_ext_table(table_block);
        disk_inode.size = self.direct_slots() as u32 + 1;

        let mut table = ExtTable::default();
        let result = self.fill_ext_table(&mut table, &content[direct_bytes..]);
        self.write_ext_table(table_block, &table)?;
        disk_inode.len = match result {
            Ok(()) => content.len() as u32,
            Err(_) => direct_bytes as u32 + self.committed_len(&table)?,
        };

        result
    }

    /// 扩展表中各子 inode 已写入的字节数之和
    fn committed_len(&self, table: &ExtTable) -> Result<u32> {
        let mut len = 0;
        for (_, sub) in table.entries() {
            len += self.inodes.get(&self.store, sub)?.len;
        }

        Ok(len)
    }

    /// 依次为每个表项分配子 inode 并写入 K 块的内容，最后一项承载剩余的全部内容
    fn fill_ext_table(&self, table: &mut ExtTable, rest: &[u8]) -> Result<()> {
        let direct_bytes = self.direct_bytes();
        let mut offset = 0;

        for slot in 0..EXT_TABLE_LEN {
            if offset >= rest.len() {
                break;
            }
            let end = if slot == EXT_TABLE_LEN - 1 {
                rest.len()
            } else {
                (offset + direct_bytes).min(rest.len())
            };

            let sub = self
                .inodes
                .alloc(&self.store, InodeType::File, self.clock.now())?;
            table.set(slot, sub);
            self.write_file(sub, &rest[offset..end])?;
            offset = end;
        }

        Ok(())
    }

    /// 缩短文件到 `len` 字节
    pub(crate) fn truncate_file(&self, inode_id: u32, len: usize) -> Result<()> {
        let mut disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        if len >= disk_inode.len as usize {
            return Ok(());
        }

        let k = self.direct_slots();
        let keep = len.div_ceil(BLOCK_SIZE);

        for slot in keep.min(k)..disk_inode.direct_used() {
            self.bitmap.dealloc(&self.store, disk_inode.blocks[slot])?;
            disk_inode.blocks[slot] = 0;
        }

        // 截断点落在本 inode 的直接范围内：清零末块中超出新长度的部分
        if keep <= k && len % BLOCK_SIZE != 0 {
            self.store.map_mut(disk_inode.blocks[keep - 1], |data_block| {
                data_block[len % BLOCK_SIZE..].fill(0)
            })?;
        }

        if disk_inode.has_ext_table() {
            let table_block = disk_inode.ext_table();
            let mut table = self.read_ext_table(&disk_inode)?;
            let direct_bytes = self.direct_bytes();

            for (slot, sub) in table.clone().entries() {
                let start = (slot + 1) * direct_bytes;
                let sub_len = if slot == EXT_TABLE_LEN - 1 {
                    len.saturating_sub(start)
                } else {
                    len.saturating_sub(start).min(direct_bytes)
                };

                if sub_len == 0 {
                    self.release_inode(sub)?;
                    table.set(slot, 0);
                } else {
                    self.truncate_file(sub, sub_len)?;
                }
            }

            if keep <= k {
                self.bitmap.dealloc(&self.store, table_block)?;
                disk_inode.set_ext_table(0);
            } else {
                self.write_ext_table(table_block, &table)?;
            }
        }

        disk_inode.size = keep.min(k + 1) as u32;
        disk_inode.len = len as u32;
        disk_inode.mtime = self.clock.now();
        self.inodes.put(&self.store, inode_id, &disk_inode)
    }

    /// 以零字节把文件加长到 `len` 字节
    pub(crate) fn pad_file(&self, inode_id: u32, len: usize) -> Result<()> {
        let mut disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        if len <= disk_inode.len as usize {
            return Ok(());
        }

        let result = self.grow(&mut disk_inode, len);
        disk_inode.mtime = self.clock.now();
        self.inodes.put(&self.store, inode_id, &disk_inode)?;

        result
    }

    fn grow(&self, disk_inode: &mut DiskInode, len: usize) -> Result<()> {
        let k = self.direct_slots();
        let direct_bytes = self.direct_bytes();
        let final_blocks = len.div_ceil(BLOCK_SIZE);

        for slot in disk_inode.direct_used()..final_blocks.min(k) {
            let block_id = self.bitmap.alloc(&self.store)?;
            self.store.zero(block_id)?;
            disk_inode.blocks[slot] = block_id;
            disk_inode.size = slot as u32 + 1;
            disk_inode.len = ((slot + 1) * BLOCK_SIZE).min(len) as u32;
        }

        if final_blocks <= k {
            disk_inode.len = len as u32;
            return Ok(());
        }

        // 按需创建扩展表
        let table_block = if disk_inode.has_ext_table() {
            disk_inode.ext_table()
        } else {
            let block_id = self.bitmap.alloc(&self.store)?;
            self.write_ext_table(block_id, &ExtTable::default())?;
            disk_inode.set_ext_table(block_id);
            disk_inode.size = k as u32 + 1;
            block_id
        };
        disk_inode.len = disk_inode.len.max(direct_bytes as u32);

        let mut table = self.store.map(table_block, ExtTable::decode)?;
        let result = self.grow_ext_table(&mut table, len - direct_bytes, disk_inode.kind);
        self.write_ext_table(table_block, &table)?;
        disk_inode.len = match result {
            Ok(()) => len as u32,
            Err(_) => direct_bytes as u32 + self.committed_len(&table)?,
        };

        result
    }

    fn grow_ext_table(&self, table: &mut ExtTable, rest: usize, kind: InodeType) -> Result<()> {
        let direct_bytes = self.direct_bytes();

        for slot in 0..EXT_TABLE_LEN {
            let start = slot * direct_bytes;
            if start >= rest {
                break;
            }
            let sub_len = if slot == EXT_TABLE_LEN - 1 {
                rest - start
            } else {
                (rest - start).min(direct_bytes)
            };

            if table.get(slot) == 0 {
                table.set(slot, self.inodes.alloc(&self.store, kind, self.clock.now())?);
            }
            self.pad_file(table.get(slot), sub_len)?;
        }

        Ok(())
    }

    /// 回收 inode 的全部内容并释放该 inode；已空闲的 inode 不做处理
    pub(crate) fn release_inode(&self, inode_id: u32) -> Result<()> {
        let mut disk_inode = self.inodes.get(&self.store, inode_id)?;
        if disk_inode.is_free() {
            return Ok(());
        }

        self.release_content(&mut disk_inode)?;
        self.inodes.free(&self.store, inode_id)
    }

    /// 回收直接块、所有子 inode 以及扩展表块，并清空记录中的寻址信息
    fn release_content(&self, disk_inode: &mut DiskInode) -> Result<()> {
        for &block_id in &disk_inode.blocks[..disk_inode.direct_used()] {
            self.bitmap.dealloc(&self.store, block_id)?;
        }

        if disk_inode.has_ext_table() {
            for (_, sub) in self.read_ext_table(disk_inode)?.entries() {
                self.release_inode(sub)?;
            }
            self.bitmap.dealloc(&self.store, disk_inode.ext_table())?;
        }

        disk_inode.blocks.fill(0);
        disk_inode.size = 0;
        disk_inode.len = 0;
        Ok(())
    }
}
