//! # 文件系统层
//!
//! 构建出设备布局，并对外提供以 inode ID 为标识的 extent 操作。
//! 位图与 inode 表由 [`BlockFileSystem`] 显式持有，数据映射与目录操作
//! 分别实现于 `mapper` 与 `dir` 模块。
//!
//! 所有操作都在调用者线程上同步执行完毕，可变操作需要 `&mut self`，
//! 并发访问须由外部串行化。

use alloc::sync::Arc;
use alloc::vec::Vec;
use block_dev::BlockDevice;

use crate::block_store::BlockStore;
use crate::config::{BITMAP_START_BLOCK, SUPER_BLOCK_ID};
use crate::inode_table::InodeTable;
use crate::layout::{Bitmap, InodeType, SuperBlock};
use crate::{Clock, FsError, Geometry, Result};
use crate::{BLOCK_SIZE, ROOT_INODE};

pub struct BlockFileSystem {
    pub(crate) store: BlockStore,
    pub(crate) bitmap: Bitmap,
    pub(crate) inodes: InodeTable,
    pub(crate) clock: Arc<dyn Clock>,
    geometry: Geometry,
    super_block: SuperBlock,
}

/// `getattr` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub kind: InodeType,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    /// 文件为内容字节数；目录为目录项数乘以块大小
    pub size: u64,
}

impl Attr {
    /// POSIX 风格的文件类型位
    pub fn mode(&self) -> u32 {
        match self.kind {
            InodeType::Free => 0,
            InodeType::Dir => 0o040000,
            InodeType::File => 0o100000,
            InodeType::Symlink => 0o120000,
        }
    }
}

impl core::fmt::Debug for BlockFileSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockFileSystem")
            .field("geometry", &self.geometry)
            .field("bitmap", &self.bitmap)
            .field("inodes", &self.inodes)
            .finish_non_exhaustive()
    }
}

impl BlockFileSystem {
    /// 在块设备上初始化设备布局，并分配根目录（inode 1）
    pub fn new(
        block_device: Arc<dyn BlockDevice>,
        geometry: Geometry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        geometry.validate()?;
        let store = BlockStore::new(block_device)?;
        if store.num_blocks() != geometry.total_blocks {
            return Err(FsError::InvalidGeometry("device size does not match geometry"));
        }

        let data_start_block = geometry
            .data_start_block()
            .ok_or(FsError::InvalidGeometry("no room left for data blocks"))?;
        let bitmap = Bitmap::new(
            BITMAP_START_BLOCK,
            geometry.bitmap_blocks(),
            data_start_block,
            geometry.total_blocks,
        );
        let inodes = InodeTable::new(
            geometry.inode_area_start_block(),
            geometry.inode_count,
            geometry.direct_slots as usize,
        );
        log::debug!(
            "layout: bitmap {}..{}, inodes {}..{}, data {}..{}",
            BITMAP_START_BLOCK,
            geometry.inode_area_start_block(),
            geometry.inode_area_start_block(),
            data_start_block,
            data_start_block,
            geometry.total_blocks,
        );

        for block_id in 0..geometry.total_blocks {
            store.zero(block_id)?;
        }

        let super_block = SuperBlock::new(&geometry);
        store.map_mut(SUPER_BLOCK_ID, |data_block| super_block.encode(data_block))?;

        let fs = Self {
            store,
            bitmap,
            inodes,
            clock,
            geometry,
            super_block,
        };

        let root = fs.inodes.alloc(&fs.store, InodeType::Dir, fs.clock.now())?;
        assert_eq!(root, ROOT_INODE, "first inode must be the root directory");

        Ok(fs)
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    /// 从设备上重新读出超级块
    pub fn read_super_block(&self) -> Result<SuperBlock> {
        self.store.map(SUPER_BLOCK_ID, SuperBlock::decode)
    }

    /// 分配一个数据块并返回其ID
    #[inline]
    pub fn alloc_block(&mut self) -> Result<u32> {
        self.bitmap.alloc(&self.store)
    }

    #[inline]
    pub fn free_block(&mut self, block_id: u32) -> Result<()> {
        self.bitmap.dealloc(&self.store, block_id)
    }

    #[inline]
    pub fn is_block_allocated(&self, block_id: u32) -> Result<bool> {
        self.bitmap.is_allocated(&self.store, block_id)
    }

    /// 可分配区域的总块数
    #[inline]
    pub fn data_blocks(&self) -> u32 {
        self.bitmap.capacity()
    }

    /// 可分配区域内的空闲块数
    #[inline]
    pub fn free_blocks(&self) -> Result<u32> {
        self.bitmap.count_free(&self.store)
    }

    #[inline]
    pub fn inode_capacity(&self) -> u32 {
        self.inodes.capacity()
    }

    #[inline]
    pub fn free_inodes(&self) -> Result<u32> {
        self.inodes.count_free(&self.store)
    }

    /// 读取整块原始数据
    #[inline]
    pub fn read_block(&self, block_id: u32) -> Result<[u8; BLOCK_SIZE]> {
        self.store.read(block_id)
    }

    /// 清空 inode 记录（不回收其数据块）；重复释放是安全的，根目录不可释放
    #[inline]
    pub fn free_inode(&mut self, inode_id: u32) -> Result<()> {
        if inode_id == ROOT_INODE {
            return Err(FsError::ReservedInode(inode_id));
        }
        self.inodes.free(&self.store, inode_id)
    }

    /// 创建新的文件、目录或符号链接，返回其 inode ID
    pub fn create(&mut self, kind: InodeType) -> Result<u32> {
        let inode_id = self.inodes.alloc(&self.store, kind, self.clock.now())?;
        log::debug!("create inode {inode_id} ({kind:?})");
        Ok(inode_id)
    }

    /// 以协议中的原始类型值创建 inode
    pub fn create_raw(&mut self, kind: u32) -> Result<u32> {
        self.create(InodeType::try_from(kind)?)
    }

    /// 读出文件内容，末尾的 NUL 字节会被去掉
    pub fn get(&self, inode_id: u32) -> Result<Vec<u8>> {
        let mut content = self.read(inode_id)?;
        let len = content.iter().rposition(|&c| c != 0).map_or(0, |pos| pos + 1);
        content.truncate(len);

        Ok(content)
    }

    /// 以新内容替换文件内容
    pub fn put(&mut self, inode_id: u32, content: &[u8]) -> Result<()> {
        self.live_file(inode_id)?;
        if u32::try_from(content.len()).is_err() {
            return Err(FsError::OutOfSpace);
        }

        log::debug!("put inode {inode_id}: {} bytes", content.len());
        self.write_file(inode_id, content)
    }

    pub fn getattr(&self, inode_id: u32) -> Result<Attr> {
        let disk_inode = self.inodes.get_live(&self.store, inode_id)?;
        let size = if disk_inode.is_dir() {
            (self.block_count(inode_id)? * BLOCK_SIZE) as u64
        } else {
            disk_inode.len as u64
        };

        Ok(Attr {
            kind: disk_inode.kind,
            atime: disk_inode.atime,
            mtime: disk_inode.mtime,
            ctime: disk_inode.ctime,
            size,
        })
    }

    /// 释放 inode 及其拥有的全部数据块、扩展表与子 inode
    pub fn remove(&mut self, inode_id: u32) -> Result<()> {
        if inode_id == ROOT_INODE {
            return Err(FsError::ReservedInode(inode_id));
        }
        self.inodes.get_live(&self.store, inode_id)?;

        log::debug!("remove inode {inode_id}");
        self.release_inode(inode_id)
    }

    /// 将文件截断或以零填充到 `size` 字节
    pub fn set_attr(&mut self, inode_id: u32, size: u64) -> Result<()> {
        let disk_inode = self.live_file(inode_id)?;
        let size = usize::try_from(size)
            .ok()
            .filter(|&size| u32::try_from(size).is_ok())
            .ok_or(FsError::OutOfSpace)?;

        log::debug!("set inode {inode_id} size {} -> {size}", disk_inode.len);
        match size.cmp(&(disk_inode.len as usize)) {
            core::cmp::Ordering::Less => self.truncate_file(inode_id, size),
            core::cmp::Ordering::Greater => self.pad_file(inode_id, size),
            core::cmp::Ordering::Equal => Ok(()),
        }
    }
}
