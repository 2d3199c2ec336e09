use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use block_dev::MemDisk;
use blockfs::{BlockFileSystem, Clock, Geometry, InodeType, BLOCK_SIZE, ROOT_INODE};

/// 以 UNIX 时间（秒）为时间戳
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX))
    }
}

/// 在内存盘上初始化一个新的文件系统
pub fn format(geometry: Geometry) -> anyhow::Result<BlockFileSystem> {
    let disk = Arc::new(MemDisk::new(BLOCK_SIZE, geometry.total_blocks as usize));
    BlockFileSystem::new(disk, geometry, Arc::new(SystemClock)).context("formatting device")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub dirs: usize,
    pub symlinks: usize,
    pub bytes: usize,
}

/// 把宿主目录 `source` 下的内容递归导入到目录 `parent` 中，
/// 导入的每个文件都会读回比对
pub fn import_dir(
    fs: &mut BlockFileSystem,
    parent: u32,
    source: &Path,
) -> anyhow::Result<ImportStats> {
    let mut stats = ImportStats::default();

    let mut entries = fs::read_dir(source)
        .with_context(|| format!("reading {}", source.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            log::warn!("skip non UTF-8 name {path:?}");
            continue;
        };
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let inode_id = fs.create(InodeType::Dir)?;
            if let Err(err) = fs.add_to_dir(parent, inode_id, &name) {
                discard(fs, inode_id);
                return Err(err).with_context(|| format!("linking {}", path.display()));
            }
            let sub = import_dir(fs, inode_id, &path)?;
            stats.files += sub.files;
            stats.dirs += sub.dirs + 1;
            stats.symlinks += sub.symlinks;
            stats.bytes += sub.bytes;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            let target = target.to_string_lossy();
            let inode_id = import_bytes(fs, parent, &name, InodeType::Symlink, target.as_bytes())?;
            log::info!("symlink {name:?} -> {target:?} (inode {inode_id})");
            stats.symlinks += 1;
        } else {
            let content = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let inode_id = import_bytes(fs, parent, &name, InodeType::File, &content)?;
            log::info!("file {name:?}: {} bytes (inode {inode_id})", content.len());
            stats.files += 1;
            stats.bytes += content.len();
        }
    }

    Ok(stats)
}

fn import_bytes(
    fs: &mut BlockFileSystem,
    parent: u32,
    name: &str,
    kind: InodeType,
    content: &[u8],
) -> anyhow::Result<u32> {
    let inode_id = fs.create(kind)?;
    if let Err(err) = fs.put(inode_id, content) {
        discard(fs, inode_id);
        return Err(err).with_context(|| format!("writing {name:?}"));
    }
    if let Err(err) = fs.add_to_dir(parent, inode_id, name) {
        discard(fs, inode_id);
        return Err(err).with_context(|| format!("linking {name:?}"));
    }

    if fs.read(inode_id)? != content {
        bail!("read-back mismatch for {name:?}");
    }

    Ok(inode_id)
}

/// 导入失败时释放刚创建的 inode
fn discard(fs: &mut BlockFileSystem, inode_id: u32) {
    if let Err(err) = fs.remove(inode_id) {
        log::warn!("cannot release inode {inode_id}: {err}");
    }
}

/// 以缩进树的形式列出目录 `dir`
pub fn list(fs: &BlockFileSystem, dir: u32, out: &mut impl Write) -> anyhow::Result<()> {
    list_at(fs, dir, 0, out)
}

fn list_at(fs: &BlockFileSystem, dir: u32, depth: usize, out: &mut impl Write) -> anyhow::Result<()> {
    let mut entries = fs.read_dir(dir)?;
    entries.sort_by(|a, b| a.name().cmp(b.name()));

    for entry in entries {
        let attr = fs.getattr(entry.inode_id())?;
        writeln!(
            out,
            "{:indent$}{:06o} {:>5} {:>10} {}",
            "",
            attr.mode(),
            entry.inode_id(),
            attr.size,
            entry.name(),
            indent = depth * 2,
        )?;
        if attr.kind == InodeType::Dir {
            list_at(fs, entry.inode_id(), depth + 1, out)?;
        }
    }

    Ok(())
}

pub fn usage(fs: &BlockFileSystem, out: &mut impl Write) -> io::Result<()> {
    let free_blocks = fs.free_blocks().map_err(io::Error::other)?;
    let free_inodes = fs.free_inodes().map_err(io::Error::other)?;
    writeln!(
        out,
        "blocks: {}/{} used, inodes: {}/{} used",
        fs.data_blocks() - free_blocks,
        fs.data_blocks(),
        fs.inode_capacity() - free_inodes,
        fs.inode_capacity(),
    )
}

/// 根目录
#[inline]
pub fn root() -> u32 {
    ROOT_INODE
}
