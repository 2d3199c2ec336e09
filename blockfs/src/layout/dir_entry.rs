use alloc::string::String;

use crate::layout::{get_u32, put_u32};
use crate::{DataBlock, FsError, Result, BLOCK_SIZE};

/// 目录项名的最大字节数：块内前 4 字节留给 inode ID
pub const NAME_MAX_LEN: usize = BLOCK_SIZE - 4;

/// 目录项：独占一块，`inode_id` 位于偏移 0，名字从偏移 4 开始，以 NUL 或块尾结束
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct DirEntry {
    inode_id: u32,
    name: String,
}

impl DirEntry {
    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        if name.is_empty() || name.len() > NAME_MAX_LEN || name.bytes().any(|c| c == 0) {
            return Err(FsError::InvalidName);
        }

        Ok(Self {
            inode_id,
            name: String::from(name),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    pub fn encode(&self) -> DataBlock {
        let mut data_block = [0; BLOCK_SIZE];
        put_u32(&mut data_block, 0, self.inode_id);
        data_block[4..4 + self.name.len()].copy_from_slice(self.name.as_bytes());

        data_block
    }

    pub fn decode(data_block: &DataBlock) -> Self {
        let raw = &data_block[4..];
        let len = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());

        Self {
            inode_id: Self::peek_inode_id(data_block),
            name: String::from_utf8_lossy(&raw[..len]).into_owned(),
        }
    }

    /// 只读出块内的 inode ID
    #[inline]
    pub fn peek_inode_id(data_block: &DataBlock) -> u32 {
        get_u32(data_block, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_id_then_name() {
        let entry = DirEntry::new("a.txt", 42).unwrap();
        let data_block = entry.encode();
        assert_eq!(&data_block[..4], &42u32.to_le_bytes());
        assert_eq!(&data_block[4..9], b"a.txt");
        assert_eq!(data_block[9], 0);
        assert_eq!(DirEntry::decode(&data_block), entry);
    }

    #[test]
    fn name_may_fill_the_block() {
        let name = "n".repeat(NAME_MAX_LEN);
        let entry = DirEntry::new(&name, 3).unwrap();
        assert_eq!(DirEntry::decode(&entry.encode()).name(), name);
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(DirEntry::new("", 1), Err(FsError::InvalidName));
        assert_eq!(DirEntry::new("a\0b", 1), Err(FsError::InvalidName));
        let long = "n".repeat(NAME_MAX_LEN + 1);
        assert_eq!(DirEntry::new(&long, 1), Err(FsError::InvalidName));
    }
}
