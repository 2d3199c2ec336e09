use thiserror::Error;

pub type Result<T> = core::result::Result<T, FsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// 块编号超出设备范围
    #[error("invalid block id {0}")]
    InvalidBlockId(u32),

    /// inode ID 不在 `1..=inode_count` 之内
    #[error("invalid inode id {0}")]
    InvalidInodeId(u32),

    /// 创建时给出了不支持的 inode 类型
    #[error("invalid inode type {0}")]
    InvalidType(u32),

    /// 没有空闲的数据块或 inode 槽位
    #[error("out of space")]
    OutOfSpace,

    /// inode 槽位空闲，或目录中没有对应的项
    #[error("inode {0} not found")]
    NotFound(u32),

    #[error("inode {0} is not a directory")]
    NotADirectory(u32),

    #[error("inode {0} is a directory")]
    IsADirectory(u32),

    /// 目录项名为空、含 NUL，或一块放不下
    #[error("invalid directory entry name")]
    InvalidName,

    /// 试图释放保留的 inode（根目录）
    #[error("inode {0} is reserved")]
    ReservedInode(u32),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
}
