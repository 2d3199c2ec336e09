/// 时间源：为 inode 的 atime/mtime/ctime 提供以秒计的时间戳
///
/// 核心库不依赖 std，时间由使用者注入。
pub trait Clock: Send + Sync {
    fn now(&self) -> u32;
}

impl<F> Clock for F
where
    F: Fn() -> u32 + Send + Sync,
{
    #[inline]
    fn now(&self) -> u32 {
        self()
    }
}
