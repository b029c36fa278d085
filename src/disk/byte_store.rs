use std::io::Result;

/// 容器的底层介质：按字节偏移随机读写
///
/// 卷管理器只通过这两个原语访问容器，不做任何缓存。
pub trait ByteStore {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
