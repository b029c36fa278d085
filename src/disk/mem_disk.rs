use std::{
    io::{Error, ErrorKind, Result},
    sync::{Mutex, MutexGuard},
};

use crate::disk::byte_store::ByteStore;

/// 纯内存容器，用于测试卷管理器而不落盘
///
/// 写入超出当前长度时自动扩展；读取未写过的区域返回 `UnexpectedEof`，
/// 与读取一个过短的容器文件行为一致。
#[derive(Debug, Default)]
pub struct MemDisk {
    data: Mutex<Vec<u8>>,
}

impl MemDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|data| data.len()).unwrap_or(0)
    }

    /// 直接读取原始字节（测试校验用）
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().map(|data| data.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.data
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "memory disk lock poisoned"))
    }
}

impl ByteStore for MemDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.lock()?;
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("read {}..{} past end of {} bytes", start, end, data.len()),
            ));
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut data = self.lock()?;
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_grows_the_disk() {
        let disk = MemDisk::new();
        disk.write_at(10, &[1, 2, 3]).unwrap();
        assert_eq!(disk.len(), 13);

        let mut buf = [0u8; 3];
        disk.read_at(10, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn read_past_end_is_eof() {
        let disk = MemDisk::new();
        disk.write_at(0, &[0; 4]).unwrap();
        let err = disk.read_at(2, &mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }
}
