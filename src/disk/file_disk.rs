use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::disk::byte_store::ByteStore;

/// 以宿主机上的一个普通文件作为容器
#[derive(Debug)]
pub struct FileDisk {
    file: Mutex<File>,
}

impl FileDisk {
    /// 创建（或截断）一个容器文件，并把长度设置为 `size` 字节
    pub fn create(path: impl AsRef<Path>, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        // 只预留空间，不写零
        file.set_len(size)?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// 以读写方式打开已有容器
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// 从宿主机上删除整个容器
    pub fn remove(path: impl AsRef<Path>) -> Result<()> {
        std::fs::remove_file(path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "container lock poisoned"))
    }
}

impl ByteStore for FileDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let mut file = self.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.lock()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_reserves_requested_length() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("disc.vol");
        FileDisk::create(&path, 4096).expect("create");
        assert_eq!(std::fs::metadata(&path).expect("metadata").len(), 4096);
    }

    #[test]
    fn positioned_writes_are_visible_after_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("disc.vol");
        let disk = FileDisk::create(&path, 1024).expect("create");
        disk.write_at(100, b"minivol").expect("write");
        disk.flush().expect("flush");
        drop(disk);

        let disk = FileDisk::open(&path).expect("open");
        let mut buf = [0u8; 7];
        disk.read_at(100, &mut buf).expect("read");
        assert_eq!(&buf, b"minivol");
    }

    #[test]
    fn open_missing_container_fails() {
        let dir = TempDir::new().expect("tempdir");
        assert!(FileDisk::open(dir.path().join("missing.vol")).is_err());
    }

    #[test]
    fn remove_deletes_container() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("disc.vol");
        FileDisk::create(&path, 128).expect("create");
        FileDisk::remove(&path).expect("remove");
        assert!(!path.exists());
    }
}
