use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::ByteStore,
    fs::{
        config::{ENTRY_SIZE, ENTRY_SLOTS, ENTRY_UNUSED, NAME_LEN},
        error::{FileSystemError, Result},
        super_block::VolumeHeader,
    },
};

/// 经过校验的定长文件名：非空、不含 NUL、不超过 16 字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName([u8; NAME_LEN]);

impl FileName {
    pub fn new(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() {
            return Err(FileSystemError::InvalidName("name is empty".to_string()));
        }
        if bytes.len() > NAME_LEN {
            return Err(FileSystemError::InvalidName(format!(
                "{} is longer than {} bytes",
                name, NAME_LEN
            )));
        }
        if bytes.contains(&0) {
            return Err(FileSystemError::InvalidName(format!(
                "{:?} contains a NUL byte",
                name
            )));
        }

        let mut fixed = [0u8; NAME_LEN];
        fixed[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(fixed))
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(trim_name(&self.0)))
    }
}

// 名字字段以 0 填充；满 16 字节时没有结尾 0
fn trim_name(raw: &[u8; NAME_LEN]) -> &[u8] {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    &raw[..len]
}

/// 文件表中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub size: i64,            // 文件大小（字节），负数表示空槽位
    pub first_block: u64,     // 首个数据块号
    pub name: [u8; NAME_LEN], // 文件名
}

impl FileEntry {
    pub fn unused() -> Self {
        Self {
            size: ENTRY_UNUSED,
            first_block: 0,
            name: [0; NAME_LEN],
        }
    }

    pub fn new(name: &FileName, size: u64, first_block: u64) -> Self {
        Self {
            size: size as i64,
            first_block,
            name: name.0,
        }
    }

    pub fn is_used(&self) -> bool {
        self.size >= 0
    }

    pub fn len(&self) -> u64 {
        self.size.max(0) as u64
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(trim_name(&self.name)).into_owned()
    }

    fn matches(&self, name: &FileName) -> bool {
        self.is_used() && self.name == name.0
    }
}

/// 定长文件表，每次查询都直接扫描容器
pub struct FileTable<'a, S: ByteStore> {
    store: &'a S,
    start: u64,
}

impl<'a, S: ByteStore> FileTable<'a, S> {
    pub fn new(store: &'a S, header: &VolumeHeader) -> Self {
        Self {
            store,
            start: header.table_offset,
        }
    }

    pub fn slot_offset(&self, slot: u32) -> u64 {
        self.start + slot as u64 * ENTRY_SIZE
    }

    /// 所有槽位写为空
    pub fn format(&self) -> Result<()> {
        let record = bincode::serialize(&FileEntry::unused())?;
        let bytes = record.repeat(ENTRY_SLOTS as usize);
        self.store.write_at(self.start, &bytes)?;
        Ok(())
    }

    pub fn read_slot(&self, slot: u32) -> Result<FileEntry> {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        self.store.read_at(self.slot_offset(slot), &mut buf)?;
        Ok(bincode::deserialize(&buf)?)
    }

    pub fn write_slot(&self, slot: u32, entry: &FileEntry) -> Result<()> {
        let bytes = bincode::serialize(entry)?;
        self.store.write_at(self.slot_offset(slot), &bytes)?;
        Ok(())
    }

    /// 第一个空槽位；表满时返回 None
    pub fn find_first_free_slot(&self) -> Result<Option<u32>> {
        for slot in 0..ENTRY_SLOTS {
            if !self.read_slot(slot)?.is_used() {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// 按名字查找，返回槽位号和记录
    pub fn lookup(&self, name: &FileName) -> Result<Option<(u32, FileEntry)>> {
        for slot in 0..ENTRY_SLOTS {
            let entry = self.read_slot(slot)?;
            if entry.matches(name) {
                return Ok(Some((slot, entry)));
            }
        }
        Ok(None)
    }

    /// 把第一个同名记录标为空；返回是否找到
    pub fn mark_deleted(&self, name: &FileName) -> Result<bool> {
        match self.lookup(name)? {
            Some((slot, mut entry)) => {
                entry.size = ENTRY_UNUSED;
                self.write_slot(slot, &entry)?;
                debug!("entry {} in slot {} marked unused", name, slot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 按槽位顺序返回全部记录（包括空槽位）
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        (0..ENTRY_SLOTS).map(|slot| self.read_slot(slot)).collect()
    }
}
