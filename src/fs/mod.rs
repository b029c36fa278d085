use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use log::{debug, info, warn};

use crate::{
    disk::{ByteStore, FileDisk},
    fs::{
        config::{VolumeConfig, ENTRY_SIZE, HEADER_SIZE, MAP_ENTRY_SIZE},
        data_area::DataArea,
        error::{FileSystemError, Result},
        file_table::{FileEntry, FileName, FileTable},
        free_map::{BlockState, FreeMap},
        super_block::VolumeHeader,
    },
};

pub mod config;
pub mod data_area;
pub mod error;
pub mod file_table;
pub mod free_map;
pub mod super_block;

/// 一个已打开的卷
///
/// 句柄持有底层容器和卷头；除卷头外不缓存任何分配状态，
/// 每次分配或查找都重新扫描容器上的空闲表和文件表。
/// 丢弃句柄即释放容器。
#[derive(Debug)]
pub struct Volume<S: ByteStore> {
    store: S,
    header: VolumeHeader,
}

/// 卷内一个文件的概况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub slot: u32,
    pub size: u64,
    pub blocks: Vec<u64>, // 按链顺序排列的块号
}

/// 扫描空闲表和文件表得到的实际占用情况，用于与卷头计数对照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub first_free_block: Option<u64>,
    pub free_blocks: u64,
    pub free_entry_slots: u32,
}

/// 容器中的结构区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Header,
    Entry(u32),
    FreeMap,
    Block(u64),
}

impl Region {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Header => "Header",
            Self::Entry(_) => "Entry",
            Self::FreeMap => "FreeMap",
            Self::Block(_) => "Block",
        }
    }
}

/// 布局转储中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRecord {
    pub offset: u64,
    pub region: Region,
    pub size: u64,
    pub used: bool,
}

impl<S: ByteStore> Volume<S> {
    /// 在 `store` 上格式化一个新卷：卷头、16 个空槽位、全部空闲的空闲表
    ///
    /// 数据块载荷不预先清零。
    pub fn format(store: S, name: &str, total_size: u64, config: &VolumeConfig) -> Result<Self> {
        let header = VolumeHeader::new(name, total_size, config)?;
        header.sync(&store)?;
        FileTable::new(&store, &header).format()?;
        FreeMap::new(&store, &header).format()?;

        info!(
            "formatted volume {} ({} bytes, {} blocks of {} bytes)",
            header.volume_name(),
            total_size,
            header.blocks_number,
            header.block_payload_size
        );
        Ok(Self { store, header })
    }

    /// 读取已有卷的卷头
    ///
    /// 没有魔数或校验和。卷头记录的块载荷大小必须与当前配置一致，
    /// 各区域的偏移和计数必须与记录的容器大小相符。
    pub fn open(store: S, config: &VolumeConfig) -> Result<Self> {
        let header = VolumeHeader::load(&store)?;
        if header.block_payload_size != config.block_payload_size {
            return Err(FileSystemError::FormatMismatch {
                expected: config.block_payload_size,
                found: header.block_payload_size,
            });
        }
        header.check_layout()?;

        debug!(
            "opened volume {}: {}/{} blocks free, {}/{} slots free",
            header.volume_name(),
            header.free_blocks,
            header.blocks_number,
            header.free_entry_slots,
            header.entry_slots
        );
        Ok(Self { store, header })
    }

    /// 刷新并交还底层容器
    pub fn close(self) -> Result<S> {
        self.store.flush()?;
        debug!("closed volume {}", self.header.volume_name());
        Ok(self.store)
    }

    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// 把宿主机文件复制进卷，卷内文件名取路径的最后一段
    pub fn copy_in(&mut self, host_path: &Path) -> Result<FileInfo> {
        let name = host_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                FileSystemError::InvalidName(format!(
                    "{} has no usable file name",
                    host_path.display()
                ))
            })?;

        let host_error = |source: std::io::Error| FileSystemError::HostFile {
            path: host_path.display().to_string(),
            source,
        };
        let file = File::open(host_path).map_err(host_error)?;
        let len = file.metadata().map_err(host_error)?.len();

        self.copy_in_from(name, file, len)
    }

    /// 从 `source` 读取 `len` 字节，作为名为 `name` 的文件写入卷
    ///
    /// 所有校验都在修改之前完成。数据块先写入（不改变分配状态），
    /// 再标记空闲表、写文件表、写卷头；提交阶段任何一步失败都会撤销已做的标记。
    pub fn copy_in_from<R: Read>(&mut self, name: &str, mut source: R, len: u64) -> Result<FileInfo> {
        let name = FileName::new(name)?;

        let available = self.header.free_bytes();
        if len > available {
            return Err(FileSystemError::InsufficientSpace {
                needed: len,
                available,
            });
        }
        if self.header.free_entry_slots == 0 {
            return Err(FileSystemError::TableFull);
        }

        let table = FileTable::new(&self.store, &self.header);
        if table.lookup(&name)?.is_some() {
            return Err(FileSystemError::NameCollision(name.to_string()));
        }

        let payload = self.header.block_payload_size;
        let needed = len.div_ceil(payload);
        let slot = table
            .find_first_free_slot()?
            .ok_or(FileSystemError::TableFull)?;
        let blocks = FreeMap::new(&self.store, &self.header)
            .find_free(needed)?
            .ok_or_else(|| {
                FileSystemError::Corrupted(format!(
                    "header reports {} free blocks but the free map has fewer than {}",
                    self.header.free_blocks, needed
                ))
            })?;
        debug!(
            "copy-in {}: {} bytes into slot {}, blocks {:?}",
            name, len, slot, blocks
        );

        let end = self.header.end_of_chain();
        let area = DataArea::new(&self.store, &self.header);
        let mut buf = vec![0u8; payload as usize];
        let mut remaining = len;
        for (i, &index) in blocks.iter().enumerate() {
            let chunk = remaining.min(payload) as usize;
            source.read_exact(&mut buf[..chunk])?;
            let next = blocks.get(i + 1).copied().unwrap_or(end);
            area.write_block(index, &buf[..chunk], next)?;
            remaining -= chunk as u64;
        }

        let first_block = blocks.first().copied().unwrap_or(end);
        let entry = FileEntry::new(&name, len, first_block);
        if let Err(e) = self.commit(slot, &entry, &blocks) {
            warn!("copy-in of {} failed, releasing its allocation: {}", name, e);
            self.rollback(slot, &blocks);
            return Err(e);
        }

        info!(
            "copied {} into volume {} ({} bytes, {} blocks)",
            name,
            self.header.volume_name(),
            len,
            blocks.len()
        );
        Ok(FileInfo {
            name: name.to_string(),
            slot,
            size: len,
            blocks,
        })
    }

    fn commit(&mut self, slot: u32, entry: &FileEntry, blocks: &[u64]) -> Result<()> {
        let map = FreeMap::new(&self.store, &self.header);
        for &index in blocks {
            map.set_state(index, BlockState::Used)?;
        }
        FileTable::new(&self.store, &self.header).write_slot(slot, entry)?;

        let mut header = self.header.clone();
        header.free_entry_slots -= 1;
        header.free_blocks -= blocks.len() as u32;
        header.sync(&self.store)?;
        self.header = header;
        Ok(())
    }

    // 尽力恢复到复制前的状态；这里的失败只能记录下来
    fn rollback(&self, slot: u32, blocks: &[u64]) {
        let map = FreeMap::new(&self.store, &self.header);
        for &index in blocks {
            if let Err(e) = map.set_state(index, BlockState::Unused) {
                warn!("rollback could not release block {}: {}", index, e);
            }
        }
        if let Err(e) = FileTable::new(&self.store, &self.header).write_slot(slot, &FileEntry::unused())
        {
            warn!("rollback could not clear slot {}: {}", slot, e);
        }
        if let Err(e) = self.header.sync(&self.store) {
            warn!("rollback could not restore the volume header: {}", e);
        }
    }

    /// 把卷内文件写到宿主机路径 `destination`
    pub fn copy_out(&self, name: &str, destination: &Path) -> Result<u64> {
        // 文件存在才创建目标
        self.find(name)?;
        let file = File::create(destination).map_err(|source| FileSystemError::HostFile {
            path: destination.display().to_string(),
            source,
        })?;

        let written = self.copy_out_to(name, BufWriter::new(file))?;
        info!(
            "copied {} out of volume {} to {} ({} bytes)",
            name,
            self.header.volume_name(),
            destination.display(),
            written
        );
        Ok(written)
    }

    /// 把卷内文件的内容写入 `dest`，返回写出的字节数
    pub fn copy_out_to<W: Write>(&self, name: &str, dest: W) -> Result<u64> {
        let (_, _, entry) = self.find(name)?;
        self.write_chain(&entry, dest)
    }

    // 沿块链输出，最后一块截断到剩余字节数。链比声明的大小短时输出也随之变短
    fn write_chain<W: Write>(&self, entry: &FileEntry, mut dest: W) -> Result<u64> {
        let payload = self.header.block_payload_size;
        let mut remaining = entry.len();
        let mut written = 0;

        for item in DataArea::new(&self.store, &self.header).chain(entry.first_block) {
            let (_, block) = item?;
            let take = remaining.min(payload) as usize;
            dest.write_all(&block.data[..take])?;
            remaining -= take as u64;
            written += take as u64;
        }
        dest.flush()?;

        if remaining > 0 {
            warn!(
                "block chain of {} ended {} bytes short of its size",
                entry.name(),
                remaining
            );
        }
        Ok(written)
    }

    /// 删除文件：释放整条块链，清空槽位，更新计数
    pub fn delete(&mut self, name: &str) -> Result<u64> {
        let (file_name, _, entry) = self.find(name)?;
        // 先完整走一遍链，确认没有损坏再释放
        let blocks = self.chain_of(&entry)?;

        let map = FreeMap::new(&self.store, &self.header);
        for &index in &blocks {
            map.set_state(index, BlockState::Unused)?;
        }
        FileTable::new(&self.store, &self.header).mark_deleted(&file_name)?;

        self.header.free_entry_slots += 1;
        self.header.free_blocks += blocks.len() as u32;
        self.header.sync(&self.store)?;

        info!(
            "deleted {} from volume {} ({} blocks released)",
            file_name,
            self.header.volume_name(),
            blocks.len()
        );
        Ok(blocks.len() as u64)
    }

    /// 按槽位顺序列出所有文件名
    pub fn list(&self) -> Result<Vec<String>> {
        if self.header.free_entry_slots == self.header.entry_slots {
            return Ok(Vec::new());
        }

        let entries = FileTable::new(&self.store, &self.header).entries()?;
        Ok(entries
            .into_iter()
            .filter(FileEntry::is_used)
            .map(|entry| entry.name())
            .collect())
    }

    pub fn file_info(&self, name: &str) -> Result<FileInfo> {
        let (file_name, slot, entry) = self.find(name)?;
        Ok(FileInfo {
            name: file_name.to_string(),
            slot,
            size: entry.len(),
            blocks: self.chain_of(&entry)?,
        })
    }

    pub fn usage(&self) -> Result<Usage> {
        let map = FreeMap::new(&self.store, &self.header);
        let free_entry_slots = FileTable::new(&self.store, &self.header)
            .entries()?
            .iter()
            .filter(|entry| !entry.is_used())
            .count() as u32;

        Ok(Usage {
            first_free_block: map.find_first_free()?,
            free_blocks: map.count_free()?,
            free_entry_slots,
        })
    }

    /// 按偏移升序列出每个结构区域：卷头、各槽位、空闲表整体、各数据块
    pub fn dump_map(&self) -> Result<Vec<MapRecord>> {
        let header = &self.header;
        let table = FileTable::new(&self.store, header);
        let map = FreeMap::new(&self.store, header);
        let area = DataArea::new(&self.store, header);

        let mut records = Vec::new();
        records.push(MapRecord {
            offset: 0,
            region: Region::Header,
            size: HEADER_SIZE,
            used: true,
        });

        for (slot, entry) in (0u32..).zip(table.entries()?) {
            records.push(MapRecord {
                offset: table.slot_offset(slot),
                region: Region::Entry(slot),
                size: ENTRY_SIZE,
                used: entry.is_used(),
            });
        }

        records.push(MapRecord {
            offset: header.free_map_offset,
            region: Region::FreeMap,
            size: header.blocks_number as u64 * MAP_ENTRY_SIZE,
            used: true,
        });

        for index in 0..header.blocks_number as u64 {
            records.push(MapRecord {
                offset: area.block_offset(index),
                region: Region::Block(index),
                size: header.block_size(),
                used: map.state(index)? == BlockState::Used,
            });
        }

        Ok(records)
    }

    // 名字不合法的文件不可能存在于卷中，统一报告为 NotFound
    fn find(&self, name: &str) -> Result<(FileName, u32, FileEntry)> {
        let not_found = || FileSystemError::NotFound(name.to_string());
        let file_name = FileName::new(name).map_err(|_| not_found())?;
        let (slot, entry) = FileTable::new(&self.store, &self.header)
            .lookup(&file_name)?
            .ok_or_else(not_found)?;
        Ok((file_name, slot, entry))
    }

    fn chain_of(&self, entry: &FileEntry) -> Result<Vec<u64>> {
        DataArea::new(&self.store, &self.header)
            .chain(entry.first_block)
            .map(|item| item.map(|(index, _)| index))
            .collect()
    }
}

impl Volume<FileDisk> {
    /// 在宿主机上创建容器文件并格式化
    pub fn create_file(path: &Path, total_size: u64, config: &VolumeConfig) -> Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        // 几何不合法时不留下容器文件
        VolumeHeader::new(&name, total_size, config)?;

        let store = FileDisk::create(path, total_size).map_err(|source| {
            FileSystemError::StorageUnavailable {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::format(store, &name, total_size, config)
    }

    pub fn open_file(path: &Path, config: &VolumeConfig) -> Result<Self> {
        let store = FileDisk::open(path).map_err(|source| FileSystemError::StorageUnavailable {
            path: path.display().to_string(),
            source,
        })?;
        Self::open(store, config)
    }
}
