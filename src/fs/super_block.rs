use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    disk::ByteStore,
    fs::{
        config::{
            VolumeConfig, ENTRY_SIZE, ENTRY_SLOTS, HEADER_SIZE, LINK_SIZE, MAP_ENTRY_SIZE,
            NAME_LEN,
        },
        error::{FileSystemError, Result},
    },
};

/// 卷头，位于容器偏移 0
///
/// 各区域偏移在格式化时计算一次，之后不再改变；
/// 两个空闲计数是冗余摘要，由卷管理器负责与空闲表、文件表保持一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeHeader {
    /** 数据块信息 */
    pub blocks_number: u32, // 数据块总数
    pub free_blocks: u32, // 当前空闲块数
    /** 文件表信息 */
    pub entry_slots: u32, // 槽位总数
    pub free_entry_slots: u32, // 当前空闲槽位数
    /** 卷信息 */
    pub name: [u8; NAME_LEN], // 卷名（定长，可能无结尾 0）
    pub size: u64, // 格式化时请求的容器大小
    /** 区域偏移（字节） */
    pub table_offset: u64,
    pub free_map_offset: u64,
    pub block_area_offset: u64,
    /** 格式参数 */
    pub block_payload_size: u64,
}

impl VolumeHeader {
    /// 由请求的容器大小计算卷的几何布局
    pub fn new(name: &str, size: u64, config: &VolumeConfig) -> Result<Self> {
        let table_size = ENTRY_SLOTS as u64 * ENTRY_SIZE;
        let minimum = HEADER_SIZE + table_size;
        if size < minimum {
            return Err(FileSystemError::VolumeTooSmall { size, minimum });
        }

        let per_block = config.block_size() + MAP_ENTRY_SIZE;
        let blocks_number = u32::try_from((size - minimum) / per_block).map_err(|_| {
            FileSystemError::InvalidConfig(format!(
                "volume of {} bytes holds more than {} blocks",
                size,
                u32::MAX
            ))
        })?;

        let table_offset = HEADER_SIZE;
        let free_map_offset = table_offset + table_size;
        let block_area_offset = free_map_offset + blocks_number as u64 * MAP_ENTRY_SIZE;

        let mut fixed_name = [0u8; NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        fixed_name[..len].copy_from_slice(&bytes[..len]);

        debug!(
            "geometry for {} bytes: {} blocks of {} bytes, block area at {}",
            size,
            blocks_number,
            config.block_payload_size,
            block_area_offset
        );

        Ok(Self {
            blocks_number,
            free_blocks: blocks_number,
            entry_slots: ENTRY_SLOTS,
            free_entry_slots: ENTRY_SLOTS,
            name: fixed_name,
            size,
            table_offset,
            free_map_offset,
            block_area_offset,
            block_payload_size: config.block_payload_size,
        })
    }

    /// 从容器偏移 0 读取卷头，不做内容校验
    pub fn load<S: ByteStore>(store: &S) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        store.read_at(0, &mut buf)?;
        Ok(bincode::deserialize(&buf)?)
    }

    /// 将卷头写回容器
    pub fn sync<S: ByteStore>(&self, store: &S) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        store.write_at(0, &bytes)?;
        Ok(())
    }

    /// 用卷头记录的容器大小和载荷大小重算布局，与记录的字段逐一比对
    ///
    /// 之后所有扫描都以这些字段为界，不一致的卷头按损坏处理。
    pub fn check_layout(&self) -> Result<()> {
        let corrupted =
            |e: FileSystemError| FileSystemError::Corrupted(format!("volume header: {}", e));
        let config = VolumeConfig::new(self.block_payload_size).map_err(corrupted)?;
        let expected = Self::new("", self.size, &config).map_err(corrupted)?;

        let consistent = self.blocks_number == expected.blocks_number
            && self.entry_slots == expected.entry_slots
            && self.table_offset == expected.table_offset
            && self.free_map_offset == expected.free_map_offset
            && self.block_area_offset == expected.block_area_offset
            && self.free_blocks <= self.blocks_number
            && self.free_entry_slots <= self.entry_slots;
        if !consistent {
            return Err(FileSystemError::Corrupted(format!(
                "volume header layout does not match a {} byte volume ({} blocks, {} slots)",
                self.size, self.blocks_number, self.entry_slots
            )));
        }
        Ok(())
    }

    /// 链尾哨兵：最后一个合法块号再加 2，不会与任何真实块号重合
    pub fn end_of_chain(&self) -> u64 {
        self.blocks_number as u64 + 1
    }

    pub fn block_size(&self) -> u64 {
        self.block_payload_size + LINK_SIZE
    }

    /// 剩余可写入的字节数
    pub fn free_bytes(&self) -> u64 {
        self.free_blocks as u64 * self.block_payload_size
    }

    pub fn volume_name(&self) -> String {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }
}
