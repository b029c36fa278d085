use crate::fs::error::{FileSystemError, Result};

/// 文件表固定的槽位数
pub const ENTRY_SLOTS: u32 = 16;

/// 文件名与卷名的定长字段（字节）
pub const NAME_LEN: usize = 16;

/// 默认数据块载荷大小（字节）
pub const DEFAULT_BLOCK_PAYLOAD_SIZE: u64 = 256;

/// 数据块载荷大小上限（1 MiB）
pub const MAX_BLOCK_PAYLOAD_SIZE: u64 = 1024 * 1024;

// 磁盘记录的定长编码大小，由 bincode 定长整数编码决定
pub const HEADER_SIZE: u64 = 72; // 4 * u32 + [u8; 16] + 5 * u64
pub const ENTRY_SIZE: u64 = 32; // i64 + u64 + [u8; 16]
pub const MAP_ENTRY_SIZE: u64 = 4; // i32
pub const LINK_SIZE: u64 = 8; // 数据块尾部的 next 指针

/// 文件表中空槽位的 size 标记
pub const ENTRY_UNUSED: i64 = -1;

/// 空闲表记录取值
pub const BLOCK_UNUSED: i32 = -1;
pub const BLOCK_USED: i32 = 1;

/// 覆盖数据块载荷大小的环境变量
pub const BLOCK_SIZE_ENV: &str = "MINIVOL_BLOCK_SIZE";

/// 运行时配置；载荷大小会写入卷头，打开时必须一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeConfig {
    pub block_payload_size: u64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            block_payload_size: DEFAULT_BLOCK_PAYLOAD_SIZE,
        }
    }
}

impl VolumeConfig {
    pub fn new(block_payload_size: u64) -> Result<Self> {
        if block_payload_size == 0 {
            return Err(FileSystemError::InvalidConfig(
                "block payload size must be positive".to_string(),
            ));
        }
        if block_payload_size > MAX_BLOCK_PAYLOAD_SIZE {
            return Err(FileSystemError::InvalidConfig(format!(
                "block payload size {} exceeds the {} byte limit",
                block_payload_size, MAX_BLOCK_PAYLOAD_SIZE
            )));
        }
        Ok(Self { block_payload_size })
    }

    /// 读取 `MINIVOL_BLOCK_SIZE`，未设置时使用默认值
    pub fn from_env() -> Result<Self> {
        match std::env::var(BLOCK_SIZE_ENV) {
            Ok(value) => Self::parse(&value),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(FileSystemError::InvalidConfig(format!(
                "{}: {}",
                BLOCK_SIZE_ENV, e
            ))),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let size = value.trim().parse::<u64>().map_err(|_| {
            FileSystemError::InvalidConfig(format!("{}={} is not a number", BLOCK_SIZE_ENV, value))
        })?;
        Self::new(size)
    }

    /// 一个数据块在磁盘上的完整大小：载荷 + next 指针
    pub fn block_size(&self) -> u64 {
        self.block_payload_size + LINK_SIZE
    }
}
