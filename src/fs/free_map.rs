use log::debug;

use crate::{
    disk::ByteStore,
    fs::{
        config::{BLOCK_UNUSED, BLOCK_USED, MAP_ENTRY_SIZE},
        error::{FileSystemError, Result},
        super_block::VolumeHeader,
    },
};

// 格式化时每次批量写入的记录数
const FORMAT_BATCH: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Unused,
    Used,
}

impl BlockState {
    fn to_raw(self) -> i32 {
        match self {
            Self::Unused => BLOCK_UNUSED,
            Self::Used => BLOCK_USED,
        }
    }

    // 只有 BLOCK_USED 表示占用，其余取值一律视为空闲
    fn from_raw(raw: i32) -> Self {
        if raw == BLOCK_USED {
            Self::Used
        } else {
            Self::Unused
        }
    }
}

/// 空闲表：每个数据块一条 i32 记录，直接在容器上读写
pub struct FreeMap<'a, S: ByteStore> {
    store: &'a S,
    start: u64,        // 空闲表在容器中的起始偏移
    total_blocks: u64, // 记录条数
}

impl<'a, S: ByteStore> FreeMap<'a, S> {
    pub fn new(store: &'a S, header: &VolumeHeader) -> Self {
        Self {
            store,
            start: header.free_map_offset,
            total_blocks: header.blocks_number as u64,
        }
    }

    /// 把所有记录写为空闲
    pub fn format(&self) -> Result<()> {
        let record = bincode::serialize(&BLOCK_UNUSED)?;
        let mut written = 0;
        while written < self.total_blocks {
            let batch = (self.total_blocks - written).min(FORMAT_BATCH);
            let bytes = record.repeat(batch as usize);
            self.store
                .write_at(self.start + written * MAP_ENTRY_SIZE, &bytes)?;
            written += batch;
        }
        Ok(())
    }

    pub fn state(&self, index: u64) -> Result<BlockState> {
        self.check_index(index)?;
        let mut buf = [0u8; MAP_ENTRY_SIZE as usize];
        self.store
            .read_at(self.start + index * MAP_ENTRY_SIZE, &mut buf)?;
        let raw: i32 = bincode::deserialize(&buf)?;
        Ok(BlockState::from_raw(raw))
    }

    pub fn set_state(&self, index: u64, state: BlockState) -> Result<()> {
        self.check_index(index)?;
        let bytes = bincode::serialize(&state.to_raw())?;
        self.store
            .write_at(self.start + index * MAP_ENTRY_SIZE, &bytes)?;
        Ok(())
    }

    /// 从 0 开始顺序扫描，返回第一个空闲块；扫描不越出空闲表
    pub fn find_first_free(&self) -> Result<Option<u64>> {
        for index in 0..self.total_blocks {
            if self.state(index)? == BlockState::Unused {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// 按升序返回前 `count` 个空闲块，不足时返回 None
    ///
    /// 结果与“每找到一块就立即标记占用、再从 0 重新扫描”的首次适配完全相同。
    pub fn find_free(&self, count: u64) -> Result<Option<Vec<u64>>> {
        let mut found = Vec::new();
        for index in 0..self.total_blocks {
            if found.len() as u64 == count {
                break;
            }
            if self.state(index)? == BlockState::Unused {
                found.push(index);
            }
        }

        if (found.len() as u64) < count {
            debug!(
                "free map scan found {} of {} requested blocks",
                found.len(),
                count
            );
            return Ok(None);
        }
        Ok(Some(found))
    }

    pub fn count_free(&self) -> Result<u64> {
        let mut free = 0;
        for index in 0..self.total_blocks {
            if self.state(index)? == BlockState::Unused {
                free += 1;
            }
        }
        Ok(free)
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if index >= self.total_blocks {
            return Err(FileSystemError::Corrupted(format!(
                "block {} outside free map of {} entries",
                index, self.total_blocks
            )));
        }
        Ok(())
    }
}
