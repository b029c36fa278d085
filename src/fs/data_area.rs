use crate::{
    disk::ByteStore,
    fs::{
        config::LINK_SIZE,
        error::{FileSystemError, Result},
        super_block::VolumeHeader,
    },
};

/// 一个数据块：定长载荷 + 指向同一文件下一块的块号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub data: Vec<u8>,
    pub next: u64,
}

/// 数据区，所有块读写都直接落到容器上
pub struct DataArea<'a, S: ByteStore> {
    store: &'a S,
    start: u64,        // 数据区起始偏移
    total_blocks: u64, // 块总数
    payload_size: u64, // 每块载荷字节数
    end_of_chain: u64, // 链尾哨兵
}

impl<'a, S: ByteStore> DataArea<'a, S> {
    pub fn new(store: &'a S, header: &VolumeHeader) -> Self {
        Self {
            store,
            start: header.block_area_offset,
            total_blocks: header.blocks_number as u64,
            payload_size: header.block_payload_size,
            end_of_chain: header.end_of_chain(),
        }
    }

    pub fn block_offset(&self, index: u64) -> u64 {
        self.start + index * (self.payload_size + LINK_SIZE)
    }

    /// 写入一块；`data` 不足一块时以 0 补齐
    pub fn write_block(&self, index: u64, data: &[u8], next: u64) -> Result<()> {
        self.check_index(index)?;
        if data.len() as u64 > self.payload_size {
            return Err(FileSystemError::Corrupted(format!(
                "{} bytes do not fit a {}-byte block",
                data.len(),
                self.payload_size
            )));
        }

        let payload = self.payload_size as usize;
        let mut buf = vec![0u8; payload + LINK_SIZE as usize];
        buf[..data.len()].copy_from_slice(data);
        buf[payload..].copy_from_slice(&bincode::serialize(&next)?);
        self.store.write_at(self.block_offset(index), &buf)?;
        Ok(())
    }

    pub fn read_block(&self, index: u64) -> Result<DataBlock> {
        self.check_index(index)?;
        let payload = self.payload_size as usize;
        let mut buf = vec![0u8; payload + LINK_SIZE as usize];
        self.store.read_at(self.block_offset(index), &mut buf)?;

        let next: u64 = bincode::deserialize(&buf[payload..])?;
        buf.truncate(payload);
        Ok(DataBlock { data: buf, next })
    }

    /// 从 `first` 开始沿 next 指针遍历，直到哨兵
    pub fn chain(self, first: u64) -> Chain<'a, S> {
        Chain {
            next: first,
            hops: 0,
            area: self,
        }
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if index >= self.total_blocks {
            return Err(FileSystemError::Corrupted(format!(
                "block link {} points outside the {} data blocks",
                index, self.total_blocks
            )));
        }
        Ok(())
    }
}

/// 块链迭代器，产出 (块号, 块内容)
///
/// 指向数据区之外的链接、或长度超过块总数的链（必然有环）都报告为损坏，
/// 之后迭代结束。
pub struct Chain<'a, S: ByteStore> {
    area: DataArea<'a, S>,
    next: u64,
    hops: u64,
}

impl<'a, S: ByteStore> Iterator for Chain<'a, S> {
    type Item = Result<(u64, DataBlock)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.area.end_of_chain {
            return None;
        }
        if self.hops >= self.area.total_blocks {
            self.next = self.area.end_of_chain;
            return Some(Err(FileSystemError::Corrupted(
                "block chain is longer than the volume".to_string(),
            )));
        }

        let index = self.next;
        match self.area.read_block(index) {
            Ok(block) => {
                self.next = block.next;
                self.hops += 1;
                Some(Ok((index, block)))
            }
            Err(e) => {
                self.next = self.area.end_of_chain;
                Some(Err(e))
            }
        }
    }
}
