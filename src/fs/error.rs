use thiserror::Error;

/// 文件系统错误类型
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// 容器无法打开或创建
    #[error("Cannot open or create container {path}: {source}")]
    StorageUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 宿主机上的源文件或目标文件无法访问
    #[error("Cannot access host file {path}: {source}")]
    HostFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Not enough space on volume: {needed} bytes requested, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },

    #[error("Volume reached max number of files")]
    TableFull,

    #[error("File already exists on volume: {0}")]
    NameCollision(String),

    #[error("File not found on volume: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Volume size {size} is too small, at least {minimum} bytes required")]
    VolumeTooSmall { size: u64, minimum: u64 },

    /// 卷头记录的载荷大小与当前配置不一致
    #[error("Volume uses {found}-byte blocks but {expected}-byte blocks are configured")]
    FormatMismatch { expected: u64, found: u64 },

    #[error("File system corrupted: {0}")]
    Corrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Disk I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
