//! 预处理错误类型

use contracts::ContractError;
use thiserror::Error;

/// 预处理错误
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// 图像负载不是合法的 base64
    #[error("invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// 无法解码为图像
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// 裁剪窗口未选中任何行
    #[error("crop rows {top}..{bottom} select nothing from an image {height} rows tall")]
    EmptyCrop {
        /// First requested row
        top: u32,
        /// One past the last requested row
        bottom: u32,
        /// Image height
        height: u32,
    },

    /// 模糊核尺寸为偶数
    #[error("gaussian kernel size must be odd, got {0}")]
    InvalidKernel(u32),

    /// 缩放目标存在零尺寸
    #[error("resize target {width}x{height} is empty")]
    EmptyTarget {
        /// Target width
        width: u32,
        /// Target height
        height: u32,
    },
}

impl From<PreprocessError> for ContractError {
    fn from(err: PreprocessError) -> Self {
        ContractError::image_decode(err.to_string())
    }
}

/// 预处理 Result 类型别名
pub type Result<T> = std::result::Result<T, PreprocessError>;
