//! 与 Jupiter JSON 约定对齐的 serde 辅助函数。

pub mod field_as_string;
pub mod null_as_default;
