//! 以字符串形式收发的字段（公钥、u64 数量等）。

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serializer, de};

pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|err| de::Error::custom(format!("无法解析字段 `{raw}`: {err}")))
}
