//! Known result categories / 已知网盘类型
//!
//! The search API groups links by platform. Categories outside this
//! table are still accepted and displayed under their raw key.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudKind {
    /// Cloud storage share page / 网盘分享
    Netdisk,
    /// Protocol link that can only be copied (magnet, ed2k, ...) / 仅可复制的链接
    Protocol,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloudType {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: CloudKind,
}

impl CloudType {
    pub fn is_copy_only(&self) -> bool {
        self.kind == CloudKind::Protocol
    }
}

static CLOUD_TYPES: Lazy<IndexMap<&'static str, CloudType>> = Lazy::new(|| {
    let netdisks = [
        ("baidu", "百度网盘"),
        ("aliyun", "阿里云盘"),
        ("quark", "夸克网盘"),
        ("tianyi", "天翼云盘"),
        ("uc", "UC网盘"),
        ("115", "115网盘"),
        ("pikpak", "PikPak"),
        ("xunlei", "迅雷网盘"),
        ("123", "123网盘"),
        ("mobile", "移动云盘"),
        ("lanzou", "蓝奏云盘"),
    ];
    let protocols = [
        ("magnet", "磁力链接"),
        ("torrent", "Torrent"),
        ("thunder", "Thunder"),
        ("ed2k", "ED2K链接"),
    ];

    let mut registry = IndexMap::new();
    for (key, label) in netdisks {
        registry.insert(key, CloudType { key, label, kind: CloudKind::Netdisk });
    }
    for (key, label) in protocols {
        registry.insert(key, CloudType { key, label, kind: CloudKind::Protocol });
    }
    registry
});

/// All known categories, netdisks first
pub fn all() -> impl Iterator<Item = &'static CloudType> {
    CLOUD_TYPES.values()
}

pub fn lookup(key: &str) -> Option<&'static CloudType> {
    CLOUD_TYPES.get(key)
}

/// Human readable label, falling back to the raw key
pub fn label(key: &str) -> &str {
    lookup(key).map(|t| t.label).unwrap_or(key)
}

pub fn is_copy_only(key: &str) -> bool {
    lookup(key).map(CloudType::is_copy_only).unwrap_or(false)
}
