//! Sidecar files attached to record files.

use bytes::Bytes;
use mirror_common::Hash384;

use crate::proto::SidecarType;

/// Category of data carried by a sidecar record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SidecarKind {
    StateChanges,
    Actions,
    Bytecode,
}

impl SidecarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SidecarKind::StateChanges => "state_changes",
            SidecarKind::Actions => "actions",
            SidecarKind::Bytecode => "bytecode",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "state_changes" => Some(SidecarKind::StateChanges),
            "actions" => Some(SidecarKind::Actions),
            "bytecode" => Some(SidecarKind::Bytecode),
            _ => None,
        }
    }

    /// Maps a declared sidecar type; unknown types have no kind.
    pub fn from_proto(value: i32) -> Option<Self> {
        match SidecarType::try_from(value).ok()? {
            SidecarType::ContractStateChange => Some(SidecarKind::StateChanges),
            SidecarType::ContractAction => Some(SidecarKind::Actions),
            SidecarType::ContractBytecode => Some(SidecarKind::Bytecode),
            SidecarType::SidecarTypeUnknown => None,
        }
    }

    pub fn to_proto(self) -> SidecarType {
        match self {
            SidecarKind::StateChanges => SidecarType::ContractStateChange,
            SidecarKind::Actions => SidecarType::ContractAction,
            SidecarKind::Bytecode => SidecarType::ContractBytecode,
        }
    }
}

/// One record in a sidecar file. The payload is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarRecord {
    pub consensus_timestamp: i64,
    pub migration: bool,
    pub kind: SidecarKind,
    pub data: Bytes,
}

/// A decoded sidecar file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarFile {
    pub name: String,
    pub id: u32,
    /// SHA-384 of the decompressed file.
    pub hash: Hash384,
    pub size: usize,
    pub records: Vec<SidecarRecord>,
}
