// ==========================================
// 双轨会员网络管理系统 - 领域模型层
// ==========================================
// 依据: Network_Master_Spec.md - PART B 数据与占位体系
// 依据: Engine_Specs_v0.2_Network.md - 主实体定义
// ==========================================
// 职责: 定义领域实体、类型、路径编解码
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod hierarchy_path;
pub mod import;
pub mod occupant;
pub mod position;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use hierarchy_path::PathCodecError;
pub use import::{DqLevel, DqViolation, ImportOutcome, RawNetworkRecord};
pub use occupant::{MemberRef, Occupant, OccupantDescriptor, WithdrawalRef};
pub use position::{Position, RollupUpdate};
pub use types::{OccupantKind, PositionType, ReconcileFindingKind};
