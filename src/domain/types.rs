// ==========================================
// 双轨会员网络管理系统 - 领域类型定义
// ==========================================
// 依据: Network_Master_Spec.md - PART B 点位树红线
// 依据: Engine_Specs_v0.2_Network.md - 0.1 点位类型体系
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 点位类型 (Position Type)
// ==========================================
// 红线: 每个点位至多一个 LEFT 子点位、一个 RIGHT 子点位
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionType {
    Root,  // 根点位 (全网唯一)
    Left,  // 左区点位
    Right, // 右区点位
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionType::Root => write!(f, "ROOT"),
            PositionType::Left => write!(f, "LEFT"),
            PositionType::Right => write!(f, "RIGHT"),
        }
    }
}

impl PositionType {
    /// 从字符串解析点位类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ROOT" => Some(PositionType::Root),
            "LEFT" => Some(PositionType::Left),
            "RIGHT" => Some(PositionType::Right),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PositionType::Root => "ROOT",
            PositionType::Left => "LEFT",
            PositionType::Right => "RIGHT",
        }
    }
}

// ==========================================
// 占位人类型 (Occupant Kind)
// ==========================================
// 红线: 一个点位在任一时刻恰好有一种占位形态
// MEMBER: 在网会员占位; WITHDRAWAL: 退网占位 (永久占位符)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupantKind {
    Member,     // 在网会员
    Withdrawal, // 退网记录
}

impl fmt::Display for OccupantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccupantKind::Member => write!(f, "MEMBER"),
            OccupantKind::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

impl OccupantKind {
    /// 从字符串解析占位人类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MEMBER" => Some(OccupantKind::Member),
            "WITHDRAWAL" => Some(OccupantKind::Withdrawal),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OccupantKind::Member => "MEMBER",
            OccupantKind::Withdrawal => "WITHDRAWAL",
        }
    }
}

// ==========================================
// 对账发现类型 (Reconcile Finding Kind)
// ==========================================
// 依据: Engine_Specs_v0.2_Network.md - 6. Reconcile Engine
// 红线: 对账只读, 只出报告, 不做任何自动修正
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileFindingKind {
    OnlyInStore,       // 仅存在于安置网络
    OnlyInExternal,    // 仅存在于推荐网络
    NameMismatch,      // 姓名不一致
    LevelMismatch,     // 层级不一致 (外部层级 vs 安置层级)
    PathInconsistency, // 层级路径与存储字段不一致
    RollupMismatch,    // 汇总值与子点位推导值不一致
}

impl fmt::Display for ReconcileFindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileFindingKind::OnlyInStore => write!(f, "ONLY_IN_STORE"),
            ReconcileFindingKind::OnlyInExternal => write!(f, "ONLY_IN_EXTERNAL"),
            ReconcileFindingKind::NameMismatch => write!(f, "NAME_MISMATCH"),
            ReconcileFindingKind::LevelMismatch => write!(f, "LEVEL_MISMATCH"),
            ReconcileFindingKind::PathInconsistency => write!(f, "PATH_INCONSISTENCY"),
            ReconcileFindingKind::RollupMismatch => write!(f, "ROLLUP_MISMATCH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_type_roundtrip() {
        for pt in [PositionType::Root, PositionType::Left, PositionType::Right] {
            assert_eq!(PositionType::from_str(pt.to_db_str()), Some(pt));
        }
        assert_eq!(PositionType::from_str("left"), Some(PositionType::Left));
        assert_eq!(PositionType::from_str("MIDDLE"), None);
    }

    #[test]
    fn test_occupant_kind_roundtrip() {
        assert_eq!(
            OccupantKind::from_str("MEMBER"),
            Some(OccupantKind::Member)
        );
        assert_eq!(
            OccupantKind::from_str("withdrawal"),
            Some(OccupantKind::Withdrawal)
        );
        assert_eq!(OccupantKind::from_str(""), None);
    }

    #[test]
    fn test_display_matches_db_str() {
        assert_eq!(PositionType::Left.to_string(), "LEFT");
        assert_eq!(OccupantKind::Withdrawal.to_string(), "WITHDRAWAL");
        assert_eq!(
            ReconcileFindingKind::OnlyInExternal.to_string(),
            "ONLY_IN_EXTERNAL"
        );
    }
}
