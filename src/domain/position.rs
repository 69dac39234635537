// ==========================================
// 双轨会员网络管理系统 - 点位领域模型
// ==========================================
// 依据: Network_Master_Spec.md - PART B 点位树红线
// 依据: Engine_Specs_v0.2_Network.md - 主实体定义
// ==========================================
// 红线: 点位只由安置引擎创建; 父子链接/层级/路径建后不变;
//       点位永不删除, 退网仅替换占位人
// ==========================================

use crate::domain::hierarchy_path::{self, PathCodecError};
use crate::domain::occupant::Occupant;
use crate::domain::types::PositionType;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Position - 点位
// ==========================================
// 对齐: schema_v0.1.sql network_position 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    // ===== 结构字段 (建后不变) =====
    pub position_id: String,         // 点位ID (UUID)
    pub parent_id: Option<String>,   // 父点位ID (根点位为 None)
    pub position_type: PositionType, // ROOT / LEFT / RIGHT
    pub level: i64,                  // 层级 (根 = 0, 子 = 父 + 1)
    pub hierarchy_path: String,      // 层级路径 (根到自身的点位ID序列)
    pub seq_no: i64,                 // 全局落位序号 (入库事务内分配)

    // ===== 占位人 (退网时整体替换) =====
    pub occupant: Occupant,

    // ===== 汇总字段 (由 Rollup Engine 维护) =====
    pub left_count: i64,      // 左区伞下点位数
    pub right_count: i64,     // 右区伞下点位数
    pub own_sales: Decimal,   // 本点位自身业绩
    pub left_sales: Decimal,  // 左区伞下业绩 (含左子自身)
    pub right_sales: Decimal, // 右区伞下业绩 (含右子自身)

    // ===== 时间戳 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Position {
    /// 创建根点位 (层级 0, 路径 = 自身ID)
    ///
    /// # 参数
    /// - `position_id`: 点位ID (通常使用UUID)
    /// - `occupant`: 占位人
    pub fn new_root(position_id: String, occupant: Occupant) -> Result<Self, PathCodecError> {
        let hierarchy_path = hierarchy_path::encode_root(&position_id)?;
        let now = chrono::Utc::now().naive_utc();
        Ok(Self {
            position_id,
            parent_id: None,
            position_type: PositionType::Root,
            level: 0,
            hierarchy_path,
            seq_no: 0,
            occupant,
            left_count: 0,
            right_count: 0,
            own_sales: Decimal::ZERO,
            left_sales: Decimal::ZERO,
            right_sales: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    /// 创建子点位 (层级/路径由父点位推导, 保证落位不变式)
    ///
    /// # 参数
    /// - `position_id`: 新点位ID
    /// - `parent`: 已入库的父点位
    /// - `position_type`: LEFT 或 RIGHT (ROOT 由 `new_root` 负责)
    /// - `occupant`: 占位人
    pub fn new_child(
        position_id: String,
        parent: &Position,
        position_type: PositionType,
        occupant: Occupant,
    ) -> Result<Self, PathCodecError> {
        let hierarchy_path = hierarchy_path::encode_child(&parent.hierarchy_path, &position_id)?;
        let now = chrono::Utc::now().naive_utc();
        Ok(Self {
            position_id,
            parent_id: Some(parent.position_id.clone()),
            position_type,
            level: parent.level + 1,
            hierarchy_path,
            seq_no: 0,
            occupant,
            left_count: 0,
            right_count: 0,
            own_sales: Decimal::ZERO,
            left_sales: Decimal::ZERO,
            right_sales: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    /// 设置自身业绩 (存量导入时使用)
    pub fn with_own_sales(mut self, own_sales: Decimal) -> Self {
        self.own_sales = own_sales;
        self
    }

    /// 是否根点位
    pub fn is_root(&self) -> bool {
        self.position_type == PositionType::Root
    }

    /// 伞下总点位数 (左区 + 右区)
    pub fn downline_count(&self) -> i64 {
        self.left_count + self.right_count
    }

    /// 伞下总业绩 (左区 + 右区, 不含自身)
    pub fn downline_sales(&self) -> Decimal {
        self.left_sales + self.right_sales
    }
}

// ==========================================
// RollupUpdate - 汇总字段更新集
// ==========================================
// 用途: Rollup Engine 计算出的祖先链更新, 由仓储层在
//       同一事务内与触发变更一起提交
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupUpdate {
    pub position_id: String,
    pub left_count: i64,
    pub right_count: i64,
    pub left_sales: Decimal,
    pub right_sales: Decimal,
}

impl RollupUpdate {
    /// 从点位当前值构造 (再由重算逻辑覆写)
    pub fn from_position(position: &Position) -> Self {
        Self {
            position_id: position.position_id.clone(),
            left_count: position.left_count,
            right_count: position.right_count,
            left_sales: position.left_sales,
            right_sales: position.right_sales,
        }
    }

    /// 是否与点位当前存储值一致
    pub fn matches(&self, position: &Position) -> bool {
        self.left_count == position.left_count
            && self.right_count == position.right_count
            && self.left_sales == position.left_sales
            && self.right_sales == position.right_sales
    }

    /// 将更新套用到点位内存快照 (向上递推时构造"已更新子节点")
    pub fn apply_to(&self, position: &mut Position) {
        position.left_count = self.left_count;
        position.right_count = self.right_count;
        position.left_sales = self.left_sales;
        position.right_sales = self.right_sales;
    }
}
