// ==========================================
// 双轨会员网络管理系统 - 占位人领域模型
// ==========================================
// 依据: Network_Master_Spec.md - PART B1 占位形态
// 红线: 点位永不删除; 退网只替换占位人, 不动结构
// ==========================================

use crate::domain::types::OccupantKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// MemberRef - 在网会员占位
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub member_id: String,    // 会员编号 (会员注册系统主键)
    pub display_name: String, // 会员姓名
}

// ==========================================
// WithdrawalRef - 退网占位
// ==========================================
// 用途: 会员退网后的永久占位符, 保持树结构与历史业绩可追溯
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRef {
    pub member_no: String,        // 退网会员编号
    pub display_name: String,     // 退网会员姓名
    pub withdrawn_on: NaiveDate,  // 退网日期
}

// ==========================================
// Occupant - 占位人 (标签联合)
// ==========================================
// 红线: 任一时刻恰好一种形态, 序列化带显式 kind 标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Occupant {
    Member(MemberRef),
    Withdrawal(WithdrawalRef),
}

impl Occupant {
    /// 构造在网会员占位
    pub fn member(member_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Occupant::Member(MemberRef {
            member_id: member_id.into(),
            display_name: display_name.into(),
        })
    }

    /// 构造退网占位
    pub fn withdrawal(
        member_no: impl Into<String>,
        display_name: impl Into<String>,
        withdrawn_on: NaiveDate,
    ) -> Self {
        Occupant::Withdrawal(WithdrawalRef {
            member_no: member_no.into(),
            display_name: display_name.into(),
            withdrawn_on,
        })
    }

    /// 占位人类型
    pub fn kind(&self) -> OccupantKind {
        match self {
            Occupant::Member(_) => OccupantKind::Member,
            Occupant::Withdrawal(_) => OccupantKind::Withdrawal,
        }
    }

    /// 展示姓名
    pub fn display_name(&self) -> &str {
        match self {
            Occupant::Member(m) => &m.display_name,
            Occupant::Withdrawal(w) => &w.display_name,
        }
    }

    /// 身份标识 (在网 = 会员编号, 退网 = 退网会员编号)
    ///
    /// 用于导入幂等判断与对账身份匹配
    pub fn identity_id(&self) -> &str {
        match self {
            Occupant::Member(m) => &m.member_id,
            Occupant::Withdrawal(w) => &w.member_no,
        }
    }

    /// 是否退网占位
    pub fn is_withdrawn(&self) -> bool {
        matches!(self, Occupant::Withdrawal(_))
    }

    /// 生成读侧描述符 (调用方无需感知存储形态)
    pub fn descriptor(&self) -> OccupantDescriptor {
        OccupantDescriptor {
            kind: self.kind(),
            display_name: self.display_name().to_string(),
            identity_id: self.identity_id().to_string(),
        }
    }
}

// ==========================================
// OccupantDescriptor - 占位人描述符 (读侧)
// ==========================================
// 用途: 伞下/安置链查询的统一占位人视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupantDescriptor {
    pub kind: OccupantKind,   // 占位形态
    pub display_name: String, // 展示姓名
    pub identity_id: String,  // 身份标识
}
