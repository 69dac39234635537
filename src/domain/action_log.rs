// ==========================================
// 双轨会员网络管理系统 - 操作日志领域模型
// ==========================================
// 依据: Network_Master_Spec.md - PART A3 审计增强
// 红线: 所有写入必须记录
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 用途: 审计追踪 (安置/退网/业绩/导入)
// 对齐: schema_v0.1.sql action_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,          // 日志ID (UUID)
    pub position_id: Option<String>, // 关联点位 (导入/配置等系统操作可为None)
    pub action_type: String,        // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,   // 操作时间戳
    pub actor: String,              // 操作人

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    PlaceRoot,   // 创建根点位
    Place,       // 安置落位
    Withdraw,    // 退网占位替换
    SalesUpdate, // 业绩更新
    Recompute,   // 汇总重算 (修复/校验用)
    Import,      // 存量网络导入
    Seed,        // 演示数据播种
    ConfigUpdate, // 策略配置变更
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PlaceRoot => "PlaceRoot",
            ActionType::Place => "Place",
            ActionType::Withdraw => "Withdraw",
            ActionType::SalesUpdate => "SalesUpdate",
            ActionType::Recompute => "Recompute",
            ActionType::Import => "Import",
            ActionType::Seed => "Seed",
            ActionType::ConfigUpdate => "ConfigUpdate",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PlaceRoot" => Some(ActionType::PlaceRoot),
            "Place" => Some(ActionType::Place),
            "Withdraw" => Some(ActionType::Withdraw),
            "SalesUpdate" => Some(ActionType::SalesUpdate),
            "Recompute" => Some(ActionType::Recompute),
            "Import" => Some(ActionType::Import),
            "Seed" => Some(ActionType::Seed),
            "ConfigUpdate" => Some(ActionType::ConfigUpdate),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `action_id`: 日志ID (通常使用UUID)
    /// - `position_id`: 关联点位ID (可选)
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    pub fn new(
        action_id: String,
        position_id: Option<String>,
        action_type: ActionType,
        actor: String,
    ) -> Self {
        Self {
            action_id,
            position_id,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor,
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
