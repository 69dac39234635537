// ==========================================
// 双轨会员网络管理系统 - API层错误类型
// ==========================================
// 依据: Network_Master_Spec.md - PART D 错误分类
// 职责: 将仓储/引擎/导入错误转换为可向操作员解释的错误消息
// 红线: 错误必须可解释, 禁止向调用方抛裸SQL错误
// ==========================================

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::engine::EngineError;
use crate::importer::ImportError;
use crate::repository::RepositoryError;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 安置错误 =====
    #[error("安置失败: {0}")]
    PlacementFailed(String),

    #[error("安置容量不足: {0}")]
    CapacityExceeded(String),

    #[error("槽位冲突: {0}")]
    SlotOccupied(String),

    // ===== 退网错误 =====
    #[error("退网失败: {0}")]
    WithdrawalFailed(String),

    #[error("重复退网: {0}")]
    AlreadyWithdrawn(String),

    // ===== 业绩错误 =====
    #[error("业绩更新失败: {0}")]
    SalesUpdateFailed(String),

    // ===== 谱系/对账错误 =====
    #[error("网络结构不一致: {0}")]
    InconsistentNetwork(String),

    // ===== 通用错误 =====
    #[error("无效的输入参数: {0}")]
    InvalidInput(String),

    #[error("记录不存在: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("数据库操作失败: {0}")]
    DatabaseError(String),

    #[error("导入失败: {0}")]
    ImportFailed(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 错误转换: Repository -> Api
// ==========================================
// 说明: 仓储错误面向表结构, 这里翻译成操作员视角的措辞。
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SlotOccupied {
                parent_id,
                position_type,
            } => ApiError::SlotOccupied(format!(
                "上级 {} 的 {} 槽位已有占位, 请改用滑落安置或另选上级",
                parent_id, position_type
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => {
                ApiError::DatabaseError(format!("数据库连接失败: {}", msg))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseError(format!("事务执行失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => {
                ApiError::DatabaseError(format!("查询执行失败: {}", msg))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                // 槽位部分唯一索引是并发安置的最后防线, 提示重试而非报输入错误
                if msg.contains("idx_position_slot") {
                    ApiError::SlotOccupied("目标槽位刚被并发安置占用, 请重试".to_string())
                } else if msg.contains("hierarchy_path") || msg.contains("seq_no") {
                    ApiError::InternalError(format!("网络结构键冲突: {}", msg))
                } else {
                    ApiError::InvalidInput(format!("唯一性冲突: {}", msg))
                }
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("引用的父点位不存在: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::BusinessRuleViolation(format!("无效的状态转换: {} -> {}", from, to))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段 {} 取值非法: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

// ==========================================
// 错误转换: Engine -> Api
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::CapacityExceeded {
                upline_id,
                max_depth,
            } => ApiError::CapacityExceeded(format!(
                "上级 {} 伞下 {} 层内无空槽, 请另选安置上级",
                upline_id, max_depth
            )),
            EngineError::InvalidPlacement(msg) => ApiError::PlacementFailed(msg),
            EngineError::AlreadyWithdrawn { position_id } => ApiError::AlreadyWithdrawn(format!(
                "点位 {} 已是退网占位, 不允许重复退网",
                position_id
            )),
            EngineError::InvalidWithdrawal(msg) => ApiError::WithdrawalFailed(msg),
            EngineError::InvalidSalesAmount(msg) => ApiError::SalesUpdateFailed(msg),
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::InconsistentPath {
                position_id,
                detail,
            } => ApiError::InconsistentNetwork(format!(
                "点位 {} 路径不一致: {}, 请先运行对账",
                position_id, detail
            )),
            EngineError::LockError(msg) => {
                ApiError::InternalError(format!("引擎写锁获取失败: {}", msg))
            }
            EngineError::Repository(e) => e.into(),
            EngineError::Other(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

// ==========================================
// 错误转换: Import -> Api
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => {
                ApiError::InvalidInput(format!("导入文件不存在: {}", path))
            }
            ImportError::UnsupportedFormat(ext) => ApiError::InvalidInput(format!(
                "文件格式不支持: {}（仅支持 .xlsx/.xls/.csv）",
                ext
            )),
            ImportError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(e) => ApiError::InternalError(e.to_string()),
            other => ApiError::ImportFailed(other.to_string()),
        }
    }
}

/// API层结果类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 入参校验辅助函数
// ==========================================

/// 校验会员编号入参
///
/// # 参数
/// - `member_no`: 会员编号 (如 M000001)
///
/// # 红线
/// 空编号与含空白字符的编号一律拒绝, 不做静默修剪
pub fn validate_member_no(member_no: &str) -> ApiResult<()> {
    if member_no.is_empty() {
        return Err(ApiError::InvalidInput("会员编号不能为空".to_string()));
    }
    if member_no.chars().any(|c| c.is_whitespace()) {
        return Err(ApiError::InvalidInput(format!(
            "会员编号不能包含空白字符: {:?}",
            member_no
        )));
    }
    if member_no.len() > 64 {
        return Err(ApiError::InvalidInput(format!(
            "会员编号过长 ({} 字符, 上限 64)",
            member_no.len()
        )));
    }
    Ok(())
}

/// 校验点位ID入参
///
/// 点位ID会拼入层级路径, 含路径分隔符的ID直接拒绝。
pub fn validate_position_id(position_id: &str) -> ApiResult<()> {
    if position_id.is_empty() {
        return Err(ApiError::InvalidInput("点位ID不能为空".to_string()));
    }
    if position_id.contains('/') {
        return Err(ApiError::InvalidInput(format!(
            "点位ID不能包含路径分隔符: {}",
            position_id
        )));
    }
    Ok(())
}

/// 解析并校验业绩金额入参
///
/// # 返回
/// 非负定点数金额; 非数字或负数返回 InvalidInput
pub fn validate_sales_amount(amount: &str) -> ApiResult<Decimal> {
    let value = Decimal::from_str(amount.trim()).map_err(|e| {
        ApiError::InvalidInput(format!("业绩金额不是合法数字: {} ({})", amount, e))
    })?;
    if value.is_sign_negative() {
        return Err(ApiError::InvalidInput(format!(
            "业绩金额不能为负数: {}",
            value
        )));
    }
    Ok(value)
}
