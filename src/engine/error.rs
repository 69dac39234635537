// ==========================================
// 双轨会员网络管理系统 - 引擎层错误类型
// ==========================================
// 依据: Network_Master_Spec.md - PART D 错误分类
// 红线: 引擎错误必须可区分匹配, 禁止用字符串错误做控制流
// ==========================================

use thiserror::Error;

use crate::domain::hierarchy_path::PathCodecError;
use crate::repository::RepositoryError;

// ==========================================
// EngineError - 引擎层错误
// ==========================================
// 说明: 安置/退网/业绩/查询引擎的统一错误出口。
// 对齐: Network_Master_Spec.md - PART D 错误分类表
#[derive(Debug, Error)]
pub enum EngineError {
    /// 滑落搜索在限定深度内未找到空槽
    #[error("安置容量不足: 上级 {upline_id} 伞下 {max_depth} 层内无空槽")]
    CapacityExceeded { upline_id: String, max_depth: i64 },

    /// 非法安置请求 (自引用/上级不存在/槽位参数非法)
    #[error("非法安置: {0}")]
    InvalidPlacement(String),

    /// 对已退网点位重复执行退网
    #[error("点位 {position_id} 已是退网占位, 不允许重复退网")]
    AlreadyWithdrawn { position_id: String },

    /// 退网请求与点位当前占位人不匹配
    #[error("非法退网: {0}")]
    InvalidWithdrawal(String),

    /// 业绩金额非法 (非数字/负数)
    #[error("非法业绩金额: {0}")]
    InvalidSalesAmount(String),

    /// 目标实体不存在
    #[error("{entity}不存在: {id}")]
    NotFound { entity: String, id: String },

    /// 层级路径与存储结构不一致 (祖先链查询/对账检出)
    #[error("点位 {position_id} 路径不一致: {detail}")]
    InconsistentPath { position_id: String, detail: String },

    /// 写锁获取失败 (持锁线程panic)
    #[error("引擎写锁获取失败: {0}")]
    LockError(String),

    /// 仓储层错误透传
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// 其他未分类错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<PathCodecError> for EngineError {
    fn from(e: PathCodecError) -> Self {
        // 路径编码失败只会发生在安置入参非法时
        EngineError::InvalidPlacement(e.to_string())
    }
}

// 策略/注册表/台账端口统一返回 Box<dyn Error + Send + Sync>
impl From<Box<dyn std::error::Error + Send + Sync>> for EngineError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        EngineError::Other(anyhow::Error::msg(e.to_string()))
    }
}

/// 引擎层结果类型别名
pub type EngineResult<T> = Result<T, EngineError>;
