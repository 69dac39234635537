// ==========================================
// 双轨会员网络管理系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合网络引擎所需的全部 Repository
// 目标: 减少各引擎构造函数的参数数量, 统一依赖注入入口
// ==========================================

use std::sync::Arc;

use crate::repository::{ActionLogRepository, PositionRepository};

/// 网络引擎仓储集合
///
/// 聚合安置/退网/业绩/对账引擎共用的仓储, 简化依赖注入。
///
/// # 包含的仓储
/// - `position_repo`: 点位树 (唯一持久化真相)
/// - `action_log_repo`: 操作日志 (审计追踪)
#[derive(Clone)]
pub struct NetworkRepositories {
    /// 点位仓储
    pub position_repo: Arc<PositionRepository>,
    /// 操作日志仓储
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl NetworkRepositories {
    /// 创建新的仓储集合
    pub fn new(
        position_repo: Arc<PositionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            position_repo,
            action_log_repo,
        }
    }

    /// 获取点位仓储
    pub fn position_repo(&self) -> &Arc<PositionRepository> {
        &self.position_repo
    }

    /// 获取操作日志仓储
    pub fn action_log_repo(&self) -> &Arc<ActionLogRepository> {
        &self.action_log_repo
    }
}

// 注: 聚合结构体自身无行为, 其正确性由各引擎的
// 单元测试与集成测试覆盖。
