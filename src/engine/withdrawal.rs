// ==========================================
// 双轨会员网络管理系统 - 退网引擎
// ==========================================
// 依据: Network_Master_Spec.md - PART B3 退网占位替换
// 职责: 将在网会员占位替换为退网占位, 点位本身永不删除
// 红线: 只改占位人字段; 结构字段与两侧汇总一律不动;
//       退网本身不触发汇总重算 (口径变化在下次重算时生效)
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::occupant::{Occupant, WithdrawalRef};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::NetworkRepositories;
use crate::repository::RepositoryError;

// ==========================================
// WithdrawalRequest - 退网请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// 退网会员编号 (必须与点位当前占位人一致)
    pub member_no: String,
    /// 退网生效日
    pub withdrawn_on: NaiveDate,
    /// 审计备注
    pub reason: Option<String>,
}

impl WithdrawalRequest {
    pub fn new(member_no: impl Into<String>, withdrawn_on: NaiveDate) -> Self {
        Self {
            member_no: member_no.into(),
            withdrawn_on,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// ==========================================
// WithdrawalResult - 退网结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalResult {
    pub position_id: String,
    pub member_no: String,
    /// 保留的退网前展示姓名
    pub display_name: String,
    pub withdrawn_on: NaiveDate,
}

// ==========================================
// WithdrawalEngine - 退网引擎
// ==========================================
// 并发说明: 占位替换是单行条件 UPDATE, 不产生汇总写入,
// 无需引擎写闸门; 并发重复退网由仓储层状态守卫拒绝。
pub struct WithdrawalEngine {
    repos: NetworkRepositories,
}

impl WithdrawalEngine {
    pub fn new(repos: NetworkRepositories) -> Self {
        Self { repos }
    }

    /// 退网占位替换
    ///
    /// # 参数
    /// - `position_id`: 目标点位
    /// - `request`: 退网请求 (编号必须与当前占位人一致)
    /// - `operator`: 操作人
    ///
    /// # 红线
    /// - 重复退网报 [`EngineError::AlreadyWithdrawn`], 不静默成功
    /// - 不触发任何汇总重算; 点位后续业绩更新照常向上递推
    #[instrument(skip(self, request), fields(position_id = %position_id, operator = %operator))]
    pub fn withdraw(
        &self,
        position_id: &str,
        request: WithdrawalRequest,
        operator: &str,
    ) -> EngineResult<WithdrawalResult> {
        let position = self
            .repos
            .position_repo
            .find_by_id(position_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "点位".to_string(),
                id: position_id.to_string(),
            })?;

        let member = match &position.occupant {
            Occupant::Member(member) => member,
            Occupant::Withdrawal(_) => {
                return Err(EngineError::AlreadyWithdrawn {
                    position_id: position_id.to_string(),
                })
            }
        };
        if member.member_id != request.member_no {
            return Err(EngineError::InvalidWithdrawal(format!(
                "点位 {} 当前占位会员为 {}, 与退网请求 {} 不符",
                position_id, member.member_id, request.member_no
            )));
        }

        let record = WithdrawalRef {
            member_no: request.member_no.clone(),
            display_name: member.display_name.clone(),
            withdrawn_on: request.withdrawn_on,
        };

        // 并发下两次预检可能同时通过, 以仓储层条件更新的结果为准
        match self
            .repos
            .position_repo
            .convert_to_withdrawal(position_id, &record)
        {
            Ok(()) => {}
            Err(RepositoryError::InvalidStateTransition { .. }) => {
                return Err(EngineError::AlreadyWithdrawn {
                    position_id: position_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            position_id = %position_id,
            member_no = %record.member_no,
            withdrawn_on = %record.withdrawn_on,
            "退网占位替换完成"
        );

        let result = WithdrawalResult {
            position_id: position_id.to_string(),
            member_no: record.member_no,
            display_name: record.display_name,
            withdrawn_on: record.withdrawn_on,
        };

        let mut log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(position_id.to_string()),
            ActionType::Withdraw,
            operator.to_string(),
        )
        .with_payload(&result);
        if let Some(reason) = &request.reason {
            log = log.with_detail(reason.clone());
        }
        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            tracing::warn!(
                position_id = %position_id,
                error = %e,
                "操作日志写入失败"
            );
        }

        Ok(result)
    }
}
