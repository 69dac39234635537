// ==========================================
// 双轨会员网络管理系统 - 安置引擎
// ==========================================
// 依据: Network_Master_Spec.md - PART B1 安置与滑落
// 依据: TD-002 并发控制设计 (引擎级写闸門)
// 职责: 根点位创建、常规安置 (含滑落搜索)、定向安置 (导入回放)
// 红线: 任何上级最多一左一右; 滑落搜索为确定性广度优先左优先;
//       点位插入与祖先汇总更新同事务提交
// ==========================================

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::config::NetworkPolicyReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::occupant::Occupant;
use crate::domain::position::Position;
use crate::domain::types::PositionType;
use crate::engine::collaborators::OptionalMemberRegistry;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::NetworkRepositories;
use crate::engine::rollup::RollupCalculator;

// ==========================================
// PlacementResult - 安置结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementResult {
    /// 新点位ID
    pub position_id: String,
    /// 直接父点位 (根点位为 None)
    pub parent_id: Option<String>,
    /// 槽位类型
    pub position_type: PositionType,
    /// 所在层级
    pub level: i64,
    /// 层级路径
    pub hierarchy_path: String,
    /// 全局插入序号
    pub seq_no: i64,
    /// 相对安置上级的实际落位深度 (直接落位=1, 根=0)
    pub spillover_depth: i64,
}

// ==========================================
// PlacementEngine - 安置引擎
// ==========================================
pub struct PlacementEngine {
    repos: NetworkRepositories,
    rollup: Arc<RollupCalculator>,
    registry: Arc<OptionalMemberRegistry>,
    policy: Arc<dyn NetworkPolicyReader>,
    /// 写闸门: 与业绩引擎共享, 串行化"读树-算汇总-写库"全程
    write_gate: Arc<Mutex<()>>,
}

impl PlacementEngine {
    pub fn new(
        repos: NetworkRepositories,
        rollup: Arc<RollupCalculator>,
        registry: Arc<OptionalMemberRegistry>,
        policy: Arc<dyn NetworkPolicyReader>,
        write_gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            repos,
            rollup,
            registry,
            policy,
            write_gate,
        }
    }

    /// 创建根点位
    ///
    /// # 参数
    /// - `occupant`: 根占位人
    /// - `operator`: 操作人 (审计用)
    ///
    /// # 红线
    /// - 全网最多一个根点位, 重复创建由仓储层事务内拒绝
    #[instrument(skip(self, occupant), fields(operator = %operator))]
    pub fn place_root(&self, occupant: Occupant, operator: &str) -> EngineResult<PlacementResult> {
        self.verify_member_identity(&occupant)?;
        self.verify_not_already_placed(&occupant)?;

        let _guard = self
            .write_gate
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        let position = Position::new_root(Uuid::new_v4().to_string(), occupant)?;
        let seq_no = self.repos.position_repo.insert_root(&position)?;

        tracing::info!(
            position_id = %position.position_id,
            "根点位创建完成"
        );

        let result = PlacementResult {
            position_id: position.position_id.clone(),
            parent_id: None,
            position_type: PositionType::Root,
            level: 0,
            hierarchy_path: position.hierarchy_path.clone(),
            seq_no,
            spillover_depth: 0,
        };
        self.log_action(
            ActionType::PlaceRoot,
            &result,
            operator,
            "创建根点位".to_string(),
        );
        Ok(result)
    }

    /// 常规安置: 先左后右, 满则广度优先左优先滑落
    ///
    /// # 参数
    /// - `occupant`: 新占位人
    /// - `upline_id`: 安置上级点位ID (滑落搜索起点)
    /// - `operator`: 操作人
    ///
    /// # 返回
    /// - 实际落位信息 (父点位可能深于安置上级)
    ///
    /// # 红线
    /// - 搜索深度受 placement/max_spillover_depth 限定, 超界报容量不足
    /// - 绝不在同一上级下产生第三个直接子节点
    #[instrument(skip(self, occupant), fields(upline_id = %upline_id, operator = %operator))]
    pub fn place(
        &self,
        occupant: Occupant,
        upline_id: &str,
        operator: &str,
    ) -> EngineResult<PlacementResult> {
        self.verify_member_identity(&occupant)?;
        self.verify_not_already_placed(&occupant)?;

        let _guard = self
            .write_gate
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        let upline = self
            .repos
            .position_repo
            .find_by_id(upline_id)?
            .ok_or_else(|| {
                EngineError::InvalidPlacement(format!("安置上级不存在: {}", upline_id))
            })?;

        let (parent, slot, depth) = self.find_open_slot(&upline)?;
        let position = Position::new_child(Uuid::new_v4().to_string(), &parent, slot, occupant)?;

        let updates = self.rollup.propagate_from(&position)?;
        let seq_no = self
            .repos
            .position_repo
            .insert_placement(&position, &updates)?;

        tracing::info!(
            position_id = %position.position_id,
            parent_id = %parent.position_id,
            slot = %slot,
            spillover_depth = depth,
            ancestors_updated = updates.len(),
            "安置落位完成"
        );

        let result = PlacementResult {
            position_id: position.position_id.clone(),
            parent_id: Some(parent.position_id.clone()),
            position_type: slot,
            level: position.level,
            hierarchy_path: position.hierarchy_path.clone(),
            seq_no,
            spillover_depth: depth,
        };
        self.log_action(
            ActionType::Place,
            &result,
            operator,
            format!(
                "安置上级 {}, 落位 {} 的 {} 槽位, 深度 {}",
                upline_id, parent.position_id, slot, depth
            ),
        );
        Ok(result)
    }

    /// 定向安置: 指定父点位与槽位, 不做滑落搜索
    ///
    /// # 用途
    /// - 存量网络导入按原结构回放; 槽位冲突由仓储层事务内拒绝
    #[instrument(skip(self, occupant), fields(parent_id = %parent_id, slot = %position_type, operator = %operator))]
    pub fn place_directed(
        &self,
        occupant: Occupant,
        parent_id: &str,
        position_type: PositionType,
        operator: &str,
    ) -> EngineResult<PlacementResult> {
        if position_type == PositionType::Root {
            return Err(EngineError::InvalidPlacement(
                "定向安置不允许指定 ROOT 槽位".to_string(),
            ));
        }
        self.verify_member_identity(&occupant)?;
        self.verify_not_already_placed(&occupant)?;

        let _guard = self
            .write_gate
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        let parent = self
            .repos
            .position_repo
            .find_by_id(parent_id)?
            .ok_or_else(|| {
                EngineError::InvalidPlacement(format!("指定父点位不存在: {}", parent_id))
            })?;

        let position =
            Position::new_child(Uuid::new_v4().to_string(), &parent, position_type, occupant)?;

        let updates = self.rollup.propagate_from(&position)?;
        let seq_no = self
            .repos
            .position_repo
            .insert_placement(&position, &updates)?;

        let result = PlacementResult {
            position_id: position.position_id.clone(),
            parent_id: Some(parent.position_id.clone()),
            position_type,
            level: position.level,
            hierarchy_path: position.hierarchy_path.clone(),
            seq_no,
            spillover_depth: 1,
        };
        self.log_action(
            ActionType::Place,
            &result,
            operator,
            format!("定向安置至 {} 的 {} 槽位", parent_id, position_type),
        );
        Ok(result)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 广度优先左优先搜索空槽
    ///
    /// # 返回
    /// - (父点位, 空槽类型, 新节点相对上级的深度)
    ///
    /// # 说明
    /// 队列按层序扩展, 同层先左后右; 某节点左槽空立即落左,
    /// 左满右空落右。深度达到策略上限后不再向下扩展。
    fn find_open_slot(&self, upline: &Position) -> EngineResult<(Position, PositionType, i64)> {
        let max_depth = self.policy.max_spillover_depth()?;
        let mut queue: VecDeque<(Position, i64)> = VecDeque::new();
        queue.push_back((upline.clone(), 0));

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let (left, right) = self.repos.position_repo.find_children(&node.position_id)?;
            match (left, right) {
                (None, _) => return Ok((node, PositionType::Left, depth + 1)),
                (Some(_), None) => return Ok((node, PositionType::Right, depth + 1)),
                (Some(l), Some(r)) => {
                    queue.push_back((l, depth + 1));
                    queue.push_back((r, depth + 1));
                }
            }
        }

        Err(EngineError::CapacityExceeded {
            upline_id: upline.position_id.clone(),
            max_depth,
        })
    }

    /// 在网会员身份核验 (注册表未配置时跳过)
    fn verify_member_identity(&self, occupant: &Occupant) -> EngineResult<()> {
        let Occupant::Member(member) = occupant else {
            return Ok(());
        };
        if !self.registry.is_configured() {
            return Ok(());
        }
        match self.registry.lookup(&member.member_id)? {
            Some(profile) if profile.active => Ok(()),
            Some(_) => Err(EngineError::InvalidPlacement(format!(
                "会员 {} 已失效, 不允许安置",
                member.member_id
            ))),
            None => Err(EngineError::InvalidPlacement(format!(
                "会员 {} 不在注册表",
                member.member_id
            ))),
        }
    }

    /// 在网会员唯一占位校验 (退网重入走新点位, 不受此限)
    fn verify_not_already_placed(&self, occupant: &Occupant) -> EngineResult<()> {
        let Occupant::Member(member) = occupant else {
            return Ok(());
        };
        if let Some(existing) = self
            .repos
            .position_repo
            .find_active_by_member_id(&member.member_id)?
        {
            return Err(EngineError::InvalidPlacement(format!(
                "会员 {} 已占据点位 {}",
                member.member_id, existing.position_id
            )));
        }
        Ok(())
    }

    /// 提交后写操作日志 (失败只告警, 不影响已提交的安置)
    fn log_action(&self, action_type: ActionType, result: &PlacementResult, operator: &str, detail: String) {
        let log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(result.position_id.clone()),
            action_type,
            operator.to_string(),
        )
        .with_payload(result)
        .with_detail(detail);

        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            tracing::warn!(
                position_id = %result.position_id,
                error = %e,
                "操作日志写入失败"
            );
        }
    }
}
