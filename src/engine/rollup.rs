// ==========================================
// 双轨会员网络管理系统 - 汇总推导引擎
// ==========================================
// 依据: Network_Master_Spec.md - PART B2 汇总与向上递推
// 职责: 由两个直接子节点的现值推导单点汇总, 沿父链向上递推
// 红线: 推导只读子节点现值, 禁止全子树扫描; 更新集交由
//       仓储层与触发变更同事务提交, 引擎自身不写库
// ==========================================

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use crate::config::NetworkPolicyReader;
use crate::domain::occupant::Occupant;
use crate::domain::position::{Position, RollupUpdate};
use crate::domain::types::PositionType;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::PositionRepository;

// ==========================================
// RollupCalculator - 汇总推导
// ==========================================
// 口径: 子节点对父侧的贡献 = 占位权重 + 子左计数 + 子右计数,
//       业绩贡献 = 子个人业绩 + 子左业绩 + 子右业绩。
// 说明: 退网占位策略只改变计数权重, 业绩始终全额上卷。
pub struct RollupCalculator {
    position_repo: Arc<PositionRepository>,
    policy: Arc<dyn NetworkPolicyReader>,
}

impl RollupCalculator {
    pub fn new(position_repo: Arc<PositionRepository>, policy: Arc<dyn NetworkPolicyReader>) -> Self {
        Self {
            position_repo,
            policy,
        }
    }

    /// 占位计数权重
    ///
    /// # 返回
    /// - 在网会员: 1
    /// - 退网占位: 按 rollup/count_withdrawn 策略取 1 或 0
    pub fn occupant_weight(&self, occupant: &Occupant) -> EngineResult<i64> {
        match occupant {
            Occupant::Member(_) => Ok(1),
            Occupant::Withdrawal(_) => {
                if self.policy.count_withdrawn_in_rollup()? {
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
        }
    }

    /// 单个子节点对父侧的 (人数, 业绩) 贡献
    pub fn side_contribution(&self, child: &Position) -> EngineResult<(i64, Decimal)> {
        let weight = self.occupant_weight(&child.occupant)?;
        let count = weight + child.left_count + child.right_count;
        let sales = child.own_sales + child.left_sales + child.right_sales;
        Ok((count, sales))
    }

    /// 由两个直接子节点现值推导一个点位的汇总更新
    ///
    /// # 参数
    /// - `position`: 待推导点位 (只取其ID与现值做比对)
    /// - `left` / `right`: 两个直接子节点现值, 缺槽传 None
    pub fn derive_for(
        &self,
        position: &Position,
        left: Option<&Position>,
        right: Option<&Position>,
    ) -> EngineResult<RollupUpdate> {
        let mut update = RollupUpdate::from_position(position);

        let (left_count, left_sales) = match left {
            Some(child) => self.side_contribution(child)?,
            None => (0, Decimal::ZERO),
        };
        let (right_count, right_sales) = match right {
            Some(child) => self.side_contribution(child)?,
            None => (0, Decimal::ZERO),
        };

        update.left_count = left_count;
        update.right_count = right_count;
        update.left_sales = left_sales;
        update.right_sales = right_sales;
        Ok(update)
    }

    /// 从待写入子节点快照出发, 沿父链向上推导汇总更新集
    ///
    /// # 参数
    /// - `pending`: 触发变更的点位快照 (新叶子尚未入库, 或业绩已
    ///   更新但尚未提交的既有点位)
    ///
    /// # 返回
    /// - 自下而上排列的祖先更新集 (不含 `pending` 自身)
    ///
    /// # 说明
    /// 推导每级父节点时用 `pending` 链上的最新快照顶替存储中的旧
    /// 子节点; 某级祖先推导结果与存储一致时提前收敛 (其上游输入
    /// 必然不变)。
    #[instrument(skip(self, pending), fields(position_id = %pending.position_id))]
    pub fn propagate_from(&self, pending: &Position) -> EngineResult<Vec<RollupUpdate>> {
        self.walk_up(pending, true)
    }

    /// 重算指定点位并向上递推到根 (修复/校验入口)
    ///
    /// # 返回
    /// - 与存储不一致的更新集 (首元素为点位自身, 若自身有偏差);
    ///   全链一致时为空
    ///
    /// # 说明
    /// 与 [`propagate_from`](Self::propagate_from) 不同, 本方法不做
    /// 提前收敛: 即使本级一致也继续向上, 以便修复链上任意位置的
    /// 历史偏差。
    #[instrument(skip(self), fields(position_id = %position_id))]
    pub fn recompute_chain(&self, position_id: &str) -> EngineResult<Vec<RollupUpdate>> {
        let position = self
            .position_repo
            .find_by_id(position_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "点位".to_string(),
                id: position_id.to_string(),
            })?;

        let (left, right) = self.position_repo.find_children(position_id)?;
        let update = self.derive_for(&position, left.as_ref(), right.as_ref())?;

        let mut snapshot = position.clone();
        update.apply_to(&mut snapshot);

        let mut updates = Vec::new();
        if !update.matches(&position) {
            tracing::warn!(
                position_id = %position_id,
                "点位汇总与子节点现值不一致, 已生成修复更新"
            );
            updates.push(update);
        }
        updates.extend(self.walk_up(&snapshot, false)?);
        Ok(updates)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 沿父链向上推导
    ///
    /// `stop_when_converged`: 活跃路径 (安置/业绩) 用提前收敛;
    /// 修复路径必须走完全链。
    fn walk_up(&self, pending: &Position, stop_when_converged: bool) -> EngineResult<Vec<RollupUpdate>> {
        let mut updates = Vec::new();
        let mut child_snapshot = pending.clone();

        while let Some(parent_id) = child_snapshot.parent_id.clone() {
            let parent = self
                .position_repo
                .find_by_id(&parent_id)?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "点位".to_string(),
                    id: parent_id.clone(),
                })?;

            let (mut left, mut right) = self.position_repo.find_children(&parent_id)?;
            // 用链上最新快照顶替存储中的旧子节点 (新叶子此时尚未入库)
            match child_snapshot.position_type {
                PositionType::Left => left = Some(child_snapshot.clone()),
                PositionType::Right => right = Some(child_snapshot.clone()),
                PositionType::Root => {
                    return Err(EngineError::InvalidPlacement(format!(
                        "根点位 {} 不应出现父引用 {}",
                        child_snapshot.position_id, parent_id
                    )))
                }
            }

            let update = self.derive_for(&parent, left.as_ref(), right.as_ref())?;
            let changed = !update.matches(&parent);
            if changed {
                updates.push(update.clone());
            } else if stop_when_converged {
                break;
            }

            let mut next = parent;
            update.apply_to(&mut next);
            child_snapshot = next;
        }

        Ok(updates)
    }
}
