// ==========================================
// 双轨会员网络管理系统 - 业绩引擎
// ==========================================
// 依据: Network_Master_Spec.md - PART B2 汇总与向上递推
// 依据: TD-002 并发控制设计 (与安置引擎共享写闸门)
// 职责: 个人业绩覆写、台账周期同步、汇总链修复
// 红线: 业绩为精确定点数, 不得为负; 个人业绩变更与祖先
//       汇总更新同事务提交; 退网占位的业绩更新照常递推
// ==========================================

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::engine::collaborators::{OptionalSalesLedger, SalesPeriod};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::repositories::NetworkRepositories;
use crate::engine::rollup::RollupCalculator;

// ==========================================
// SalesUpdateResult - 业绩更新结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesUpdateResult {
    pub position_id: String,
    /// 更新前个人业绩
    pub previous_sales: Decimal,
    /// 更新后个人业绩
    pub current_sales: Decimal,
    /// 发生汇总写入的祖先数
    pub ancestors_updated: usize,
    /// 是否发生实际写入 (等值覆写直接短路)
    pub changed: bool,
}

// ==========================================
// RollupRepairResult - 汇总修复结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupRepairResult {
    pub position_id: String,
    /// 被修复的点位ID (自下而上)
    pub repaired_ids: Vec<String>,
}

// ==========================================
// SalesEngine - 业绩引擎
// ==========================================
pub struct SalesEngine {
    repos: NetworkRepositories,
    rollup: Arc<RollupCalculator>,
    ledger: Arc<OptionalSalesLedger>,
    /// 写闸门: 与安置引擎共享, 串行化"读树-算汇总-写库"全程
    write_gate: Arc<Mutex<()>>,
}

impl SalesEngine {
    pub fn new(
        repos: NetworkRepositories,
        rollup: Arc<RollupCalculator>,
        ledger: Arc<OptionalSalesLedger>,
        write_gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            repos,
            rollup,
            ledger,
            write_gate,
        }
    }

    /// 覆写点位个人业绩并向上递推
    ///
    /// # 参数
    /// - `position_id`: 目标点位 (在网或退网均可)
    /// - `amount`: 新的个人业绩 (绝对值覆写, 非增量)
    /// - `operator`: 操作人
    #[instrument(skip(self), fields(position_id = %position_id, amount = %amount, operator = %operator))]
    pub fn record_sales(
        &self,
        position_id: &str,
        amount: Decimal,
        operator: &str,
    ) -> EngineResult<SalesUpdateResult> {
        Self::verify_amount(&amount)?;

        let _guard = self
            .write_gate
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;
        self.apply_sales_locked(position_id, amount, operator, "手工录入")
    }

    /// 从业绩台账同步指定周期的累计业绩
    ///
    /// # 返回
    /// - `Ok(None)`: 台账未配置, 或该占位人在周期内无台账记录
    /// - `Ok(Some(result))`: 已按台账金额覆写
    #[instrument(skip(self), fields(position_id = %position_id, period = %period, operator = %operator))]
    pub fn sync_from_ledger(
        &self,
        position_id: &str,
        period: &SalesPeriod,
        operator: &str,
    ) -> EngineResult<Option<SalesUpdateResult>> {
        if !self.ledger.is_configured() {
            tracing::debug!("业绩台账未配置, 跳过同步");
            return Ok(None);
        }

        let position = self
            .repos
            .position_repo
            .find_by_id(position_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "点位".to_string(),
                id: position_id.to_string(),
            })?;

        let Some(amount) = self
            .ledger
            .sales_for(position.occupant.identity_id(), period)?
        else {
            tracing::debug!(
                occupant_id = %position.occupant.identity_id(),
                "台账无该周期业绩记录"
            );
            return Ok(None);
        };
        Self::verify_amount(&amount)?;

        let _guard = self
            .write_gate
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;
        let result =
            self.apply_sales_locked(position_id, amount, operator, &format!("台账同步 {}", period))?;
        Ok(Some(result))
    }

    /// 重算指定点位汇总并修复到根
    ///
    /// # 用途
    /// - 对账检出偏差后的修复入口; 全链一致时不产生任何写入
    #[instrument(skip(self), fields(position_id = %position_id, operator = %operator))]
    pub fn recompute_rollups(
        &self,
        position_id: &str,
        operator: &str,
    ) -> EngineResult<RollupRepairResult> {
        let _guard = self
            .write_gate
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;

        let updates = self.rollup.recompute_chain(position_id)?;
        let result = RollupRepairResult {
            position_id: position_id.to_string(),
            repaired_ids: updates.iter().map(|u| u.position_id.clone()).collect(),
        };
        if updates.is_empty() {
            return Ok(result);
        }

        self.repos.position_repo.apply_rollup_updates(&updates)?;
        tracing::info!(
            position_id = %position_id,
            repaired = updates.len(),
            "汇总链修复完成"
        );

        let log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(position_id.to_string()),
            ActionType::Recompute,
            operator.to_string(),
        )
        .with_payload(&result)
        .with_detail(format!("修复 {} 个点位的汇总字段", result.repaired_ids.len()));
        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            tracing::warn!(position_id = %position_id, error = %e, "操作日志写入失败");
        }

        Ok(result)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 已持写闸门前提下执行业绩覆写
    fn apply_sales_locked(
        &self,
        position_id: &str,
        amount: Decimal,
        operator: &str,
        source: &str,
    ) -> EngineResult<SalesUpdateResult> {
        let position = self
            .repos
            .position_repo
            .find_by_id(position_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "点位".to_string(),
                id: position_id.to_string(),
            })?;

        let previous = position.own_sales;
        if previous == amount {
            return Ok(SalesUpdateResult {
                position_id: position_id.to_string(),
                previous_sales: previous,
                current_sales: amount,
                ancestors_updated: 0,
                changed: false,
            });
        }

        let mut snapshot = position.clone();
        snapshot.own_sales = amount;
        let updates = self.rollup.propagate_from(&snapshot)?;
        self.repos
            .position_repo
            .update_own_sales(position_id, amount, &updates)?;

        tracing::info!(
            position_id = %position_id,
            previous = %previous,
            current = %amount,
            ancestors_updated = updates.len(),
            source = %source,
            "个人业绩更新完成"
        );

        let result = SalesUpdateResult {
            position_id: position_id.to_string(),
            previous_sales: previous,
            current_sales: amount,
            ancestors_updated: updates.len(),
            changed: true,
        };

        let log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(position_id.to_string()),
            ActionType::SalesUpdate,
            operator.to_string(),
        )
        .with_payload(&result)
        .with_detail(source.to_string());
        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            tracing::warn!(position_id = %position_id, error = %e, "操作日志写入失败");
        }

        Ok(result)
    }

    fn verify_amount(amount: &Decimal) -> EngineResult<()> {
        if amount.is_sign_negative() {
            return Err(EngineError::InvalidSalesAmount(format!(
                "业绩不允许为负数: {}",
                amount
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::domain::occupant::{Occupant, WithdrawalRef};
    use crate::domain::position::Position;
    use crate::domain::types::PositionType;
    use crate::engine::collaborators::InMemorySalesLedger;
    use crate::repository::{ActionLogRepository, PositionRepository};
    use chrono::NaiveDate;
    use rusqlite::{params, Connection};
    use std::str::FromStr;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct TestContext {
        conn: Arc<Mutex<Connection>>,
        repos: NetworkRepositories,
        rollup: Arc<RollupCalculator>,
        engine: SalesEngine,
    }

    fn setup() -> TestContext {
        setup_with_ledger(OptionalSalesLedger::none())
    }

    fn setup_with_ledger(ledger: OptionalSalesLedger) -> TestContext {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let position_repo = Arc::new(PositionRepository::new(conn.clone()));
        let repos = NetworkRepositories::new(
            position_repo.clone(),
            Arc::new(ActionLogRepository::new(conn.clone())),
        );
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let rollup = Arc::new(RollupCalculator::new(position_repo, config));
        let engine = SalesEngine::new(
            repos.clone(),
            rollup.clone(),
            Arc::new(ledger),
            Arc::new(Mutex::new(())),
        );
        TestContext {
            conn,
            repos,
            rollup,
            engine,
        }
    }

    fn place(ctx: &TestContext, child: &Position) {
        let updates = ctx.rollup.propagate_from(child).unwrap();
        ctx.repos
            .position_repo
            .insert_placement(child, &updates)
            .unwrap();
    }

    /// 根A + B(左) + C(右) + D(B的左), 个人业绩全 0
    fn seed_tree(ctx: &TestContext) {
        let a = Position::new_root(
            "PA".to_string(),
            Occupant::member("M000001", "张伟"),
        )
        .unwrap();
        ctx.repos.position_repo.insert_root(&a).unwrap();

        let b = Position::new_child(
            "PB".to_string(),
            &a,
            PositionType::Left,
            Occupant::member("M000002", "王芳"),
        )
        .unwrap();
        place(ctx, &b);

        let c = Position::new_child(
            "PC".to_string(),
            &a,
            PositionType::Right,
            Occupant::member("M000003", "李娜"),
        )
        .unwrap();
        place(ctx, &c);

        let b = ctx.repos.position_repo.find_by_id("PB").unwrap().unwrap();
        let d = Position::new_child(
            "PD".to_string(),
            &b,
            PositionType::Left,
            Occupant::member("M000004", "刘强"),
        )
        .unwrap();
        place(ctx, &d);
    }

    fn load(ctx: &TestContext, id: &str) -> Position {
        ctx.repos.position_repo.find_by_id(id).unwrap().unwrap()
    }

    #[test]
    fn test_record_sales_propagates_to_root() {
        let ctx = setup();
        seed_tree(&ctx);

        let result = ctx
            .engine
            .record_sales("PD", dec("100.50"), "admin")
            .unwrap();
        assert!(result.changed);
        assert_eq!(result.previous_sales, Decimal::ZERO);
        assert_eq!(result.ancestors_updated, 2);

        assert_eq!(load(&ctx, "PD").own_sales, dec("100.50"));
        assert_eq!(load(&ctx, "PB").left_sales, dec("100.50"));
        assert_eq!(load(&ctx, "PA").left_sales, dec("100.50"));
        // 兄弟子树数值不受影响
        let c = load(&ctx, "PC");
        assert_eq!(c.own_sales, Decimal::ZERO);
        assert_eq!(load(&ctx, "PA").right_sales, Decimal::ZERO);
    }

    #[test]
    fn test_record_sales_equal_value_short_circuits() {
        let ctx = setup();
        seed_tree(&ctx);
        ctx.engine.record_sales("PD", dec("10"), "admin").unwrap();

        let result = ctx.engine.record_sales("PD", dec("10"), "admin").unwrap();
        assert!(!result.changed);
        assert_eq!(result.ancestors_updated, 0);

        // 短路不产生第二条业绩日志
        let logs = ctx.repos.action_log_repo.find_by_position_id("PD").unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_record_sales_rejects_negative() {
        let ctx = setup();
        seed_tree(&ctx);
        let err = ctx
            .engine
            .record_sales("PD", dec("-0.01"), "admin")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSalesAmount(_)));
    }

    #[test]
    fn test_record_sales_missing_position() {
        let ctx = setup();
        let err = ctx
            .engine
            .record_sales("P999999", dec("1"), "admin")
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_record_sales_on_withdrawn_position_still_propagates() {
        let ctx = setup();
        seed_tree(&ctx);
        ctx.repos
            .position_repo
            .convert_to_withdrawal(
                "PB",
                &WithdrawalRef {
                    member_no: "M000002".to_string(),
                    display_name: "王芳".to_string(),
                    withdrawn_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                },
            )
            .unwrap();

        let result = ctx.engine.record_sales("PB", dec("66"), "admin").unwrap();
        assert!(result.changed);
        assert_eq!(load(&ctx, "PA").left_sales, dec("66"));
    }

    #[test]
    fn test_sync_from_ledger() {
        let mut ledger = InMemorySalesLedger::new();
        ledger.record(
            "M000004",
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            dec("70"),
        );
        ledger.record(
            "M000004",
            NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            dec("30.50"),
        );
        let ctx = setup_with_ledger(OptionalSalesLedger::with_ledger(Arc::new(ledger)));
        seed_tree(&ctx);

        let feb = SalesPeriod::month(2026, 2).unwrap();
        let result = ctx
            .engine
            .sync_from_ledger("PD", &feb, "scheduler")
            .unwrap()
            .unwrap();
        assert_eq!(result.current_sales, dec("100.50"));
        assert_eq!(load(&ctx, "PA").left_sales, dec("100.50"));

        // 周期内无记录 → None
        let jan = SalesPeriod::month(2026, 1).unwrap();
        assert!(ctx
            .engine
            .sync_from_ledger("PC", &jan, "scheduler")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_sync_without_ledger_returns_none() {
        let ctx = setup();
        seed_tree(&ctx);
        let feb = SalesPeriod::month(2026, 2).unwrap();
        assert!(ctx
            .engine
            .sync_from_ledger("PD", &feb, "scheduler")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_recompute_rollups_repairs_chain() {
        let ctx = setup();
        seed_tree(&ctx);
        ctx.engine.record_sales("PD", dec("50"), "admin").unwrap();

        {
            let conn = ctx.conn.lock().unwrap();
            conn.execute(
                "UPDATE network_position SET left_sales = '888', left_count = 9 WHERE position_id = ?1",
                params!["PA"],
            )
            .unwrap();
        }

        let result = ctx.engine.recompute_rollups("PD", "admin").unwrap();
        assert_eq!(result.repaired_ids, vec!["PA".to_string()]);

        let root = load(&ctx, "PA");
        assert_eq!(root.left_count, 2);
        assert_eq!(root.left_sales, dec("50"));

        // 全链一致后再次修复不产生写入
        let result = ctx.engine.recompute_rollups("PD", "admin").unwrap();
        assert!(result.repaired_ids.is_empty());
    }
}
