// ==========================================
// 双轨会员网络管理系统 - 网络谱系查询服务
// ==========================================
// 依据: Network_Master_Spec.md - PART B4 谱系查询
// 职责: 伞下列表、祖先链、全网统计 (只读)
// 红线: 查询绝不修改任何行; 伞下匹配必须是路径的严格前缀
//       扩展 (排除自身); 大范围扫描必须分页
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::NetworkPolicyReader;
use crate::domain::hierarchy_path;
use crate::domain::occupant::OccupantDescriptor;
use crate::domain::position::Position;
use crate::domain::types::{OccupantKind, PositionType};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::PositionRepository;

// ==========================================
// PositionView - 点位只读视图
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub position_id: String,
    pub parent_id: Option<String>,
    pub position_type: PositionType,
    pub level: i64,
    pub hierarchy_path: String,
    pub seq_no: i64,
    /// 占位人多态描述 (在网会员/退网占位统一口径)
    pub occupant: OccupantDescriptor,
    pub left_count: i64,
    pub right_count: i64,
    pub own_sales: Decimal,
    pub left_sales: Decimal,
    pub right_sales: Decimal,
}

impl From<&Position> for PositionView {
    fn from(position: &Position) -> Self {
        Self {
            position_id: position.position_id.clone(),
            parent_id: position.parent_id.clone(),
            position_type: position.position_type,
            level: position.level,
            hierarchy_path: position.hierarchy_path.clone(),
            seq_no: position.seq_no,
            occupant: position.occupant.descriptor(),
            left_count: position.left_count,
            right_count: position.right_count,
            own_sales: position.own_sales,
            left_sales: position.left_sales,
            right_sales: position.right_sales,
        }
    }
}

// ==========================================
// NetworkStats - 全网统计
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    /// 点位总数 (含退网占位)
    pub total_positions: i64,
    /// 在网会员占位数
    pub active_members: i64,
    /// 退网占位数
    pub withdrawn_positions: i64,
    /// 最深层级 (空网络为 None)
    pub max_level: Option<i64>,
    /// 在网会员个人业绩合计
    pub active_sales_total: Decimal,
    /// 退网占位个人业绩合计
    pub withdrawn_sales_total: Decimal,
}

// ==========================================
// GenealogyService - 谱系查询
// ==========================================
pub struct GenealogyService {
    position_repo: Arc<PositionRepository>,
    policy: Arc<dyn NetworkPolicyReader>,
}

impl GenealogyService {
    pub fn new(position_repo: Arc<PositionRepository>, policy: Arc<dyn NetworkPolicyReader>) -> Self {
        Self {
            position_repo,
            policy,
        }
    }

    /// 伞下点位列表 (不含起点自身)
    ///
    /// # 参数
    /// - `position_id`: 起点点位
    /// - `max_depth`: 相对起点的最大层深; None 表示不限深
    ///
    /// # 返回
    /// - 按 (层级, 落位先后) 升序排列的视图; `max_depth <= 0` 时为空
    #[instrument(skip(self), fields(position_id = %position_id))]
    pub fn descendants(
        &self,
        position_id: &str,
        max_depth: Option<i64>,
    ) -> EngineResult<Vec<PositionView>> {
        let position = self.load(position_id)?;

        let max_level = match max_depth {
            Some(d) if d <= 0 => return Ok(Vec::new()),
            Some(d) => Some(position.level + d),
            None => None,
        };
        let pattern = hierarchy_path::descendant_like_pattern(&position.hierarchy_path);
        let page_size = self.policy.genealogy_page_size()?;

        let mut views = Vec::new();
        let mut offset = 0i64;
        loop {
            let page =
                self.position_repo
                    .find_descendants_page(&pattern, max_level, page_size, offset)?;
            let fetched = page.len() as i64;
            views.extend(page.iter().map(PositionView::from));
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        Ok(views)
    }

    /// 祖先链 (根到直接父级, 不含自身)
    ///
    /// # 返回
    /// - 根点位在前的有序视图; 起点为根时为空
    ///
    /// # 红线
    /// - 路径解码层级与存储层级不符、路径末段与点位ID不符、
    ///   路径引用的祖先缺行, 一律报 [`EngineError::InconsistentPath`]
    #[instrument(skip(self), fields(position_id = %position_id))]
    pub fn ancestors(&self, position_id: &str) -> EngineResult<Vec<PositionView>> {
        let position = self.load(position_id)?;

        let segments = hierarchy_path::decode(&position.hierarchy_path).map_err(|e| {
            EngineError::InconsistentPath {
                position_id: position_id.to_string(),
                detail: e.to_string(),
            }
        })?;

        let path_level = segments.len() as i64 - 1;
        if path_level != position.level {
            return Err(EngineError::InconsistentPath {
                position_id: position_id.to_string(),
                detail: format!(
                    "存储层级 {} 与路径解码层级 {} 不一致",
                    position.level, path_level
                ),
            });
        }
        if segments.last().copied() != Some(position.position_id.as_str()) {
            return Err(EngineError::InconsistentPath {
                position_id: position_id.to_string(),
                detail: "路径末段与点位ID不符".to_string(),
            });
        }

        let ancestor_ids: Vec<String> = segments[..segments.len() - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if ancestor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.position_repo.find_by_ids(&ancestor_ids)?;
        if rows.len() != ancestor_ids.len() {
            let found: HashSet<&str> = rows.iter().map(|p| p.position_id.as_str()).collect();
            let missing = ancestor_ids
                .iter()
                .find(|id| !found.contains(id.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(EngineError::InconsistentPath {
                position_id: position_id.to_string(),
                detail: format!("路径引用的祖先 {} 不存在", missing),
            });
        }

        // find_by_ids 按层级升序返回, 即根到父的顺序
        Ok(rows.iter().map(PositionView::from).collect())
    }

    /// 全网统计
    ///
    /// # 说明
    /// 业绩以 TEXT 存储精确定点数, 合计在引擎侧分页累加,
    /// 不走 SQL SUM。
    #[instrument(skip(self))]
    pub fn stats(&self) -> EngineResult<NetworkStats> {
        let total_positions = self.position_repo.count_all()?;
        let active_members = self
            .position_repo
            .count_by_occupant_kind(OccupantKind::Member)?;
        let withdrawn_positions = self
            .position_repo
            .count_by_occupant_kind(OccupantKind::Withdrawal)?;
        let max_level = self.position_repo.max_level()?;

        let page_size = self.policy.reconcile_scan_page_size()?;
        let mut active_sales_total = Decimal::ZERO;
        let mut withdrawn_sales_total = Decimal::ZERO;
        let mut offset = 0i64;
        loop {
            let page = self.position_repo.scan_page(page_size, offset)?;
            let fetched = page.len() as i64;
            for position in &page {
                match position.occupant.kind() {
                    OccupantKind::Member => active_sales_total += position.own_sales,
                    OccupantKind::Withdrawal => withdrawn_sales_total += position.own_sales,
                }
            }
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }

        Ok(NetworkStats {
            total_positions,
            active_members,
            withdrawn_positions,
            max_level,
            active_sales_total,
            withdrawn_sales_total,
        })
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn load(&self, position_id: &str) -> EngineResult<Position> {
        self.position_repo
            .find_by_id(position_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "点位".to_string(),
                id: position_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{config_keys, ConfigManager};
    use crate::domain::occupant::{Occupant, WithdrawalRef};
    use crate::engine::rollup::RollupCalculator;
    use chrono::NaiveDate;
    use rusqlite::{params, Connection};
    use std::str::FromStr;
    use std::sync::Mutex;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct TestContext {
        conn: Arc<Mutex<Connection>>,
        repo: Arc<PositionRepository>,
        config: Arc<ConfigManager>,
        service: GenealogyService,
    }

    fn setup() -> TestContext {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = Arc::new(PositionRepository::new(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let service = GenealogyService::new(repo.clone(), config.clone());
        TestContext {
            conn,
            repo,
            config,
            service,
        }
    }

    /// 根A + B(左,业绩10) + C(右,业绩20) + D(B左,业绩30) + E(B右,业绩40),
    /// 其中 E 为退网占位
    fn seed_tree(ctx: &TestContext) {
        let calc = RollupCalculator::new(ctx.repo.clone(), ctx.config.clone());
        let place = |child: &Position| {
            let updates = calc.propagate_from(child).unwrap();
            ctx.repo.insert_placement(child, &updates).unwrap();
        };

        let a = Position::new_root("PA".to_string(), Occupant::member("M000001", "张伟")).unwrap();
        ctx.repo.insert_root(&a).unwrap();

        let b = Position::new_child(
            "PB".to_string(),
            &a,
            PositionType::Left,
            Occupant::member("M000002", "王芳"),
        )
        .unwrap()
        .with_own_sales(dec("10"));
        place(&b);

        let c = Position::new_child(
            "PC".to_string(),
            &a,
            PositionType::Right,
            Occupant::member("M000003", "李娜"),
        )
        .unwrap()
        .with_own_sales(dec("20"));
        place(&c);

        let b = ctx.repo.find_by_id("PB").unwrap().unwrap();
        let d = Position::new_child(
            "PD".to_string(),
            &b,
            PositionType::Left,
            Occupant::member("M000004", "刘强"),
        )
        .unwrap()
        .with_own_sales(dec("30"));
        place(&d);

        let b = ctx.repo.find_by_id("PB").unwrap().unwrap();
        let e = Position::new_child(
            "PE".to_string(),
            &b,
            PositionType::Right,
            Occupant::member("M000005", "陈洁"),
        )
        .unwrap()
        .with_own_sales(dec("40"));
        place(&e);

        ctx.repo
            .convert_to_withdrawal(
                "PE",
                &WithdrawalRef {
                    member_no: "M000005".to_string(),
                    display_name: "陈洁".to_string(),
                    withdrawn_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                },
            )
            .unwrap();
    }

    fn ids(views: &[PositionView]) -> Vec<&str> {
        views.iter().map(|v| v.position_id.as_str()).collect()
    }

    #[test]
    fn test_descendants_excludes_self_and_orders_by_level_then_seq() {
        let ctx = setup();
        seed_tree(&ctx);

        let views = ctx.service.descendants("PA", None).unwrap();
        assert_eq!(ids(&views), vec!["PB", "PC", "PD", "PE"]);
        // 全部为起点路径的严格前缀扩展
        for view in &views {
            assert!(hierarchy_path::is_strict_extension("PA", &view.hierarchy_path));
        }
        // 退网占位仍在伞下列表中, 以多态描述呈现
        let e = views.iter().find(|v| v.position_id == "PE").unwrap();
        assert_eq!(e.occupant.kind, OccupantKind::Withdrawal);
        assert_eq!(e.occupant.identity_id, "M000005");
    }

    #[test]
    fn test_descendants_depth_window() {
        let ctx = setup();
        seed_tree(&ctx);

        let views = ctx.service.descendants("PA", Some(1)).unwrap();
        assert_eq!(ids(&views), vec!["PB", "PC"]);

        let views = ctx.service.descendants("PB", Some(1)).unwrap();
        assert_eq!(ids(&views), vec!["PD", "PE"]);

        assert!(ctx.service.descendants("PA", Some(0)).unwrap().is_empty());
        assert!(ctx.service.descendants("PD", None).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_paging_preserves_order() {
        let ctx = setup();
        seed_tree(&ctx);
        ctx.config
            .set_config_value(config_keys::GENEALOGY_PAGE_SIZE, "2")
            .unwrap();

        let views = ctx.service.descendants("PA", None).unwrap();
        assert_eq!(ids(&views), vec!["PB", "PC", "PD", "PE"]);
    }

    #[test]
    fn test_descendants_missing_position() {
        let ctx = setup();
        let err = ctx.service.descendants("P999999", None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_ancestors_root_to_parent_order() {
        let ctx = setup();
        seed_tree(&ctx);

        let views = ctx.service.ancestors("PD").unwrap();
        assert_eq!(ids(&views), vec!["PA", "PB"]);

        assert!(ctx.service.ancestors("PA").unwrap().is_empty());

        let err = ctx.service.ancestors("P999999").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_ancestors_detects_level_mismatch() {
        let ctx = setup();
        seed_tree(&ctx);
        {
            let conn = ctx.conn.lock().unwrap();
            conn.execute(
                "UPDATE network_position SET level = 5 WHERE position_id = ?1",
                params!["PD"],
            )
            .unwrap();
        }

        let err = ctx.service.ancestors("PD").unwrap_err();
        assert!(matches!(err, EngineError::InconsistentPath { .. }));
    }

    #[test]
    fn test_ancestors_detects_phantom_ancestor() {
        let ctx = setup();
        seed_tree(&ctx);
        {
            let conn = ctx.conn.lock().unwrap();
            conn.execute(
                "UPDATE network_position SET hierarchy_path = 'PA/PX/PD' WHERE position_id = ?1",
                params!["PD"],
            )
            .unwrap();
        }

        let err = ctx.service.ancestors("PD").unwrap_err();
        match err {
            EngineError::InconsistentPath { detail, .. } => assert!(detail.contains("PX")),
            other => panic!("预期路径不一致, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_ancestors_detects_tail_mismatch() {
        let ctx = setup();
        seed_tree(&ctx);
        {
            let conn = ctx.conn.lock().unwrap();
            conn.execute(
                "UPDATE network_position SET hierarchy_path = 'PA/PB/PZ' WHERE position_id = ?1",
                params!["PD"],
            )
            .unwrap();
        }

        let err = ctx.service.ancestors("PD").unwrap_err();
        assert!(matches!(err, EngineError::InconsistentPath { .. }));
    }

    #[test]
    fn test_stats_splits_active_and_withdrawn() {
        let ctx = setup();
        seed_tree(&ctx);

        let stats = ctx.service.stats().unwrap();
        assert_eq!(stats.total_positions, 5);
        assert_eq!(stats.active_members, 4);
        assert_eq!(stats.withdrawn_positions, 1);
        assert_eq!(stats.max_level, Some(2));
        // 在网: 根0 + B10 + C20 + D30; 退网: E40
        assert_eq!(stats.active_sales_total, dec("60"));
        assert_eq!(stats.withdrawn_sales_total, dec("40"));
    }

    #[test]
    fn test_stats_on_empty_network() {
        let ctx = setup();
        let stats = ctx.service.stats().unwrap();
        assert_eq!(stats.total_positions, 0);
        assert_eq!(stats.max_level, None);
        assert_eq!(stats.active_sales_total, Decimal::ZERO);
    }
}
