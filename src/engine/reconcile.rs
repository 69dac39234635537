// ==========================================
// 双轨会员网络管理系统 - 网络对账引擎
// ==========================================
// 依据: Network_Master_Spec.md - PART C2 对账
// 依据: Engine_Specs_v0.2_Network.md - 6. Reconcile Engine
// 职责: 安置网络自检 (路径/层级/汇总) + 与推荐关系名册交叉核对
// 红线: 对账只读, 只出报告, 不做任何自动修正;
//       退网占位缺席名册属正常现象, 不计 ONLY_IN_STORE
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::NetworkPolicyReader;
use crate::domain::hierarchy_path;
use crate::domain::position::Position;
use crate::domain::types::{OccupantKind, PositionType, ReconcileFindingKind};
use crate::engine::error::EngineResult;
use crate::repository::PositionRepository;

// ==========================================
// ExternalNode - 推荐关系名册记录
// ==========================================
/// 外部名册的一行: 以会员编号为主键的身份快照。
/// `level` 为名册导出时随带的安置层级, 缺省时跳过层级核对。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalNode {
    pub identity_id: String,
    pub display_name: String,
    pub level: Option<i64>,
}

impl ExternalNode {
    pub fn new(identity_id: &str, display_name: &str) -> Self {
        Self {
            identity_id: identity_id.to_string(),
            display_name: display_name.to_string(),
            level: None,
        }
    }

    pub fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }
}

// ==========================================
// ReconcileFinding / ReconcileReport
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileFinding {
    pub kind: ReconcileFindingKind,
    pub position_id: Option<String>,
    pub identity_id: Option<String>,
    pub detail: String,
}

impl ReconcileFinding {
    fn for_position(kind: ReconcileFindingKind, position_id: &str, detail: String) -> Self {
        Self {
            kind,
            position_id: Some(position_id.to_string()),
            identity_id: None,
            detail,
        }
    }

    fn for_identity(kind: ReconcileFindingKind, identity_id: &str, detail: String) -> Self {
        Self {
            kind,
            position_id: None,
            identity_id: Some(identity_id.to_string()),
            detail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub generated_at: NaiveDateTime,
    /// 安置网络点位总数
    pub store_total: usize,
    /// 名册记录总数
    pub external_total: usize,
    pub findings: Vec<ReconcileFinding>,
    pub elapsed_ms: u64,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count_by_kind(&self, kind: ReconcileFindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }
}

// 汇总核对的中间累计值 (按父点位聚合)
#[derive(Debug, Default, Clone)]
struct SideTotals {
    left_count: i64,
    right_count: i64,
    left_sales: Decimal,
    right_sales: Decimal,
}

// ==========================================
// ReconcileEngine
// ==========================================
pub struct ReconcileEngine {
    position_repo: Arc<PositionRepository>,
    policy: Arc<dyn NetworkPolicyReader>,
}

impl ReconcileEngine {
    pub fn new(position_repo: Arc<PositionRepository>, policy: Arc<dyn NetworkPolicyReader>) -> Self {
        Self {
            position_repo,
            policy,
        }
    }

    /// 执行全量对账
    ///
    /// # 参数
    /// - `external`: 推荐关系名册快照 (可为空, 为空则只做自检)
    ///
    /// # 返回
    /// - 对账报告; 发现按 自检 -> 汇总 -> 名册 的顺序排列
    #[instrument(skip(self, external), fields(external_total = external.len()))]
    pub fn run(&self, external: &[ExternalNode]) -> EngineResult<ReconcileReport> {
        let started = Instant::now();
        let positions = self.scan_all()?;

        let mut findings = self.structural_findings(&positions);
        findings.extend(self.rollup_findings(&positions)?);
        findings.extend(self.external_findings(&positions, external));

        let report = ReconcileReport {
            generated_at: chrono::Utc::now().naive_utc(),
            store_total: positions.len(),
            external_total: external.len(),
            findings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            store_total = report.store_total,
            findings = report.findings.len(),
            elapsed_ms = report.elapsed_ms,
            "对账完成"
        );
        Ok(report)
    }

    /// 安置网络自检 (不做名册交叉核对)
    ///
    /// # 用途
    /// - 控制台 verify 入口: 路径/层级/父子链 + 汇总核对
    #[instrument(skip(self))]
    pub fn audit(&self) -> EngineResult<ReconcileReport> {
        let started = Instant::now();
        let positions = self.scan_all()?;

        let mut findings = self.structural_findings(&positions);
        findings.extend(self.rollup_findings(&positions)?);

        let report = ReconcileReport {
            generated_at: chrono::Utc::now().naive_utc(),
            store_total: positions.len(),
            external_total: 0,
            findings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            store_total = report.store_total,
            findings = report.findings.len(),
            elapsed_ms = report.elapsed_ms,
            "自检完成"
        );
        Ok(report)
    }

    // 分页拉取全部点位
    fn scan_all(&self) -> EngineResult<Vec<Position>> {
        let page_size = self.policy.reconcile_scan_page_size()?;
        let mut positions = Vec::new();
        let mut offset = 0i64;
        loop {
            let page = self.position_repo.scan_page(page_size, offset)?;
            let fetched = page.len() as i64;
            positions.extend(page);
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        Ok(positions)
    }

    // ==========================================
    // 自检: 路径 / 层级 / 父子链
    // ==========================================
    fn structural_findings(&self, positions: &[Position]) -> Vec<ReconcileFinding> {
        let path_by_id: HashMap<&str, &Position> = positions
            .iter()
            .map(|p| (p.position_id.as_str(), p))
            .collect();

        let mut findings = Vec::new();
        for position in positions {
            let segments = match hierarchy_path::decode(&position.hierarchy_path) {
                Ok(segments) => segments,
                Err(e) => {
                    findings.push(ReconcileFinding::for_position(
                        ReconcileFindingKind::PathInconsistency,
                        &position.position_id,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            if segments.last().copied() != Some(position.position_id.as_str()) {
                findings.push(ReconcileFinding::for_position(
                    ReconcileFindingKind::PathInconsistency,
                    &position.position_id,
                    "路径末段与点位ID不符".to_string(),
                ));
                continue;
            }

            let path_level = segments.len() as i64 - 1;
            if path_level != position.level {
                findings.push(ReconcileFinding::for_position(
                    ReconcileFindingKind::PathInconsistency,
                    &position.position_id,
                    format!(
                        "存储层级 {} 与路径解码层级 {} 不一致",
                        position.level, path_level
                    ),
                ));
            }

            match &position.parent_id {
                None => {
                    if position.position_type != PositionType::Root || segments.len() != 1 {
                        findings.push(ReconcileFinding::for_position(
                            ReconcileFindingKind::PathInconsistency,
                            &position.position_id,
                            "无父点位却不是单段根路径".to_string(),
                        ));
                    }
                }
                Some(parent_id) => match path_by_id.get(parent_id.as_str()) {
                    None => findings.push(ReconcileFinding::for_position(
                        ReconcileFindingKind::PathInconsistency,
                        &position.position_id,
                        format!("父点位 {} 不在扫描结果中", parent_id),
                    )),
                    Some(parent) => {
                        let expected = hierarchy_path::encode_child(
                            &parent.hierarchy_path,
                            &position.position_id,
                        );
                        match expected {
                            Ok(expected) if expected == position.hierarchy_path => {}
                            Ok(expected) => findings.push(ReconcileFinding::for_position(
                                ReconcileFindingKind::PathInconsistency,
                                &position.position_id,
                                format!(
                                    "路径 {} 与父路径推导值 {} 不一致",
                                    position.hierarchy_path, expected
                                ),
                            )),
                            Err(e) => findings.push(ReconcileFinding::for_position(
                                ReconcileFindingKind::PathInconsistency,
                                &position.position_id,
                                e.to_string(),
                            )),
                        }
                        if position.level != parent.level + 1 {
                            findings.push(ReconcileFinding::for_position(
                                ReconcileFindingKind::PathInconsistency,
                                &position.position_id,
                                format!(
                                    "层级 {} 不等于父层级 {} + 1",
                                    position.level, parent.level
                                ),
                            ));
                        }
                    }
                },
            }
        }
        findings
    }

    // ==========================================
    // 汇总核对: 左右人数 / 左右业绩
    // ==========================================
    // 单趟累加每个点位对其父侧的贡献, 再逐点比对存储值,
    // 整体 O(N), 不做递归
    fn rollup_findings(&self, positions: &[Position]) -> EngineResult<Vec<ReconcileFinding>> {
        let count_withdrawn = self.policy.count_withdrawn_in_rollup()?;
        let weight = |position: &Position| -> i64 {
            match position.occupant.kind() {
                OccupantKind::Member => 1,
                OccupantKind::Withdrawal => {
                    if count_withdrawn {
                        1
                    } else {
                        0
                    }
                }
            }
        };

        let mut expected: HashMap<&str, SideTotals> = HashMap::new();
        for position in positions {
            let parent_id = match &position.parent_id {
                Some(parent_id) => parent_id.as_str(),
                None => continue,
            };
            let entry = expected.entry(parent_id).or_default();
            let count_contrib = weight(position) + position.left_count + position.right_count;
            let sales_contrib = position.own_sales + position.left_sales + position.right_sales;
            match position.position_type {
                PositionType::Left => {
                    entry.left_count += count_contrib;
                    entry.left_sales += sales_contrib;
                }
                PositionType::Right => {
                    entry.right_count += count_contrib;
                    entry.right_sales += sales_contrib;
                }
                PositionType::Root => {} // 自检环节已另行上报
            }
        }

        let empty = SideTotals::default();
        let mut findings = Vec::new();
        for position in positions {
            let want = expected
                .get(position.position_id.as_str())
                .unwrap_or(&empty);
            if position.left_count != want.left_count || position.right_count != want.right_count {
                findings.push(ReconcileFinding::for_position(
                    ReconcileFindingKind::RollupMismatch,
                    &position.position_id,
                    format!(
                        "人数汇总不符: 存储 L{}/R{}, 推导 L{}/R{}",
                        position.left_count, position.right_count, want.left_count, want.right_count
                    ),
                ));
            }
            if position.left_sales != want.left_sales || position.right_sales != want.right_sales {
                findings.push(ReconcileFinding::for_position(
                    ReconcileFindingKind::RollupMismatch,
                    &position.position_id,
                    format!(
                        "业绩汇总不符: 存储 L{}/R{}, 推导 L{}/R{}",
                        position.left_sales, position.right_sales, want.left_sales, want.right_sales
                    ),
                ));
            }
        }
        Ok(findings)
    }

    // ==========================================
    // 名册交叉核对
    // ==========================================
    fn external_findings(
        &self,
        positions: &[Position],
        external: &[ExternalNode],
    ) -> Vec<ReconcileFinding> {
        let mut findings = Vec::new();

        let store_by_identity: HashMap<&str, &Position> = positions
            .iter()
            .map(|p| (p.occupant.identity_id(), p))
            .collect();
        let external_ids: HashSet<&str> =
            external.iter().map(|n| n.identity_id.as_str()).collect();

        for node in external {
            match store_by_identity.get(node.identity_id.as_str()) {
                None => findings.push(ReconcileFinding::for_identity(
                    ReconcileFindingKind::OnlyInExternal,
                    &node.identity_id,
                    format!("名册会员 {} 在安置网络中无点位", node.display_name),
                )),
                Some(position) => {
                    if position.occupant.display_name() != node.display_name {
                        findings.push(ReconcileFinding::for_identity(
                            ReconcileFindingKind::NameMismatch,
                            &node.identity_id,
                            format!(
                                "姓名不一致: 安置网络 {}, 名册 {}",
                                position.occupant.display_name(),
                                node.display_name
                            ),
                        ));
                    }
                    if let Some(level) = node.level {
                        if level != position.level {
                            findings.push(ReconcileFinding::for_identity(
                                ReconcileFindingKind::LevelMismatch,
                                &node.identity_id,
                                format!("层级不一致: 安置网络 {}, 名册 {}", position.level, level),
                            ));
                        }
                    }
                }
            }
        }

        for position in positions {
            // 退网占位缺席名册属正常, 不上报
            if position.occupant.kind() == OccupantKind::Withdrawal {
                continue;
            }
            if !external_ids.contains(position.occupant.identity_id()) {
                findings.push(ReconcileFinding::for_identity(
                    ReconcileFindingKind::OnlyInStore,
                    position.occupant.identity_id(),
                    format!(
                        "点位 {} 的会员 {} 不在名册中",
                        position.position_id,
                        position.occupant.display_name()
                    ),
                ));
            }
        }
        findings
    }
}
