// ==========================================
// 双轨会员网络管理系统 - 对账 API
// ==========================================
// 职责: 对账入口封装, 名册文件解析, 报告透出
// 依据: Network_Master_Spec.md - PART C2 对账
// 红线: 对账只读; 名册解析失败必须整体拒绝, 不得半份名册对账
// ==========================================

use std::path::Path;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::engine::reconcile::{ExternalNode, ReconcileEngine, ReconcileReport};
use crate::importer::{FileParser, UniversalFileParser};

// 名册列名与存量导出保持同一套别名
const ROSTER_MEMBER_NO_COLUMNS: [&str; 2] = ["会员编号", "编号"];
const ROSTER_MEMBER_NAME_COLUMNS: [&str; 2] = ["会员姓名", "姓名"];
const ROSTER_LEVEL_COLUMNS: [&str; 2] = ["层级", "网络层级"];

// ==========================================
// ReconcileApi - 对账 API
// ==========================================
pub struct ReconcileApi {
    reconcile: Arc<ReconcileEngine>,
    file_parser: Box<dyn FileParser>,
}

impl ReconcileApi {
    pub fn new(reconcile: Arc<ReconcileEngine>) -> Self {
        Self {
            reconcile,
            file_parser: Box::new(UniversalFileParser),
        }
    }

    /// 执行对账 (内存名册)
    ///
    /// # 参数
    /// - roster: 推荐关系名册快照; 空名册照常交叉核对, 在网会员全部计 ONLY_IN_STORE
    ///
    /// # 返回
    /// - Ok(ReconcileReport): 对账报告 (只读, 不做任何修正)
    pub fn run_reconcile(&self, roster: Vec<ExternalNode>) -> ApiResult<ReconcileReport> {
        Ok(self.reconcile.run(&roster)?)
    }

    /// 安置网络自检 (路径/层级/汇总, 不做名册交叉核对)
    pub fn run_audit(&self) -> ApiResult<ReconcileReport> {
        let _perf = crate::perf::PerfGuard::new("api.run_audit");
        Ok(self.reconcile.audit()?)
    }

    /// 执行对账 (名册文件)
    ///
    /// # 参数
    /// - file_path: 名册文件路径 (.xlsx/.xls/.csv, 列: 会员编号/会员姓名/层级)
    ///
    /// # 红线
    /// - 任一行缺少编号或姓名即整体拒绝, 避免半份名册产生误报
    pub fn run_reconcile_from_file(&self, file_path: &str) -> ApiResult<ReconcileReport> {
        let _perf = crate::perf::PerfGuard::new("api.run_reconcile_from_file");
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("名册文件路径不能为空".to_string()));
        }

        let roster = self.parse_roster(Path::new(file_path))?;
        Ok(self.reconcile.run(&roster)?)
    }

    // ==========================================
    // 名册解析
    // ==========================================

    fn parse_roster(&self, file_path: &Path) -> ApiResult<Vec<ExternalNode>> {
        let rows = self
            .file_parser
            .parse_to_raw_records(file_path)
            .map_err(|e| ApiError::ValidationError(format!("名册解析失败: {}", e)))?;

        let mut roster = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            // 解析器产出的首条数据行对应文件第 2 行
            let row_number = index + 2;

            let member_no = Self::pick_column(row, &ROSTER_MEMBER_NO_COLUMNS).ok_or_else(|| {
                ApiError::ValidationError(format!("名册第 {} 行缺少会员编号", row_number))
            })?;
            let member_name =
                Self::pick_column(row, &ROSTER_MEMBER_NAME_COLUMNS).ok_or_else(|| {
                    ApiError::ValidationError(format!("名册第 {} 行缺少会员姓名", row_number))
                })?;

            let mut node = ExternalNode::new(&member_no, &member_name);
            if let Some(raw_level) = Self::pick_column(row, &ROSTER_LEVEL_COLUMNS) {
                let level = raw_level.parse::<i64>().map_err(|_| {
                    ApiError::ValidationError(format!(
                        "名册第 {} 行层级不是整数: {}",
                        row_number, raw_level
                    ))
                })?;
                node = node.with_level(level);
            }
            roster.push(node);
        }

        Ok(roster)
    }

    fn pick_column(
        row: &std::collections::HashMap<String, String>,
        columns: &[&str],
    ) -> Option<String> {
        for column in columns {
            if let Some(value) = row.get(*column) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        None
    }
}
