// ==========================================
// 双轨会员网络管理系统 - 存量导入 API
// ==========================================
// 职责: 封装存量网络导入入口, 按扩展名分发, 汇报批次结果
// 依据: Network_Master_Spec.md - PART D 存量网络迁移
// ==========================================

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::{DqViolation, ImportOutcome};
use crate::importer::{NetworkImporter, NetworkImporterImpl};

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 批次ID（导入器生成, 用于留痕追溯）
    pub batch_id: String,
    /// 源文件名
    pub file_name: Option<String>,
    /// 总行数
    pub total_rows: usize,
    /// 新落位点位数
    pub imported: usize,
    /// 幂等跳过数（编号已在网内）
    pub skipped_existing: usize,
    /// 重放的退网替换数
    pub withdrawn_applied: usize,
    /// 阻断行数（DQ ERROR）
    pub blocked: usize,
    /// DQ 违规明细
    pub violations: Vec<DqViolation>,
    /// 申报汇总与重建汇总的差异
    pub verify_mismatches: Vec<String>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
    /// 摘要文本
    pub message: String,
}

impl From<ImportOutcome> for ImportApiResponse {
    fn from(outcome: ImportOutcome) -> Self {
        let message = outcome.summary_text();
        Self {
            batch_id: outcome.batch_id,
            file_name: outcome.file_name,
            total_rows: outcome.total_rows,
            imported: outcome.imported,
            skipped_existing: outcome.skipped_existing,
            withdrawn_applied: outcome.withdrawn_applied,
            blocked: outcome.blocked,
            violations: outcome.violations,
            verify_mismatches: outcome.verify_mismatches,
            elapsed_ms: outcome.elapsed_ms,
            message,
        }
    }
}

/// 批量导入单文件结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchImportItem {
    pub file: String,
    pub success: bool,
    pub message: String,
}

/// 批量导入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchImportResponse {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchImportItem>,
}

// ==========================================
// ImportApi - 存量导入 API
// ==========================================
pub struct ImportApi {
    importer: Arc<NetworkImporterImpl>,
}

impl ImportApi {
    pub fn new(importer: Arc<NetworkImporterImpl>) -> Self {
        Self { importer }
    }

    /// 导入存量网络导出文件
    ///
    /// # 参数
    /// - file_path: 文件路径（.xlsx/.xls/.csv, 按扩展名分发）
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 批次结果（落位统计、DQ 违规、核对差异）
    /// - Err(ApiError): 格式不支持 / 文件读取失败 / 数据库错误
    pub async fn import_network(&self, file_path: &str) -> ApiResult<ImportApiResponse> {
        let _perf = crate::perf::PerfGuard::new("api.import_network");
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("导入文件路径不能为空".to_string()));
        }

        let extension = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let outcome = match extension.as_str() {
            "csv" => self.importer.import_from_csv(file_path).await,
            "xlsx" | "xls" => self.importer.import_from_excel(file_path).await,
            other => {
                return Err(ApiError::InvalidInput(format!(
                    "文件格式不支持: {}（仅支持 .xlsx/.xls/.csv）",
                    other
                )))
            }
        }
        .map_err(|e| ApiError::ImportFailed(e.to_string()))?;

        Ok(ImportApiResponse::from(outcome))
    }

    /// 批量导入多个导出文件 (按给定顺序串行重放)
    pub async fn batch_import_network(
        &self,
        file_paths: Vec<String>,
    ) -> ApiResult<BatchImportResponse> {
        if file_paths.is_empty() {
            return Err(ApiError::InvalidInput("文件列表不能为空".to_string()));
        }

        let results = self
            .importer
            .batch_import(file_paths.clone())
            .await
            .map_err(|e| ApiError::ImportFailed(e.to_string()))?;

        let mut items = Vec::with_capacity(results.len());
        let mut succeeded = 0;
        for (file, result) in file_paths.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    succeeded += 1;
                    items.push(BatchImportItem {
                        file: file.clone(),
                        success: true,
                        message: outcome.summary_text(),
                    });
                }
                Err(message) => {
                    items.push(BatchImportItem {
                        file: file.clone(),
                        success: false,
                        message,
                    });
                }
            }
        }

        Ok(BatchImportResponse {
            total_files: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        })
    }
}
