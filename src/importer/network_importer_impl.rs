// ==========================================
// 双轨会员网络管理系统 - 存量网络导入器实现
// ==========================================
// 依据: Network_Master_Spec.md - PART D 存量网络迁移
// 依据: Field_Mapping_Spec_v0.2_Network.md - 字段映射规范
// ==========================================
// 职责: 整合导入流程, 从导出文件到点位网络
// 流程: 解析 → 映射 → DQ 校验 → 按层重放 → 申报核对 → 批次留痕
// 红线: 重放必须经安置/退网/业绩引擎, 不得绕过引擎直写;
//       申报汇总仅用于核对, 绝不直接入库
// ==========================================

use crate::config::NetworkPolicyReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::import::{DqLevel, DqViolation, ImportOutcome, RawNetworkRecord};
use crate::domain::occupant::Occupant;
use crate::domain::position::Position;
use crate::domain::types::{OccupantKind, PositionType};
use crate::engine::placement::PlacementEngine;
use crate::engine::repositories::NetworkRepositories;
use crate::engine::sales::SalesEngine;
use crate::engine::withdrawal::{WithdrawalEngine, WithdrawalRequest};
use crate::importer::error::ImportError;
use crate::importer::field_mapper::FieldMapper as FieldMapperImpl;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::network_importer_trait::{
    FieldMapper, FileParser, NetworkImporter, RecordValidator,
};
use crate::importer::record_validator::RecordValidator as RecordValidatorImpl;
use serde_json::json;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 导入重放操作人（批次留痕用）
const IMPORT_OPERATOR: &str = "system.import";

// 单行重放的落位结果
enum ReplayAction {
    Placed,
    PlacedAndWithdrawn,
    WithdrawnOnly,
    SkippedExisting,
}

// ==========================================
// NetworkImporterImpl - 存量网络导入器实现
// ==========================================
pub struct NetworkImporterImpl {
    // 引擎（重放走与实时操作相同的不变式）
    placement: Arc<PlacementEngine>,
    withdrawal: Arc<WithdrawalEngine>,
    sales: Arc<SalesEngine>,

    // 数据访问层
    repos: NetworkRepositories,

    // 策略读取器
    policy: Arc<dyn NetworkPolicyReader>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    validator: Box<dyn RecordValidator>,
}

impl NetworkImporterImpl {
    /// 创建新的 NetworkImporter 实例
    ///
    /// # 参数
    /// - placement: 安置引擎
    /// - withdrawal: 退网引擎
    /// - sales: 业绩引擎
    /// - repos: 仓储集合
    /// - policy: 策略读取器
    /// - file_parser: 文件解析器
    /// - field_mapper: 字段映射器
    /// - validator: DQ 校验器
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        placement: Arc<PlacementEngine>,
        withdrawal: Arc<WithdrawalEngine>,
        sales: Arc<SalesEngine>,
        repos: NetworkRepositories,
        policy: Arc<dyn NetworkPolicyReader>,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        validator: Box<dyn RecordValidator>,
    ) -> Self {
        Self {
            placement,
            withdrawal,
            sales,
            repos,
            policy,
            file_parser,
            field_mapper,
            validator,
        }
    }

    /// 以默认组件（通用解析器/标准映射/标准校验）装配导入器
    pub fn with_default_components(
        placement: Arc<PlacementEngine>,
        withdrawal: Arc<WithdrawalEngine>,
        sales: Arc<SalesEngine>,
        repos: NetworkRepositories,
        policy: Arc<dyn NetworkPolicyReader>,
    ) -> Self {
        Self::new(
            placement,
            withdrawal,
            sales,
            repos,
            policy,
            Box::new(UniversalFileParser),
            Box::new(FieldMapperImpl),
            Box::new(RecordValidatorImpl),
        )
    }
}

#[async_trait::async_trait]
impl NetworkImporter for NetworkImporterImpl {
    #[instrument(skip(self, file_path), fields(batch_id))]
    async fn import_from_excel<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportOutcome, Box<dyn Error>> {
        self.run_import(file_path.as_ref()).map_err(Into::into)
    }

    async fn import_from_csv<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportOutcome, Box<dyn Error>> {
        // 解析器按扩展名分发, CSV 复用同一管道
        self.run_import(file_path.as_ref()).map_err(Into::into)
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Result<Vec<Result<ImportOutcome, String>>, Box<dyn Error>> {
        info!(count = file_paths.len(), "开始批量导入存量文件");

        // 串行处理: 重放依赖层级先后, 不做并发
        let mut results = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            let path_str = path.as_ref().display().to_string();
            match self.run_import(path.as_ref()) {
                Ok(outcome) => {
                    info!(file = %path_str, summary = %outcome.summary_text(), "文件导入成功");
                    results.push(Ok(outcome));
                }
                Err(e) => {
                    warn!(file = %path_str, error = %e, "文件导入失败");
                    results.push(Err(format!("文件 {} 导入失败: {}", path_str, e)));
                }
            }
        }

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            "批量导入完成"
        );
        Ok(results)
    }
}

// 导入管道各阶段
impl NetworkImporterImpl {
    fn run_import(&self, file_path: &Path) -> Result<ImportOutcome, ImportError> {
        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from);
        let mut outcome = ImportOutcome::new(batch_id.clone(), file_name);

        info!(batch_id = %batch_id, file = %file_path.display(), "开始导入存量网络");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let raw_rows = self
            .file_parser
            .parse_to_raw_records(file_path)
            .map_err(|e| ImportError::FileReadError(e.to_string()))?;
        outcome.total_rows = raw_rows.len();
        info!(total_rows = outcome.total_rows, "文件解析完成");

        // === 步骤 2: 字段映射 ===
        debug!("步骤 2: 字段映射");
        let mut records = Vec::new();
        for (idx, row) in raw_rows.into_iter().enumerate() {
            let row_number = idx + 1;
            match self.field_mapper.map_to_raw_network(row, row_number) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(row_number, error = %e, "字段映射失败");
                    outcome.violations.push(DqViolation {
                        row_number,
                        member_no: None,
                        level: DqLevel::Error,
                        field: "-".to_string(),
                        message: format!("字段映射失败: {}", e),
                    });
                }
            }
        }
        info!(mapped = records.len(), "字段映射完成");

        // === 步骤 3: DQ 校验 ===
        debug!("步骤 3: DQ 校验");
        outcome
            .violations
            .extend(self.validator.validate_member_keys(&records));
        for record in &records {
            outcome
                .violations
                .extend(self.validator.validate_required_fields(record));
        }
        outcome
            .violations
            .extend(self.validator.validate_topology(&records));

        let mut blocked_rows: HashSet<usize> = outcome
            .violations
            .iter()
            .filter(|v| v.level == DqLevel::Error)
            .map(|v| v.row_number)
            .collect();
        info!(
            violations = outcome.violations.len(),
            blocked = blocked_rows.len(),
            "DQ 校验完成"
        );

        // === 步骤 4: 按 (层级, 行号) 排序后重放 ===
        debug!("步骤 4: 重放落位");
        let mut replay_queue: Vec<&RawNetworkRecord> = records
            .iter()
            .filter(|r| !blocked_rows.contains(&r.row_number))
            .collect();
        replay_queue.sort_by_key(|r| (r.level.unwrap_or(i64::MAX), r.row_number));

        let batch_size = self
            .policy
            .import_batch_size()
            .map_err(|e| ImportError::ConfigReadError {
                key: "import/batch_size".to_string(),
                message: e.to_string(),
            })?
            .max(1);

        let mut processed = 0usize;
        for chunk in replay_queue.chunks(batch_size) {
            for record in chunk {
                match self.replay_record(record) {
                    Ok(ReplayAction::Placed) => outcome.imported += 1,
                    Ok(ReplayAction::PlacedAndWithdrawn) => {
                        outcome.imported += 1;
                        outcome.withdrawn_applied += 1;
                    }
                    Ok(ReplayAction::WithdrawnOnly) => outcome.withdrawn_applied += 1,
                    Ok(ReplayAction::SkippedExisting) => outcome.skipped_existing += 1,
                    Err(e) => {
                        warn!(row_number = record.row_number, error = %e, "重放落位失败");
                        blocked_rows.insert(record.row_number);
                        outcome.violations.push(DqViolation {
                            row_number: record.row_number,
                            member_no: record.member_no.clone(),
                            level: DqLevel::Error,
                            field: "-".to_string(),
                            message: format!("重放落位失败: {}", e),
                        });
                    }
                }
            }
            processed += chunk.len();
            debug!(processed, "导入批次处理完成");
        }
        outcome.blocked = blocked_rows.len();

        // === 步骤 5: 申报汇总核对 ===
        // 汇总需全部子孙落位后才定型, 所以放在重放循环之后
        debug!("步骤 5: 申报汇总核对");
        for record in records
            .iter()
            .filter(|r| !blocked_rows.contains(&r.row_number))
        {
            match self.verify_declared_rollups(record) {
                Ok(mismatches) => outcome.verify_mismatches.extend(mismatches),
                Err(e) => {
                    warn!(row_number = record.row_number, error = %e, "申报汇总核对失败");
                }
            }
        }

        outcome.elapsed_ms = started.elapsed().as_millis() as i64;

        // === 步骤 6: 批次留痕（提交后, 失败只告警） ===
        self.log_batch(&outcome);

        info!(
            batch_id = %batch_id,
            summary = %outcome.summary_text(),
            elapsed_ms = outcome.elapsed_ms,
            "存量网络导入完成"
        );
        Ok(outcome)
    }

    /// 重放单行: 幂等跳过 → 落位 → 业绩 → 退网替换
    fn replay_record(&self, record: &RawNetworkRecord) -> Result<ReplayAction, ImportError> {
        let row = record.row_number;
        let member_no = record
            .member_no
            .as_deref()
            .ok_or(ImportError::MemberNoMissing(row))?;
        let display_name = record
            .member_name
            .clone()
            .unwrap_or_else(|| member_no.to_string());

        // 幂等检查: 编号已在网内（在网或退网占位）一律跳过,
        // 仅退网标志未重放完成时补齐退网替换
        let existing = self.repos.position_repo.find_by_identity(member_no)?;
        if !existing.is_empty() {
            if record.withdrawn {
                if let Some(active) = existing
                    .iter()
                    .find(|p| p.occupant.kind() == OccupantKind::Member)
                {
                    self.apply_withdrawal(&active.position_id, record, member_no)?;
                    return Ok(ReplayAction::WithdrawnOnly);
                }
            }
            return Ok(ReplayAction::SkippedExisting);
        }

        // 落位
        let occupant = Occupant::member(member_no, display_name);
        let placed = if record.level == Some(0) {
            if let Some(root) = self.repos.position_repo.find_root()? {
                return Err(ImportError::ReplayError {
                    row,
                    member_no: member_no.to_string(),
                    message: format!("网络已有根点位 {}", root.position_id),
                });
            }
            self.placement
                .place_root(occupant, IMPORT_OPERATOR)
                .map_err(|e| ImportError::ReplayError {
                    row,
                    member_no: member_no.to_string(),
                    message: e.to_string(),
                })?
        } else {
            let parent = self.resolve_upline(record, member_no)?;
            let position_type = record
                .position_type
                .as_deref()
                .and_then(PositionType::from_str);
            match position_type {
                Some(side) if side != PositionType::Root => self
                    .placement
                    .place_directed(occupant, &parent.position_id, side, IMPORT_OPERATOR)
                    .map_err(|e| ImportError::ReplayError {
                        row,
                        member_no: member_no.to_string(),
                        message: e.to_string(),
                    })?,
                // 导出未带侧别时按广度优先滑落自动落位
                _ => self
                    .placement
                    .place(occupant, &parent.position_id, IMPORT_OPERATOR)
                    .map_err(|e| ImportError::ReplayError {
                        row,
                        member_no: member_no.to_string(),
                        message: e.to_string(),
                    })?,
            }
        };

        // 个人业绩（走业绩引擎, 汇总链同步更新）
        if let Some(sales) = record.own_sales {
            if !sales.is_zero() {
                self.sales
                    .record_sales(&placed.position_id, sales, IMPORT_OPERATOR)
                    .map_err(|e| ImportError::ReplayError {
                        row,
                        member_no: member_no.to_string(),
                        message: format!("业绩重放失败: {}", e),
                    })?;
            }
        }

        // 退网替换
        if record.withdrawn {
            self.apply_withdrawal(&placed.position_id, record, member_no)?;
            return Ok(ReplayAction::PlacedAndWithdrawn);
        }

        Ok(ReplayAction::Placed)
    }

    fn apply_withdrawal(
        &self,
        position_id: &str,
        record: &RawNetworkRecord,
        member_no: &str,
    ) -> Result<(), ImportError> {
        let withdrawn_on = record
            .withdrawn_on
            .ok_or_else(|| ImportError::ReplayError {
                row: record.row_number,
                member_no: member_no.to_string(),
                message: "退网行缺少退网日期".to_string(),
            })?;
        let request =
            WithdrawalRequest::new(member_no, withdrawn_on).with_reason("存量导入重放");
        self.withdrawal
            .withdraw(position_id, request, IMPORT_OPERATOR)
            .map_err(|e| ImportError::ReplayError {
                row: record.row_number,
                member_no: member_no.to_string(),
                message: format!("退网重放失败: {}", e),
            })?;
        Ok(())
    }

    /// 解析安置上级编号到点位: 优先在网占位, 次选唯一退网占位
    fn resolve_upline(
        &self,
        record: &RawNetworkRecord,
        member_no: &str,
    ) -> Result<Position, ImportError> {
        let row = record.row_number;
        let upline_no =
            record
                .upline_member_no
                .as_deref()
                .ok_or_else(|| ImportError::ReplayError {
                    row,
                    member_no: member_no.to_string(),
                    message: "非根点位缺少安置上级编号".to_string(),
                })?;

        let candidates = self.repos.position_repo.find_by_identity(upline_no)?;
        if let Some(active) = candidates
            .iter()
            .find(|p| p.occupant.kind() == OccupantKind::Member)
        {
            return Ok(active.clone());
        }
        match candidates.len() {
            0 => Err(ImportError::ReplayError {
                row,
                member_no: member_no.to_string(),
                message: format!("安置上级 {} 不在网内", upline_no),
            }),
            1 => Ok(candidates.into_iter().next().ok_or_else(|| {
                ImportError::InternalError("候选点位列表意外为空".to_string())
            })?),
            n => Err(ImportError::ReplayError {
                row,
                member_no: member_no.to_string(),
                message: format!("安置上级 {} 命中 {} 个退网占位, 无法判定", upline_no, n),
            }),
        }
    }

    /// 申报汇总 vs 重建汇总（只核对, 不修正）
    fn verify_declared_rollups(
        &self,
        record: &RawNetworkRecord,
    ) -> Result<Vec<String>, ImportError> {
        if record.decl_left_count.is_none()
            && record.decl_right_count.is_none()
            && record.decl_left_sales.is_none()
            && record.decl_right_sales.is_none()
        {
            return Ok(Vec::new());
        }
        let member_no = match record.member_no.as_deref() {
            Some(no) => no,
            None => return Ok(Vec::new()),
        };

        let candidates = self.repos.position_repo.find_by_identity(member_no)?;
        let position = match candidates
            .iter()
            .find(|p| p.occupant.kind() == OccupantKind::Member)
            .or_else(|| candidates.first())
        {
            Some(p) => p,
            None => return Ok(Vec::new()),
        };

        let mut mismatches = Vec::new();
        if let Some(declared) = record.decl_left_count {
            if declared != position.left_count {
                mismatches.push(format!(
                    "会员 {}: 申报左区人数 {} != 重建 {}",
                    member_no, declared, position.left_count
                ));
            }
        }
        if let Some(declared) = record.decl_right_count {
            if declared != position.right_count {
                mismatches.push(format!(
                    "会员 {}: 申报右区人数 {} != 重建 {}",
                    member_no, declared, position.right_count
                ));
            }
        }
        if let Some(declared) = record.decl_left_sales {
            if declared != position.left_sales {
                mismatches.push(format!(
                    "会员 {}: 申报左区业绩 {} != 重建 {}",
                    member_no, declared, position.left_sales
                ));
            }
        }
        if let Some(declared) = record.decl_right_sales {
            if declared != position.right_sales {
                mismatches.push(format!(
                    "会员 {}: 申报右区业绩 {} != 重建 {}",
                    member_no, declared, position.right_sales
                ));
            }
        }
        Ok(mismatches)
    }

    /// 提交后写批次留痕 (失败只告警, 不影响已落位数据)
    fn log_batch(&self, outcome: &ImportOutcome) {
        let log = ActionLog::new(
            Uuid::new_v4().to_string(),
            None,
            ActionType::Import,
            IMPORT_OPERATOR.to_string(),
        )
        .with_payload(&json!({
            "batch_id": outcome.batch_id,
            "file_name": outcome.file_name,
            "total_rows": outcome.total_rows,
            "imported": outcome.imported,
            "skipped_existing": outcome.skipped_existing,
            "withdrawn_applied": outcome.withdrawn_applied,
            "blocked": outcome.blocked,
            "verify_mismatches": outcome.verify_mismatches.len(),
            "elapsed_ms": outcome.elapsed_ms,
        }))
        .with_detail(outcome.summary_text());

        if let Err(e) = self.repos.action_log_repo.insert(&log) {
            warn!(batch_id = %outcome.batch_id, error = %e, "导入批次留痕写入失败");
        }
    }
}
