// ==========================================
// 双轨会员网络管理系统 - 存量导入领域模型
// ==========================================
// 依据: Network_Master_Spec.md - PART D 存量网络迁移
// 依据: Field_Mapping_Spec_v0.2_Network.md - 导入管道
// ==========================================
// 红线: 导入走与实时安置相同的不变式, 不得绕过引擎直写
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// RawNetworkRecord - 存量导出行 (已类型转换)
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNetworkRecord {
    // 源字段（已类型转换）
    pub member_no: Option<String>,        // 会员编号
    pub member_name: Option<String>,      // 会员姓名
    pub level: Option<i64>,               // 层级 (根 = 0)
    pub position_type: Option<String>,    // 点位类型 (ROOT/LEFT/RIGHT, 原样保留)
    pub upline_member_no: Option<String>, // 安置上级会员编号
    pub withdrawn: bool,                  // 是否退网
    pub withdrawn_on: Option<NaiveDate>,  // 退网日期
    pub own_sales: Option<Decimal>,       // 自身业绩

    // 申报汇总（仅用于重建后核对, 绝不直接入库）
    pub decl_left_count: Option<i64>,
    pub decl_right_count: Option<i64>,
    pub decl_left_sales: Option<Decimal>,
    pub decl_right_sales: Option<Decimal>,

    // 元信息
    pub row_number: usize, // 原始文件行号（用于 DQ 报告）
}

// ==========================================
// DqViolation - 数据质量违规记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqViolation {
    pub row_number: usize,         // 原始文件行号
    pub member_no: Option<String>, // 会员编号（如果可解析）
    pub level: DqLevel,            // 违规级别
    pub field: String,             // 违规字段
    pub message: String,           // 违规描述
}

// ==========================================
// DqLevel - 数据质量级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DqLevel {
    Error,   // 错误（该行阻断导入）
    Warning, // 警告（允许导入）
    Info,    // 提示（仅记录）
}

// ==========================================
// ImportOutcome - 导入结果
// ==========================================
// 用途: 导入接口返回值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub batch_id: String,              // 批次 ID（UUID）
    pub file_name: Option<String>,     // 源文件名
    pub total_rows: usize,             // 总行数
    pub imported: usize,               // 新落位点位数
    pub skipped_existing: usize,       // 幂等跳过（编号已在网内）
    pub withdrawn_applied: usize,      // 重放的退网替换数
    pub blocked: usize,                // 阻断行数（DQ ERROR）
    pub violations: Vec<DqViolation>,  // 违规明细
    pub verify_mismatches: Vec<String>, // 申报汇总与重建汇总的差异
    pub elapsed_ms: i64,               // 导入耗时（毫秒）
}

impl ImportOutcome {
    /// 创建空结果（导入前初始化）
    pub fn new(batch_id: String, file_name: Option<String>) -> Self {
        Self {
            batch_id,
            file_name,
            total_rows: 0,
            imported: 0,
            skipped_existing: 0,
            withdrawn_applied: 0,
            blocked: 0,
            violations: vec![],
            verify_mismatches: vec![],
            elapsed_ms: 0,
        }
    }

    /// 是否有阻断级违规
    pub fn has_blocking_violations(&self) -> bool {
        self.violations.iter().any(|v| v.level == DqLevel::Error)
    }

    /// 生成简短摘要文本
    pub fn summary_text(&self) -> String {
        format!(
            "总行数{}, 新落位{}, 幂等跳过{}, 退网重放{}, 阻断{}, 核对差异{}",
            self.total_rows,
            self.imported,
            self.skipped_existing,
            self.withdrawn_applied,
            self.blocked,
            self.verify_mismatches.len()
        )
    }
}
