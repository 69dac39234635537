// ==========================================
// 双轨会员网络管理系统 - 存量导入 Trait
// ==========================================
// 依据: Network_Master_Spec.md - PART D 存量网络迁移
// 依据: Field_Mapping_Spec_v0.2_Network.md - 导入管道
// 职责: 定义存量网络导入接口（不包含实现）
// ==========================================

use crate::domain::import::{DqViolation, ImportOutcome, RawNetworkRecord};
use async_trait::async_trait;
use std::error::Error;
use std::path::Path;

// ==========================================
// NetworkImporter Trait
// ==========================================
// 用途: 存量网络导入主接口
// 实现者: NetworkImporterImpl
#[async_trait]
pub trait NetworkImporter: Send + Sync {
    /// 从 Excel 文件导入存量网络
    ///
    /// # 参数
    /// - file_path: Excel 文件路径（.xlsx/.xls）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 导入结果（批次信息、落位统计、DQ 违规、核对差异）
    /// - Err: 文件读取错误、数据库错误等
    ///
    /// # 导入流程（5个阶段）
    /// 1. 文件读取与解析
    /// 2. 字段映射与类型转换
    /// 3. DQ 校验（编号/必填/拓扑）
    /// 4. 按 (层级, 行号) 排序后经安置/退网引擎重放
    /// 5. 申报汇总与重建汇总核对 + 批次留痕
    async fn import_from_excel<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportOutcome, Box<dyn Error>>;

    /// 从 CSV 文件导入存量网络
    ///
    /// # 参数
    /// - file_path: CSV 文件路径（.csv）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 导入结果
    /// - Err: 文件读取错误、数据库错误等
    async fn import_from_csv<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> Result<ImportOutcome, Box<dyn Error>>;

    /// 批量导入多个文件
    ///
    /// # 参数
    /// - file_paths: 文件路径列表
    ///
    /// # 返回
    /// - Ok(Vec<...>): 每个文件的导入结果
    ///
    /// # 说明
    /// - 文件按给定顺序串行处理: 重放依赖层级先后,
    ///   并发导入会打乱父先子后的顺序
    /// - 单个文件失败不影响其余文件（幂等跳过保证可重试）
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Result<Vec<Result<ImportOutcome, String>>, Box<dyn Error>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录（HashMap<列名, 值>）
    ///
    /// # 参数
    /// - file_path: 文件路径
    ///
    /// # 返回
    /// - Ok(Vec<HashMap<String, String>>): 行记录列表
    /// - Err: 文件读取错误、格式错误
    fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> Result<Vec<std::collections::HashMap<String, String>>, Box<dyn Error>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 字段映射接口（阶段 1）
// 实现者: FieldMapper
pub trait FieldMapper: Send + Sync {
    /// 将原始行记录映射为 RawNetworkRecord
    ///
    /// # 参数
    /// - row: 原始行记录（HashMap<列名, 值>）
    /// - row_number: 行号（用于 DQ 报告）
    ///
    /// # 返回
    /// - Ok(RawNetworkRecord): 映射后的中间结构体
    /// - Err: 类型转换错误
    fn map_to_raw_network(
        &self,
        row: std::collections::HashMap<String, String>,
        row_number: usize,
    ) -> Result<RawNetworkRecord, Box<dyn Error>>;
}

// ==========================================
// RecordValidator Trait
// ==========================================
// 用途: 数据质量校验接口（阶段 2）
// 实现者: RecordValidator
pub trait RecordValidator: Send + Sync {
    /// 校验会员编号（非空且同批次内唯一）
    ///
    /// # 参数
    /// - records: 待校验记录列表
    ///
    /// # 返回
    /// - Vec<DqViolation>: 违规记录列表（编号缺失/重复, 均为阻断级）
    fn validate_member_keys(&self, records: &[RawNetworkRecord]) -> Vec<DqViolation>;

    /// 校验单条记录的必填字段与字段取值
    ///
    /// # 参数
    /// - record: 待校验记录
    ///
    /// # 返回
    /// - Vec<DqViolation>: 违规记录列表
    fn validate_required_fields(&self, record: &RawNetworkRecord) -> Vec<DqViolation>;

    /// 校验批次内拓扑（根唯一、层级连续、父子引用）
    ///
    /// # 参数
    /// - records: 待校验记录列表
    ///
    /// # 返回
    /// - Vec<DqViolation>: 违规记录列表
    fn validate_topology(&self, records: &[RawNetworkRecord]) -> Vec<DqViolation>;
}
