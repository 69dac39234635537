// ==========================================
// 双轨会员网络管理系统 - 导入层
// ==========================================
// 依据: Network_Master_Spec.md - PART D 存量网络迁移
// ==========================================
// 职责: 存量网络导出文件导入, 经引擎重放重建点位树
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod network_importer_impl;
pub mod network_importer_trait;
pub mod record_validator;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use network_importer_impl::NetworkImporterImpl;
pub use record_validator::RecordValidator as RecordValidatorImpl;

// 重导出 Trait 接口
pub use network_importer_trait::{
    FieldMapper, FileParser, NetworkImporter, RecordValidator,
};
