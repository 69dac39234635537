// ==========================================
// 双轨会员网络管理系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供控制台入口与上层集成调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod network_api;
pub mod reconcile_api;

// 重导出核心类型
pub use error::{
    validate_member_no, validate_position_id, validate_sales_amount, ApiError, ApiResult,
};
pub use import_api::{BatchImportItem, BatchImportResponse, ImportApi, ImportApiResponse};
pub use network_api::NetworkApi;
pub use reconcile_api::ReconcileApi;
