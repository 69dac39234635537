// ==========================================
// 双轨会员网络管理系统 - 应用层
// ==========================================
// 职责: 共享装配, 供控制台入口与数据播种复用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
