// ==========================================
// 双轨会员网络管理系统 - 配置层
// ==========================================
// 依据: Network_Master_Spec.md - PART C 策略配置全集
// ==========================================
// 职责: 系统策略配置管理 (安置深度/汇总口径/分页参数)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod network_policy_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use network_policy_trait::NetworkPolicyReader;
