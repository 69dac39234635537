// ==========================================
// 双轨会员网络管理系统 - 点位数据仓储
// ==========================================
// 依据: Network_Master_Spec.md - PART C 点位存储
// 依据: schema_v0.1.sql network_position 表
// 红线: 结构字段建后不变; 每次变更连同汇总更新走单事务
// ==========================================


mod core;
mod queries;


pub use core::PositionRepository;
