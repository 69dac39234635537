// ==========================================
// 双轨会员网络管理系统 - 核心库
// ==========================================
// 依据: Network_Master_Spec.md - 系统宪法
// 技术栈: Rust + SQLite
// 系统定位: 网络台账系统 (安置不可逆, 人工最终控制权)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 性能观测（SQL 计数 + 慢查询日志）
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配与默认数据库路径
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OccupantKind, PositionType, ReconcileFindingKind};

// 领域实体
pub use domain::{ActionLog, ActionType, ImportOutcome, Occupant, Position};

// 引擎
pub use engine::{
    GenealogyService, NetworkStats, PlacementEngine, PositionView, ReconcileEngine,
    RollupCalculator, SalesEngine, WithdrawalEngine,
};

// API
pub use api::{ImportApi, NetworkApi, ReconcileApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "双轨会员网络管理系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================
