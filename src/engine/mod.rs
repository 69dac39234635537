// ==========================================
// 双轨会员网络管理系统 - 引擎层
// ==========================================
// 依据: Network_Master_Spec.md - PART B 引擎体系
// 依据: Engine_Specs_v0.2_Network.md - 1.2 模块拆分
// ==========================================
// 职责: 实现安置/退网/业绩/谱系/对账的业务规则,不拼 SQL
// 红线: Engine 不拼 SQL; 写路径全部走仓储事务;
//       安置与业绩共用一把写闸, 汇总链不允许交叉写
// ==========================================

pub mod collaborators;
pub mod error;
pub mod genealogy;
pub mod placement;
pub mod reconcile;
pub mod repositories;
pub mod rollup;
pub mod sales;
pub mod withdrawal;

// 重导出核心引擎
pub use collaborators::{
    InMemoryMemberRegistry, InMemorySalesLedger, MemberProfile, MemberRegistry,
    OptionalMemberRegistry, OptionalSalesLedger, SalesLedger, SalesPeriod,
};
pub use error::{EngineError, EngineResult};
pub use genealogy::{GenealogyService, NetworkStats, PositionView};
pub use placement::{PlacementEngine, PlacementResult};
pub use reconcile::{ExternalNode, ReconcileEngine, ReconcileFinding, ReconcileReport};
pub use repositories::NetworkRepositories;
pub use rollup::RollupCalculator;
pub use sales::{RollupRepairResult, SalesEngine, SalesUpdateResult};
pub use withdrawal::{WithdrawalEngine, WithdrawalRequest, WithdrawalResult};
