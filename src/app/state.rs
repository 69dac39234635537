// ==========================================
// 双轨会员网络管理系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 依据: TD-002 并发控制设计 (单连接 + 写闸门装配)
// 红线: 安置引擎与业绩引擎必须共用同一把写闸门,
//       分别建锁会让滑落搜索与汇总递推交叉写
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ImportApi, NetworkApi, ReconcileApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::collaborators::{OptionalMemberRegistry, OptionalSalesLedger};
use crate::engine::genealogy::GenealogyService;
use crate::engine::placement::PlacementEngine;
use crate::engine::reconcile::ReconcileEngine;
use crate::engine::repositories::NetworkRepositories;
use crate::engine::rollup::RollupCalculator;
use crate::engine::sales::SalesEngine;
use crate::engine::withdrawal::WithdrawalEngine;
use crate::importer::NetworkImporterImpl;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::position_repo::PositionRepository;

/// 应用状态
///
/// 包含所有API实例和共享资源，控制台入口与演示数据播种共用这一份装配。
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 网络操作API（安置/退网/业绩/谱系/审计查询）
    pub network_api: Arc<NetworkApi>,

    /// 存量导入API
    pub import_api: Arc<ImportApi>,

    /// 对账API
    pub reconcile_api: Arc<ReconcileApi>,

    /// 配置管理器（策略读写与快照）
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（审计追踪直达）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并幂等建表
    /// 2. 初始化Repository层
    /// 3. 初始化Engine层（安置/业绩共享一把写闸门）
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let mut conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库 {}: {}", db_path, e))?;
        init_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        crate::perf::install_sqlite_tracing(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let position_repo = Arc::new(PositionRepository::new(Arc::clone(&conn)));
        let action_log_repo = Arc::new(ActionLogRepository::new(Arc::clone(&conn)));
        let repos = NetworkRepositories::new(
            Arc::clone(&position_repo),
            Arc::clone(&action_log_repo),
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(Arc::clone(&conn))
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let rollup = Arc::new(RollupCalculator::new(
            Arc::clone(&position_repo),
            config_manager.clone(),
        ));

        // 写闸门只建这一把
        let write_gate = Arc::new(Mutex::new(()));

        let placement = Arc::new(PlacementEngine::new(
            repos.clone(),
            Arc::clone(&rollup),
            Arc::new(OptionalMemberRegistry::none()),
            config_manager.clone(),
            Arc::clone(&write_gate),
        ));
        let withdrawal = Arc::new(WithdrawalEngine::new(repos.clone()));
        let sales = Arc::new(SalesEngine::new(
            repos.clone(),
            Arc::clone(&rollup),
            Arc::new(OptionalSalesLedger::none()),
            Arc::clone(&write_gate),
        ));
        let genealogy = Arc::new(GenealogyService::new(
            Arc::clone(&position_repo),
            config_manager.clone(),
        ));
        let reconcile = Arc::new(ReconcileEngine::new(
            Arc::clone(&position_repo),
            config_manager.clone(),
        ));

        let importer = Arc::new(NetworkImporterImpl::with_default_components(
            Arc::clone(&placement),
            Arc::clone(&withdrawal),
            Arc::clone(&sales),
            repos,
            config_manager.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let network_api = Arc::new(NetworkApi::new(
            placement,
            withdrawal,
            sales,
            genealogy,
            position_repo,
            Arc::clone(&action_log_repo),
        ));
        let import_api = Arc::new(ImportApi::new(importer));
        let reconcile_api = Arc::new(ReconcileApi::new(reconcile));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            network_api,
            import_api,
            reconcile_api,
            config_manager,
            action_log_repo,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 MEMBER_NETWORK_DB_PATH 优先（调试/测试/CI）
/// - 开发构建: 用户数据目录/member-network-dev/member_network.db
/// - 发布构建: 用户数据目录/member-network/member_network.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("MEMBER_NETWORK_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./member_network.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("member-network-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("member-network");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("member_network.db");
    }

    path.to_string_lossy().to_string()
}
