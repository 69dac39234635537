// ==========================================
// 双轨会员网络管理系统 - 网络策略读取 Trait
// ==========================================
// 依据: Network_Master_Spec.md - PART C 策略配置全集
// 职责: 定义网络引擎所需的策略读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::error::Error;

// ==========================================
// NetworkPolicyReader Trait
// ==========================================
// 用途: 安置/汇总/导入/对账/查询引擎的策略读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait NetworkPolicyReader: Send + Sync {
    /// 获取滑落搜索最大深度（相对安置上级的层数）
    ///
    /// # 返回
    /// - i64: 最大搜索层深（至少为 1）
    ///
    /// # 默认值
    /// - 16
    ///
    /// # 用途
    /// - 限定广度优先滑落搜索的边界，超界报容量不足
    fn max_spillover_depth(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;

    /// 退网占位是否计入人数/业绩汇总
    ///
    /// # 返回
    /// - true: 退网占位按权重 1 计入（默认口径）
    /// - false: 退网占位按权重 0 计入
    ///
    /// # 默认值
    /// - true
    ///
    /// # 用途
    /// - 汇总推导时决定占位的计数权重
    fn count_withdrawn_in_rollup(&self) -> Result<bool, Box<dyn Error + Send + Sync>>;

    /// 获取存量导入每批行数
    ///
    /// # 默认值
    /// - 500
    fn import_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取对账全量扫描每页行数
    ///
    /// # 默认值
    /// - 1000
    fn reconcile_scan_page_size(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;

    /// 获取伞下查询每页行数
    ///
    /// # 默认值
    /// - 500
    fn genealogy_page_size(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;
}
