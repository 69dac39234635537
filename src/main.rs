// ==========================================
// 双轨会员网络管理系统 - 控制台入口
// ==========================================
// 依据: Network_Master_Spec.md - PART E 运维入口
// 用法: member-network-engine [stats|import <文件>...|reconcile <名册>|verify]
// 红线: 入口只做参数解析与结果呈现, 业务全部走 API 层
// ==========================================

use std::collections::HashSet;
use std::error::Error;
use std::process::ExitCode;

use member_network_engine::app::{get_default_db_path, AppState};
use member_network_engine::domain::import::DqLevel;
use member_network_engine::domain::types::ReconcileFindingKind;
use member_network_engine::engine::reconcile::ReconcileReport;
use member_network_engine::i18n::{t, t_with_args};
use member_network_engine::logging;

/// 校验/修复操作的操作人标识
const VERIFY_OPERATOR: &str = "system.verify";

fn main() -> ExitCode {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 点位树引擎", member_network_engine::APP_NAME);
    tracing::info!("系统版本: {}", member_network_engine::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("stats");

    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    // 获取数据库路径 (MEMBER_NETWORK_DB_PATH 优先)
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("AppState 初始化失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        "stats" => run_stats(&state),
        "import" => run_import(&state, &args[1..]),
        "reconcile" => run_reconcile(&state, &args[1..]),
        "verify" => run_verify(&state),
        other => {
            eprintln!("未知子命令: {}", other);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", t("common.failure"), e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("{} v{}", member_network_engine::APP_NAME, member_network_engine::VERSION);
    println!();
    println!("用法: member-network-engine [子命令]");
    println!();
    println!("子命令:");
    println!("  stats                 全网统计 (缺省子命令)");
    println!("  import <文件>...      导入存量网络导出 (.xlsx/.xls/.csv, 按给定顺序串行重放)");
    println!("  reconcile <名册>      与推荐关系名册交叉对账 (只读)");
    println!("  verify                安置网络自检, 汇总差异自动修复");
    println!();
    println!("环境变量:");
    println!("  MEMBER_NETWORK_DB_PATH  数据库文件路径 (缺省为用户数据目录)");
    println!("  RUST_LOG                日志级别 (缺省 info)");
}

// ==========================================
// stats - 全网统计
// ==========================================
fn run_stats(state: &AppState) -> Result<(), Box<dyn Error>> {
    let stats = state.network_api.get_network_stats()?;

    println!("==================================================");
    println!("全网统计");
    println!("==================================================");
    println!("点位总数:       {}", stats.total_positions);
    println!("在网会员:       {}", stats.active_members);
    println!("退网占位:       {}", stats.withdrawn_positions);
    match stats.max_level {
        Some(level) => println!("最深层级:       {}", level),
        None => println!("最深层级:       - (空网络)"),
    }
    println!("在网业绩合计:   {}", stats.active_sales_total);
    println!("退网业绩合计:   {}", stats.withdrawn_sales_total);
    Ok(())
}

// ==========================================
// import - 存量网络导入
// ==========================================
fn run_import(state: &AppState, files: &[String]) -> Result<(), Box<dyn Error>> {
    if files.is_empty() {
        return Err("import 需要至少一个导出文件路径".into());
    }

    // 导入管道是 async 接口, 控制台入口自建运行时桥接
    let runtime = tokio::runtime::Runtime::new()?;

    for file in files {
        println!("==================================================");
        println!("导入文件: {}", file);
        let response = runtime.block_on(state.import_api.import_network(file))?;

        println!(
            "{}",
            t_with_args("import.completed", &[("summary", &response.message)])
        );
        println!("批次ID: {} (耗时 {} ms)", response.batch_id, response.elapsed_ms);

        // 阻断级违规逐行列出, 警告只给计数
        let errors: Vec<_> = response
            .violations
            .iter()
            .filter(|v| v.level == DqLevel::Error)
            .collect();
        let warnings = response
            .violations
            .iter()
            .filter(|v| v.level == DqLevel::Warning)
            .count();
        if !errors.is_empty() {
            println!("阻断明细 ({} 行):", errors.len());
            for violation in &errors {
                println!(
                    "  行 {} [{}] {}",
                    violation.row_number, violation.field, violation.message
                );
            }
        }
        if warnings > 0 {
            println!("警告 {} 条 (不阻断, 详见日志)", warnings);
        }
        if !response.verify_mismatches.is_empty() {
            println!(
                "申报汇总差异 ({} 处, 仅提示不修正):",
                response.verify_mismatches.len()
            );
            for mismatch in &response.verify_mismatches {
                println!("  {}", mismatch);
            }
        }
    }
    Ok(())
}

// ==========================================
// reconcile - 名册交叉对账
// ==========================================
fn run_reconcile(state: &AppState, args: &[String]) -> Result<(), Box<dyn Error>> {
    let roster_path = args
        .first()
        .ok_or("reconcile 需要名册文件路径 (.xlsx/.xls/.csv)")?;

    let report = state.reconcile_api.run_reconcile_from_file(roster_path)?;

    println!("==================================================");
    println!("对账报告 ({})", report.generated_at.format("%Y-%m-%d %H:%M:%S"));
    println!("==================================================");
    println!("安置网络点位: {}", report.store_total);
    println!("名册记录:     {}", report.external_total);

    if report.is_clean() {
        println!("{}", t("reconcile.clean"));
        return Ok(());
    }

    println!(
        "{}",
        t_with_args(
            "reconcile.findings",
            &[("count", &report.findings.len().to_string())]
        )
    );
    print_findings(&report);

    // 对账只读: 差异是报告内容, 不是进程失败
    Ok(())
}

// ==========================================
// verify - 自检 + 汇总修复
// ==========================================
fn run_verify(state: &AppState) -> Result<(), Box<dyn Error>> {
    let report = state.reconcile_api.run_audit()?;

    println!("==================================================");
    println!("安置网络自检 (点位 {})", report.store_total);
    println!("==================================================");

    if report.is_clean() {
        println!("{}", t("verify.passed"));
        return Ok(());
    }
    print_findings(&report);

    // 汇总差异走业绩引擎重算链修复; 路径不一致必须人工介入
    let mut repaired: HashSet<String> = HashSet::new();
    for finding in report
        .findings
        .iter()
        .filter(|f| f.kind == ReconcileFindingKind::RollupMismatch)
    {
        if let Some(position_id) = &finding.position_id {
            let result = state
                .network_api
                .recompute_rollups(position_id, VERIFY_OPERATOR)?;
            repaired.extend(result.repaired_ids);
        }
    }
    if !repaired.is_empty() {
        println!(
            "{}",
            t_with_args("verify.failed", &[("count", &repaired.len().to_string())])
        );
    }

    // 复检: 修复后仍有差异视为运维失败
    let recheck = state.reconcile_api.run_audit()?;
    if recheck.is_clean() {
        println!("复检通过, 全网恢复一致");
        Ok(())
    } else {
        print_findings(&recheck);
        Err(format!("复检仍有 {} 处差异, 需人工排查", recheck.findings.len()).into())
    }
}

fn print_findings(report: &ReconcileReport) {
    for finding in &report.findings {
        let subject = finding
            .position_id
            .as_deref()
            .or(finding.identity_id.as_deref())
            .unwrap_or("-");
        println!("  [{}] {} {}", finding.kind, subject, finding.detail);
    }
}
