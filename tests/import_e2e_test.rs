// ==========================================
// 存量导入端到端测试
// ==========================================
// 目标: 验证 legacy 导出文件经 DQ 校验 → 引擎重放 →
//       申报核对的完整导入链路与幂等语义
// ==========================================


#[cfg(test)]
mod import_e2e_test {
    use crate::test_helpers::{
        create_test_state, seed_standard_network, write_export_csv, EXPORT_HEADER,
    };
    use member_network_engine::api::ApiError;
    use member_network_engine::domain::{DqLevel, OccupantKind};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const SMALL_NETWORK_FIXTURE: &str = "tests/fixtures/datasets/01_small_network.csv";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_import_standard_fixture() {
        let (_db, state) = create_test_state().unwrap();

        let response = state
            .import_api
            .import_network(SMALL_NETWORK_FIXTURE)
            .await
            .unwrap();

        assert!(!response.batch_id.is_empty());
        assert_eq!(response.total_rows, 8);
        assert_eq!(response.imported, 8);
        assert_eq!(response.withdrawn_applied, 1);
        assert_eq!(response.blocked, 0);
        assert!(
            response.verify_mismatches.is_empty(),
            "标准导出的申报汇总应与重建一致: {:?}",
            response.verify_mismatches
        );
        println!("✓ 步骤 1: 标准导出文件导入完成 ({})", response.message);

        let stats = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats.total_positions, 8);
        assert_eq!(stats.active_members, 7);
        assert_eq!(stats.withdrawn_positions, 1);
        assert_eq!(stats.max_level, Some(3));
        assert_eq!(stats.active_sales_total, dec("360.75"));
        assert_eq!(stats.withdrawn_sales_total, dec("20.00"));

        // 导入落位的网络必须通过结构自检
        let audit = state.reconcile_api.run_audit().unwrap();
        assert!(audit.is_clean(), "导入后结构自检应零差异: {:?}", audit.findings);
        println!("✓ 步骤 2: 导入网络通过结构自检");
    }

    #[tokio::test]
    async fn test_import_idempotent_reimport() {
        let (_db, state) = create_test_state().unwrap();

        let first = state
            .import_api
            .import_network(SMALL_NETWORK_FIXTURE)
            .await
            .unwrap();
        assert_eq!(first.imported, 8);

        let stats_before = state.network_api.get_network_stats().unwrap();

        // 同文件重复导入: 全部幂等跳过, 不产生新点位
        let second = state
            .import_api
            .import_network(SMALL_NETWORK_FIXTURE)
            .await
            .unwrap();
        assert_eq!(second.imported, 0, "重复导入不得新建点位");
        assert_eq!(second.skipped_existing, 8);
        assert_eq!(second.withdrawn_applied, 0, "退网已重放过, 不得重复替换");
        assert_eq!(second.blocked, 0);

        let stats_after = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats_before.total_positions, stats_after.total_positions);
        assert_eq!(stats_before.active_sales_total, stats_after.active_sales_total);
        assert_eq!(
            stats_before.withdrawn_sales_total,
            stats_after.withdrawn_sales_total
        );
    }

    /// 同一行集, 在线逐笔落位与文件重放必须产出同构网络
    #[tokio::test]
    async fn test_replay_matches_live_construction() {
        let (_db_live, live) = create_test_state().unwrap();
        let placed = seed_standard_network(&live.network_api).unwrap();

        let (_db_replay, replay) = create_test_state().unwrap();
        replay
            .import_api
            .import_network(SMALL_NETWORK_FIXTURE)
            .await
            .unwrap();

        // 按 (层级, 落位先后) 对齐比较身份/层级/槽位
        let live_root = &placed[0].1;
        let replay_root_id = replay
            .network_api
            .find_member_positions("M000001")
            .unwrap()
            .first()
            .unwrap()
            .position_id
            .clone();

        let live_tree = live.network_api.get_descendants(live_root, None).unwrap();
        let replay_tree = replay
            .network_api
            .get_descendants(&replay_root_id, None)
            .unwrap();

        let shape = |views: &[member_network_engine::PositionView]| {
            views
                .iter()
                .map(|v| {
                    (
                        v.occupant.identity_id.clone(),
                        v.level,
                        v.position_type,
                        v.occupant.kind,
                        v.own_sales,
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&live_tree), shape(&replay_tree), "重放网络应与在线构建同构");

        let live_root_view = live.network_api.get_position_detail(live_root).unwrap().unwrap();
        let replay_root_view = replay
            .network_api
            .get_position_detail(&replay_root_id)
            .unwrap()
            .unwrap();
        assert_eq!(live_root_view.left_count, replay_root_view.left_count);
        assert_eq!(live_root_view.right_count, replay_root_view.right_count);
        assert_eq!(live_root_view.left_sales, replay_root_view.left_sales);
        assert_eq!(live_root_view.right_sales, replay_root_view.right_sales);
    }

    #[tokio::test]
    async fn test_import_blocks_bad_rows_and_continues() {
        let (_db, state) = create_test_state().unwrap();

        let content = format!(
            "{}\n\
             M000001,张伟,0,ROOT,,否,,0,,,,\n\
             ,李娜,1,RIGHT,M000001,否,,10,,,,\n\
             M000003,刘洋,1,LEFT,M000001,否,,20,,,,\n\
             M000004,陈静,,RIGHT,M000003,否,,30,,,,\n",
            EXPORT_HEADER
        );
        let file = write_export_csv(&content).unwrap();

        let response = state
            .import_api
            .import_network(file.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(response.total_rows, 4);
        assert_eq!(response.imported, 2, "有效行应照常落位");
        assert_eq!(response.blocked, 2, "缺编号与缺层级的行应被阻断");
        assert!(response
            .violations
            .iter()
            .any(|v| v.level == DqLevel::Error && v.field == "member_no"));
        assert!(response
            .violations
            .iter()
            .any(|v| v.level == DqLevel::Error && v.field == "level"));

        // 被阻断的行不落库
        let stats = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats.total_positions, 2);
    }

    #[tokio::test]
    async fn test_import_reports_declared_mismatch_without_fixing() {
        let (_db, state) = create_test_state().unwrap();

        // 根的申报汇总故意写错 (左区人数5, 左区业绩999.99)
        let content = format!(
            "{}\n\
             M000001,张伟,0,ROOT,,否,,0,5,1,999.99,80.00\n\
             M000002,王芳,1,LEFT,M000001,否,,100.00,0,0,0,0\n\
             M000003,李娜,1,RIGHT,M000001,否,,80.00,0,0,0,0\n",
            EXPORT_HEADER
        );
        let file = write_export_csv(&content).unwrap();

        let response = state
            .import_api
            .import_network(file.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(response.imported, 3);
        assert_eq!(response.blocked, 0, "申报差异不阻断落位");
        assert!(
            !response.verify_mismatches.is_empty(),
            "应报告申报汇总与重建结果的差异"
        );

        // 库内以重建值为准, 不采信申报值
        let root = state
            .network_api
            .find_member_positions("M000001")
            .unwrap()
            .remove(0);
        assert_eq!(root.left_count, 1);
        assert_eq!(root.left_sales, dec("100.00"));
    }

    #[tokio::test]
    async fn test_import_applies_withdrawal_to_existing_member() {
        let (_db, state) = create_test_state().unwrap();

        let base = format!(
            "{}\n\
             M000001,张伟,0,ROOT,,否,,0,,,,\n\
             M000002,王芳,1,LEFT,M000001,否,,50.00,,,,\n",
            EXPORT_HEADER
        );
        let file = write_export_csv(&base).unwrap();
        state
            .import_api
            .import_network(file.path().to_str().unwrap())
            .await
            .unwrap();

        // 增量文件: 同编号带退网标记, 已在网 → 只补退网替换
        let delta = format!(
            "{}\n\
             M000002,王芳,1,LEFT,M000001,是,20250601,50.00,,,,\n",
            EXPORT_HEADER
        );
        let file = write_export_csv(&delta).unwrap();
        let response = state
            .import_api
            .import_network(file.path().to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(response.imported, 0);
        assert_eq!(response.withdrawn_applied, 1, "应对在网点位补执行退网替换");

        let view = state
            .network_api
            .find_member_positions("M000002")
            .unwrap()
            .remove(0);
        assert_eq!(view.occupant.kind, OccupantKind::Withdrawal);
    }

    #[tokio::test]
    async fn test_import_rejects_unsupported_extension() {
        let (_db, state) = create_test_state().unwrap();

        let err = state
            .import_api
            .import_network("roster.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)), "不支持的格式: {err}");

        let err = state.import_api.import_network("  ").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_batch_import_continues_after_failure() {
        let (_db, state) = create_test_state().unwrap();

        let good = format!(
            "{}\n\
             M000001,张伟,0,ROOT,,否,,0,,,,\n",
            EXPORT_HEADER
        );
        let file = write_export_csv(&good).unwrap();

        let response = state
            .import_api
            .batch_import_network(vec![
                "/nonexistent/legacy_export.csv".to_string(),
                file.path().to_str().unwrap().to_string(),
            ])
            .await
            .unwrap();

        assert_eq!(response.total_files, 2);
        assert_eq!(response.succeeded, 1);
        assert_eq!(response.failed, 1);
        assert!(!response.items[0].success, "缺失文件应失败但不中断批次");
        assert!(response.items[1].success);

        let stats = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats.total_positions, 1, "后续文件应照常导入");
    }
}
