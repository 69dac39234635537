// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证安置/退网/业绩在多线程并发下的控制机制
// ==========================================


#[cfg(test)]
mod concurrent_control_test {
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    use member_network_engine::api::ApiError;

    use crate::test_helpers::create_test_state;

    // ==========================================
    // 测试1: 同一槽位并发定向安置
    // ==========================================

    #[test]
    fn test_concurrent_directed_placement_single_winner() {
        let (_temp_file, state) = create_test_state().unwrap();

        let root = state
            .network_api
            .place_root("M000001", "张伟", "tester")
            .unwrap();

        // 两个线程同时抢根点位的左槽
        let mut handles = vec![];
        for i in 0..2 {
            let api = state.network_api.clone();
            let root_id = root.position_id.clone();

            let handle = thread::spawn(move || -> Result<String, ApiError> {
                // 稍微延迟,增加并发冲突概率
                thread::sleep(Duration::from_millis(10));
                let result = api.place_member_directed(
                    &format!("M00000{}", i + 2),
                    "王芳",
                    &root_id,
                    "LEFT",
                    "tester",
                )?;
                Ok(result.position_id)
            });
            handles.push(handle);
        }

        let mut success_count = 0;
        let mut conflict_count = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => success_count += 1,
                Err(err) => {
                    assert!(
                        matches!(err, ApiError::SlotOccupied(_)),
                        "落败方错误应为槽位冲突: {}",
                        err
                    );
                    conflict_count += 1;
                }
            }
        }

        assert_eq!(success_count, 1, "同一槽位应该只有1个线程落位成功");
        assert_eq!(conflict_count, 1, "另一个线程应该因槽位冲突失败");

        // 落位结果必须仍是合法的两点位网络
        let stats = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats.total_positions, 2);
        let audit = state.reconcile_api.run_audit().unwrap();
        assert!(audit.is_clean(), "冲突落败不得留下残缺数据: {:?}", audit.findings);

        println!("✅ 并发定向安置测试通过: 1个成功,1个冲突");
    }

    // ==========================================
    // 测试2: 自动安置并发落位(无冲突)
    // ==========================================

    #[test]
    fn test_concurrent_auto_placement_all_succeed() {
        let (_temp_file, state) = create_test_state().unwrap();

        let root = state
            .network_api
            .place_root("M000001", "张伟", "tester")
            .unwrap();

        // 多个线程同时向根点位伞下自动安置
        let thread_count = 8;
        let mut handles = vec![];
        for i in 0..thread_count {
            let api = state.network_api.clone();
            let root_id = root.position_id.clone();

            let handle = thread::spawn(move || {
                api.place_member(
                    &format!("M0000{:02}", i + 2),
                    "李娜",
                    &root_id,
                    "tester",
                )
            });
            handles.push(handle);
        }

        let mut slots = HashSet::new();
        for handle in handles {
            let result = handle.join().unwrap().expect("自动安置不应出现冲突");
            let slot_key = format!(
                "{}:{}",
                result.parent_id.clone().unwrap_or_default(),
                result.position_type.to_db_str()
            );
            assert!(slots.insert(slot_key), "每个线程必须落入不同槽位");
            assert!(result.spillover_depth >= 1);
        }
        assert_eq!(slots.len(), thread_count);

        // BFS 逐层填充: 9 个点位最深到第 3 层
        let stats = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats.total_positions, (thread_count + 1) as i64);
        assert_eq!(stats.max_level, Some(3));
        let audit = state.reconcile_api.run_audit().unwrap();
        assert!(audit.is_clean(), "并发自动安置后自检应零差异: {:?}", audit.findings);

        println!("✅ 并发自动安置测试通过: {}个线程全部落位", thread_count);
    }

    // ==========================================
    // 测试3: 同一点位并发退网
    // ==========================================

    #[test]
    fn test_concurrent_withdrawal_single_winner() {
        let (_temp_file, state) = create_test_state().unwrap();

        let root = state
            .network_api
            .place_root("M000001", "张伟", "tester")
            .unwrap();
        let target = state
            .network_api
            .place_member_directed("M000002", "王芳", &root.position_id, "LEFT", "tester")
            .unwrap();

        let mut handles = vec![];
        for _ in 0..2 {
            let api = state.network_api.clone();
            let position_id = target.position_id.clone();

            let handle = thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                api.withdraw_member(&position_id, "M000002", "2025-05-01", Some("并发退网"), "tester")
            });
            handles.push(handle);
        }

        let mut success_count = 0;
        let mut already_count = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => success_count += 1,
                Err(err) => {
                    assert!(
                        matches!(err, ApiError::AlreadyWithdrawn(_)),
                        "落败方错误应为重复退网: {}",
                        err
                    );
                    already_count += 1;
                }
            }
        }

        assert_eq!(success_count, 1, "同一点位应该只退网一次");
        assert_eq!(already_count, 1);

        let stats = state.network_api.get_network_stats().unwrap();
        assert_eq!(stats.withdrawn_positions, 1);

        println!("✅ 并发退网测试通过: 1个成功,1个拦截");
    }

    // ==========================================
    // 测试4: 同一点位并发业绩覆写
    // ==========================================

    #[test]
    fn test_concurrent_sales_overwrite_keeps_rollups_consistent() {
        let (_temp_file, state) = create_test_state().unwrap();

        let root = state
            .network_api
            .place_root("M000001", "张伟", "tester")
            .unwrap();
        let child = state
            .network_api
            .place_member_directed("M000002", "王芳", &root.position_id, "LEFT", "tester")
            .unwrap();

        // 多个线程对同一点位写不同业绩, 覆写语义下最后提交者生效
        let thread_count = 5;
        let mut handles = vec![];
        for i in 0..thread_count {
            let api = state.network_api.clone();
            let position_id = child.position_id.clone();

            let handle = thread::spawn(move || {
                thread::sleep(Duration::from_millis(5 * i as u64));
                api.record_sales(&position_id, &format!("{}.00", (i + 1) * 100), "tester")
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap().expect("业绩覆写不应失败");
        }

        // 红线: 点位现值与父链汇总必须同事务一致
        let child_view = state
            .network_api
            .get_position_detail(&child.position_id)
            .unwrap()
            .unwrap();
        let root_view = state
            .network_api
            .get_position_detail(&root.position_id)
            .unwrap()
            .unwrap();
        assert_eq!(root_view.left_sales, child_view.own_sales);
        let audit = state.reconcile_api.run_audit().unwrap();
        assert!(audit.is_clean(), "并发覆写后自检应零差异: {:?}", audit.findings);

        println!(
            "✅ 并发业绩覆写测试通过: 终值 {} 且汇总一致",
            child_view.own_sales
        );
    }
}
