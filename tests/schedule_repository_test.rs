// ==========================================
// 排程仓储集成测试
// ==========================================
// 测试目标: SQLite 排程存储的窗口查询、写入前重叠校验、原子性与幂等删除
// ==========================================


use cascade_aps::domain::{
    BomLine, Operation, Product, ProductivityRecord, RouteStep, StaffingRecord,
};
use cascade_aps::engine::{ReferenceDataProvider, ScheduleStore};
use cascade_aps::repository::{
    ProductionScheduleRepository, ReferenceDataRepository, RepositoryError,
};
use cascade_aps::{ProductKind, ScheduleStatus};
use chrono::NaiveDate;
use test_helpers::{
    bakery_bundle, create_seeded_db, create_test_db, dt, schedule_row, work_center,
};

#[test]
fn test_reference_bundle_roundtrip_through_provider() {
    let (_file, db_path) = create_test_db().unwrap();
    let repo = ReferenceDataRepository::new(&db_path).unwrap();
    let bundle = bakery_bundle();
    assert_eq!(repo.import_bundle(&bundle).unwrap(), bundle.len());

    let route = repo.get_route("BREAD").unwrap();
    assert_eq!(
        route.iter().map(|s| s.operation_id.as_str()).collect::<Vec<_>>(),
        vec!["MIX", "BAKE"]
    );
    assert_eq!(route[0].rest_hours_after, 0.5);

    let options = repo.get_productivity_options("BREAD", "MIX").unwrap();
    assert_eq!(
        options.iter().map(|o| o.work_center_id.as_str()).collect::<Vec<_>>(),
        vec!["MIX1", "MIX2"]
    );
    let bake = repo.get_productivity("BREAD", "BAKE", "OVEN1").unwrap().unwrap();
    assert!(bake.uses_fixed_time);
    assert_eq!(bake.fixed_minutes_per_batch, Some(30.0));

    assert_eq!(repo.get_bom("BREAD").unwrap().len(), 2);
    assert!(repo.get_product("NOPE").unwrap().is_none());
    assert!(repo.get_work_center("SHARED1").unwrap().unwrap().allows_parallel_references);
}

#[test]
fn test_single_row_upserts_are_visible_through_provider() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let repo = ReferenceDataRepository::new(&db_path).unwrap();

    repo.upsert_product(&Product {
        product_id: "ROLL".to_string(),
        name: "小餐包".to_string(),
        kind: ProductKind::FinishedGood,
        lote_minimo: 40,
        max_batch_size: Some(60),
    })
    .unwrap();
    repo.upsert_operation(&Operation {
        operation_id: "PROOF".to_string(),
        name: "醒发".to_string(),
        display_order: 9,
    })
    .unwrap();
    repo.upsert_work_center(&work_center("PROOFER1", false)).unwrap();
    repo.upsert_route_step(&RouteStep {
        product_id: "ROLL".to_string(),
        operation_id: "PROOF".to_string(),
        work_center_id: "PROOFER1".to_string(),
        sequence_order: 1,
        rest_hours_after: 0.0,
    })
    .unwrap();
    repo.upsert_bom_line(&BomLine {
        product_id: "ROLL".to_string(),
        material_id: "DOUGH".to_string(),
        operation_id: "PROOF".to_string(),
        quantity_per_unit: 0.3,
        rest_hours_before_use: 0.5,
    })
    .unwrap();
    let record = ProductivityRecord {
        product_id: "ROLL".to_string(),
        operation_id: "PROOF".to_string(),
        work_center_id: "PROOFER1".to_string(),
        units_per_hour: Some(60.0),
        fixed_minutes_per_batch: None,
        uses_fixed_time: false,
        labor_minutes_per_batch: None,
        reference_staff: Some(1),
    };
    repo.upsert_productivity(&record).unwrap();
    // 同键再次写入覆盖旧值
    repo.upsert_productivity(&ProductivityRecord {
        units_per_hour: Some(75.0),
        ..record
    })
    .unwrap();
    let day = NaiveDate::from_ymd_opt(2030, 1, 3).unwrap();
    repo.upsert_staffing(&StaffingRecord {
        work_center_id: "PROOFER1".to_string(),
        date: day,
        shift_number: 1,
        staff_count: 3,
    })
    .unwrap();

    assert_eq!(repo.get_product("ROLL").unwrap().unwrap().lote_minimo, 40);
    assert!(repo.get_work_center("PROOFER1").unwrap().is_some());
    let route = repo.get_route("ROLL").unwrap();
    assert_eq!(route.len(), 1);
    assert_eq!(route[0].work_center_id, "PROOFER1");
    let bom = repo.get_bom("ROLL").unwrap();
    assert_eq!(bom.len(), 1);
    assert_eq!(bom[0].quantity_per_unit, 0.3);
    let options = repo.get_productivity_options("ROLL", "PROOF").unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].units_per_hour, Some(75.0));
    assert_eq!(repo.get_staffing("PROOFER1", day, 1).unwrap(), Some(3));
}

#[test]
fn test_demo_bundle_parses_and_imports() {
    let (_file, db_path) = create_test_db().unwrap();
    let raw = include_str!("../demos/bakery_reference.json");
    let bundle: cascade_aps::repository::ReferenceDataBundle = serde_json::from_str(raw).unwrap();
    let repo = ReferenceDataRepository::new(&db_path).unwrap();
    repo.import_bundle(&bundle).unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let blackouts = repo.get_blackouts("OVEN1", day, day).unwrap();
    assert_eq!(blackouts.len(), 1);
    assert_eq!(blackouts[0].shift_number, 2);
    assert_eq!(
        repo.get_staffing("MIX1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 1)
            .unwrap(),
        Some(2)
    );
}

#[test]
fn test_bundle_import_is_atomic() {
    let (_file, db_path) = create_test_db().unwrap();
    let repo = ReferenceDataRepository::new(&db_path).unwrap();
    let mut bundle = bakery_bundle();
    // 路线引用不存在的工作中心，外键失败
    bundle.routes[0].work_center_id = "GHOST".to_string();

    assert!(repo.import_bundle(&bundle).is_err());
    assert!(repo.list_products().unwrap().is_empty());
}

#[test]
fn test_existing_schedule_window_and_order_lookup() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let repo = ProductionScheduleRepository::new(&db_path).unwrap();

    let rows = vec![
        schedule_row("S1", "OP-A", "BREAD", "MIX1", dt(7, 6, 0, 0), dt(7, 7, 0, 0)),
        schedule_row("S2", "OP-A", "BREAD", "MIX1", dt(7, 7, 0, 0), dt(7, 8, 0, 0)),
        schedule_row("S3", "OP-A", "BREAD", "MIX1", dt(8, 6, 0, 0), dt(8, 7, 0, 0)),
    ];
    assert_eq!(repo.insert_schedules(&rows).unwrap(), 3);

    // 窗口 [7日 06:30, 7日 07:00) 只与 S1 相交，相邻不算重叠
    let hit = repo
        .get_existing_schedule("MIX1", dt(7, 6, 30, 0), dt(7, 7, 0, 0))
        .unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].schedule_id, "S1");

    let all = repo.find_by_order_number("OP-A").unwrap();
    assert_eq!(
        all.iter().map(|r| r.schedule_id.as_str()).collect::<Vec<_>>(),
        vec!["S1", "S2", "S3"]
    );
    assert_eq!(all[0], rows[0]);

    let summaries = repo.summarize_orders().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].rows, 3);
    assert_eq!(summaries[0].first_start, dt(7, 6, 0, 0));
    assert_eq!(summaries[0].last_end, dt(8, 7, 0, 0));
}

#[test]
fn test_overlap_with_other_order_rolls_back_whole_batch() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let repo = ProductionScheduleRepository::new(&db_path).unwrap();
    repo.insert_schedules(&[schedule_row(
        "A1", "OP-A", "BREAD", "MIX1", dt(7, 6, 0, 0), dt(7, 7, 0, 0),
    )])
    .unwrap();

    let attempt = vec![
        schedule_row("B1", "OP-B", "BREAD", "OVEN1", dt(7, 6, 0, 0), dt(7, 6, 30, 0)),
        schedule_row("B2", "OP-B", "BREAD", "MIX1", dt(7, 6, 30, 0), dt(7, 7, 30, 0)),
    ];
    let err = repo.insert_schedules(&attempt).unwrap_err();
    assert!(err.is_conflict());
    match err {
        RepositoryError::ScheduleConflict { work_center_id, .. } => {
            assert_eq!(work_center_id, "MIX1")
        }
        other => panic!("unexpected: {:?}", other),
    }

    // B1 不能残留
    assert!(repo.find_by_order_number("OP-B").unwrap().is_empty());
    assert_eq!(repo.count_all().unwrap(), 1);
}

#[test]
fn test_overlap_exemptions() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let repo = ProductionScheduleRepository::new(&db_path).unwrap();

    let mut parked = schedule_row("P1", "OP-P", "BREAD", "MIX1", dt(7, 6, 0, 0), dt(7, 9, 0, 0));
    parked.status = ScheduleStatus::Parked;
    let shared = schedule_row("H1", "OP-H", "DOUGH", "SHARED1", dt(7, 6, 0, 0), dt(7, 9, 0, 0));
    repo.insert_schedules(&[parked, shared]).unwrap();

    // 挂起行不占用资源；允许并行的工作中心上不同产品可重叠；同一订单内部不校验
    repo.insert_schedules(&[
        schedule_row("N1", "OP-N", "BREAD", "MIX1", dt(7, 7, 0, 0), dt(7, 8, 0, 0)),
        schedule_row("N2", "OP-N", "BREAD", "SHARED1", dt(7, 7, 0, 0), dt(7, 8, 0, 0)),
    ])
    .unwrap();

    // 允许并行的工作中心上同一产品仍然冲突
    let err = repo
        .insert_schedules(&[schedule_row(
            "X1", "OP-X", "DOUGH", "SHARED1", dt(7, 8, 0, 0), dt(7, 8, 30, 0),
        )])
        .unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn test_delete_by_order_number_is_idempotent() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let repo = ProductionScheduleRepository::new(&db_path).unwrap();
    repo.insert_schedules(&[
        schedule_row("A1", "OP-A", "BREAD", "MIX1", dt(7, 6, 0, 0), dt(7, 7, 0, 0)),
        schedule_row("A2", "OP-A", "BREAD", "OVEN1", dt(7, 7, 30, 0), dt(7, 8, 0, 0)),
    ])
    .unwrap();
    repo.insert_schedules(&[schedule_row(
        "K1", "OP-K", "BREAD", "MIX1", dt(7, 7, 0, 0), dt(7, 8, 0, 0),
    )])
    .unwrap();

    assert_eq!(repo.delete_by_order_number("OP-A").unwrap(), 2);
    assert_eq!(repo.delete_by_order_number("OP-A").unwrap(), 0);
    assert_eq!(repo.count_all().unwrap(), 1);
    assert!(repo.find_by_id("K1").unwrap().is_some());
    assert!(repo.find_by_id("A1").unwrap().is_none());
}
