// ==========================================
// 级联引擎 + SQLite 仓储集成测试
// ==========================================
// 测试目标: 引擎通过 SQLite 实现的 provider/store 读取停机、排班与已有负载
// ==========================================


use cascade_aps::domain::{BlackoutWindow, ProductivityRecord, StaffingRecord};
use cascade_aps::engine::{CascadeEngine, CascadeRequest, CascadeWarning, ScheduleStore};
use cascade_aps::repository::{ProductionScheduleRepository, ReferenceDataRepository};
use cascade_aps::{logging, CascadeConfig};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use test_helpers::{create_seeded_db, dt};

type SqliteEngine = CascadeEngine<ReferenceDataRepository, ProductionScheduleRepository>;

fn open(db_path: &str) -> (Arc<ReferenceDataRepository>, Arc<ProductionScheduleRepository>) {
    let conn = Arc::new(Mutex::new(test_helpers::open_test_connection(db_path).unwrap()));
    (
        Arc::new(ReferenceDataRepository::from_connection(conn.clone())),
        Arc::new(ProductionScheduleRepository::from_connection(conn)),
    )
}

fn engine(refs: &Arc<ReferenceDataRepository>, store: &Arc<ProductionScheduleRepository>) -> SqliteEngine {
    CascadeEngine::new(refs.clone(), store.clone(), CascadeConfig::default())
}

fn request(quantity: i64) -> CascadeRequest {
    let mut req = CascadeRequest::new("BREAD", quantity, dt(7, 6, 0, 0));
    req.now = Some(dt(1, 0, 0, 0));
    req
}

#[test]
fn test_blackout_from_database_shifts_whole_cascade() {
    logging::init_test();
    let (_file, db_path) = create_seeded_db().unwrap();
    let (refs, store) = open(&db_path);
    refs.insert_blackout(&BlackoutWindow {
        work_center_id: "MIX1".to_string(),
        date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
        shift_number: 1,
        reason: "搅拌机保养".to_string(),
    })
    .unwrap();

    let plan = engine(&refs, &store).plan(&request(250)).unwrap();

    let first_mix = plan
        .schedules
        .iter()
        .filter(|r| r.operation_id == "MIX")
        .map(|r| r.start_datetime)
        .min()
        .unwrap();
    assert_eq!(first_mix, dt(7, 14, 0, 0));
    let first_bake = plan
        .schedules
        .iter()
        .filter(|r| r.operation_id == "BAKE")
        .map(|r| r.start_datetime)
        .min()
        .unwrap();
    assert_eq!(first_bake, dt(7, 16, 10, 48));

    // 半成品跟随消耗方后移
    let dough_end = plan
        .rows_at_level(1)
        .map(|r| r.end_datetime)
        .max()
        .unwrap();
    assert_eq!(dough_end, dt(7, 13, 0, 0));
}

#[test]
fn test_staffing_from_database_scales_rate() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let (refs, store) = open(&db_path);
    refs.upsert_productivity(&ProductivityRecord {
        product_id: "BREAD".to_string(),
        operation_id: "MIX".to_string(),
        work_center_id: "MIX1".to_string(),
        units_per_hour: Some(50.0),
        fixed_minutes_per_batch: None,
        uses_fixed_time: false,
        labor_minutes_per_batch: None,
        reference_staff: Some(2),
    })
    .unwrap();
    refs.upsert_staffing(&StaffingRecord {
        work_center_id: "MIX1".to_string(),
        date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
        shift_number: 1,
        staff_count: 4,
    })
    .unwrap();

    let plan = engine(&refs, &store).plan(&request(250)).unwrap();
    let mut mix: Vec<_> = plan
        .schedules
        .iter()
        .filter(|r| r.operation_id == "MIX")
        .collect();
    mix.sort_by_key(|r| r.batch_number);
    // 4 人 = 2 倍标准产能: 84 / 100 h = 50.4 分钟
    assert_eq!(mix[0].end_datetime, dt(7, 6, 50, 24));
}

#[test]
fn test_planning_floor_produces_shortfall_warning() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let (refs, store) = open(&db_path);

    let mut req = request(250);
    req.now = Some(dt(7, 5, 0, 0));
    let plan = engine(&refs, &store).plan(&req).unwrap();

    let dough_start = plan
        .rows_at_level(1)
        .map(|r| r.start_datetime)
        .min()
        .unwrap();
    assert!(dough_start >= dt(7, 5, 0, 0));
    assert!(plan.warnings.iter().any(|w| matches!(
        w,
        CascadeWarning::BackwardShortfall { product_id, .. } if product_id == "DOUGH"
    )));
}

#[test]
fn test_run_persists_plan_atomically() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let (refs, store) = open(&db_path);

    let plan = engine(&refs, &store).run(&request(250)).unwrap();
    let persisted = store
        .find_by_order_number(&plan.production_order_number)
        .unwrap();
    assert_eq!(persisted.len(), plan.schedules.len());
    assert_eq!(plan.max_level(), 1);

    // 第二次运行读取到已写入的负载
    let again = engine(&refs, &store).plan(&request(250)).unwrap();
    let first_mix = again
        .schedules
        .iter()
        .filter(|r| r.operation_id == "MIX")
        .map(|r| r.start_datetime)
        .min()
        .unwrap();
    assert_eq!(first_mix, dt(7, 11, 0, 0));
}
