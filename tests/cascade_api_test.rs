// ==========================================
// 级联排产 API 集成测试
// ==========================================
// 测试目标: ScheduleProduction / DeleteProductionOrder 在 SQLite 上的端到端行为
// ==========================================


use cascade_aps::api::ApiError;
use cascade_aps::app::AppState;
use cascade_aps::config::config_keys;
use cascade_aps::logging;
use cascade_aps::domain::{ProductionSchedule, WeeklyPlan};
use cascade_aps::{CascadeType, CascadeWarning, ScheduleProductionRequest};
use chrono::{Duration, NaiveDate};
use test_helpers::{create_seeded_db, dt};

fn bread_request(quantity: i64) -> ScheduleProductionRequest {
    ScheduleProductionRequest {
        product_id: "BREAD".to_string(),
        quantity,
        start_datetime: dt(7, 6, 0, 0),
        shift_hours: None,
        staff_count: None,
        deadline: None,
        weekly_plan_id: None,
    }
}

fn ops<'a>(rows: &'a [ProductionSchedule], op: &str) -> Vec<&'a ProductionSchedule> {
    let mut v: Vec<_> = rows.iter().filter(|r| r.operation_id == op).collect();
    v.sort_by_key(|r| r.batch_number);
    v
}

#[tokio::test]
async fn test_schedule_production_writes_forward_and_backward_rows() {
    logging::init_test();
    let (_file, db_path) = create_seeded_db().unwrap();
    let state = AppState::new(db_path, false).unwrap();

    let response = state
        .cascade_api
        .schedule_production(bread_request(250))
        .await
        .unwrap();

    assert!(response.warnings.is_empty(), "{:?}", response.warnings);
    assert_eq!(response.schedules.len(), 8);

    let mix = ops(&response.schedules, "MIX");
    assert_eq!(mix.iter().map(|r| r.quantity).collect::<Vec<_>>(), vec![84, 83, 83]);
    assert_eq!(mix[0].start_datetime, dt(7, 6, 0, 0));
    assert_eq!(mix[2].end_datetime, dt(7, 11, 0, 0));
    assert_eq!(ops(&response.schedules, "BAKE")[0].start_datetime, dt(7, 8, 10, 48));

    let dough = ops(&response.schedules, "KNEAD");
    assert_eq!(dough.iter().map(|r| r.quantity).sum::<i64>(), 125);
    for row in &dough {
        assert_eq!(row.cascade_level, 1);
        assert_eq!(row.cascade_type, CascadeType::BackwardPp);
        assert_eq!(row.cascade_source_id.as_deref(), Some(mix[0].schedule_id.as_str()));
        assert!(row.end_datetime + Duration::hours(1) <= mix[0].start_datetime);
    }
    assert_eq!(dough.last().unwrap().end_datetime, dt(7, 5, 0, 0));

    // SALT 为原料，不排程
    assert!(response.schedules.iter().all(|r| r.product_id != "SALT"));

    let persisted = state
        .cascade_api
        .get_production_order(&response.production_order_number)
        .unwrap();
    assert_eq!(persisted.len(), 8);
    assert!(persisted
        .iter()
        .all(|r| r.production_order_number == response.production_order_number));
}

#[tokio::test]
async fn test_second_order_queues_behind_first_and_delete_restores_capacity() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let state = AppState::new(db_path, false).unwrap();
    let api = &state.cascade_api;

    let first = api.schedule_production(bread_request(250)).await.unwrap();
    let second = api.schedule_production(bread_request(250)).await.unwrap();
    assert_ne!(first.production_order_number, second.production_order_number);

    let mix = ops(&second.schedules, "MIX");
    assert_eq!(mix[0].start_datetime, dt(7, 11, 0, 0));
    assert_eq!(ops(&second.schedules, "BAKE")[0].start_datetime, dt(7, 13, 10, 48));
    assert_eq!(ops(&second.schedules, "KNEAD").last().unwrap().end_datetime, dt(7, 10, 0, 0));

    assert_eq!(api.delete_production_order(&second.production_order_number).unwrap(), 8);
    assert_eq!(api.delete_production_order(&second.production_order_number).unwrap(), 0);
    assert_eq!(api.list_production_orders().unwrap().len(), 1);

    // 删除后重排得到与第二单相同的时间
    let third = api.schedule_production(bread_request(250)).await.unwrap();
    let slots = |rows: &[ProductionSchedule]| {
        let mut v: Vec<_> = rows
            .iter()
            .map(|r| (r.operation_id.clone(), r.batch_number, r.start_datetime, r.end_datetime))
            .collect();
        v.sort();
        v
    };
    assert_eq!(slots(&third.schedules), slots(&second.schedules));

    // 第一单不受影响
    assert_eq!(
        api.get_production_order(&first.production_order_number).unwrap().len(),
        8
    );
}

#[tokio::test]
async fn test_weekly_plan_attribution() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let state = AppState::new(db_path, false).unwrap();

    let mut request = bread_request(100);
    request.weekly_plan_id = Some("WP-2030-02".to_string());
    let err = state
        .cascade_api
        .schedule_production(request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(state.cascade_api.list_production_orders().unwrap().is_empty());

    state
        .weekly_plan_repo
        .create(&WeeklyPlan {
            weekly_plan_id: "WP-2030-02".to_string(),
            week_start: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            description: Some("第2周".to_string()),
            created_at: dt(1, 0, 0, 0),
        })
        .unwrap();

    let response = state.cascade_api.schedule_production(request).await.unwrap();
    assert!(response
        .schedules
        .iter()
        .all(|r| r.weekly_plan_id.as_deref() == Some("WP-2030-02")));
}

#[tokio::test]
async fn test_invalid_requests_write_nothing() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let state = AppState::new(db_path, false).unwrap();
    let api = &state.cascade_api;

    let err = api.schedule_production(bread_request(0)).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let mut unknown = bread_request(100);
    unknown.product_id = "CAKE".to_string();
    let err = api.schedule_production(unknown).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let mut raw = bread_request(100);
    raw.product_id = "SALT".to_string();
    assert!(api.schedule_production(raw).await.is_err());

    let mut no_staff = bread_request(100);
    no_staff.staff_count = Some(0);
    assert!(api.schedule_production(no_staff).await.is_err());

    assert!(api.list_production_orders().unwrap().is_empty());
    assert!(matches!(
        api.get_production_order("OP-NOPE"),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.delete_production_order("  "),
        Err(ApiError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_config_drives_shift_warnings() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let state = AppState::new(db_path, false).unwrap();
    state
        .config_manager
        .set_global_config_value(config_keys::MAX_BATCH_HOURS_PER_SHIFT, "1")
        .unwrap();

    let response = state
        .cascade_api
        .schedule_production(bread_request(250))
        .await
        .unwrap();

    let over: Vec<_> = response
        .warnings
        .iter()
        .filter_map(|w| match w {
            CascadeWarning::BatchExceedsShift {
                operation_id,
                max_hours,
                ..
            } => Some((operation_id.as_str(), *max_hours)),
            _ => None,
        })
        .collect();
    assert_eq!(over, vec![("MIX", 1.0), ("MIX", 1.0), ("MIX", 1.0)]);
    // 告警不阻止写入
    assert_eq!(response.schedules.len(), 8);
}

#[tokio::test]
async fn test_infeasible_deadline_is_warning() {
    let (_file, db_path) = create_seeded_db().unwrap();
    let state = AppState::new(db_path, false).unwrap();

    let mut request = bread_request(250);
    request.deadline = Some(dt(7, 8, 0, 0));
    let response = state.cascade_api.schedule_production(request).await.unwrap();

    assert!(response
        .warnings
        .iter()
        .any(|w| matches!(w, CascadeWarning::DeadlineInfeasible { .. })));
    assert!(!response.schedules.is_empty());
    assert_eq!(
        state
            .cascade_api
            .get_production_order(&response.production_order_number)
            .unwrap()
            .len(),
        response.schedules.len()
    );
}

#[test]
fn test_concurrent_runs_never_overlap() {
    logging::init_test();
    let (_file, db_path) = create_seeded_db().unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = db_path.clone();
            std::thread::spawn(move || {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let state = AppState::new(path, false).unwrap();
                rt.block_on(state.cascade_api.schedule_production(bread_request(250)))
                    .unwrap()
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let state = AppState::new(db_path, false).unwrap();
    let mut all = Vec::new();
    for summary in state.cascade_api.list_production_orders().unwrap() {
        all.extend(
            state
                .cascade_api
                .get_production_order(&summary.production_order_number)
                .unwrap(),
        );
    }
    assert_eq!(all.len(), 16);

    for wc in ["MIX1", "OVEN1", "KNEADER1"] {
        let mut rows: Vec<_> = all.iter().filter(|r| r.work_center_id == wc).collect();
        rows.sort_by_key(|r| r.start_datetime);
        for pair in rows.windows(2) {
            assert!(
                pair[0].end_datetime <= pair[1].start_datetime,
                "{} overlap: {:?} / {:?}",
                wc,
                pair[0],
                pair[1]
            );
        }
    }
}
