// ==========================================
// 生产级联排产引擎 - 命令行入口
// ==========================================
// 用法:
//   cascade-aps init [reference_data.json]
//   cascade-aps schedule <product_id> <quantity> <start> [--deadline <dt>] [--staff <n>]
//                        [--shift-hours <h>] [--weekly-plan <id>]
//   cascade-aps show [production_order_number]
//   cascade-aps delete <production_order_number>
//   cascade-aps export <production_order_number> <file.csv>
//   cascade-aps weekly-plan <weekly_plan_id> <week_start> [description]
//   cascade-aps config [<key> <value>]
//
// 数据库路径: 环境变量 CASCADE_APS_DB_PATH，缺省为用户数据目录
// ==========================================

use std::error::Error;

use cascade_aps::app::AppState;
use cascade_aps::config::{config_keys, get_default_db_path};
use cascade_aps::domain::{ProductionSchedule, WeeklyPlan};
use cascade_aps::repository::row_codec::format_datetime;
use cascade_aps::repository::ReferenceDataBundle;
use cascade_aps::ScheduleProductionRequest;
use chrono::{Local, NaiveDate, NaiveDateTime};

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const USAGE: &str = "用法: cascade-aps <init|schedule|show|delete|export|weekly-plan|config> [参数...]";

#[tokio::main]
async fn main() -> CliResult<()> {
    cascade_aps::logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }
    let command = args.remove(0);

    let db_path = get_default_db_path();
    tracing::info!(version = cascade_aps::VERSION, db_path = %db_path, "{}", cascade_aps::APP_NAME);

    match command.as_str() {
        "init" => {
            let state = AppState::new(db_path.clone(), true)?;
            println!("数据库已初始化: {}", db_path);
            if let Some(file) = args.first() {
                let raw = std::fs::read_to_string(file)?;
                let bundle: ReferenceDataBundle = serde_json::from_str(&raw)?;
                let written = state.reference_repo.import_bundle(&bundle)?;
                println!("已导入参考数据 {} 行: {}", written, file);
            }
        }
        "schedule" => {
            let state = AppState::new(db_path, false)?;
            let request = parse_schedule_args(&args)?;
            let response = state.cascade_api.schedule_production(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "show" => {
            let state = AppState::new(db_path, false)?;
            match args.first() {
                Some(order) => {
                    let rows = state.cascade_api.get_production_order(order)?;
                    print_rows(&rows);
                }
                None => {
                    for s in state.cascade_api.list_production_orders()? {
                        println!(
                            "{}\trows={}\tmax_level={}\t{} ~ {}",
                            s.production_order_number,
                            s.rows,
                            s.max_level,
                            format_datetime(s.first_start),
                            format_datetime(s.last_end)
                        );
                    }
                }
            }
        }
        "delete" => {
            let order = args.first().ok_or("缺少生产订单号")?;
            let state = AppState::new(db_path, false)?;
            let deleted = state.cascade_api.delete_production_order(order)?;
            println!("已删除 {} 行", deleted);
        }
        "export" => {
            let order = args.first().ok_or("缺少生产订单号")?;
            let out = args.get(1).ok_or("缺少导出文件路径")?;
            let state = AppState::new(db_path, false)?;
            let rows = state.cascade_api.get_production_order(order)?;
            export_csv(&rows, out)?;
            println!("已导出 {} 行到 {}", rows.len(), out);
        }
        "weekly-plan" => {
            let (id, week_start) = match (args.first(), args.get(1)) {
                (Some(id), Some(d)) => (id.clone(), NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")?),
                _ => return Err("weekly-plan 需要 <weekly_plan_id> <week_start>".into()),
            };
            let state = AppState::new(db_path, false)?;
            state.weekly_plan_repo.create(&WeeklyPlan {
                weekly_plan_id: id.clone(),
                week_start,
                description: args.get(2).cloned(),
                created_at: Local::now().naive_local(),
            })?;
            println!("周计划已创建: {}", id);
        }
        "config" => {
            let state = AppState::new(db_path, false)?;
            match (args.first(), args.get(1)) {
                (Some(key), Some(value)) => {
                    if !config_keys::ALL.contains(&key.as_str()) {
                        return Err(format!("未知配置键: {}", key).into());
                    }
                    state.config_manager.set_global_config_value(key, value)?;
                    println!("{} = {}", key, value);
                }
                _ => {
                    for (key, value) in state.config_manager.list_global_config()? {
                        println!("{} = {}", key, value);
                    }
                }
            }
        }
        other => {
            eprintln!("未知命令: {}\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn parse_datetime(raw: &str) -> CliResult<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(t);
        }
    }
    Err(format!("无法解析时间: {}", raw).into())
}

fn parse_schedule_args(args: &[String]) -> CliResult<ScheduleProductionRequest> {
    if args.len() < 3 {
        return Err("schedule 需要 <product_id> <quantity> <start>".into());
    }

    let mut request = ScheduleProductionRequest {
        product_id: args[0].clone(),
        quantity: args[1].parse()?,
        start_datetime: parse_datetime(&args[2])?,
        shift_hours: None,
        staff_count: None,
        deadline: None,
        weekly_plan_id: None,
    };

    let mut rest = args[3..].iter();
    while let Some(flag) = rest.next() {
        let value = rest.next().ok_or_else(|| format!("{} 缺少取值", flag))?;
        match flag.as_str() {
            "--deadline" => request.deadline = Some(parse_datetime(value)?),
            "--staff" => request.staff_count = Some(value.parse()?),
            "--shift-hours" => request.shift_hours = Some(value.parse()?),
            "--weekly-plan" => request.weekly_plan_id = Some(value.clone()),
            other => return Err(format!("未知参数: {}", other).into()),
        }
    }
    Ok(request)
}

fn print_rows(rows: &[ProductionSchedule]) {
    for r in rows {
        println!(
            "L{} {:<12} {:<10} {:<8} #{}/{} qty={:<6} {} ~ {} {}",
            r.cascade_level,
            r.product_id,
            r.operation_id,
            r.work_center_id,
            r.batch_number,
            r.total_batches_in_run,
            r.quantity,
            format_datetime(r.start_datetime),
            format_datetime(r.end_datetime),
            r.cascade_type.to_db_str()
        );
    }
}

fn export_csv(rows: &[ProductionSchedule], path: &str) -> CliResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "schedule_id",
        "production_order_number",
        "cascade_level",
        "cascade_type",
        "cascade_source_id",
        "product_id",
        "operation_id",
        "work_center_id",
        "resource_id",
        "batch_number",
        "total_batches_in_run",
        "quantity",
        "start_datetime",
        "end_datetime",
        "status",
        "weekly_plan_id",
    ])?;
    for r in rows {
        writer.write_record([
            r.schedule_id.clone(),
            r.production_order_number.clone(),
            r.cascade_level.to_string(),
            r.cascade_type.to_db_str().to_string(),
            r.cascade_source_id.clone().unwrap_or_default(),
            r.product_id.clone(),
            r.operation_id.clone(),
            r.work_center_id.clone(),
            r.resource_id.clone(),
            r.batch_number.to_string(),
            r.total_batches_in_run.to_string(),
            r.quantity.to_string(),
            format_datetime(r.start_datetime),
            format_datetime(r.end_datetime),
            r.status.to_db_str().to_string(),
            r.weekly_plan_id.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
