use chrono::Local;
use medminder_core::Config;
use serde::Serialize;

#[derive(Serialize)]
struct PeriodStatus<'a> {
    period: &'a str,
    due_after: String,
    complete: bool,
    overdue: bool,
    confirmed_at: Option<String>,
    attempts: Option<u32>,
}

/// Today's completion per period.
pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let now = Local::now().naive_local();
    let key = config.resolver().resolve(now);
    let log = config.log_store().load();

    let rows: Vec<PeriodStatus<'_>> = config
        .periods
        .iter()
        .map(|period| {
            let complete = log.is_complete(&key, period);
            let record = log.record(&key, &period.name).filter(|_| complete);
            PeriodStatus {
                period: &period.name,
                due_after: period.due_after.format("%H:%M").to_string(),
                complete,
                overdue: !complete && period.is_overdue_at(now),
                confirmed_at: record.map(|r| r.confirmed_at.format("%H:%M").to_string()),
                attempts: record.map(|r| r.attempts),
            }
        })
        .collect();

    if json {
        let out = serde_json::json!({ "day_key": key, "periods": rows });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Medication log for {key}");
    for row in &rows {
        let state = match (&row.confirmed_at, row.overdue) {
            (Some(at), _) => format!("taken at {at}"),
            (None, true) => "MISSED".to_string(),
            (None, false) => "not due yet".to_string(),
        };
        println!("  {:<12} due {}  {state}", row.period, row.due_after);
    }
    Ok(())
}
