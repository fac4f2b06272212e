use chrono::Local;
use medminder_core::{Config, MissedDoseChecker};

/// One missed-dose pass. Meant to be run from cron or a systemd timer.
pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let checker = MissedDoseChecker::new(config.periods.clone(), config.resolver());
    let launcher = config.launcher();
    let notifier = config.notifier();
    let store = config.log_store();

    let report = checker.check(
        Local::now().naive_local(),
        store.as_ref(),
        notifier.as_ref(),
        &launcher,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.all_clear() {
        println!("All medications taken for {}", report.day_key);
    } else {
        for period in &report.launched {
            println!("Missed {period} medication, reminder started");
        }
    }
    Ok(())
}
