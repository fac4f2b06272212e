use std::sync::Arc;

use medminder_core::reminder::{SystemClock, TokioScheduler};
use medminder_core::{Config, ReminderEngine, ReminderOutcome};

use crate::terminal::TerminalSurface;

/// Run one escalating reminder cycle in the foreground.
pub fn run(period: Option<String>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let period = config.resolve_period(period.as_deref());
    let max_reminders = config.max_reminders_for(&period);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let handle = runtime.handle().clone();

    let report = runtime.block_on(async move {
        tokio::task::spawn_blocking(move || {
            let notifier = config.notifier();
            let mut surface =
                TerminalSurface::new(notifier.clone(), config.alarm_player(), handle.clone());
            let mut scheduler = TokioScheduler::new(handle);
            let mut engine = ReminderEngine::new(
                period,
                max_reminders,
                config.escalation.clone(),
                config.resolver(),
                config.log_store(),
                notifier,
                Arc::new(SystemClock),
            );
            engine.run(&mut surface, &mut scheduler)
        })
        .await
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report.outcome {
        ReminderOutcome::AlreadyComplete => {
            println!("{} medication already logged for today", report.period);
        }
        ReminderOutcome::Confirmed { attempts, recorded } => {
            if recorded {
                println!("{} medication logged after {attempts} reminder(s)", report.period);
            } else {
                println!(
                    "{} medication confirmed after {attempts} reminder(s) but could not be saved",
                    report.period
                );
            }
        }
        ReminderOutcome::CompletedElsewhere { .. } => {
            println!("{} medication was logged elsewhere", report.period);
        }
        ReminderOutcome::Exhausted { attempts } => {
            println!("Gave up on {} medication after {attempts} reminders", report.period);
        }
    }
    Ok(())
}
