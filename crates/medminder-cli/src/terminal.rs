//! Terminal prompt for the reminder engine.

use std::sync::Arc;

use chrono::Local;
use crossterm::style::{Color, Stylize};
use dialoguer::{MultiSelect, Select};
use medminder_core::alert::AlertSession;
use medminder_core::{
    AlarmPlayer, DosePeriod, InteractionSurface, Notifier, UrgencyTier, UserResponse,
};
use tokio::runtime::Handle;

const ACTIONS: [&str; 2] = ["✅ Log medication", "😴 Snooze"];

/// Colour banner, action menu and item checklist.
///
/// Esc or `q` on either menu, or a terminal that cannot prompt, counts as
/// a dismissal.
pub struct TerminalSurface {
    notifier: Arc<dyn Notifier>,
    player: AlarmPlayer,
    runtime: Handle,
}

impl TerminalSurface {
    pub fn new(notifier: Arc<dyn Notifier>, player: AlarmPlayer, runtime: Handle) -> Self {
        Self {
            notifier,
            player,
            runtime,
        }
    }

    fn banner(&self, period: &DosePeriod, attempt: u32) {
        let palette = UrgencyTier::for_attempt(attempt).palette();
        let background = hex_color(palette.background);
        let text = hex_color(palette.text);
        let heading = format!("  💊 {}  ", period.display_title());
        let subtitle = format!(
            "  Reminder #{attempt} • {}  ",
            Local::now().format("%H:%M")
        );
        let width = heading.chars().count().max(subtitle.chars().count());

        println!();
        println!("{}", format!("{heading:<width$}").with(text).on(background).bold());
        println!("{}", format!("{subtitle:<width$}").with(text).on(background));
        println!();
    }

    fn checklist(&self, period: &DosePeriod) -> UserResponse {
        let labels: Vec<String> = period.items.iter().map(|item| format!("💊 {item}")).collect();
        let picked = MultiSelect::new()
            .with_prompt("📋 Please check off each medication (space to toggle, enter to submit)")
            .items(&labels)
            .interact_opt();

        match picked {
            Ok(Some(indices)) => UserResponse::Confirmed(
                indices
                    .into_iter()
                    .filter_map(|i| period.items.get(i).cloned())
                    .collect(),
            ),
            Ok(None) => UserResponse::Dismissed,
            Err(e) => {
                tracing::warn!(error = %e, "checklist unavailable");
                UserResponse::Dismissed
            }
        }
    }
}

impl InteractionSurface for TerminalSurface {
    fn present(&mut self, period: &DosePeriod, attempt: u32) -> UserResponse {
        self.banner(period, attempt);
        let mut session = AlertSession::begin(
            attempt,
            self.notifier.as_ref(),
            &self.player,
            Some(&self.runtime),
        );

        let choice = Select::new()
            .with_prompt("What would you like to do?")
            .items(&ACTIONS)
            .default(0)
            .interact_opt();
        let _ = session.stop();

        match choice {
            Ok(Some(0)) => self.checklist(period),
            Ok(Some(_)) => UserResponse::Snoozed,
            Ok(None) => UserResponse::Dismissed,
            Err(e) => {
                tracing::warn!(error = %e, "terminal cannot prompt, treating as dismissed");
                UserResponse::Dismissed
            }
        }
    }

    fn incomplete(&mut self, period: &DosePeriod, missing: &[String]) {
        println!(
            "{}",
            format!("⚠️ Please check all {} medications", period.items.len())
                .with(Color::Yellow)
                .bold()
        );
        for item in missing {
            println!("   missing: {item}");
        }
    }

    fn confirmed(&mut self, _period: &DosePeriod) {
        println!(
            "{}",
            "🎉 Great! All medications logged. See you next time!"
                .with(Color::Green)
                .bold()
        );
    }
}

/// `#rrggbb` to a terminal colour; anything else is white.
fn hex_color(hex: &str) -> Color {
    let channel = |range: std::ops::Range<usize>| {
        hex.strip_prefix('#')
            .filter(|h| h.len() == 6)
            .and_then(|h| h.get(range))
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb { r, g, b },
        _ => Color::White,
    }
}
