//! Turns announcement kinds into text. Kept apart from the announcer state
//! machine so the wording can change without touching navigation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{announcer::AnnouncementKind, route::Maneuver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Plain, fixed wording
    #[default]
    Neutral,
    /// As few words as possible
    Concise,
    /// Chatty, picks between a few variants
    Friendly,
}

/// What the phrase is about
pub struct PhraseContext<'a> {
    pub maneuver: Maneuver,
    /// Instruction text of the step being announced
    pub instruction: &'a str,
    /// Distance to the maneuver
    pub distance_m: f64,
}

/// Round for speech: tens of metres below a kilometre, tenths of kilometres above
pub fn spoken_distance(meters: f64) -> String {
    match round_to_ten(meters) {
        rounded if rounded >= 1000 => format!("{:.1} kilometres", meters / 1000.0),
        rounded => format!("{rounded} metres"),
    }
}

fn short_distance(meters: f64) -> String {
    match round_to_ten(meters) {
        rounded if rounded >= 1000 => format!("{:.1} km", meters / 1000.0),
        rounded => format!("{rounded} m"),
    }
}

/// Nearest 10 m, never less than 10. Units are picked from this, not the raw distance
fn round_to_ten(meters: f64) -> i64 {
    ((meters / 10.0).round() as i64 * 10).max(10)
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pick<'a>(rng: &mut impl Rng, variants: &[&'a str]) -> &'a str {
    variants[rng.random_range(0..variants.len())]
}

/// Build the text for an announcement
pub fn phrase(
    kind: AnnouncementKind,
    ctx: &PhraseContext,
    tone: Tone,
    rng: &mut impl Rng,
) -> String {
    match tone {
        Tone::Neutral => neutral(kind, ctx),
        Tone::Concise => concise(kind, ctx),
        Tone::Friendly => friendly(kind, ctx, rng),
    }
}

fn neutral(kind: AnnouncementKind, ctx: &PhraseContext) -> String {
    let dist = spoken_distance(ctx.distance_m);
    let instruction = lower_first(ctx.instruction);
    match kind {
        AnnouncementKind::Depart => format!("Starting navigation. In {dist}, {instruction}"),
        AnnouncementKind::Approaching => format!("In {dist}, {instruction}"),
        AnnouncementKind::Immediate if ctx.maneuver == Maneuver::Arrive => {
            "Your destination is just ahead".to_string()
        }
        AnnouncementKind::Immediate => format!("Now, {instruction}"),
        AnnouncementKind::Arrived => "You have arrived at your destination".to_string(),
        AnnouncementKind::OffRoute => "You are off route. Recalculating".to_string(),
        AnnouncementKind::Recalculated => format!("Route recalculated. In {dist}, {instruction}"),
    }
}

fn concise(kind: AnnouncementKind, ctx: &PhraseContext) -> String {
    match kind {
        AnnouncementKind::Depart | AnnouncementKind::Immediate => ctx.instruction.to_string(),
        AnnouncementKind::Approaching | AnnouncementKind::Recalculated => {
            format!("{}: {}", short_distance(ctx.distance_m), ctx.instruction)
        }
        AnnouncementKind::Arrived => "Arrived".to_string(),
        AnnouncementKind::OffRoute => "Off route".to_string(),
    }
}

fn friendly(kind: AnnouncementKind, ctx: &PhraseContext, rng: &mut impl Rng) -> String {
    let dist = spoken_distance(ctx.distance_m);
    let instruction = lower_first(ctx.instruction);
    match kind {
        AnnouncementKind::Depart => {
            let lead = pick(rng, &["Let's go!", "Off we go.", "Ready when you are."]);
            format!("{lead} In {dist}, {instruction}")
        }
        AnnouncementKind::Approaching => {
            let lead = pick(rng, &["Coming up in", "In about", "Heads up, in"]);
            format!("{lead} {dist}, {instruction}")
        }
        AnnouncementKind::Immediate if ctx.maneuver == Maneuver::Arrive => {
            pick(rng, &["Almost there!", "Your destination is right ahead"]).to_string()
        }
        AnnouncementKind::Immediate => {
            let lead = pick(rng, &["Right here,", "Now", "This is it,"]);
            format!("{lead} {instruction}")
        }
        AnnouncementKind::Arrived => pick(
            rng,
            &[
                "You've arrived, enjoy your shopping!",
                "Here we are, you've reached your destination",
                "You made it!",
            ],
        )
        .to_string(),
        AnnouncementKind::OffRoute => pick(
            rng,
            &[
                "Looks like we took a detour, finding a new way",
                "No worries, recalculating your route",
            ],
        )
        .to_string(),
        AnnouncementKind::Recalculated => {
            let lead = pick(rng, &["Found a new way.", "Back on track."]);
            format!("{lead} In {dist}, {instruction}")
        }
    }
}
