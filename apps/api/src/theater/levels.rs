//! Catalogue of purchasable protection levels and data funerals.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionLevel {
    pub name: &'static str,
    pub cost: i64,
    /// Extra encryption passes handed to the encryptor, if any.
    pub encrypt_passes: Option<u32>,
    /// Overwrite passes for the plaintext; `None` means a plain delete.
    pub shred_passes: Option<u32>,
    pub password_suffix: &'static str,
    pub password_hint: &'static str,
    pub elements: &'static [&'static str],
}

pub const PROTECTION_LEVELS: &[ProtectionLevel] = &[
    ProtectionLevel {
        name: "basic",
        cost: 100,
        encrypt_passes: None,
        shred_passes: None,
        password_suffix: "password123",
        password_hint: "It's literally 'password123' with your user ID",
        elements: &[
            "Applied ROT13 (just kidding)",
            "Added blockchain dust",
            "Sprinkled with cyber-salt",
        ],
    },
    ProtectionLevel {
        name: "premium",
        cost: 500,
        encrypt_passes: None,
        shred_passes: Some(3),
        password_suffix: "premiumpassword!",
        password_hint: "Same as basic but with an exclamation mark!",
        elements: &[
            "Double-encrypted for safety",
            "Blessed by cyber-monks",
            "Wrapped in digital silk",
            "Premium particles added",
        ],
    },
    ProtectionLevel {
        name: "paranoid",
        cost: 1000,
        encrypt_passes: Some(3),
        shred_passes: Some(7),
        password_suffix: "they_are_watching",
        password_hint: "They. Are. Watching. (with underscores)",
        elements: &[
            "Wrapped in digital tin foil",
            "Hidden from government satellites",
            "5G-proof coating applied",
            "Illuminati-resistant layer added",
            "Birds aren't real protection enabled",
        ],
    },
    ProtectionLevel {
        name: "tinfoil",
        cost: 5000,
        encrypt_passes: Some(7),
        shred_passes: Some(13),
        password_suffix: "5g_cant_penetrate_this",
        password_hint: "5G can't penetrate this password",
        elements: &[
            "Compressed with anxiety",
            "Encrypted with conspiracy theories",
            "Chemtrail-resistant layer added",
            "Flat-earth approved encryption",
            "Lizard people can't read this",
        ],
    },
    ProtectionLevel {
        name: "quantum",
        cost: 10000,
        encrypt_passes: None,
        shred_passes: Some(21),
        password_suffix: "schrodingers_password",
        password_hint: "The cat knows the password (or doesn't)",
        elements: &[
            "Quantum entangled with parallel universe",
            "Schrödinger's encryption applied",
            "Observed by quantum cats",
            "Superposition achieved",
            "Heisenberg would be uncertain",
        ],
    },
    ProtectionLevel {
        name: "alien",
        cost: 25000,
        encrypt_passes: None,
        shred_passes: Some(35),
        password_suffix: "area51_clearance",
        password_hint: "Check your Area 51 clearance badge",
        elements: &[
            "Applied Area 51 technology",
            "Translated to alien language",
            "UFO cloaking activated",
            "Crop circle pattern applied",
            "Roswell-grade protection",
        ],
    },
    ProtectionLevel {
        name: "eldritch",
        cost: 66666,
        encrypt_passes: Some(13),
        shred_passes: Some(66),
        password_suffix: "ph_nglui_mglw_nafh",
        password_hint: "Ph'nglui mglw'nafh... you know the rest",
        elements: &[
            "Cthulhu fhtagn",
            "Reality.exe has stopped responding",
            "Sanity check failed",
            "Tentacles deployed",
            "Non-Euclidean geometry applied",
        ],
    },
];

pub fn protection_level(name: &str) -> Option<&'static ProtectionLevel> {
    PROTECTION_LEVELS.iter().find(|level| level.name == name)
}

/// How many overwrite passes a funeral shreds with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuneralPasses {
    Fixed(u32),
    /// Uniform in the inclusive range.
    Between(u32, u32),
    /// One of the two, never anything in between.
    Either(u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuneralKind {
    pub name: &'static str,
    pub cost: i64,
    pub passes: FuneralPasses,
    pub message: &'static str,
}

pub const FUNERAL_KINDS: &[FuneralKind] = &[
    FuneralKind {
        name: "viking",
        cost: 10000,
        passes: FuneralPasses::Fixed(35),
        message: "Your data sails to Valhalla!",
    },
    FuneralKind {
        name: "space",
        cost: 7500,
        passes: FuneralPasses::Between(1, 100),
        message: "Your data has achieved escape velocity!",
    },
    FuneralKind {
        name: "quantum",
        cost: 15000,
        passes: FuneralPasses::Either(0, 999),
        message: "Your data both exists and doesn't exist!",
    },
    FuneralKind {
        name: "eldritch",
        cost: 66666,
        passes: FuneralPasses::Fixed(66),
        message: "Your data has returned to the void between the stars.",
    },
];

pub fn funeral_kind(name: &str) -> Option<&'static FuneralKind> {
    FUNERAL_KINDS.iter().find(|kind| kind.name == name)
}

impl FuneralKind {
    fn roll_passes<R: Rng>(&self, rng: &mut R) -> u32 {
        match self.passes {
            FuneralPasses::Fixed(n) => n,
            FuneralPasses::Between(lo, hi) => rng.gen_range(lo..=hi),
            FuneralPasses::Either(a, b) => {
                if rng.gen_bool(0.5) {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// The memorial stored as the funeral's ledger value.
    pub fn memorial<R: Rng>(&self, rng: &mut R, data_count: usize, now: DateTime<Utc>) -> Value {
        json!({
            "funeral_type": self.name,
            "scheduled_for": (now + Duration::hours(24)).to_rfc3339(),
            "epitaph": format!("Here lies {data_count} pieces of data. {}", self.message),
            "shred_passes": self.roll_passes(rng),
        })
    }
}

const BUZZWORDS: &[&str] = &[
    "blockchain",
    "AI-powered",
    "quantum-resistant",
    "zero-knowledge",
    "military-grade",
    "NSA-approved",
    "holographic",
    "5D encrypted",
];

const TECHNOLOGIES: &[&str] = &["Alien", "Time-traveling", "Interdimensional"];

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub security_score: u32,
    pub encryption_layers: u32,
    pub protection_level: String,
    pub vulnerabilities_found: u32,
    pub items_protected: usize,
    pub technology: &'static str,
    pub prayers_to_data_gods: u32,
    pub recommendation: &'static str,
    pub next_audit: &'static str,
}

fn buzzword<R: Rng>(rng: &mut R) -> &'static str {
    BUZZWORDS.choose(rng).copied().unwrap_or("military-grade")
}

pub fn security_report<R: Rng>(rng: &mut R, items_protected: usize) -> SecurityReport {
    let protection_level = format!("{} {}", buzzword(rng), buzzword(rng));
    SecurityReport {
        security_score: rng.gen_range(900..=999),
        encryption_layers: rng.gen_range(7..=13),
        protection_level,
        vulnerabilities_found: 0,
        items_protected,
        technology: TECHNOLOGIES.choose(rng).copied().unwrap_or("Alien"),
        prayers_to_data_gods: rng.gen_range(3..=7),
        recommendation: "Sell more data for enhanced protection!",
        next_audit: "When pigs fly",
    }
}
