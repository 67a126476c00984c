//! Synthetic seed feeds
//!
//! Writes JSON array feeds for load testing. Patients are numbered
//! `usr0..usrN`; payments reference random patients in `usr1..usr999999`, so
//! most of them are dropped unless a large patient feed was loaded first.

use crate::domain::{EntityKind, ReloadError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const NAME_SUFFIXES: &[char] = &['a', 'b', 'c'];

/// Synthetic patient number `n`
pub fn seed_patient<R: Rng>(n: u64, rng: &mut R) -> Value {
    let suffix = NAME_SUFFIXES.choose(rng).copied().unwrap_or('a');
    json!({
        "firstName": format!("Rick_{n}_{suffix}"),
        "lastName": format!("Deckard_{n}"),
        "dateOfBirth": "2000-01-01",
        "externalId": format!("usr{n}"),
    })
}

/// A synthetic payment with random ids and amount
///
/// The amount is written as a decimal string with two-digit cents.
pub fn seed_payment<R: Rng>(rng: &mut R) -> Value {
    let whole: u32 = rng.gen_range(1..100);
    let cents: u32 = rng.gen_range(0..99);
    json!({
        "amount": format!("{whole}.{cents:02}"),
        "patientId": format!("usr{}", rng.gen_range(1..1_000_000u32)),
        "externalId": format!("pay{}", rng.gen_range(1..1_000_000_000u32)),
    })
}

/// Write a feed of `count` synthetic records as a JSON array
pub fn write_seed<W: Write, R: Rng>(
    writer: &mut W,
    kind: EntityKind,
    count: u64,
    rng: &mut R,
) -> Result<()> {
    writer.write_all(b"[")?;
    for n in 0..count {
        if n > 0 {
            writer.write_all(b", ")?;
        }
        let record = match kind {
            EntityKind::Patient => seed_patient(n, rng),
            EntityKind::Payment => seed_payment(rng),
        };
        serde_json::to_writer(&mut *writer, &record)?;
    }
    writer.write_all(b"]")?;
    Ok(())
}

/// Write a seed feed to `path`, replacing any existing file
pub fn write_seed_file(path: impl AsRef<Path>, kind: EntityKind, count: u64) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| ReloadError::Io(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    write_seed(&mut writer, kind, count, &mut rand::thread_rng())?;
    writer.flush()?;

    tracing::info!(path = %path.display(), entity = %kind, count, "Seed feed written");
    Ok(())
}
