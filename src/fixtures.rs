// 🌱 Fixtures - Demo seed data
//
// The embedded seed mirrors what the intake agent would have produced:
// three proposals of each kind (Türk Traktör, Caterpillar Turkey, JCB Latin
// America) alongside the canonical book of business.

use crate::store::{RecordStore, SeedData};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const DEMO_SEED: &str = include_str!("../fixtures/seed.json");
const DEMO_EMAILS: &str = include_str!("../fixtures/emails.json");

/// Parse seed data from JSON text
pub fn parse_seed(json: &str) -> Result<SeedData> {
    serde_json::from_str(json).context("Failed to parse seed data")
}

/// The embedded demo seed, with the inbox the proposals were extracted from
pub fn demo_seed() -> Result<SeedData> {
    let mut seed = parse_seed(DEMO_SEED)?;
    let inbox = parse_seed(DEMO_EMAILS).context("Failed to parse demo inbox")?;
    seed.emails = inbox.emails;
    Ok(seed)
}

/// Build a store from seed data and report integrity problems
pub fn store_from_seed(seed: SeedData) -> Result<RecordStore> {
    let store = RecordStore::from_seed(seed).context("Seed data contains duplicate ids")?;

    for violation in store.integrity_violations() {
        warn!(%violation, "seed integrity");
    }

    Ok(store)
}

/// Store loaded with the embedded demo seed
pub fn demo_store() -> Result<RecordStore> {
    store_from_seed(demo_seed()?)
}

/// Store loaded from a seed file on disk
pub fn load_seed(path: &Path) -> Result<RecordStore> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    let seed = parse_seed(&json).with_context(|| format!("In seed file: {}", path.display()))?;

    info!(
        path = %path.display(),
        accounts = seed.accounts.len(),
        contacts = seed.contacts.len(),
        opportunities = seed.opportunities.len(),
        emails = seed.emails.len(),
        "seed loaded"
    );
    store_from_seed(seed)
}
