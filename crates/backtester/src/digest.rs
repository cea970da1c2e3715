use crate::error::EngineFailure;
use core_types::{DailySnapshot, DeterminismRecord};
use sha2::{Digest, Sha256};

/// SHA-256 (lowercase hex) of the snapshot's canonical JSON encoding.
///
/// The encoding is canonical because every map in the snapshot is a `BTreeMap`
/// and `Decimal` serialises as its exact string form.
pub fn snapshot_digest(snapshot: &DailySnapshot) -> Result<String, EngineFailure> {
    let bytes = serde_json::to_vec(snapshot).map_err(|e| EngineFailure::Digest {
        date: snapshot.date,
        reason: e.to_string(),
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// One hash over an ordered digest sequence.
pub fn sequence_fingerprint(records: &[DeterminismRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.date.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(record.digest.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::HealthStatus;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn snapshot() -> DailySnapshot {
        DailySnapshot {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            nav: dec!(100000),
            cash: dec!(100000),
            gross_exposure: dec!(0),
            net_exposure: dec!(0),
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            decisions_accepted: 0,
            decisions_rejected: 0,
            health_status: HealthStatus::Excellent,
            health_checked: true,
            strategy_failed: false,
        }
    }

    #[test]
    fn digest_is_stable_hex_sha256() {
        let a = snapshot_digest(&snapshot()).unwrap();
        let b = snapshot_digest(&snapshot()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn any_field_change_changes_the_digest() {
        let base = snapshot_digest(&snapshot()).unwrap();
        let mut changed = snapshot();
        changed.decisions_rejected = 1;
        assert_ne!(base, snapshot_digest(&changed).unwrap());
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let a = DeterminismRecord { date: d1, digest: "aa".to_string() };
        let b = DeterminismRecord { date: d2, digest: "bb".to_string() };
        assert_ne!(
            sequence_fingerprint(&[a.clone(), b.clone()]),
            sequence_fingerprint(&[b, a])
        );
    }
}
