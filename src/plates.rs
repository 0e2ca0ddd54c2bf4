//! Authorized-plate registry and the entry/exit gate
//!
//! Each known plate is either inside (`in`) or outside (`out`). The gate only
//! lets a plate enter from `out` and leave from `in`; unknown plates are
//! turned away until someone registers them. State lives in process memory
//! and is reset to the built-in list on restart.

use crate::engine::TextRegion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Plates known at startup
const DEFAULT_PLATES: [(&str, PlateStatus); 10] = [
    ("ABC123", PlateStatus::Out),
    ("XYZ789", PlateStatus::In),
    ("KA01AB1234", PlateStatus::Out),
    ("MH12DE1433", PlateStatus::In),
    ("DL8CAF5030", PlateStatus::Out),
    ("TN22BX4545", PlateStatus::Out),
    ("GJ05JK9090", PlateStatus::In),
    ("7ABC234", PlateStatus::Out),
    ("LMN456", PlateStatus::Out),
    ("QRS321", PlateStatus::In),
];

/// Bounds on what a scanned line must look like to be taken as a plate
const MIN_PLATE_LEN: usize = 4;
const MAX_PLATE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateStatus {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAction {
    Entry,
    Exit,
}

impl GateAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "entry" | "enter" | "in" => Some(Self::Entry),
            "exit" | "leave" | "out" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Outcome of presenting a plate at the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Plate is not in the registry
    Unauthorized,
    /// Entry requested while already inside
    AlreadyInside,
    EntryGranted,
    ExitRecorded,
    /// Exit requested with no matching entry
    NoEntryRecorded,
}

impl GateDecision {
    /// Whether the barrier opens
    pub fn allowed(&self) -> bool {
        matches!(self, Self::EntryGranted | Self::ExitRecorded)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Access denied: plate is not authorized",
            Self::AlreadyInside => "Entry denied: vehicle is already inside",
            Self::EntryGranted => "Entry granted",
            Self::ExitRecorded => "Exit recorded",
            Self::NoEntryRecorded => "Exit denied: no entry recorded for this vehicle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlateEntry {
    pub plate: String,
    pub status: PlateStatus,
}

/// In-memory mapping from normalized plate to its status
#[derive(Debug, Default)]
pub struct PlateRegistry {
    plates: HashMap<String, PlateStatus>,
}

impl PlateRegistry {
    /// Registry seeded with the built-in authorized plates
    pub fn with_defaults() -> Self {
        let plates = DEFAULT_PLATES
            .iter()
            .map(|(plate, status)| (plate.to_string(), *status))
            .collect();
        Self { plates }
    }

    pub fn status(&self, plate: &str) -> Option<PlateStatus> {
        self.plates.get(&normalize_plate(plate)).copied()
    }

    /// Apply a gate action, updating the plate's status when it is allowed
    pub fn apply(&mut self, plate: &str, action: GateAction) -> GateDecision {
        let key = normalize_plate(plate);
        let Some(status) = self.plates.get_mut(&key) else {
            return GateDecision::Unauthorized;
        };

        let decision = match (action, *status) {
            (GateAction::Entry, PlateStatus::In) => GateDecision::AlreadyInside,
            (GateAction::Entry, PlateStatus::Out) => {
                *status = PlateStatus::In;
                GateDecision::EntryGranted
            }
            (GateAction::Exit, PlateStatus::In) => {
                *status = PlateStatus::Out;
                GateDecision::ExitRecorded
            }
            (GateAction::Exit, PlateStatus::Out) => GateDecision::NoEntryRecorded,
        };

        tracing::info!("Gate {:?} for {}: {:?}", action, key, decision);
        decision
    }

    /// Register a plate with exactly `status`, replacing any previous status
    ///
    /// Returns `None` when the plate has no alphanumeric characters.
    pub fn add(&mut self, plate: &str, status: PlateStatus) -> Option<PlateEntry> {
        let key = normalize_plate(plate);
        if key.is_empty() {
            return None;
        }

        if let Some(previous) = self.plates.insert(key.clone(), status) {
            tracing::info!("Plate {} re-registered ({:?} -> {:?})", key, previous, status);
        } else {
            tracing::info!("Plate {} registered as {:?}", key, status);
        }

        Some(PlateEntry { plate: key, status })
    }

    /// All entries, sorted by plate
    pub fn list(&self) -> Vec<PlateEntry> {
        let mut entries: Vec<PlateEntry> = self
            .plates
            .iter()
            .map(|(plate, status)| PlateEntry {
                plate: plate.clone(),
                status: *status,
            })
            .collect();
        entries.sort_by(|a, b| a.plate.cmp(&b.plate));
        entries
    }
}

/// Uppercase ASCII alphanumerics only: `"ka-01 ab 1234"` becomes `"KA01AB1234"`
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Pick the region most likely to be the plate and return it normalized
///
/// Prefers plate-shaped text (length bounds, at least one digit); otherwise
/// falls back to the most confident non-empty line.
pub fn extract_plate(regions: &[TextRegion]) -> Option<String> {
    let mut candidates: Vec<(String, f32)> = regions
        .iter()
        .map(|r| (normalize_plate(&r.text), r.confidence))
        .filter(|(plate, _)| !plate.is_empty())
        .collect();

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let plate_shaped = candidates.iter().find(|(plate, _)| {
        (MIN_PLATE_LEN..=MAX_PLATE_LEN).contains(&plate.len())
            && plate.chars().any(|c| c.is_ascii_digit())
    });

    plate_shaped
        .or_else(|| candidates.first())
        .map(|(plate, _)| plate.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(text: &str, confidence: f32) -> TextRegion {
        TextRegion::from_rect(0.0, 0.0, 10.0, 10.0, text.to_string(), confidence)
    }

    #[test]
    fn test_defaults_have_ten_plates() {
        let registry = PlateRegistry::with_defaults();
        assert_eq!(registry.list().len(), 10);
        assert_eq!(registry.status("ABC123"), Some(PlateStatus::Out));
        assert_eq!(registry.status("XYZ789"), Some(PlateStatus::In));
    }

    #[test]
    fn test_unauthorized_plate_denied_both_ways() {
        let mut registry = PlateRegistry::with_defaults();
        assert_eq!(
            registry.apply("NOPE999", GateAction::Entry),
            GateDecision::Unauthorized
        );
        assert_eq!(
            registry.apply("NOPE999", GateAction::Exit),
            GateDecision::Unauthorized
        );
        assert_eq!(registry.status("NOPE999"), None);
        assert_eq!(registry.list().len(), 10);
    }

    #[test]
    fn test_entry_from_out_is_granted() {
        let mut registry = PlateRegistry::with_defaults();
        let decision = registry.apply("ABC123", GateAction::Entry);
        assert_eq!(decision, GateDecision::EntryGranted);
        assert!(decision.allowed());
        assert_eq!(registry.status("ABC123"), Some(PlateStatus::In));
    }

    #[test]
    fn test_second_entry_is_denied() {
        let mut registry = PlateRegistry::with_defaults();
        registry.apply("ABC123", GateAction::Entry);
        let decision = registry.apply("ABC123", GateAction::Entry);
        assert_eq!(decision, GateDecision::AlreadyInside);
        assert!(!decision.allowed());
        assert_eq!(registry.status("ABC123"), Some(PlateStatus::In));
    }

    #[test]
    fn test_exit_from_in_is_recorded() {
        let mut registry = PlateRegistry::with_defaults();
        let decision = registry.apply("XYZ789", GateAction::Exit);
        assert_eq!(decision, GateDecision::ExitRecorded);
        assert!(decision.allowed());
        assert_eq!(registry.status("XYZ789"), Some(PlateStatus::Out));
    }

    #[test]
    fn test_exit_from_out_reports_no_entry() {
        let mut registry = PlateRegistry::with_defaults();
        let decision = registry.apply("LMN456", GateAction::Exit);
        assert_eq!(decision, GateDecision::NoEntryRecorded);
        assert!(!decision.allowed());
        assert_eq!(registry.status("LMN456"), Some(PlateStatus::Out));
    }

    #[test]
    fn test_add_stores_exact_status() {
        let mut registry = PlateRegistry::with_defaults();
        let entry = registry.add("new 42", PlateStatus::In).unwrap();
        assert_eq!(entry.plate, "NEW42");
        assert_eq!(registry.status("NEW42"), Some(PlateStatus::In));

        registry.add("NEW42", PlateStatus::Out);
        assert_eq!(registry.status("new42"), Some(PlateStatus::Out));
        assert_eq!(registry.list().len(), 11);
    }

    #[test]
    fn test_added_plate_then_passes_gate() {
        let mut registry = PlateRegistry::with_defaults();
        assert_eq!(
            registry.apply("FRESH1", GateAction::Entry),
            GateDecision::Unauthorized
        );
        registry.add("FRESH1", PlateStatus::Out);
        assert_eq!(
            registry.apply("FRESH1", GateAction::Entry),
            GateDecision::EntryGranted
        );
    }

    #[test]
    fn test_add_rejects_blank_plate() {
        let mut registry = PlateRegistry::default();
        assert!(registry.add(" - ", PlateStatus::In).is_none());
        assert_eq!(registry.list().len(), 0);
    }

    #[test]
    fn test_lookup_ignores_formatting() {
        let mut registry = PlateRegistry::with_defaults();
        assert_eq!(
            registry.apply("ka-01 ab 1234", GateAction::Entry),
            GateDecision::EntryGranted
        );
        assert_eq!(registry.status("KA01AB1234"), Some(PlateStatus::In));
    }

    #[test]
    fn test_list_is_sorted() {
        let plates: Vec<String> = PlateRegistry::with_defaults()
            .list()
            .into_iter()
            .map(|e| e.plate)
            .collect();
        let mut sorted = plates.clone();
        sorted.sort();
        assert_eq!(plates, sorted);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(GateAction::parse("Entry"), Some(GateAction::Entry));
        assert_eq!(GateAction::parse(" exit "), Some(GateAction::Exit));
        assert_eq!(GateAction::parse("park"), None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PlateStatus::In).unwrap(), "\"in\"");
        let status: PlateStatus = serde_json::from_str("\"out\"").unwrap();
        assert_eq!(status, PlateStatus::Out);
    }

    #[test]
    fn test_extract_prefers_plate_shaped_text() {
        let regions = vec![
            region("WELCOME TO PARKING", 0.95),
            region("MH 12 DE 1433", 0.80),
            region("IND", 0.90),
        ];
        assert_eq!(extract_plate(&regions), Some("MH12DE1433".to_string()));
    }

    #[test]
    fn test_extract_picks_most_confident_plate() {
        let regions = vec![region("AB 1234", 0.6), region("XY 9876", 0.9)];
        assert_eq!(extract_plate(&regions), Some("XY9876".to_string()));
    }

    #[test]
    fn test_extract_falls_back_to_any_text() {
        let regions = vec![region("hello", 0.4), region("--", 0.9)];
        assert_eq!(extract_plate(&regions), Some("HELLO".to_string()));
        assert_eq!(extract_plate(&[]), None);
    }
}
