use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::capture::Capture;
use crate::logic::policy::{DecisionRecord, DecisionVerdict, PriorState};

/// Bumped whenever the stored record layout changes
pub const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Stored baseline for one target. Exactly one live snapshot per target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u8,
    pub target_id: String,

    /// SHA-256 of the raw capture bytes (hex)
    pub content_hash: String,
    /// `{w}x{h}:{crc32}` over decoded pixels, images only
    pub image_digest: Option<String>,
    /// Raw capture kept as the next cycle's comparison point
    #[serde(default, with = "payload_b64", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    pub captured_at: DateTime<Utc>,

    // Decision state at the time this snapshot was taken
    pub last_verdict: DecisionVerdict,
    pub consecutive_count: u32,
    #[serde(default)]
    pub uncertain_streak: u32,
    #[serde(default)]
    pub episode_notified: bool,
}

impl Snapshot {
    /// Re-baseline on `capture`, carrying the state decided this cycle
    pub fn from_capture(
        capture: &Capture,
        image_digest: Option<String>,
        decision: &DecisionRecord,
        retain_payload: bool,
    ) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            target_id: capture.target_id().to_string(),
            content_hash: capture.content_hash(),
            image_digest,
            payload: retain_payload.then(|| capture.bytes().to_vec()),
            captured_at: capture.captured_at(),
            last_verdict: decision.verdict,
            consecutive_count: decision.consecutive_count,
            uncertain_streak: decision.uncertain_streak,
            episode_notified: decision.episode_notified,
        }
    }

    pub fn prior_state(&self) -> PriorState {
        PriorState {
            verdict: self.last_verdict,
            consecutive_count: self.consecutive_count,
            uncertain_streak: self.uncertain_streak,
            episode_notified: self.episode_notified,
        }
    }

    /// Rebuild the old capture for pixel comparison, if the payload was kept
    pub fn to_capture(&self) -> Option<Capture> {
        self.payload
            .as_ref()
            .map(|bytes| Capture::new(self.target_id.clone(), bytes.clone(), self.captured_at))
    }
}

// ============================================================================
// PAYLOAD ENCODING
// ============================================================================

mod payload_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
