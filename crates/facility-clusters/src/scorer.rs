//! Bus-access scoring
//!
//! Maps the walking distance from a facility to its nearest bus stop onto a
//! small ordinal score. Thresholds are inclusive upper bounds checked in
//! ascending order; anything beyond the last threshold gets the floor score.

use crate::{Facility, ScoredFacility};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Fine scale: 50/100/200/300/400 m → 5..1, beyond → 0
pub const FINE_THRESHOLDS: [(f64, u8); 5] = [
    (50.0, 5),
    (100.0, 4),
    (200.0, 3),
    (300.0, 2),
    (400.0, 1),
];
pub const FINE_FLOOR: u8 = 0;

/// Coarse scale: 100/200/400/800 m → 5..2, beyond → 1
pub const COARSE_THRESHOLDS: [(f64, u8); 4] = [(100.0, 5), (200.0, 4), (400.0, 3), (800.0, 2)];
pub const COARSE_FLOOR: u8 = 1;

/// Scoring policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreScale {
    /// Six levels (0-5)
    #[default]
    Fine,
    /// Five levels (1-5)
    Coarse,
}

impl ScoreScale {
    pub fn thresholds(&self) -> &'static [(f64, u8)] {
        match self {
            Self::Fine => &FINE_THRESHOLDS,
            Self::Coarse => &COARSE_THRESHOLDS,
        }
    }

    pub fn floor(&self) -> u8 {
        match self {
            Self::Fine => FINE_FLOOR,
            Self::Coarse => COARSE_FLOOR,
        }
    }

    pub fn max_score(&self) -> u8 {
        self.thresholds().first().map(|(_, s)| *s).unwrap_or(self.floor())
    }

    /// Score a distance in meters
    pub fn score(&self, distance_m: f64) -> u8 {
        self.thresholds()
            .iter()
            .find(|(limit, _)| distance_m <= *limit)
            .map(|(_, score)| *score)
            .unwrap_or(self.floor())
    }
}

/// Score all facilities
pub fn score_facilities(facilities: Vec<Facility>, scale: ScoreScale) -> Vec<ScoredFacility> {
    let scored: Vec<ScoredFacility> = facilities
        .into_iter()
        .map(|facility| {
            let score = scale.score(facility.distance_m);
            debug!(
                "Scored {}: {:.1} m -> {}",
                facility.name, facility.distance_m, score
            );
            ScoredFacility { facility, score }
        })
        .collect();

    let mut histogram = [0usize; 6];
    for s in &scored {
        if let Some(slot) = histogram.get_mut(s.score as usize) {
            *slot += 1;
        }
    }
    info!(
        "Scored {} facilities on {:?} scale (score 0..5 counts: {:?})",
        scored.len(),
        scale,
        histogram
    );

    scored
}
