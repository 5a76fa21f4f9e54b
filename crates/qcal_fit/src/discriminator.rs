//! Two-state readout discriminator
//!
//! Gantree: L4_Fit → Discriminator
//!
//! Rotates the IQ plane so the ground-to-excited separation lies along +I,
//! then picks the threshold among the rotated shots that misassigns the
//! fewest of them. Blobs of unequal width therefore get a threshold pulled
//! towards the narrower blob.

use crate::error::{FitError, FitOutcome};
use serde::{Deserialize, Serialize};

/// Discriminator parameters
/// Gantree: Discrimination // 상태 판별
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Discrimination {
    /// Rotation angle (rad) applied as `I' = I·cos θ − Q·sin θ`
    pub angle: f64,
    /// Threshold on rotated I
    pub threshold: f64,
    /// Repeat-until-success exit threshold on rotated I
    pub rus_threshold: f64,
    /// Assignment fidelity `(P(g|g) + P(e|e)) / 2`
    pub fidelity: f64,
    /// Confusion matrix `[[P(g|g), P(e|g)], [P(g|e), P(e|e)]]`
    pub confusion: [[f64; 2]; 2],
    /// Rotated ground-blob center on I
    pub ground_center: f64,
    /// Rotated excited-blob center on I
    pub excited_center: f64,
}

impl Discrimination {
    /// Rotate one IQ point
    pub fn rotate(&self, i: f64, q: f64) -> (f64, f64) {
        rotate(self.angle, i, q)
    }

    /// Classify one IQ point (true = excited)
    pub fn classify(&self, i: f64, q: f64) -> bool {
        self.rotate(i, q).0 > self.threshold
    }
}

fn rotate(angle: f64, i: f64, q: f64) -> (f64, f64) {
    let (s, c) = angle.sin_cos();
    (i * c - q * s, i * s + q * c)
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

fn std_dev(v: &[f64], center: f64) -> f64 {
    (v.iter().map(|x| (x - center).powi(2)).sum::<f64>() / v.len() as f64).sqrt()
}

/// Rotated shot that misassigns the fewest shots; ties go to the lowest
///
/// A shot above the threshold is excited. Both slices must be sorted.
fn min_misassignment_threshold(ground: &[f64], excited: &[f64]) -> f64 {
    let mut best = (usize::MAX, f64::NAN);
    for &candidate in ground.iter().chain(excited) {
        let ground_above = ground.len() - ground.partition_point(|x| *x <= candidate);
        let excited_below = excited.partition_point(|x| *x <= candidate);
        let errors = ground_above + excited_below;
        if errors < best.0 || (errors == best.0 && candidate < best.1) {
            best = (errors, candidate);
        }
    }
    best.1
}

/// Fit a two-state discriminator to ground and excited shots
/// Gantree: two_state_discriminator(ig,qg,ie,qe) -> FitOutcome<Discrimination> // 판별기
pub fn two_state_discriminator(
    i_g: &[f64],
    q_g: &[f64],
    i_e: &[f64],
    q_e: &[f64],
) -> FitOutcome<Discrimination> {
    if i_g.len() != q_g.len() {
        return Err(FitError::LengthMismatch(i_g.len(), q_g.len()));
    }
    if i_e.len() != q_e.len() {
        return Err(FitError::LengthMismatch(i_e.len(), q_e.len()));
    }
    let shots = i_g.len().min(i_e.len());
    if shots < 2 {
        return Err(FitError::TooFewPoints {
            needed: 2,
            got: shots,
        });
    }
    if [i_g, q_g, i_e, q_e].iter().any(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(FitError::NonFinite);
    }

    let di = mean(i_e) - mean(i_g);
    let dq = mean(q_e) - mean(q_g);
    if di.hypot(dq) == 0.0 {
        return Err(FitError::Degenerate("blob centers coincide".to_string()));
    }
    let angle = -dq.atan2(di);

    let mut ground: Vec<f64> = i_g.iter().zip(q_g).map(|(i, q)| rotate(angle, *i, *q).0).collect();
    let mut excited: Vec<f64> = i_e.iter().zip(q_e).map(|(i, q)| rotate(angle, *i, *q).0).collect();
    ground.sort_by(f64::total_cmp);
    excited.sort_by(f64::total_cmp);
    let ground_center = mean(&ground);
    let excited_center = mean(&excited);
    let threshold = min_misassignment_threshold(&ground, &excited);

    let gg = ground.iter().filter(|x| **x <= threshold).count() as f64 / ground.len() as f64;
    let ee = excited.iter().filter(|x| **x > threshold).count() as f64 / excited.len() as f64;

    // One ground-blob width above the ground center, never past the threshold
    let rus_threshold = (ground_center + std_dev(&ground, ground_center)).min(threshold);

    Ok(Discrimination {
        angle,
        threshold,
        rus_threshold,
        fidelity: (gg + ee) / 2.0,
        confusion: [[gg, 1.0 - gg], [1.0 - ee, ee]],
        ground_center,
        excited_center,
    })
}

// ============================================================================
// Tests
// ============================================================================
