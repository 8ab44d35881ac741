//! Elastic/Plastic Beam Law
//!
//! Spring-damper link shared by native beams (both ends inside one actor)
//! and halfbeam free forces (ends on two actors, force applied at the base
//! end only).
//!
//! # Law
//!
//! ```text
//! dis   = p1 - p2,   len = |dis|,   diff = len - L
//! slen  = -k * diff - d * dot(v1 - v2, dis) / len
//! F(p1) = dis * slen / len
//! ```
//!
//! When `|slen|` exceeds the fast-test threshold the link may yield
//! plastically (compression or expansion, handled separately) and then break
//! once the resulting stress exceeds its strength.

use serde::{Deserialize, Serialize};

use crate::math::{Real, Vec3};

/// Shortest rest length a plastically compressed link may reach (m).
pub const MIN_BEAM_LENGTH: Real = 0.005;

/// Links shorter than this produce no force (direction undefined).
const DEGENERATE_LENGTH: Real = 1.0e-6;

/// Damping scale for a slack rope.
const ROPE_SLACK_DAMPING: Real = 0.1;

/// How a link reacts to compression
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkBehavior {
    /// Pushes and pulls
    Generic,
    /// Pulls only: below rest length stiffness drops to zero and damping to a tenth
    Rope,
}

/// Plastic yield that happened during one evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deformation {
    /// Stress after the yield correction
    pub stress: Real,
    /// Rescaled yield threshold of the side that yielded
    pub threshold: Real,
}

/// Rupture that happened during one evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Breakage {
    /// Stress magnitude that broke the link
    pub stress: Real,
    /// Strength it exceeded
    pub strength: Real,
}

/// Outcome of one link evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkResponse {
    /// Force on the first end (the second end receives the negation)
    pub force: Vec3,
    /// Axial stress before any yield correction
    pub stress: Real,
    /// Set when the link yielded plastically
    pub deformed: Option<Deformation>,
    /// Set when the link broke; it must not be evaluated again
    pub broken: Option<Breakage>,
}

impl LinkResponse {
    fn inert() -> Self {
        Self {
            force: Vec3::zeros(),
            stress: 0.0,
            deformed: None,
            broken: None,
        }
    }
}

/// Spring-damper link with plastic yield and breaking strength.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamLink {
    /// Rest length L (m)
    pub rest_length: Real,
    /// Stiffness k (N/m)
    pub spring: Real,
    /// Damping d (N·s/m)
    pub damping: Real,
    /// Breaking strength (N)
    pub strength: Real,
    /// Compressive yield stress (positive)
    pub max_pos_stress: Real,
    /// Tensile yield stress (negative)
    pub max_neg_stress: Real,
    /// Fast-test threshold: `min(max_pos, -max_neg, strength)`
    pub min_max_posneg_stress: Real,
    /// Fraction of the yield length kept elastic (0 = fully plastic)
    pub plastic_coef: Real,
    /// Visual diameter (m), carried for consumers
    pub diameter: Real,
}

impl BeamLink {
    /// Default stiffness for links created by request.
    pub const DEFAULT_SPRING: Real = 9_000_000.0;
    /// Default damping for links created by request.
    pub const DEFAULT_DAMPING: Real = 12_000.0;
    /// Default yield stress for links created by request.
    pub const DEFAULT_DEFORM: Real = 400_000.0;
    /// Default breaking strength for links created by request.
    pub const DEFAULT_STRENGTH: Real = 1_000_000.0;
    /// Default diameter for links created by request.
    pub const DEFAULT_DIAMETER: Real = 0.05;

    /// Link with symmetric yield stress `deform`
    #[must_use]
    pub fn new(
        rest_length: Real,
        spring: Real,
        damping: Real,
        deform: Real,
        strength: Real,
    ) -> Self {
        let mut link = Self {
            rest_length,
            spring,
            damping,
            strength,
            max_pos_stress: deform,
            max_neg_stress: -deform,
            min_max_posneg_stress: deform,
            plastic_coef: 0.0,
            diameter: Self::DEFAULT_DIAMETER,
        };
        link.refresh_fast_threshold();
        link
    }

    /// Link with default parameters and the given rest length
    #[must_use]
    pub fn with_rest_length(rest_length: Real) -> Self {
        Self::new(
            rest_length,
            Self::DEFAULT_SPRING,
            Self::DEFAULT_DAMPING,
            Self::DEFAULT_DEFORM,
            Self::DEFAULT_STRENGTH,
        )
    }

    /// Set the plastic coefficient
    #[must_use]
    pub fn with_plastic_coef(mut self, plastic_coef: Real) -> Self {
        self.plastic_coef = plastic_coef;
        self
    }

    /// Set the diameter
    #[must_use]
    pub fn with_diameter(mut self, diameter: Real) -> Self {
        self.diameter = diameter;
        self
    }

    fn refresh_fast_threshold(&mut self) {
        self.min_max_posneg_stress = self
            .max_pos_stress
            .min(-self.max_neg_stress)
            .min(self.strength);
    }

    /// Evaluate the link between `(p1, v1)` and `(p2, v2)`.
    ///
    /// Mutates rest length and thresholds on yield. A returned `broken`
    /// means the caller must retire the link; the force of this evaluation
    /// is still valid.
    pub fn evaluate(
        &mut self,
        p1: &Vec3,
        v1: &Vec3,
        p2: &Vec3,
        v2: &Vec3,
        behavior: LinkBehavior,
    ) -> LinkResponse {
        let dis = p1 - p2;
        let dislen = dis.norm();
        if !(dislen > DEGENERATE_LENGTH) {
            return LinkResponse::inert();
        }
        let inv_dislen = 1.0 / dislen;

        let diff = dislen - self.rest_length;
        let mut k = self.spring;
        let mut d = self.damping;
        if behavior == LinkBehavior::Rope && diff < 0.0 {
            k = 0.0;
            d *= ROPE_SLACK_DAMPING;
        }

        let v = v1 - v2;
        let mut slen = -k * diff - d * v.dot(&dis) * inv_dislen;
        let stress = slen;
        let mut deformed = None;
        let mut broken = None;

        let mut len = slen.abs();
        if len > self.min_max_posneg_stress {
            if k != 0.0 {
                if slen > self.max_pos_stress && diff < 0.0 {
                    // compression
                    let yield_length = self.max_pos_stress / k;
                    let deform = diff + yield_length * (1.0 - self.plastic_coef);
                    let l_old = self.rest_length;
                    self.rest_length = (self.rest_length + deform).max(MIN_BEAM_LENGTH);
                    slen -= (slen - self.max_pos_stress) * 0.5;
                    len = slen;
                    if self.rest_length > 0.0 && l_old > self.rest_length {
                        self.max_pos_stress *= l_old / self.rest_length;
                        self.refresh_fast_threshold();
                    }
                    // strength is kept on compression
                    deformed = Some(Deformation {
                        stress: slen,
                        threshold: self.max_pos_stress,
                    });
                } else if slen < self.max_neg_stress && diff > 0.0 {
                    // expansion
                    let yield_length = self.max_neg_stress / k;
                    let deform = diff + yield_length * (1.0 - self.plastic_coef);
                    let l_old = self.rest_length;
                    self.rest_length += deform;
                    slen -= (slen - self.max_neg_stress) * 0.5;
                    len = -slen;
                    if l_old > 0.0 && self.rest_length > l_old {
                        self.max_neg_stress *= self.rest_length / l_old;
                        self.refresh_fast_threshold();
                    }
                    self.strength -= deform * k;
                    deformed = Some(Deformation {
                        stress: slen,
                        threshold: self.max_neg_stress,
                    });
                }
            }

            if len > self.strength {
                broken = Some(Breakage {
                    stress: len,
                    strength: self.strength,
                });
            }
        }

        LinkResponse {
            force: dis * (slen * inv_dislen),
            stress,
            deformed,
            broken,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
