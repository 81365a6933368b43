//! Loss functions for binary classification.
//!
//! The four losses are a closed set; the trainers match on the enum inside
//! the example loop so every branch inlines, instead of paying a virtual
//! dispatch per example.

/// Loss function over `(y, ŷ)` with `y ∈ {-1, +1}` and `ŷ = ⟨w, x⟩`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loss {
    /// `½(y - ŷ)²`
    Square,
    /// `max(0, 1 - yŷ)`
    #[default]
    Hinge,
    /// Hinge clipped at 2 for `yŷ < -1`; the gradient vanishes outside
    /// `(-1, 1]`, which bounds the influence of outliers.
    Ramp,
    /// `ln(1 + exp(-yŷ))`
    Logistic,
}

impl Loss {
    /// Loss value.
    #[inline]
    pub fn loss(self, y: f64, haty: f64) -> f64 {
        match self {
            Loss::Square => {
                let diff = y - haty;
                0.5 * diff * diff
            }
            Loss::Hinge => {
                let z = y * haty;
                if z > 1.0 {
                    0.0
                } else {
                    1.0 - z
                }
            }
            Loss::Ramp => {
                let z = y * haty;
                if z > 1.0 {
                    0.0
                } else if z < -1.0 {
                    2.0
                } else {
                    1.0 - z
                }
            }
            Loss::Logistic => {
                let z = y * haty;
                // Stable softplus(-z) for both signs of z.
                if z > 0.0 {
                    (-z).exp().ln_1p()
                } else {
                    -z + z.exp().ln_1p()
                }
            }
        }
    }

    /// Derivative of the loss with respect to `ŷ`.
    #[inline]
    pub fn dloss(self, y: f64, haty: f64) -> f64 {
        match self {
            Loss::Square => -(y - haty),
            Loss::Hinge => {
                if y * haty > 1.0 {
                    0.0
                } else {
                    -y
                }
            }
            Loss::Ramp => {
                // Active only on (-1, 1]; flat on both clipped pieces.
                let z = y * haty;
                if z > 1.0 || z <= -1.0 {
                    0.0
                } else {
                    -y
                }
            }
            // -y * sigmoid(-yŷ)
            Loss::Logistic => -y / (1.0 + (y * haty).exp()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Loss::Square => "square",
            Loss::Hinge => "hinge",
            Loss::Ramp => "ramp",
            Loss::Logistic => "logistic",
        }
    }

    /// Inverse of [`name`](Self::name), for CLI parsing.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "square" => Some(Loss::Square),
            "hinge" => Some(Loss::Hinge),
            "ramp" => Some(Loss::Ramp),
            "logistic" => Some(Loss::Logistic),
            _ => None,
        }
    }
}
