use serde::{Serialize, Deserialize};

/// Learning-rate policy evaluated once per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LrSchedule {
    Constant,
    /// `base · (1 − iter / max_iter)^power`
    Poly { power: f64 },
}

impl LrSchedule {
    pub fn poly() -> LrSchedule {
        LrSchedule::Poly { power: 0.9 }
    }

    pub fn learning_rate(&self, base: f64, iter: usize, max_iter: usize) -> f64 {
        match self {
            LrSchedule::Constant => base,
            LrSchedule::Poly { power } => {
                if max_iter == 0 {
                    return base;
                }
                let progress = (iter.min(max_iter) as f64) / max_iter as f64;
                base * (1.0 - progress).powf(*power)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poly_decays_to_zero() {
        let s = LrSchedule::poly();
        assert_eq!(s.learning_rate(0.01, 0, 100), 0.01);
        assert!(s.learning_rate(0.01, 50, 100) < 0.01);
        assert_eq!(s.learning_rate(0.01, 100, 100), 0.0);
        assert_eq!(LrSchedule::Constant.learning_rate(0.01, 99, 100), 0.01);
    }
}
