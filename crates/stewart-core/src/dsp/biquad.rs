// Second-order IIR section, RBJ cookbook designs, DF2T state update

use std::f64::consts::PI;

use super::{DEFAULT_NOTCH_Q, DEFAULT_Q};

/// Designs must stay below this fraction of the sample rate.
const NYQUIST_GUARD: f64 = 0.499;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
    Notch,
}

impl FilterKind {
    pub const fn default_q(self) -> f64 {
        match self {
            FilterKind::Notch => DEFAULT_NOTCH_Q,
            FilterKind::LowPass | FilterKind::HighPass => DEFAULT_Q,
        }
    }
}

/// Normalised coefficients (a0 divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    /// Pass-through: y = x.
    pub const IDENTITY: Coefficients = Coefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Degenerate parameters yield [`Coefficients::IDENTITY`].
    pub fn design(kind: FilterKind, cutoff: f64, sample_rate: f64, q: f64) -> Self {
        let valid = cutoff > 0.0
            && sample_rate > 0.0
            && cutoff < sample_rate * NYQUIST_GUARD
            && q > 0.0
            && q.is_finite();
        if !valid {
            return Self::IDENTITY;
        }

        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sinw, cosw) = w0.sin_cos();
        let alpha = sinw / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => {
                let b1 = 1.0 - cosw;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterKind::HighPass => {
                let b1 = -(1.0 + cosw);
                (-b1 / 2.0, b1, -b1 / 2.0)
            }
            FilterKind::Notch => (1.0, -2.0 * cosw, 1.0),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cosw / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Biquad filter with its design parameters kept for introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Biquad {
    kind: FilterKind,
    coeffs: Coefficients,
    z1: f64,
    z2: f64,
    cutoff: f64,
    q: f64,
}

impl Biquad {
    /// Unset filter of the given kind; passes input through.
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            coeffs: Coefficients::IDENTITY,
            z1: 0.0,
            z2: 0.0,
            cutoff: 0.0,
            q: kind.default_q(),
        }
    }

    pub fn lowpass(cutoff: f64, sample_rate: f64, q: f64) -> Self {
        let mut f = Self::new(FilterKind::LowPass);
        f.design(cutoff, sample_rate, q);
        f
    }

    pub fn highpass(cutoff: f64, sample_rate: f64, q: f64) -> Self {
        let mut f = Self::new(FilterKind::HighPass);
        f.design(cutoff, sample_rate, q);
        f
    }

    pub fn notch(cutoff: f64, sample_rate: f64, q: f64) -> Self {
        let mut f = Self::new(FilterKind::Notch);
        f.design(cutoff, sample_rate, q);
        f
    }

    /// Record `cutoff`/`q` and recompute coefficients. State is untouched.
    pub fn design(&mut self, cutoff: f64, sample_rate: f64, q: f64) {
        self.cutoff = cutoff.max(0.0);
        self.q = q;
        self.coeffs = Coefficients::design(self.kind, self.cutoff, sample_rate, q);
    }

    /// Recompute at a new sample rate if a cutoff is set, keeping the
    /// recorded Q (or the kind's default when none is recorded).
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if self.cutoff > 0.0 {
            let q = if self.q > 0.0 {
                self.q
            } else {
                self.kind.default_q()
            };
            self.design(self.cutoff, sample_rate, q);
        }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Clear the state registers; coefficients are kept.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(f: &mut Biquad, x: f64, n: usize) -> f64 {
        (0..n).fold(0.0, |_, _| f.process(x))
    }

    #[test]
    fn degenerate_designs_are_identity() {
        for (fc, fs, q) in [
            (0.0, 100.0, 0.707),
            (-1.0, 100.0, 0.707),
            (49.9, 100.0, 0.707),
            (10.0, 0.0, 0.707),
            (10.0, 100.0, 0.0),
        ] {
            for kind in [FilterKind::LowPass, FilterKind::HighPass, FilterKind::Notch] {
                assert!(Coefficients::design(kind, fc, fs, q).is_identity());
            }
        }
    }

    #[test]
    fn identity_passes_everything_through() {
        bolero::check!().with_type::<(i32, bool)>().for_each(|(x, high)| {
            let mut f = if *high {
                Biquad::highpass(0.0, 100.0, 0.707)
            } else {
                Biquad::lowpass(-5.0, 100.0, 0.707)
            };
            let x = f64::from(*x) / 1000.0;
            assert_eq!(f.process(x), x);
            assert_eq!(f.process(-x), -x);
        });
    }

    #[test]
    fn lowpass_has_unity_dc_gain() {
        let mut f = Biquad::lowpass(5.0, 100.0, 0.707);
        assert!((settle(&mut f, 1.0, 2000) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn highpass_washes_out_a_step() {
        let mut f = Biquad::highpass(1.0, 100.0, 0.707);
        let first = f.process(1.0);
        assert!(first > 0.9);
        assert!(settle(&mut f, 1.0, 5000).abs() < 1e-6);
    }

    #[test]
    fn notch_rejects_its_centre_frequency() {
        let (fs, fc) = (200.0, 10.0);
        let mut f = Biquad::notch(fc, fs, DEFAULT_NOTCH_Q);
        let mut peak: f64 = 0.0;
        for n in 0..4000 {
            let x = (2.0 * PI * fc * f64::from(n) / fs).sin();
            let y = f.process(x);
            if n > 3000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 1e-3, "{peak}");
    }

    #[test]
    fn sample_rate_change_keeps_state_and_q() {
        let mut f = Biquad::lowpass(5.0, 100.0, 0.6);
        f.process(1.0);
        let state = (f.z1, f.z2);
        f.set_sample_rate(200.0);
        assert_eq!((f.z1, f.z2), state);
        assert_eq!(f.q(), 0.6);
        assert_eq!(f.coefficients(), &Coefficients::design(FilterKind::LowPass, 5.0, 200.0, 0.6));

        // Idempotent
        let once = *f.coefficients();
        f.set_sample_rate(200.0);
        assert_eq!(f.coefficients(), &once);
    }

    #[test]
    fn unset_filter_ignores_sample_rate() {
        let mut f = Biquad::new(FilterKind::HighPass);
        f.set_sample_rate(500.0);
        assert!(f.coefficients().is_identity());
    }
}
