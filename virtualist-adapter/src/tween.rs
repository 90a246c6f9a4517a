/// Shortest run a retargeted tween gets, so a late correction doesn't snap.
pub const MIN_RETARGET_MS: u64 = 80;

/// An animated scroll whose target may move while it runs.
///
/// The offset follows `from + (to - from) * easing(t)` plus a cubic Hermite term carrying
/// `start_velocity` (px/ms) that vanishes at both ends. A fresh tween starts at rest; a
/// [`Tween::retarget`] starts a new segment from the current offset and velocity, so corrections
/// issued mid-flight bend the curve instead of restarting it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub start_velocity: f64,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Tween {
    pub fn new(from: f64, to: f64, start_ms: u64, duration_ms: u64, easing: Easing) -> Self {
        Self {
            from,
            to,
            start_velocity: 0.0,
            start_ms,
            duration_ms: duration_ms.max(1),
            easing,
        }
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }

    pub fn is_done(&self, now_ms: u64) -> bool {
        now_ms >= self.end_ms()
    }

    fn progress(&self, now_ms: u64) -> f64 {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        (elapsed as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
    }

    /// Offset at `now_ms`, never negative.
    pub fn sample(&self, now_ms: u64) -> f64 {
        let t = self.progress(now_ms);
        let span = self.duration_ms as f64;
        let carried = self.start_velocity * span * (t * t * t - 2.0 * t * t + t);
        (self.from + (self.to - self.from) * self.easing.sample(t) + carried).max(0.0)
    }

    /// Rate of change at `now_ms` in px/ms; zero once done.
    pub fn velocity(&self, now_ms: u64) -> f64 {
        if self.is_done(now_ms) {
            return 0.0;
        }
        let t = self.progress(now_ms);
        let span = self.duration_ms as f64;
        let eased = (self.to - self.from) * self.easing.slope(t);
        let carried = self.start_velocity * span * (3.0 * t * t - 4.0 * t + 1.0);
        (eased + carried) / span
    }

    /// Heads for `new_to` from wherever the animation is at `now_ms`, keeping its velocity.
    ///
    /// The original end time is kept unless less than [`MIN_RETARGET_MS`] remain. The new
    /// segment eases in with [`Easing::SmoothStep`], whose flat start leaves the carried velocity
    /// as the only initial motion.
    pub fn retarget(&mut self, now_ms: u64, new_to: f64) {
        let from = self.sample(now_ms);
        let start_velocity = self.velocity(now_ms);
        let end_ms = self.end_ms().max(now_ms + MIN_RETARGET_MS);
        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "virtualist_adapter",
            from,
            new_to,
            start_velocity,
            end_ms,
            "Tween::retarget"
        );
        *self = Self {
            from,
            to: new_to,
            start_velocity,
            start_ms: now_ms,
            duration_ms: end_ms - now_ms,
            easing: Easing::SmoothStep,
        };
    }

    /// Moves both ends by `delta` without restarting, so content shifts don't bend the curve.
    pub fn shift(&mut self, delta: f64) {
        self.from += delta;
        self.to += delta;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Easing {
    Linear,
    #[default]
    SmoothStep,
    EaseInOutCubic,
}

impl Easing {
    /// Eased progress for `t` in `[0, 1]`.
    pub fn sample(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
            Self::EaseInOutCubic if t < 0.5 => 4.0 * t * t * t,
            Self::EaseInOutCubic => {
                let u = 2.0 - 2.0 * t;
                1.0 - u * u * u / 2.0
            }
        }
    }

    /// Derivative of [`Easing::sample`] with respect to `t`.
    pub fn slope(self, t: f64) -> f64 {
        match self {
            Self::Linear => 1.0,
            Self::SmoothStep => 6.0 * t * (1.0 - t),
            Self::EaseInOutCubic if t < 0.5 => 12.0 * t * t,
            Self::EaseInOutCubic => {
                let u = 2.0 - 2.0 * t;
                3.0 * u * u
            }
        }
    }
}
