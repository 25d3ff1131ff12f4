//! Simulation configuration

use std::time::Duration;

use office_core::env::{env_get, env_get_millis, env_get_opt};
use office_core::event::DEFAULT_EVENT_CAPACITY;
use office_core::{PolicyKind, Role, TierPolicy};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Inclusive range a random delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// Draw a delay and stretch it by `scale`
    ///
    /// Saturates at `Duration::MAX`; `SimConfig::validate` rejects scales
    /// that would get there.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, scale: f64) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        let ms = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
        scaled(Duration::from_millis(ms), scale).unwrap_or(Duration::MAX)
    }

    fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

fn scaled(delay: Duration, scale: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(delay.as_secs_f64() * scale).ok()
}

/// Relative arrival weights per role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMix {
    pub researcher: u32,
    pub ta: u32,
    pub student: u32,
}

impl RoleMix {
    fn weight(&self, role: Role) -> u32 {
        match role {
            Role::Researcher => self.researcher,
            Role::Ta => self.ta,
            Role::Student => self.student,
        }
    }

    /// Weights restricted to the roles `policy` serves
    fn served_weights(&self, policy: &TierPolicy) -> [u32; 3] {
        Role::ALL.map(|role| if policy.serves(role) { self.weight(role) } else { 0 })
    }

    /// Build a sampler over the served roles
    pub fn sampler(&self, policy: &TierPolicy) -> Option<RoleSampler> {
        WeightedIndex::new(self.served_weights(policy))
            .ok()
            .map(|dist| RoleSampler { dist })
    }
}

/// Weighted role picker for the auto-arrival loop
#[derive(Debug, Clone)]
pub struct RoleSampler {
    dist: WeightedIndex<u32>,
}

impl RoleSampler {
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Role {
        Role::ALL[self.dist.sample(rng)]
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Tier table deployment
    pub policy: PolicyKind,

    /// Time in the office for single-visit roles
    pub consult: DelayRange,

    /// First visit of a revisiting role (receiving the task)
    pub task_briefing: DelayRange,

    /// Time spent away on the task
    pub task: DelayRange,

    /// Returning visit (delivering results)
    pub finalize: DelayRange,

    /// Gap between auto arrivals
    pub arrival_gap: DelayRange,

    /// Role mix for auto arrivals
    pub mix: RoleMix,

    /// Give up waiting after this long (None = wait forever)
    pub patience: Option<Duration>,

    /// Multiplier applied to every delay (0 = no delays)
    pub time_scale: f64,

    /// Capacity of the visitor -> observer event ring
    pub event_capacity: usize,

    /// Seed for reproducible delays and arrivals
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::for_policy(PolicyKind::FourTier)
    }
}

impl SimConfig {
    /// Defaults tuned for one of the built-in deployments
    pub fn for_policy(policy: PolicyKind) -> Self {
        match policy {
            PolicyKind::TwoTier => Self {
                policy,
                consult: DelayRange::millis(1500, 3000),
                task_briefing: DelayRange::ZERO,
                task: DelayRange::ZERO,
                finalize: DelayRange::ZERO,
                arrival_gap: DelayRange::millis(800, 1800),
                mix: RoleMix {
                    researcher: 0,
                    ta: 35,
                    student: 65,
                },
                patience: None,
                time_scale: 1.0,
                event_capacity: DEFAULT_EVENT_CAPACITY,
                seed: None,
            },
            PolicyKind::FourTier => Self {
                policy,
                consult: DelayRange::millis(1200, 2200),
                task_briefing: DelayRange::millis(1000, 1800),
                task: DelayRange::millis(2000, 3500),
                finalize: DelayRange::millis(800, 1500),
                arrival_gap: DelayRange::millis(700, 1700),
                mix: RoleMix {
                    researcher: 25,
                    ta: 30,
                    student: 45,
                },
                patience: None,
                time_scale: 1.0,
                event_capacity: DEFAULT_EVENT_CAPACITY,
                seed: None,
            },
        }
    }

    /// Same deployment with every delay removed (tests, stress runs)
    pub fn instant(policy: PolicyKind) -> Self {
        Self::for_policy(policy).time_scale(0.0)
    }

    /// Defaults overlaid with `OFFICE_*` environment variables
    ///
    /// `OFFICE_POLICY` picks the base defaults, then `OFFICE_TIME_SCALE`,
    /// `OFFICE_PATIENCE_MS`, `OFFICE_EVENT_CAPACITY`, `OFFICE_SEED` and the
    /// `OFFICE_{RESEARCHER,TA,STUDENT}_WEIGHT` knobs apply on top.
    pub fn from_env() -> Self {
        let policy = env_get_opt::<PolicyKind>("OFFICE_POLICY").unwrap_or(PolicyKind::FourTier);
        let mut config = Self::for_policy(policy);

        config.time_scale = env_get("OFFICE_TIME_SCALE", config.time_scale);
        config.patience = env_get_millis("OFFICE_PATIENCE_MS").or(config.patience);
        config.event_capacity = env_get("OFFICE_EVENT_CAPACITY", config.event_capacity);
        config.seed = env_get_opt("OFFICE_SEED").or(config.seed);
        config.mix.researcher = env_get("OFFICE_RESEARCHER_WEIGHT", config.mix.researcher);
        config.mix.ta = env_get("OFFICE_TA_WEIGHT", config.mix.ta);
        config.mix.student = env_get("OFFICE_STUDENT_WEIGHT", config.mix.student);
        config
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn consult(mut self, range: DelayRange) -> Self {
        self.consult = range;
        self
    }

    pub fn task_briefing(mut self, range: DelayRange) -> Self {
        self.task_briefing = range;
        self
    }

    pub fn task(mut self, range: DelayRange) -> Self {
        self.task = range;
        self
    }

    pub fn finalize(mut self, range: DelayRange) -> Self {
        self.finalize = range;
        self
    }

    pub fn arrival_gap(mut self, range: DelayRange) -> Self {
        self.arrival_gap = range;
        self
    }

    pub fn mix(mut self, mix: RoleMix) -> Self {
        self.mix = mix;
        self
    }

    pub fn patience(mut self, patience: Option<Duration>) -> Self {
        self.patience = patience;
        self
    }

    pub fn time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err("time_scale must be a finite, non-negative number");
        }
        let ranges = [
            self.consult,
            self.task_briefing,
            self.task,
            self.finalize,
            self.arrival_gap,
        ];
        if !ranges.iter().all(DelayRange::is_valid) {
            return Err("delay range min must not exceed max");
        }
        if ranges.iter().any(|r| scaled(r.max, self.time_scale).is_none()) {
            return Err("time_scale stretches a delay past the longest Duration");
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be at least 1");
        }
        if self.mix.sampler(&self.policy.build()).is_none() {
            return Err("role mix gives no weight to any role the policy serves");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
        assert!(SimConfig::for_policy(PolicyKind::TwoTier).validate().is_ok());
        assert!(SimConfig::instant(PolicyKind::FourTier).validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let bad_scale = SimConfig::default().time_scale(-1.0);
        assert!(bad_scale.validate().is_err());

        let bad_range = SimConfig::default().consult(DelayRange::millis(10, 5));
        assert!(bad_range.validate().is_err());

        let overflowing = SimConfig::for_policy(PolicyKind::TwoTier).time_scale(1e30);
        assert!(overflowing.validate().is_err());
        assert!(SimConfig::default().time_scale(1000.0).validate().is_ok());

        let no_capacity = SimConfig::default().event_capacity(0);
        assert!(no_capacity.validate().is_err());

        // Only researchers, but the 2-tier office does not serve them
        let mix = RoleMix {
            researcher: 10,
            ta: 0,
            student: 0,
        };
        let unserved = SimConfig::for_policy(PolicyKind::TwoTier).mix(mix);
        assert!(unserved.validate().is_err());
    }

    #[test]
    fn test_sample_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = DelayRange::millis(100, 200);
        for _ in 0..100 {
            let d = range.sample(&mut rng, 1.0);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
        assert_eq!(range.sample(&mut rng, 0.0), Duration::ZERO);
        assert_eq!(DelayRange::millis(5, 5).sample(&mut rng, 2.0), Duration::from_millis(10));
        assert_eq!(DelayRange::millis(5, 5).sample(&mut rng, 1e30), Duration::MAX);
    }

    #[test]
    fn test_sampler_skips_unserved_roles() {
        let mut rng = StdRng::seed_from_u64(1);
        let mix = RoleMix {
            researcher: 50,
            ta: 25,
            student: 25,
        };
        let sampler = mix.sampler(&TierPolicy::two_tier()).unwrap();
        for _ in 0..200 {
            assert_ne!(sampler.pick(&mut rng), Role::Researcher);
        }
    }

    #[test]
    fn test_from_env_overlay() {
        // Only this test touches OFFICE_* variables
        std::env::set_var("OFFICE_POLICY", "2-tier");
        std::env::set_var("OFFICE_TIME_SCALE", "0.5");
        std::env::set_var("OFFICE_PATIENCE_MS", "750");
        std::env::set_var("OFFICE_SEED", "42");
        let config = SimConfig::from_env();
        for key in ["OFFICE_POLICY", "OFFICE_TIME_SCALE", "OFFICE_PATIENCE_MS", "OFFICE_SEED"] {
            std::env::remove_var(key);
        }

        assert_eq!(config.policy, PolicyKind::TwoTier);
        assert_eq!(config.time_scale, 0.5);
        assert_eq!(config.patience, Some(Duration::from_millis(750)));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.mix.ta, 35);
    }
}
