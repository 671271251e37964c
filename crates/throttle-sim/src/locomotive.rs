use throttle_core::Route;

pub const DEFAULT_MAX_SPEED: f64 = 100.0;
const DEFAULT_START_STEP: f64 = 5.0;
const STEPS_PER_UNIT: f64 = 1.0;
const RUN_UP_KICK: f64 = 2.0;
const RUN_UP_INCREMENT: f64 = 0.2;
const RUN_UP_STEPS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub start_step_forward: f64,
    pub start_step_reverse: f64,
    pub max_speed: f64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            start_step_forward: DEFAULT_START_STEP,
            start_step_reverse: DEFAULT_START_STEP,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

impl Profile {
    /// Known motor profiles by engine id; unknown engines get the defaults.
    pub fn for_engine(id: &str) -> Self {
        match id {
            "lourie" => Self {
                start_step_forward: 7.0,
                start_step_reverse: 8.0,
                max_speed: 30.0,
            },
            "test" => Self {
                start_step_forward: 8.0,
                start_step_reverse: 9.0,
                max_speed: 12.0,
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Forward,
    Reverse,
}

impl Heading {
    /// Accepts the cab's `left`/`right` as well as `forward`/`reverse`.
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "left" | "forward" => Some(Heading::Forward),
            "right" | "reverse" => Some(Heading::Reverse),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Heading::Forward => "forward",
            Heading::Reverse => "reverse",
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Heading::Forward => 1.0,
            Heading::Reverse => -1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Locomotive {
    id: String,
    profile: Profile,
    velocity: f64,
    route: Route,
}

impl Locomotive {
    pub fn new(id: &str, max_speed: Option<f64>) -> Self {
        let id = id.trim().to_lowercase();
        let mut profile = Profile::for_engine(&id);
        if let Some(max_speed) = max_speed.filter(|value| value.is_finite() && *value > 0.0) {
            profile.max_speed = max_speed;
        }
        Self {
            id,
            profile,
            velocity: 0.0,
            route: Route::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn max_speed(&self) -> f64 {
        self.profile.max_speed
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Motor step the velocity corresponds to; zero when stationary.
    pub fn step(&self) -> f64 {
        let min_step = if self.velocity > 0.0 {
            self.profile.start_step_forward
        } else if self.velocity < 0.0 {
            self.profile.start_step_reverse
        } else {
            0.0
        };
        min_step + self.velocity.abs() * STEPS_PER_UNIT
    }

    pub fn stop(&mut self) {
        self.velocity = 0.0;
    }

    /// Adds `amount` to the velocity, clamped to `±max_speed`.
    pub fn accelerate(&mut self, amount: f64) {
        let max = self.profile.max_speed;
        self.velocity = (self.velocity + amount).clamp(-max, max);
    }

    /// One unit of acceleration per command.
    pub fn nudge(&mut self, heading: Heading) {
        self.accelerate(heading.sign());
    }

    /// A kick plus a gradual ramp, as driven by the plain HTTP move endpoint.
    pub fn run_up(&mut self, heading: Heading) {
        self.accelerate(RUN_UP_KICK * heading.sign());
        for _ in 0..RUN_UP_STEPS {
            self.accelerate(RUN_UP_INCREMENT * heading.sign());
        }
    }

    pub fn set_route(&mut self, route: Route) {
        self.route = route;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_profiles_and_override() {
        let lourie = Locomotive::new("Lourie", None);
        assert_eq!(lourie.id(), "lourie");
        assert_eq!(lourie.max_speed(), 30.0);

        let custom = Locomotive::new("lourie", Some(55.0));
        assert_eq!(custom.max_speed(), 55.0);

        let unknown = Locomotive::new("flyer", Some(0.0));
        assert_eq!(unknown.max_speed(), DEFAULT_MAX_SPEED);
    }

    #[test]
    fn velocity_is_clamped_both_ways() {
        let mut engine = Locomotive::new("test", None);
        for _ in 0..20 {
            engine.nudge(Heading::Forward);
        }
        assert_eq!(engine.velocity(), 12.0);
        for _ in 0..40 {
            engine.nudge(Heading::Reverse);
        }
        assert_eq!(engine.velocity(), -12.0);
        engine.stop();
        assert_eq!(engine.velocity(), 0.0);
    }

    #[test]
    fn step_uses_direction_specific_start() {
        let mut engine = Locomotive::new("lourie", None);
        assert_eq!(engine.step(), 0.0);
        engine.nudge(Heading::Forward);
        assert_eq!(engine.step(), 8.0);
        engine.nudge(Heading::Reverse);
        engine.nudge(Heading::Reverse);
        assert_eq!(engine.step(), 9.0);
    }

    #[test]
    fn run_up_reaches_fourteen_units() {
        let mut engine = Locomotive::new("flyer", None);
        engine.run_up(Heading::Forward);
        assert!((engine.velocity() - 14.0).abs() < 1e-9);
    }

    #[test]
    fn heading_accepts_cab_directions() {
        assert_eq!(Heading::from_text("left"), Some(Heading::Forward));
        assert_eq!(Heading::from_text("reverse"), Some(Heading::Reverse));
        assert_eq!(Heading::from_text("up"), None);
    }
}
