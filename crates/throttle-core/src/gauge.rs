pub const MIN_VALUE: f64 = 0.0;
pub const TICK_INTERVAL: f64 = 10.0;
pub const DEFAULT_MAXIMUM: f64 = 100.0;
/// Tick intervals widen tenfold until a scale needs at most this many steps.
pub const MAX_TICK_STEPS: f64 = 100.0;
const DANGER_PERCENT: f64 = 85.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeConfig {
    pub min_value: f64,
    pub max_value: f64,
    pub major_ticks: Vec<f64>,
    pub danger_zone: (f64, f64),
}

impl GaugeConfig {
    pub fn for_maximum(maximum: f64) -> Self {
        let max_value = maximum.abs();
        Self {
            min_value: MIN_VALUE,
            max_value,
            major_ticks: major_ticks(max_value),
            danger_zone: (max_value * DANGER_PERCENT / 100.0, max_value),
        }
    }

    pub fn clamp(&self, velocity: f64) -> f64 {
        velocity.abs().clamp(self.min_value, self.max_value)
    }

    pub fn in_danger_zone(&self, value: f64) -> bool {
        value >= self.danger_zone.0 && value <= self.danger_zone.1 && self.max_value > 0.0
    }
}

/// Multiples of the tick interval up to `max_value`, closed by `max_value`
/// itself when it falls between two multiples.
fn major_ticks(max_value: f64) -> Vec<f64> {
    let interval = tick_interval(max_value);
    let whole = (max_value / interval).floor() as u64;
    let mut ticks: Vec<f64> = (0..=whole).map(|i| i as f64 * interval).collect();
    if let Some(last) = ticks.last() {
        if *last < max_value {
            ticks.push(max_value);
        }
    }
    ticks
}

pub fn tick_interval(max_value: f64) -> f64 {
    let mut interval = TICK_INTERVAL;
    while max_value / interval > MAX_TICK_STEPS {
        interval *= 10.0;
    }
    interval
}

/// Rendering seam for the speed display. The controller only ever writes to it.
pub trait GaugeBackend {
    fn configure(&mut self, config: &GaugeConfig);
    fn set_value(&mut self, value: f64);
}

#[derive(Debug)]
pub struct GaugeController<B> {
    config: GaugeConfig,
    value: f64,
    backend: B,
}

impl<B: GaugeBackend> GaugeController<B> {
    pub fn new(mut backend: B, default_maximum: f64) -> Self {
        let config = GaugeConfig::for_maximum(default_maximum);
        backend.configure(&config);
        backend.set_value(MIN_VALUE);
        Self {
            config,
            value: MIN_VALUE,
            backend,
        }
    }

    /// Applies a controller-reported maximum. Returns false when the value is
    /// unusable and the gauge was left as it was.
    pub fn on_init(&mut self, maximum: f64) -> bool {
        let max_value = maximum.abs();
        if !max_value.is_finite() || max_value == 0.0 {
            return false;
        }
        self.config = GaugeConfig::for_maximum(max_value);
        self.backend.configure(&self.config);
        let clamped = self.config.clamp(self.value);
        if clamped != self.value {
            self.value = clamped;
            self.backend.set_value(self.value);
        }
        true
    }

    pub fn on_ack(&mut self, velocity: f64) -> bool {
        if velocity.is_nan() {
            return false;
        }
        self.value = self.config.clamp(velocity);
        self.backend.set_value(self.value);
        true
    }

    pub fn config(&self) -> &GaugeConfig {
        &self.config
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn in_danger_zone(&self) -> bool {
        self.config.in_danger_zone(self.value)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingGauge {
        configs: Vec<GaugeConfig>,
        values: Vec<f64>,
    }

    impl GaugeBackend for RecordingGauge {
        fn configure(&mut self, config: &GaugeConfig) {
            self.configs.push(config.clone());
        }

        fn set_value(&mut self, value: f64) {
            self.values.push(value);
        }
    }

    #[test]
    fn init_configures_ticks_and_danger_zone() {
        let mut gauge = GaugeController::new(RecordingGauge::default(), DEFAULT_MAXIMUM);
        assert!(gauge.on_init(120.0));

        let config = gauge.config();
        assert_eq!(config.min_value, 0.0);
        assert_eq!(config.max_value, 120.0);
        let expected: Vec<f64> = (0..=12).map(|i| i as f64 * 10.0).collect();
        assert_eq!(config.major_ticks, expected);
        assert_eq!(config.danger_zone, (102.0, 120.0));
        assert_eq!(gauge.backend().configs.last(), Some(config));
    }

    #[test]
    fn partial_final_tick_is_kept() {
        let config = GaugeConfig::for_maximum(-45.0);
        assert_eq!(config.max_value, 45.0);
        assert_eq!(config.major_ticks, vec![0.0, 10.0, 20.0, 30.0, 40.0, 45.0]);
        assert_eq!(config.danger_zone.1, 45.0);
        assert!((config.danger_zone.0 - 38.25).abs() < 1e-9);
    }

    #[test]
    fn ack_value_is_absolute_and_clamped() {
        let mut gauge = GaugeController::new(RecordingGauge::default(), DEFAULT_MAXIMUM);
        gauge.on_init(120.0);
        for (velocity, expected) in [(-45.0, 45.0), (30.5, 30.5), (500.0, 120.0), (-500.0, 120.0), (0.0, 0.0)] {
            assert!(gauge.on_ack(velocity));
            assert_eq!(gauge.value(), expected);
            assert_eq!(gauge.backend().values.last(), Some(&expected));
        }
    }

    #[test]
    fn large_maximum_is_accepted_with_wider_ticks() {
        let mut gauge = GaugeController::new(RecordingGauge::default(), DEFAULT_MAXIMUM);
        assert!(gauge.on_init(20_000.0));
        assert!(gauge.on_ack(-15_000.0));
        assert_eq!(gauge.config().max_value, 20_000.0);
        assert_eq!(gauge.value(), 15_000.0);

        let ticks = &gauge.config().major_ticks;
        assert_eq!(ticks.len(), 21);
        assert_eq!(ticks[1], 1_000.0);
        assert_eq!(ticks.last(), Some(&20_000.0));
        assert_eq!(tick_interval(1_000.0), TICK_INTERVAL);
    }

    #[test]
    fn lowering_the_maximum_reclamps_current_value() {
        let mut gauge = GaugeController::new(RecordingGauge::default(), DEFAULT_MAXIMUM);
        gauge.on_ack(90.0);
        gauge.on_init(50.0);
        assert_eq!(gauge.value(), 50.0);
        assert!(gauge.in_danger_zone());
    }

    #[test]
    fn unusable_maximum_and_nan_velocity_are_ignored() {
        let mut gauge = GaugeController::new(RecordingGauge::default(), DEFAULT_MAXIMUM);
        assert!(!gauge.on_init(0.0));
        assert!(!gauge.on_init(f64::INFINITY));
        assert!(!gauge.on_init(f64::NAN));
        assert_eq!(gauge.config().max_value, DEFAULT_MAXIMUM);
        assert!(!gauge.on_ack(f64::NAN));
        assert_eq!(gauge.value(), 0.0);
        assert_eq!(gauge.backend().configs.len(), 1);
    }
}
