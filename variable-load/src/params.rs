//! Declarative workload parameters and the [`DemandBuilder`].
//!
//! A workload is described by a space separated list of `key=value` pairs, for example:
//!
//! ```text
//! cnt=5 amp=300,10-20,500-1000 period=30-60 shift=0-1 supp=0.3 rand=42
//! ```
//!
//! `amp`, `period` and `shift` take a comma separated list where every entry is either a
//! literal value or a `low-high` range. Entries are consumed one per component; once the list
//! runs out, the last entry is reused for all remaining components. Ranges are resolved by
//! sampling uniformly from a seeded random number generator, so a fixed `rand` seed always
//! yields the same demand curve.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::demand::{DemandFunction, SineComponent};
use crate::error::ConfigError;

/// Default number of sinusoidal components.
pub const DEFAULT_COUNT: i64 = 3;
/// Default amplitude range in operations per second.
pub const DEFAULT_AMPLITUDE: &str = "500-1000";
/// Default period range in seconds.
pub const DEFAULT_PERIOD: &str = "30-60";
/// Default phase shift range as a fraction of a full cycle.
pub const DEFAULT_SHIFT: &str = "0-1";
/// Default support coefficient.
pub const DEFAULT_SUPPORT: f64 = 1.0;

const KNOWN_KEYS: &[&str] = &[
    "cnt", "amp", "period", "shift", "supp", "rand", "name", "iodepth", "backlog",
];

/// A parsed set of `key=value` workload parameters.
///
/// Tokens without a `=` are ignored. If a key is given more than once, the last value wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkloadParams {
    values: BTreeMap<String, String>,
}

impl WorkloadParams {
    /// Returns the raw value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parses a parameter into `T`, returning `None` if it is not set.
    pub fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                value.parse().map_err(|_| ConfigError::InvalidNumber {
                    key,
                    value: value.to_owned(),
                })
            })
            .transpose()
    }

    /// Returns all keys that are not understood by the load generator.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|key| !KNOWN_KEYS.contains(key))
    }
}

impl FromStr for WorkloadParams {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .filter_map(|token| token.split_once('='))
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();

        Ok(Self { values })
    }
}

/// A builder for a [`DemandFunction`] made of randomized sinusoidal components.
#[derive(Debug, Clone)]
pub struct DemandBuilder {
    count: i64,
    amplitude: String,
    period: String,
    shift: String,
    support: f64,
    seed: Option<u64>,
}

impl Default for DemandBuilder {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            amplitude: DEFAULT_AMPLITUDE.to_owned(),
            period: DEFAULT_PERIOD.to_owned(),
            shift: DEFAULT_SHIFT.to_owned(),
            support: DEFAULT_SUPPORT,
            seed: None,
        }
    }
}

impl DemandBuilder {
    /// Creates a builder with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from workload parameters, using defaults for everything not given.
    pub fn from_params(params: &WorkloadParams) -> Result<Self, ConfigError> {
        let mut builder = Self::new();

        if let Some(count) = params.parse("cnt")? {
            builder = builder.count(count);
        }
        if let Some(amplitude) = params.get("amp") {
            builder = builder.amplitude(amplitude);
        }
        if let Some(period) = params.get("period") {
            builder = builder.period(period);
        }
        if let Some(shift) = params.get("shift") {
            builder = builder.shift(shift);
        }
        if let Some(support) = params.parse("supp")? {
            builder = builder.support(support);
        }
        if let Some(seed) = params.parse("rand")? {
            builder = builder.seed(seed);
        }

        Ok(builder)
    }

    /// The number of sinusoidal components.
    pub fn count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    /// Amplitudes in operations per second, as a list of values or ranges.
    pub fn amplitude(mut self, amplitude: impl Into<String>) -> Self {
        self.amplitude = amplitude.into();
        self
    }

    /// Periods in seconds, as a list of values or ranges.
    pub fn period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    /// Phase shifts as fractions of a full cycle, as a list of values or ranges.
    pub fn shift(mut self, shift: impl Into<String>) -> Self {
        self.shift = shift.into();
        self
    }

    /// The support coefficient shared by all components.
    pub fn support(mut self, support: f64) -> Self {
        self.support = support;
        self
    }

    /// Seed for resolving ranges. Without a seed, a random one is chosen.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Resolves all ranges and creates the demand function.
    pub fn build(self) -> Result<DemandFunction, ConfigError> {
        let count =
            usize::try_from(self.count).map_err(|_| ConfigError::NegativeCount(self.count))?;
        let support = finite("supp", self.support)?;

        let seed = self.seed.unwrap_or_else(rand::random);
        tracing::debug!(seed, count, "resolving demand components");
        let mut rng = SmallRng::seed_from_u64(seed);

        let amplitudes = resolve("amp", &self.amplitude, count, &mut rng)?;
        let periods = resolve("period", &self.period, count, &mut rng)?;
        let shifts = resolve("shift", &self.shift, count, &mut rng)?;

        let components = amplitudes
            .into_iter()
            .zip(periods)
            .zip(shifts)
            .map(|((amplitude, period), shift)| {
                if finite("amp", amplitude)? <= 0.0 {
                    return Err(ConfigError::NonPositiveAmplitude(amplitude));
                }
                if finite("period", period)? <= 0.0 {
                    return Err(ConfigError::NonPositivePeriod(period));
                }
                finite("shift", shift)?;

                // Extreme periods degenerate the frequency to zero or infinity.
                let frequency = TAU / period;
                if !frequency.is_finite() || frequency <= 0.0 {
                    return Err(ConfigError::OutOfRange {
                        key: "period",
                        value: period,
                    });
                }
                Ok(SineComponent::from_period(amplitude, period, shift))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let function = DemandFunction::new(components, support);
        if !function.is_finite() {
            let value = function
                .components()
                .iter()
                .map(SineComponent::amplitude)
                .fold(0.0, f64::max);
            return Err(ConfigError::OutOfRange { key: "amp", value });
        }
        Ok(function)
    }
}

/// A literal value or an inclusive `low-high` range.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Range {
    low: f64,
    high: f64,
}

impl Range {
    fn parse(key: &'static str, entry: &str) -> Result<Self, ConfigError> {
        let number = |value: &str| {
            value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidNumber {
                key,
                value: entry.to_owned(),
            })
        };

        let endpoints: Vec<_> = entry.split('-').collect();
        match endpoints.as_slice() {
            [value] => {
                let value = number(value)?;
                Ok(Self {
                    low: value,
                    high: value,
                })
            }
            [low, high] => Ok(Self {
                low: number(low)?,
                high: number(high)?,
            }),
            _ => Err(ConfigError::TooManyEndpoints {
                key,
                value: entry.to_owned(),
            }),
        }
    }

    fn sample(&self, rng: &mut SmallRng) -> f64 {
        self.low + (self.high - self.low) * rng.random::<f64>()
    }
}

fn finite(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { key, value })
    }
}

/// Resolves `count` values from a comma separated list of values and ranges.
fn resolve(
    key: &'static str,
    list: &str,
    count: usize,
    rng: &mut SmallRng,
) -> Result<Vec<f64>, ConfigError> {
    let entries: Vec<_> = list.split(',').collect();
    let last = entries.len() - 1;

    (0..count)
        .map(|index| {
            let range = Range::parse(key, entries[index.min(last)])?;
            Ok(range.sample(rng))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use super::*;

    fn params(s: &str) -> WorkloadParams {
        s.parse().unwrap()
    }

    #[test]
    fn parses_key_value_pairs() {
        let params = params("cnt=5  amp=300,10-20 bogus supp=0.3 cnt=2");
        assert_eq!(params.get("cnt"), Some("2"));
        assert_eq!(params.get("amp"), Some("300,10-20"));
        assert_eq!(params.get("supp"), Some("0.3"));
        assert_eq!(params.get("bogus"), None);
        assert_eq!(params.parse::<f64>("supp").unwrap(), Some(0.3));
    }

    #[test]
    fn reports_unknown_keys() {
        let params = params("cnt=1 speed=fast iodepth=4");
        assert_eq!(params.unknown_keys().collect::<Vec<_>>(), ["speed"]);
    }

    #[test]
    fn defaults_produce_three_components() {
        let function = DemandBuilder::new().seed(7).build().unwrap();
        assert_eq!(function.components().len(), 3);
        assert_eq!(function.support(), 1.0);

        for component in function.components() {
            assert!((500.0..=1000.0).contains(&component.amplitude()));
            assert!((30.0 - 1e-9..=60.0 + 1e-9).contains(&component.period()));
            assert!((0.0..=TAU).contains(&component.phase_shift()));
        }
    }

    #[test]
    fn reuses_last_entry() {
        let function = DemandBuilder::from_params(&params("cnt=4 amp=300,10-20,700 period=10"))
            .unwrap()
            .build()
            .unwrap();

        let amplitudes: Vec<_> = function.components().iter().map(|c| c.amplitude()).collect();
        assert_eq!(amplitudes.len(), 4);
        assert_eq!(amplitudes[0], 300.0);
        assert!((10.0..=20.0).contains(&amplitudes[1]));
        assert_eq!(amplitudes[2], 700.0);
        assert_eq!(amplitudes[3], 700.0);

        for component in function.components() {
            assert!((component.angular_frequency() - TAU / 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn literal_values() {
        let function =
            DemandBuilder::from_params(&params("cnt=1 amp=100 period=62.83 shift=0.25 supp=0.5"))
                .unwrap()
                .build()
                .unwrap();

        let component = function.components()[0];
        assert_eq!(component.amplitude(), 100.0);
        assert!((component.angular_frequency() - TAU / 62.83).abs() < 1e-12);
        assert!((component.phase_shift() - TAU / 4.0).abs() < 1e-12);
        assert_eq!(function.support(), 0.5);
    }

    #[test]
    fn same_seed_same_curve() {
        let a = DemandBuilder::from_params(&params("rand=1234")).unwrap().build().unwrap();
        let b = DemandBuilder::from_params(&params("rand=1234")).unwrap().build().unwrap();
        let c = DemandBuilder::from_params(&params("rand=4321")).unwrap().build().unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zero_components() {
        let function = DemandBuilder::new().count(0).build().unwrap();
        assert!(function.components().is_empty());
        assert_eq!(function.evaluate(50.0), 0.0);
    }

    #[test]
    fn rejects_bad_input() {
        let err = DemandBuilder::new().amplitude("1-2-3").build().unwrap_err();
        assert!(matches!(err, ConfigError::TooManyEndpoints { key: "amp", .. }));

        let err = DemandBuilder::new()
            .count(1)
            .period("0")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NonPositivePeriod(0.0));

        let err = DemandBuilder::new().count(-1).build().unwrap_err();
        assert_eq!(err, ConfigError::NegativeCount(-1));

        let err = DemandBuilder::new().shift("a-b").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "shift", .. }));

        let err = DemandBuilder::new().amplitude("0").build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveAmplitude(0.0));

        let err = DemandBuilder::from_params(&params("cnt=three")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "cnt", .. }));
    }

    #[test]
    fn rejects_non_finite_values() {
        let tiny = format!("0.{}1", "0".repeat(320));
        for period in ["1e999", "inf", "NaN", "inf-inf", "1-1e999", tiny.as_str()] {
            let err = DemandBuilder::new()
                .count(1)
                .period(period)
                .build()
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::OutOfRange { key: "period", .. }),
                "{period}: {err:?}"
            );
        }

        let err = DemandBuilder::new()
            .count(1)
            .amplitude("inf")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "amp", .. }));

        let err = DemandBuilder::new()
            .count(1)
            .shift("NaN")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "shift", .. }));

        let err = DemandBuilder::from_params(&params("cnt=1 supp=inf"))
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "supp", .. }));

        let err = DemandBuilder::new()
            .count(2)
            .amplitude("1e308")
            .period("1e300")
            .shift("0")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "amp", .. }));
    }
}
