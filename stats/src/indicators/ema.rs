use crate::error::{Error, Result};
use crate::{Close, Next, Reset};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, Copy)]
pub struct ExponentialMovingAverage {
    length: u32,
    k: f64,
    pub current: f64,
    is_new: bool,
}

impl ExponentialMovingAverage {
    pub fn new(smoothing: f64, length: u32) -> Result<Self> {
        match length {
            0 => Err(Error::InvalidParameter {
                name: "length".to_string(),
                expected: "!= 0".to_string(),
                found: format!("{}", length),
            }),
            _ => {
                let k = smoothing / (length as f64 + 1f64);
                let indicator = Self {
                    length,
                    k,
                    current: 0f64,
                    is_new: true,
                };
                Ok(indicator)
            }
        }
    }

    pub fn length(&self) -> u32 { self.length }
}

impl Next<f64> for ExponentialMovingAverage {
    type Output = f64;

    fn next(&mut self, input: f64) -> Self::Output {
        if self.is_new {
            self.is_new = false;
            self.current = input;
        } else {
            self.current = self.k * input + (1.0 - self.k) * self.current;
        }
        self.current
    }
}

impl<'a, T: Close> Next<&'a T> for ExponentialMovingAverage {
    type Output = f64;

    fn next(&mut self, input: &'a T) -> Self::Output { self.next(input.close()) }
}

impl Reset for ExponentialMovingAverage {
    fn reset(&mut self) {
        self.current = 0.0;
        self.is_new = true;
    }
}

impl Default for ExponentialMovingAverage {
    fn default() -> Self { Self::new(2.0, 9).unwrap() }
}

impl fmt::Display for ExponentialMovingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "EMA({})", self.length) }
}

/// Computes an EMA series over `values`, masking the first `period` entries
/// as missing (warmup) per the engine's "missing" sentinel convention.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut ema = ExponentialMovingAverage::new(2.0, period as u32).expect("period != 0");
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let next = ema.next(v);
            if i + 1 >= period {
                Some(next)
            } else {
                None
            }
        })
        .collect()
}
