/// Exponential Moving Average with incremental state.
///
/// The first observation seeds the average; each later one applies
/// `ema = alpha * value + (1 - alpha) * ema_prev` with `alpha = 2 / (span + 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    span: usize,
    alpha: f64,
    value: f64,
    initialized: bool,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        assert!(span > 0, "EMA span must be > 0");
        Self {
            span,
            alpha: 2.0 / (span as f64 + 1.0),
            value: 0.0,
            initialized: false,
        }
    }

    /// The value `push(value)` would produce, without mutating state.
    pub fn peek(&self, value: f64) -> f64 {
        if self.initialized {
            self.alpha * value + (1.0 - self.alpha) * self.value
        } else {
            value
        }
    }

    /// Push a new value and return the updated average.
    pub fn push(&mut self, value: f64) -> f64 {
        self.value = self.peek(value);
        self.initialized = true;
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.initialized.then_some(self.value)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_push_seeds_value() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.value(), None);
        assert!((ema.push(2.0) - 2.0).abs() < f64::EPSILON);
        assert!(ema.is_initialized());
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut ema = Ema::new(3);
        ema.push(10.0);
        let peeked = ema.peek(20.0);
        assert!((peeked - 15.0).abs() < f64::EPSILON);
        assert_eq!(ema.value(), Some(10.0));
    }
}
