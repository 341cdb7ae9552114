use rand::Rng;

use crate::error::Result;

pub mod samplers;

/// Trait for Markov Chain Monte Carlo Samplers.
///
/// A sampler takes ownership of the current model, advances it by one transition given the
/// data and hands it back.
pub trait Sampler<M, D: ?Sized>: Sized {
    /// Step the Sampler.
    ///
    /// # Errors
    /// Only for structural failures (e.g. an exhausted slot budget); statistical corner cases
    /// are handled inside the transition.
    fn step<R: Rng>(&mut self, model: M, data: &D, rng: &mut R) -> Result<M>;

    /// Take `steps` steps in a row, e.g. for warm-up.
    ///
    /// # Errors
    /// The first error from [`Sampler::step`].
    fn multi_step<R: Rng>(&mut self, model: M, data: &D, steps: usize, rng: &mut R) -> Result<M> {
        (0..steps).try_fold(model, |acc, _| self.step(acc, data, rng))
    }

    fn iter<'a, R: Rng>(
        &'a mut self,
        model: M,
        data: &'a D,
        rng: &'a mut R,
    ) -> SamplerIter<'a, M, D, Self, R>
    where
        M: Clone + 'a,
    {
        SamplerIter {
            sampler: self,
            model: Some(model),
            data,
            rng,
        }
    }
}

/// Endless iterator over successive models. Stops after yielding the first error.
pub struct SamplerIter<'a, M, D, S, R>
where
    D: ?Sized,
    S: Sampler<M, D>,
    R: Rng,
{
    sampler: &'a mut S,
    model: Option<M>,
    data: &'a D,
    rng: &'a mut R,
}

impl<'a, M, D, S, R> Iterator for SamplerIter<'a, M, D, S, R>
where
    D: ?Sized,
    S: Sampler<M, D>,
    M: Clone + 'a,
    R: Rng,
{
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        let model = self.model.take()?;
        match self.sampler.step(model, self.data, self.rng) {
            Ok(model) => {
                self.model = Some(model.clone());
                Some(Ok(model))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::Sampler;
    use crate::error::{Error, Result};

    /// Adds the first datum to the model; fails once the model passes a bound.
    struct Counter {
        bound: usize,
    }

    impl Sampler<usize, [usize]> for Counter {
        fn step<R: Rng>(&mut self, model: usize, data: &[usize], _rng: &mut R) -> Result<usize> {
            let next = model + data[0];
            if next > self.bound {
                Err(Error::CapacityExceeded {
                    capacity: self.bound,
                })
            } else {
                Ok(next)
            }
        }
    }

    #[test]
    fn multi_step_folds() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let mut sampler = Counter { bound: 100 };

        let data = [3_usize];

        assert_eq!(sampler.multi_step(0, &data[..], 10, &mut rng).unwrap(), 30);
        assert!(sampler.multi_step(0, &data[..], 40, &mut rng).is_err());
    }

    #[test]
    fn iter_stops_after_error() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let mut sampler = Counter { bound: 10 };
        let data = [4_usize];

        let steps: Vec<Result<usize>> = sampler.iter(0, &data[..], &mut rng).collect();
        assert_eq!(steps.len(), 3);
        assert_eq!(*steps[0].as_ref().unwrap(), 4);
        assert_eq!(*steps[1].as_ref().unwrap(), 8);
        assert!(steps[2].is_err());
    }
}
