//! Selection settings.

/// Settings of [`crate::selection::MutantSelection`].
///
/// The relaxation factors multiply the score of a dependent each time a
/// mutant is picked, so smaller factors push dependents further down.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Greedy selection stops once no remaining score reaches this value
    pub threshold: f64,
    /// Factor applied to the other mutants of the picked mutant's statement
    pub tie_relaxation: f64,
    /// Factor applied to data dependents and dependees
    pub data_relaxation: f64,
    /// Factor applied to control dependents and dependees
    pub control_relaxation: f64,
    /// Seed for random selection; `None` seeds from the operating system
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            tie_relaxation: 0.25,
            data_relaxation: 0.75,
            control_relaxation: 0.75,
            seed: None,
        }
    }
}

impl SelectionConfig {
    /// The default settings with a fixed random seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}
