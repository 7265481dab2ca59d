use std::ops::RangeFull;

/// Which steps a plan accessor reports on. Indices are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StepSelection {
    #[default]
    All,
    Steps(Vec<usize>),
}

impl StepSelection {
    pub fn contains(&self, i: usize) -> bool {
        match self {
            StepSelection::All => true,
            StepSelection::Steps(steps) => steps.contains(&i),
        }
    }
}

impl From<usize> for StepSelection {
    fn from(i: usize) -> Self {
        StepSelection::Steps(vec![i])
    }
}

impl From<Vec<usize>> for StepSelection {
    fn from(steps: Vec<usize>) -> Self {
        StepSelection::Steps(steps)
    }
}

impl From<&[usize]> for StepSelection {
    fn from(steps: &[usize]) -> Self {
        StepSelection::Steps(steps.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for StepSelection {
    fn from(steps: [usize; N]) -> Self {
        StepSelection::Steps(steps.to_vec())
    }
}

impl From<RangeFull> for StepSelection {
    fn from(_: RangeFull) -> Self {
        StepSelection::All
    }
}
