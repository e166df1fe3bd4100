use crate::config::LearnerType;
use crate::learners::{GbdtLearner, Learner, NearestCentroidLearner, NearestNeighborLearner};

/// Build a boxed learner from its registry entry.
pub fn build_learner(learner_type: LearnerType) -> Box<dyn Learner> {
    match learner_type {
        LearnerType::Gbdt(params) => Box::new(GbdtLearner::new(params)),
        LearnerType::NearestCentroid => Box::new(NearestCentroidLearner::new()),
        LearnerType::NearestNeighbor => Box::new(NearestNeighborLearner::new()),
    }
}
