use std::sync::Arc;

use anyhow::{bail, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};
use serde_json::json;

use crate::config::{GbdtParams, Params};
use crate::error::TeachingError;
use crate::learners::Learner;

/// Gradient Boosting Decision Tree (GBDT) learner for binary labels.
///
/// Labels 0/1 are trained as -1/+1 under the log-likelihood loss; a
/// predicted probability of at least 0.5 maps back to class 1.
#[derive(Clone)]
pub struct GbdtLearner {
    model: Option<Arc<GBDT>>,
    params: GbdtParams,
}

impl GbdtLearner {
    pub fn new(params: GbdtParams) -> Self {
        GbdtLearner {
            model: None,
            params,
        }
    }

    fn to_data(x: &Array2<f32>, y: Option<&Array1<usize>>) -> DataVec {
        let mut data = DataVec::new();
        for (i, row) in x.rows().into_iter().enumerate() {
            let label = match y {
                Some(y) if y[i] == 1 => 1.0,
                Some(_) => -1.0,
                None => 0.0,
            };
            data.push(Data::new_training_data(row.to_vec(), 1.0, label, None));
        }
        data
    }
}

impl Learner for GbdtLearner {
    fn name(&self) -> &str {
        "GBDTLearner"
    }

    fn start(&mut self) -> Result<()> {
        self.model = None;
        Ok(())
    }

    fn fit(&mut self, x: &Array2<f32>, y: &Array1<usize>) -> Result<()> {
        if x.nrows() == 0 {
            bail!("GBDTLearner cannot be fitted on an empty training set");
        }
        if let Some(&label) = y.iter().find(|&&label| label > 1) {
            bail!(
                "GBDTLearner only supports binary labels, found label {}",
                label
            );
        }

        let mut config = Config::new();
        config.set_feature_size(x.ncols());
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(self.params.max_depth);
        config.set_iterations(self.params.num_boost_round as usize);
        config.set_debug(self.params.debug);
        config.set_training_optimization_level(self.params.training_optimization_level);
        config.set_loss("LogLikelyhood");

        let mut gbdt = GBDT::new(&config);
        let mut train_x = Self::to_data(x, Some(y));
        gbdt.fit(&mut train_x);

        log::trace!("GBDTLearner fitted on {} rows", x.nrows());
        self.model = Some(Arc::new(gbdt));
        Ok(())
    }

    fn predict(&self, x: &Array2<f32>) -> Result<Array1<usize>> {
        let model = match &self.model {
            Some(model) => model,
            None => return Err(TeachingError::NotFitted(self.name().to_string()).into()),
        };
        let test_x = Self::to_data(x, None);
        let probabilities = model.predict(&test_x);
        Ok(probabilities
            .iter()
            .map(|&p| if p >= 0.5 { 1 } else { 0 })
            .collect())
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("learning_rate".to_string(), json!(self.params.learning_rate));
        params.insert("max_depth".to_string(), json!(self.params.max_depth));
        params.insert("num_boost_round".to_string(), json!(self.params.num_boost_round));
        params.insert(
            "training_optimization_level".to_string(),
            json!(self.params.training_optimization_level),
        );
        params
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}
