//! Machine teaching: a teacher chooses which rows of a labeled dataset a
//! learner trains on, watches how the learner labels rows it picks, and
//! keeps feeding it examples until it has nothing more to send or the time
//! budget runs out.
//!
//! ```no_run
//! use machine_teacher::config::{DoubleParams, TeachOptions};
//! use machine_teacher::dataset::Dataset;
//! use machine_teacher::learners::NearestNeighborLearner;
//! use machine_teacher::protocol::teach;
//! use machine_teacher::teachers::DoubleTeacher;
//! use ndarray::{Array1, Array2};
//!
//! let x = Array2::<f32>::zeros((4, 2));
//! let y = Array1::from_vec(vec![0, 1, 0, 1]);
//! let dataset = Dataset::new("toy", x, y).unwrap();
//! let mut teacher = DoubleTeacher::new(DoubleParams::default());
//! let learner = Box::new(NearestNeighborLearner::new());
//! let result = teach(&mut teacher, learner, &dataset, None, &TeachOptions::default()).unwrap();
//! println!("{}", result);
//! ```
pub mod clock;
pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod io;
pub mod learners;
pub mod protocol;
pub mod report;
pub mod result;
pub mod sampler;
pub mod teachers;
pub mod timer;

pub use error::TeachingError;
pub use protocol::{teach, teach_with_clock};
pub use result::TeachingResult;
