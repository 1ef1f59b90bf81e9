#![deny(dead_code)]
#![deny(unused_imports)]

pub mod estimator;
pub mod folds;
pub mod forest;
pub mod grid;
pub mod metrics;
pub mod oversample;
pub mod scaler;
pub mod svm;

pub use estimator::{Classifier, ClassifierSpec, LearnError, PipelineSpec, Preprocessing};
pub use folds::StratifiedKFold;
pub use oversample::Adasyn;
pub use svm::{Kernel, Svc, SvcParams};
