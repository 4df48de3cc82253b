mod experiment;
mod no_op;
mod run;
mod train;

pub use experiment::run_experiment;
pub use no_op::no_op;
pub use run::{
    evaluate,
    inference,
};
pub use train::{
    train,
    TrainReport,
};
