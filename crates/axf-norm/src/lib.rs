#![doc = "Norm evaluator capability used by strong-mode soundness checks."]

pub mod evaluator;
pub mod expr;
pub mod stub;

pub use evaluator::{
    round_to_precision, NormEstimate, NormEvaluator, NormRequest, SampledNormEvaluator,
    SampledOpts, DEFAULT_PRECISION_BITS, MAX_PRECISION_BITS,
};
pub use expr::Expr;
pub use stub::{FixedAnswer, FixedNormEvaluator};
