//! Message-to-audio pipeline.
//!
//! Components:
//! - `tokenizer`: chat text → text runs, `[sample]`, `{n}` and `{.}` tokens
//! - `numbers`: digit runs → spoken words
//! - `segments`: tokens → segments of samples and speech, with effect ids
//! - `effects`: effect ids → capped plan → sox transform chain
//! - `assembler`: segments → intermediate WAVs → final clip
//! - `queue`: multi-producer FIFO into the worker
//! - `worker`: the single consumer loop and its supervisor

pub mod assembler;
pub mod effects;
pub mod numbers;
pub mod queue;
pub mod segments;
pub mod tokenizer;
pub mod worker;
