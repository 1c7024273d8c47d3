//! hta-core: economic modelling and HTA compliance engine.
//!
//! Leaf-first: parameters → calculator → sensitivity / budget impact,
//! registry → compliance, all composed by `engine::Engine`.

pub mod budget_impact;
pub mod calculator;
pub mod compliance;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod parameters;
pub mod registry;
pub mod rng;
pub mod sensitivity;
pub mod snapshot;
pub mod types;
