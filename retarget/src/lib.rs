//! Batch retargeting of skeletal animation datasets.

pub mod assets;
pub mod chains;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod paths;
pub mod pipeline;
pub mod random;
pub mod rig;
pub mod shard;
pub mod solver;
pub mod worker;

#[cfg(test)]
extern crate self as retarget;

#[cfg(test)]
mod fixtures;

pub use self::{
    assets::{AssetError, AssetFile, AssetStore, MemoryAssetStore, RonAssetStore},
    chains::{build_definition, infer_chains, ChainError},
    config::{Config, PipelineConfig},
    coordinator::{run_all, CoordinatorError, CoordinatorOptions, LaunchMode},
    dataset::Subset,
    pipeline::{PairError, RetargetJob, Retargeter},
    rig::{BoneChain, RetargetDefinition, RetargetProfile},
    shard::WorkerShard,
    solver::{ChainFkSolver, PoseSolver, SolverError, SolverSession},
    worker::{run_shard, run_worker, WorkerReport},
};
