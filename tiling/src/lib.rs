//! Host-side tiling for scatter-add kernels.
//!
//! Given the shapes and element types of `var`, `indices` and `updates` plus a
//! [`PlatformProfile`], the planner decides how a scatter-add
//! (`output = var; output[indices[i]] += updates[i]`) is split across parallel units
//! and batched through each unit's fast memory. No tensor data is touched.
//!
//! # Module Organization
//!
//! - [`shape`] - Operand validation and the flattened [`ShapeDescriptor`]
//! - [`strategy`] - Execution model, atomics, sorting and determinism
//! - [`factorize`] - Two-dimensional work split across units
//! - [`budget`] - Largest batch that fits a fast-memory budget
//! - [`footprint`] - Fast-memory footprints of the kernel variants
//! - [`planner`] - Branch planners and the [`ScatterAddPlanner`] pipeline
//! - [`plan`] - Plan data model ([`TilePlan`], [`Strategy`])
//! - [`encode`] - Dispatch key, [`TilingRecord`] and launch parameters
//! - [`invariants`] - Self-check run on every plan
//!
//! # Example
//!
//! ```
//! use tilecraft_dtype::ScalarDType;
//! use tilecraft_tiling::{PlatformProfile, ScatterAddInputs, TensorDesc, plan};
//!
//! let inputs = ScatterAddInputs::new(
//!     TensorDesc::new([1000, 4096], ScalarDType::Float32),
//!     TensorDesc::new([200], ScalarDType::Int32),
//!     TensorDesc::new([200, 4096], ScalarDType::Float32),
//! );
//! let encoded = plan(&inputs, &PlatformProfile::vector_accelerator(), false)?;
//! assert!(encoded.units_to_launch() <= 64);
//! # Ok::<(), tilecraft_tiling::PlanError>(())
//! ```
//!
//! # Environment Variables
//!
//! [`PlannerConfig::from_env`] reads `TILECRAFT_*` overrides for the tuned thresholds.

pub mod budget;
pub mod config;
pub mod encode;
pub mod error;
pub mod factorize;
pub mod footprint;
pub mod invariants;
pub mod math;
pub mod plan;
pub mod planner;
pub mod platform;
pub mod shape;
pub mod strategy;


pub use config::PlannerConfig;
pub use encode::{DispatchKey, EncodedPlan, KernelVariant, TemplateKey, TilingRecord};
pub use error::{PlanError, Result};
pub use plan::{DequantizeBranch, DeterministicTiling, Loop, Split, Strategy, TileGrid, TilePlan};
pub use planner::{ScatterAddPlanner, plan, plan_with_config};
pub use platform::{PlatformProfile, RadixSortScratch, SortScratch};
pub use shape::{ScatterAddInputs, ShapeDescriptor, TensorDesc};
pub use strategy::{ExecutionModel, IndexCast, StrategyDecision};
