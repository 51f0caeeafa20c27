//! Acoustic model and scoring.
//!
//! Bottom-up: parameter pools feed [`MixtureComponent`]s, which are combined
//! into senones ([`GaussianMixture`], [`CompositeSenone`]), which are bound to
//! the states of per-unit [`SenoneHmm`]s. All of it is immutable once built and
//! shared between decoding threads.

pub mod composite_senone;
pub mod gaussian_mixture;
pub mod hmm;
pub mod hmm_manager;
pub mod loader;
pub mod logmath;
pub mod mixture_component;
pub mod pool;
pub mod senone;
pub mod simd;
pub mod unit;

pub use composite_senone::{CompositeScorePolicy, CompositeSenone};
pub use gaussian_mixture::{GaussianMixture, GaussianWeights};
pub use hmm::{HmmPosition, HmmStateArc, SenoneHmm, SenoneHmmState, SenoneSequence, TransitionMatrix};
pub use hmm_manager::{HmmKey, HmmManager, HmmPool};
pub use loader::{ModelBuilder, ModelLoader, ModelPools};
pub use logmath::LogMath;
pub use mixture_component::{MixtureComponent, Transform};
pub use pool::{Pool, PoolFeature};
pub use senone::{Data, ScoreCache, Senone};
pub use unit::{Context, Unit, UnitManager};
