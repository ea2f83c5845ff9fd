//! Finite-element analysis solver core.
//!
//! Owns the mesh/material/boundary-condition/load data model, element
//! kernels and Gauss-quadrature integration, global sparse assembly,
//! and the linear, non-linear, modal, dynamic, and thermal solvers
//! built on top of it.

pub mod analysis;
pub mod assembly;
pub mod bc_application;
pub mod conditions;
pub mod dynamic_solver;
pub mod elements;
pub mod error;
pub mod linear_solver;
pub mod materials;
pub mod mesh;
pub mod modal_solver;
pub mod nonlinear_solver;
pub mod progress;
pub mod results;
pub mod settings;
pub mod thermal_solver;

pub use analysis::{SolverKind, StaticAnalysis};
pub use conditions::{Axis, BoundaryCondition, Load, TimeVariation};
pub use dynamic_solver::DynamicAnalysis;
pub use error::{FeaError, Result};
pub use materials::{Material, MaterialHandle, MaterialLibrary, MaterialModel};
pub use mesh::{DofScheme, Element, ElementGroup, ElementKind, Mesh, Node, NodeGroup};
pub use modal_solver::{Mode, ModalAnalysis};
pub use nonlinear_solver::NonlinearAnalysis;
pub use progress::{CancellationToken, NoOpProgress, ProgressSink};
pub use results::ResultContainer;
pub use settings::{
    DynamicSettings, NonlinearMethod, NonlinearSettings, NonlinearityType, ThermalAnalysisType,
    ThermalSettings, ThermalTimeIntegrationMethod, TimeIntegrationMethod,
};
pub use thermal_solver::ThermalAnalysis;
