//! Typed, validated settings records (C14, ambient).
//!
//! Every solver entry point calls `validate()` as its first step,
//! before any mesh or group is touched, so a rejected settings record
//! never causes partial work (§4.10).

use serde::{Deserialize, Serialize};

use crate::error::{FeaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonlinearMethod {
    NewtonRaphson,
    ModifiedNewtonRaphson,
    QuasiNewton,
    ArcLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonlinearityType {
    Geometric,
    Material,
    Contact,
    Combined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonlinearSettings {
    pub method: NonlinearMethod,
    pub nonlinearity_type: NonlinearityType,
    pub convergence_tolerance: f64,
    pub max_iterations: usize,
    pub load_increment_factor: f64,
    pub num_load_steps: usize,
    pub adaptive_load_stepping: bool,
    pub min_load_step_size: f64,
    pub max_load_step_size: f64,
    pub arc_length_parameter: f64,
    pub use_line_search: bool,
    pub line_search_tolerance: f64,
    pub max_line_search_iterations: usize,
}

impl Default for NonlinearSettings {
    fn default() -> Self {
        Self {
            method: NonlinearMethod::NewtonRaphson,
            nonlinearity_type: NonlinearityType::Geometric,
            convergence_tolerance: 1e-6,
            max_iterations: 20,
            load_increment_factor: 0.1,
            num_load_steps: 10,
            adaptive_load_stepping: false,
            min_load_step_size: 1e-4,
            max_load_step_size: 0.5,
            arc_length_parameter: 1.0,
            use_line_search: false,
            line_search_tolerance: 0.5,
            max_line_search_iterations: 5,
        }
    }
}

impl NonlinearSettings {
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(FeaError::InvalidSettings(msg.to_string()));
        if !(self.convergence_tolerance > 0.0) {
            return bad("convergence_tolerance must be > 0");
        }
        if self.max_iterations == 0 {
            return bad("max_iterations must be > 0");
        }
        if !(self.load_increment_factor > 0.0 && self.load_increment_factor <= 1.0) {
            return bad("load_increment_factor must lie in (0, 1]");
        }
        if self.num_load_steps == 0 {
            return bad("num_load_steps must be >= 1");
        }
        if !(self.arc_length_parameter > 0.0) {
            return bad("arc_length_parameter must be > 0");
        }
        if !(self.line_search_tolerance > 0.0 && self.line_search_tolerance < 1.0) {
            return bad("line_search_tolerance must lie in (0, 1)");
        }
        if self.max_line_search_iterations == 0 {
            return bad("max_line_search_iterations must be >= 1");
        }
        if self.adaptive_load_stepping && !(self.min_load_step_size > 0.0 && self.min_load_step_size <= self.max_load_step_size) {
            return bad("min_load_step_size must be > 0 and <= max_load_step_size");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeIntegrationMethod {
    Newmark,
    HhtAlpha,
    CentralDifference,
    WilsonTheta,
    Bathe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicSettings {
    pub method: TimeIntegrationMethod,
    /// Newmark `beta`/`gamma`; also the base parameters HHT-alpha derives
    /// its own beta/gamma from.
    pub beta: f64,
    pub gamma: f64,
    pub hht_alpha: f64,
    pub wilson_theta: f64,
    pub rayleigh_alpha: f64,
    pub rayleigh_beta: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub time_step: f64,
    pub min_time_step: f64,
    pub max_time_step: f64,
    pub adaptive_time_stepping: bool,
    pub explicit_safety_factor: f64,
    pub save_interval: usize,
}

impl Default for DynamicSettings {
    fn default() -> Self {
        Self {
            method: TimeIntegrationMethod::Newmark,
            beta: 0.25,
            gamma: 0.5,
            hht_alpha: -0.1,
            wilson_theta: 1.4,
            rayleigh_alpha: 0.0,
            rayleigh_beta: 0.0,
            start_time: 0.0,
            end_time: 1.0,
            time_step: 1e-3,
            min_time_step: 1e-8,
            max_time_step: 1.0,
            adaptive_time_stepping: false,
            explicit_safety_factor: 0.9,
            save_interval: 1,
        }
    }
}

impl DynamicSettings {
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(FeaError::InvalidSettings(msg.to_string()));
        if !(self.end_time > self.start_time) {
            return bad("end_time must be > start_time");
        }
        if !(self.time_step > 0.0) {
            return bad("time_step must be > 0");
        }
        if self.save_interval == 0 {
            return bad("save_interval must be >= 1");
        }
        match self.method {
            TimeIntegrationMethod::Newmark => {
                if !(2.0 * self.beta >= self.gamma && self.gamma >= 0.5) {
                    return bad("Newmark requires 2*beta >= gamma >= 0.5 for unconditional stability");
                }
            }
            TimeIntegrationMethod::HhtAlpha => {
                if !(-1.0 / 3.0..=0.0).contains(&self.hht_alpha) {
                    return bad("HHT-alpha requires alpha in [-1/3, 0]");
                }
            }
            TimeIntegrationMethod::WilsonTheta => {
                if !(self.wilson_theta >= 1.37) {
                    return bad("Wilson-theta requires theta >= 1.37 for unconditional stability");
                }
            }
            TimeIntegrationMethod::CentralDifference | TimeIntegrationMethod::Bathe => {}
        }
        if self.adaptive_time_stepping && !(self.min_time_step > 0.0 && self.min_time_step <= self.max_time_step) {
            return bad("min_time_step must be > 0 and <= max_time_step");
        }
        if !(self.explicit_safety_factor > 0.0 && self.explicit_safety_factor <= 1.0) {
            return bad("explicit_safety_factor must lie in (0, 1]");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalAnalysisType {
    SteadyState,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalTimeIntegrationMethod {
    ImplicitEuler,
    CrankNicolson,
    ExplicitEuler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalSettings {
    pub analysis_type: ThermalAnalysisType,
    pub time_integration_method: ThermalTimeIntegrationMethod,
    pub start_time: f64,
    pub end_time: f64,
    pub time_step: f64,
    pub convergence_tolerance: f64,
    pub ambient_temperature: f64,
}

impl Default for ThermalSettings {
    fn default() -> Self {
        Self {
            analysis_type: ThermalAnalysisType::SteadyState,
            time_integration_method: ThermalTimeIntegrationMethod::ImplicitEuler,
            start_time: 0.0,
            end_time: 1.0,
            time_step: 1e-2,
            convergence_tolerance: 1e-6,
            ambient_temperature: 20.0,
        }
    }
}

impl ThermalSettings {
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(FeaError::InvalidSettings(msg.to_string()));
        if self.analysis_type == ThermalAnalysisType::Transient {
            if !(self.end_time > self.start_time) {
                return bad("end_time must be > start_time for a transient analysis");
            }
            if !(self.time_step > 0.0) {
                return bad("time_step must be > 0 for a transient analysis");
            }
        }
        if !(self.convergence_tolerance > 0.0) {
            return bad("convergence_tolerance must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_nonlinear_settings_validate() {
        assert!(NonlinearSettings::default().validate().is_ok());
    }

    #[test]
    fn default_dynamic_settings_validate() {
        assert!(DynamicSettings::default().validate().is_ok());
    }

    #[test]
    fn default_thermal_settings_validate() {
        assert!(ThermalSettings::default().validate().is_ok());
    }

    #[test]
    fn newmark_outside_stability_region_rejected() {
        let mut s = DynamicSettings::default();
        s.beta = 0.1;
        s.gamma = 0.9;
        assert!(s.validate().is_err());
    }

    #[test]
    fn nonlinear_rejects_zero_max_iterations() {
        let mut s = NonlinearSettings::default();
        s.max_iterations = 0;
        assert!(s.validate().is_err());
    }
}
