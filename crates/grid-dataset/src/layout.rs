//! How a product's variables are spread across dataset handles.
//!
//! A layout names the handles a source opens (one per forecast direction and
//! variable group for model output, one per group for observations), and
//! binds each public variable name to the group and native name it is read
//! from.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use ocean_common::{Cadence, QueryTime};

use crate::direction::ForecastDirection;
use crate::error::{DatasetError, Result};
use crate::handle::HandleKey;
use crate::transform_cache::TransformKey;

/// Where a public variable lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub group: String,
    pub native_name: String,
}

impl VariableBinding {
    pub fn new(group: impl Into<String>, native_name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            native_name: native_name.into(),
        }
    }
}

/// Handle and variable structure of one product.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetLayout {
    /// Product name, also the default filename prefix
    pub name: String,
    /// Data provider or observing network; grids of one product and
    /// resolution differ between networks
    pub network: String,
    /// Resolution or product variant label
    pub resolution: String,
    pub cadence: Cadence,
    /// Model reference time; `None` for observation products, which have no
    /// forecast/nowcast split
    pub model_run: Option<DateTime<Utc>>,
    /// Variable groups, one handle each (per direction for model output)
    pub groups: Vec<String>,
    /// Public variable name -> binding
    pub variables: BTreeMap<String, VariableBinding>,
    /// Public names of the (x, y) vector components
    pub vector_components: Option<(String, String)>,
}

impl DatasetLayout {
    /// RTOFS 2-D surface output (`2ds`) for the run on `run_date`.
    pub fn rtofs_2ds(run_date: NaiveDate) -> Self {
        let variables = [
            ("salt", "prog", "sss"),
            ("temp", "prog", "sst"),
            ("u", "prog", "u_velocity"),
            ("v", "prog", "v_velocity"),
            ("ssh", "diag", "ssh"),
            ("ice_coverage", "diag", "ice_coverage"),
            ("ice_thickness", "diag", "ice_thickness"),
        ];

        Self::rtofs(run_date, "2ds", &["prog", "diag"], &variables)
    }

    /// RTOFS 3-D output on depth levels (`3dz`) for the run on `run_date`.
    pub fn rtofs_3dz(run_date: NaiveDate) -> Self {
        let variables = [
            ("salt", "salt", "salinity"),
            ("temp", "temp", "temperature"),
            ("u", "uvel", "u"),
            ("v", "vvel", "v"),
        ];

        Self::rtofs(run_date, "3dz", &["salt", "temp", "uvel", "vvel"], &variables)
    }

    fn rtofs(run_date: NaiveDate, resolution: &str, groups: &[&str], variables: &[(&str, &str, &str)]) -> Self {
        Self {
            name: "rtofs".to_string(),
            network: "NCEP".to_string(),
            resolution: resolution.to_string(),
            cadence: Cadence::Daily,
            model_run: Some(QueryTime::CalendarDate(run_date).to_instant()),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            variables: variables
                .iter()
                .map(|(public, group, native)| (public.to_string(), VariableBinding::new(*group, *native)))
                .collect(),
            vector_components: Some(("u".to_string(), "v".to_string())),
        }
    }

    /// HF radar surface currents at `resolution_km` (hourly, no forecast)
    /// from the UCSD network. See [`with_network`](Self::with_network).
    pub fn hfr(resolution_km: u32) -> Self {
        Self {
            name: "hfr".to_string(),
            network: "UCSD".to_string(),
            resolution: format!("{}km", resolution_km),
            cadence: Cadence::Hourly,
            model_run: None,
            groups: vec!["uv".to_string()],
            variables: ["u", "v", "DOPx", "DOPy"]
                .iter()
                .map(|name| (name.to_string(), VariableBinding::new("uv", *name)))
                .collect(),
            vector_components: Some(("u".to_string(), "v".to_string())),
        }
    }

    /// Same layout served by another network (for HF radar, `NDBC`).
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Key under which this layout's grid geometry is cached.
    pub fn transform_key(&self) -> TransformKey {
        TransformKey::new(format!("{}/{}", self.name, self.network), self.resolution.as_str())
    }

    /// True for model output split into forecast and nowcast handles.
    pub fn has_directions(&self) -> bool {
        self.model_run.is_some()
    }

    /// Every handle a source of this layout opens.
    pub fn handle_keys(&self) -> Vec<HandleKey> {
        if self.has_directions() {
            ForecastDirection::ALL
                .iter()
                .flat_map(|&direction| {
                    self.groups
                        .iter()
                        .map(move |group| HandleKey::new(Some(direction), group.as_str()))
                })
                .collect()
        } else {
            self.groups
                .iter()
                .map(|group| HandleKey::new(None, group.as_str()))
                .collect()
        }
    }

    /// Binding of a public variable name.
    pub fn binding(&self, variable: &str) -> Result<&VariableBinding> {
        self.variables.get(variable).ok_or_else(|| {
            DatasetError::invalid_argument(format!(
                "variable must be one of {:?}, got '{}'",
                self.variables.keys().collect::<Vec<_>>(),
                variable
            ))
        })
    }

    /// Public variable names in a stable order.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }
}
