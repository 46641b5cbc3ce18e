//! Thin helpers over the native netcdf library.
//!
//! Attribute lookups go through [`has_attr`] first; probing for a missing
//! attribute directly makes HDF5 print diagnostics even though the error is
//! handled.

use std::sync::Once;

use crate::error::{NetCdfError, NetCdfResult};

/// Turn off HDF5's automatic error stack printing.
///
/// libhdf5 reports every failed lookup on stderr (`HDF5-DIAG: Error detected
/// ...`), including the optional `_FillValue` and `units` probes of a normal
/// SCHISM read. Idempotent; call once at startup before opening files.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: a null handler and client pointer disable printing for
        // the default error stack.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Check if a variable has an attribute with the given name.
pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

pub(crate) fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

pub(crate) fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Read every value of a numeric variable as f64.
///
/// Double variables are read directly; anything else is read as f32, which
/// covers the float fields SCHISM writes.
pub(crate) fn read_f64_values(var: &netcdf::Variable) -> NetCdfResult<Vec<f64>> {
    match var.get_values::<f64, _>(..) {
        Ok(values) => Ok(values),
        Err(_) => var
            .get_values::<f32, _>(..)
            .map(|values| values.into_iter().map(f64::from).collect())
            .map_err(|e| {
                NetCdfError::InvalidFormat(format!("Failed to read {}: {}", var.name(), e))
            }),
    }
}

/// Sentinel handling declared on a variable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Packing {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
    scale_factor: f64,
    add_offset: f64,
}

impl Packing {
    pub(crate) fn of(var: &netcdf::Variable) -> Self {
        Self {
            fill_value: get_f64_attr(var, "_FillValue"),
            missing_value: get_f64_attr(var, "missing_value"),
            scale_factor: get_f64_attr(var, "scale_factor").unwrap_or(1.0),
            add_offset: get_f64_attr(var, "add_offset").unwrap_or(0.0),
        }
    }

    /// Replace sentinels and non-finite raw values with NaN, then unpack.
    pub(crate) fn decode(&self, raw: &mut [f64]) {
        for v in raw.iter_mut() {
            let is_sentinel = Some(*v) == self.fill_value || Some(*v) == self.missing_value;
            *v = if is_sentinel || !v.is_finite() {
                f64::NAN
            } else {
                *v * self.scale_factor + self.add_offset
            };
        }
    }
}
