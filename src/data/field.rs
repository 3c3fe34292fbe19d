//! Field containers and the user-supplied evaluator interface.
//!
//! A field of dimension `k` over `n` points stores component `d` of point `i`
//! at `values[d * n + i]`. Coordinates are fields too.

use crate::algs::ordinals::GlobalOrdinal;
use crate::transfer_error::{TransferError, require};
use serde::{Deserialize, Serialize};

pub trait Field {
    /// Values per point.
    fn dimension(&self) -> usize;

    /// Total number of scalars, `dimension() * num_points()`.
    fn size(&self) -> usize;

    fn view(&self) -> &[f64];

    fn num_points(&self) -> usize {
        match self.dimension() {
            0 => 0,
            d => self.size() / d,
        }
    }
}

pub trait FieldMut: Field {
    fn view_mut(&mut self) -> &mut [f64];
}

/// Owned, dimension-major field storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldBuffer {
    dimension: usize,
    values: Vec<f64>,
}

/// Target point coordinates.
pub type PointCloud = FieldBuffer;

impl FieldBuffer {
    pub fn new(dimension: usize, values: Vec<f64>) -> Result<Self, TransferError> {
        require(dimension > 0, "field dimension must be positive")?;
        require(
            values.len() % dimension == 0,
            format!(
                "{} values do not split into points of dimension {dimension}",
                values.len()
            ),
        )?;
        Ok(Self { dimension, values })
    }

    pub fn zeros(dimension: usize, num_points: usize) -> Self {
        Self::filled(dimension, num_points, 0.0)
    }

    pub fn filled(dimension: usize, num_points: usize, value: f64) -> Self {
        Self {
            dimension,
            values: vec![value; dimension * num_points],
        }
    }

    /// Build from point-major tuples.
    pub fn from_points<const D: usize>(points: &[[f64; D]]) -> Self {
        let n = points.len();
        let mut values = vec![0.0; D * n];
        for (i, p) in points.iter().enumerate() {
            for d in 0..D {
                values[d * n + i] = p[d];
            }
        }
        Self {
            dimension: D,
            values,
        }
    }

    /// Build from entry-major data (`data[i * dimension + d]`).
    pub fn from_entry_major(dimension: usize, data: &[f64]) -> Result<Self, TransferError> {
        let mut out = Self::new(dimension, vec![0.0; data.len()])?;
        let n = out.num_points();
        for i in 0..n {
            for d in 0..dimension {
                out.values[d * n + i] = data[i * dimension + d];
            }
        }
        Ok(out)
    }

    pub fn get(&self, point: usize, component: usize) -> f64 {
        self.values[component * self.num_points() + point]
    }

    pub fn set(&mut self, point: usize, component: usize, value: f64) {
        let n = self.num_points();
        self.values[component * n + point] = value;
    }

    /// All components of one point.
    pub fn point(&self, point: usize) -> Vec<f64> {
        (0..self.dimension).map(|d| self.get(point, d)).collect()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl Field for FieldBuffer {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn size(&self) -> usize {
        self.values.len()
    }

    fn view(&self) -> &[f64] {
        &self.values
    }
}

impl FieldMut for FieldBuffer {
    fn view_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

/// User callback producing field values at points inside given elements.
///
/// Called with one element id per point and the matching coordinates; must
/// return a field with one point per input point, in the same order.
pub trait FieldEvaluator {
    type Output: Field;

    fn evaluate(&self, elements: &[GlobalOrdinal], coordinates: &FieldBuffer) -> Self::Output;
}

impl<F, O> FieldEvaluator for F
where
    F: Fn(&[GlobalOrdinal], &FieldBuffer) -> O,
    O: Field,
{
    type Output = O;

    fn evaluate(&self, elements: &[GlobalOrdinal], coordinates: &FieldBuffer) -> O {
        self(elements, coordinates)
    }
}
