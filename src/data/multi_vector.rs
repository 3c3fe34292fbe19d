//! Borrowed multi-vector views over a [`DistributionMap`].
//!
//! A multi-vector with `k` vectors stores vector `v` contiguously:
//! `values[v * local_len + i]`. Zero-length views are valid and must be
//! accepted by every transfer.

use crate::data::distribution_map::DistributionMap;
use crate::transfer_error::{TransferError, require};
use bytemuck::Pod;

#[derive(Clone, Copy, Debug)]
pub struct MultiVectorView<'a, T> {
    map: &'a DistributionMap,
    values: &'a [T],
    num_vectors: usize,
}

impl<'a, T: Pod> MultiVectorView<'a, T> {
    pub fn new(
        map: &'a DistributionMap,
        values: &'a [T],
        num_vectors: usize,
    ) -> Result<Self, TransferError> {
        check_len(map, values.len(), num_vectors)?;
        Ok(Self {
            map,
            values,
            num_vectors,
        })
    }

    pub fn map(&self) -> &'a DistributionMap {
        self.map
    }

    pub fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    pub fn values(&self) -> &'a [T] {
        self.values
    }

    pub fn get(&self, vector: usize, local: usize) -> T {
        self.values[vector * self.map.local_len() + local]
    }
}

#[derive(Debug)]
pub struct MultiVectorViewMut<'a, T> {
    map: &'a DistributionMap,
    values: &'a mut [T],
    num_vectors: usize,
}

impl<'a, T: Pod> MultiVectorViewMut<'a, T> {
    pub fn new(
        map: &'a DistributionMap,
        values: &'a mut [T],
        num_vectors: usize,
    ) -> Result<Self, TransferError> {
        check_len(map, values.len(), num_vectors)?;
        Ok(Self {
            map,
            values,
            num_vectors,
        })
    }

    pub fn map(&self) -> &'a DistributionMap {
        self.map
    }

    pub fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    pub fn set(&mut self, vector: usize, local: usize, value: T) {
        let n = self.map.local_len();
        self.values[vector * n + local] = value;
    }
}

fn check_len(map: &DistributionMap, len: usize, num_vectors: usize) -> Result<(), TransferError> {
    require(
        len == map.local_len() * num_vectors,
        format!(
            "multi-vector of {num_vectors} vectors over {} entries needs {} values, got {len}",
            map.local_len(),
            map.local_len() * num_vectors
        ),
    )
}
