#![allow(dead_code)]
use mesh_rendezvous::prelude::*;

/// Uniform mesh of `n` segments on `[0, length]`, with contiguous element
/// blocks per rank. Element `e` covers `[e * h, (e + 1) * h]`.
pub fn split_line(rank: usize, size: usize, n: usize, length: f64) -> MeshBlock {
    let first = rank * n / size;
    let last = (rank + 1) * n / size;
    if first == last {
        return MeshBlock::empty(1, CellType::Segment).unwrap();
    }
    let node_ids: Vec<u64> = (first as u64..=last as u64).collect();
    let coords: Vec<f64> = (first..=last).map(|i| node_x(i, n, length)).collect();
    let element_ids: Vec<u64> = (first as u64..last as u64).collect();
    let connectivity: Vec<usize> = (0..last - first).flat_map(|e| [e, e + 1]).collect();
    MeshBlock::new(1, CellType::Segment, node_ids, coords, element_ids, connectivity).unwrap()
}

fn node_x(i: usize, n: usize, length: f64) -> f64 {
    i as f64 * length / n as f64
}

/// Structured grid nodes of the unit square, dimension-major, `(n + 1)^2`
/// nodes numbered row by row.
fn square_nodes(n: usize) -> (Vec<u64>, Vec<f64>) {
    let m = n + 1;
    let mut coords = vec![0.0; 2 * m * m];
    for j in 0..m {
        for i in 0..m {
            coords[j * m + i] = i as f64 / n as f64;
            coords[m * m + j * m + i] = j as f64 / n as f64;
        }
    }
    ((0..(m * m) as u64).collect(), coords)
}

/// `n x n` quads on the unit square; cell `(i, j)` has id `j * n + i` and
/// lives on rank `id % size`, so ranks hold interleaved cells.
pub fn square_quads(rank: usize, size: usize, n: usize) -> MeshBlock {
    let m = n + 1;
    let (node_ids, coords) = square_nodes(n);
    let mut element_ids = Vec::new();
    let mut connectivity = Vec::new();
    for j in 0..n {
        for i in 0..n {
            let id = j * n + i;
            if id % size != rank {
                continue;
            }
            let v00 = j * m + i;
            element_ids.push(id as u64);
            connectivity.extend([v00, v00 + 1, v00 + m + 1, v00 + m]);
        }
    }
    MeshBlock::new(2, CellType::Quadrilateral, node_ids, coords, element_ids, connectivity).unwrap()
}

/// Each quad cell `c` of an `n x n` grid split along its diagonal into
/// triangles `2c` (below the diagonal) and `2c + 1` (above). Triangle `t`
/// lives on rank `t % size`.
pub fn square_triangles(rank: usize, size: usize, n: usize) -> MeshBlock {
    let m = n + 1;
    let (node_ids, coords) = square_nodes(n);
    let mut element_ids = Vec::new();
    let mut connectivity = Vec::new();
    for j in 0..n {
        for i in 0..n {
            let c = j * n + i;
            let v00 = j * m + i;
            let (v10, v11, v01) = (v00 + 1, v00 + m + 1, v00 + m);
            for (id, tri) in [(2 * c, [v00, v10, v11]), (2 * c + 1, [v00, v11, v01])] {
                if id % size == rank {
                    element_ids.push(id as u64);
                    connectivity.extend(tri);
                }
            }
        }
    }
    MeshBlock::new(2, CellType::Triangle, node_ids, coords, element_ids, connectivity).unwrap()
}

/// `n^3` hexes on the unit cube; cell `(i, j, k)` has id `(k * n + j) * n + i`
/// and lives on rank `id % size`.
pub fn cube_hexes(rank: usize, size: usize, n: usize) -> MeshBlock {
    let m = n + 1;
    let num_nodes = m * m * m;
    let mut coords = vec![0.0; 3 * num_nodes];
    for k in 0..m {
        for j in 0..m {
            for i in 0..m {
                let v = (k * m + j) * m + i;
                coords[v] = i as f64 / n as f64;
                coords[num_nodes + v] = j as f64 / n as f64;
                coords[2 * num_nodes + v] = k as f64 / n as f64;
            }
        }
    }
    let mut element_ids = Vec::new();
    let mut connectivity = Vec::new();
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let id = (k * n + j) * n + i;
                if id % size != rank {
                    continue;
                }
                let b = (k * m + j) * m + i;
                let t = b + m * m;
                element_ids.push(id as u64);
                connectivity.extend([b, b + 1, b + m + 1, b + m, t, t + 1, t + m + 1, t + m]);
            }
        }
    }
    let node_ids = (0..num_nodes as u64).collect();
    MeshBlock::new(3, CellType::Hexahedron, node_ids, coords, element_ids, connectivity).unwrap()
}

/// Returns `value` at every point.
pub fn constant(value: f64) -> impl Fn(&[u64], &FieldBuffer) -> FieldBuffer {
    move |elements: &[u64], _: &FieldBuffer| FieldBuffer::filled(1, elements.len(), value)
}

/// Returns the containing element id, as a float, at every point.
pub fn element_id(elements: &[u64], _: &FieldBuffer) -> FieldBuffer {
    FieldBuffer::new(1, elements.iter().map(|&e| e as f64).collect()).unwrap()
}

/// `offset + weights . x` evaluated at the coordinates it is handed.
pub fn affine(weights: [f64; 3], offset: f64) -> impl Fn(&[u64], &FieldBuffer) -> FieldBuffer {
    move |_: &[u64], coords: &FieldBuffer| {
        let values = (0..coords.num_points())
            .map(|i| affine_at(weights, offset, &coords.point(i)))
            .collect();
        FieldBuffer::new(1, values).unwrap()
    }
}

pub fn affine_at(weights: [f64; 3], offset: f64, point: &[f64]) -> f64 {
    point
        .iter()
        .zip(weights)
        .fold(offset, |acc, (x, w)| acc + w * x)
}

/// Echoes the coordinates back as a field of the coordinate dimension.
pub fn position(_: &[u64], coords: &FieldBuffer) -> FieldBuffer {
    coords.clone()
}
