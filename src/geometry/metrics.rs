//! Reference mappings and point-in-cell tests for linear cells.
//!
//! The reference elements use the following vertex ordering:
//! - Segment: `[v0, v1]` with `r` in `[0, 1]`.
//! - Triangle: `[v0, v1, v2]` with `(r, s)` in the unit right triangle.
//! - Quadrilateral: `[v0, v1, v2, v3]` with `(r, s)` in `[0, 1]^2`.
//! - Tetrahedron: `[v0, v1, v2, v3]` with `(r, s, t)` in the unit tetrahedron.
//! - Hexahedron: `[v0, .., v7]` with `(r, s, t)` in `[0, 1]^3`.
//! - Prism: `[v0, .., v5]` with `(r, s)` in the unit triangle and `t` in `[0, 1]`.
//! - Pyramid: `[v0, .., v4]` with `(r, s)` in `[0, 1]^2` and apex at `t = 1`.
//!
//! Vertices are always three-component; lower-dimensional meshes pad with 0.

use crate::topology::cell_type::CellType;
use crate::transfer_error::TransferError;

const EPS: f64 = 1e-12;
const NEWTON_ITERATIONS: usize = 20;

/// Map a point in reference coordinates to physical coordinates.
pub fn reference_to_physical(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    reference_point: &[f64],
) -> Result<[f64; 3], TransferError> {
    let (weights, _) = shape_functions(cell_type, reference_point)?;
    check_vertex_count(cell_type, vertices)?;
    let mut out = [0.0; 3];
    for (weight, vertex) in weights.iter().zip(vertices.iter()) {
        out[0] += weight * vertex[0];
        out[1] += weight * vertex[1];
        out[2] += weight * vertex[2];
    }
    Ok(out)
}

/// Jacobian at a reference point, row-major with shape `(3, cell_dim)`.
pub fn jacobian(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    reference_point: &[f64],
) -> Result<Vec<f64>, TransferError> {
    let (_, grads) = shape_functions(cell_type, reference_point)?;
    check_vertex_count(cell_type, vertices)?;
    let dim = cell_type.dimension();
    let mut out = vec![0.0; 3 * dim];
    for (vertex, grad) in vertices.iter().zip(grads.iter()) {
        for ref_dim in 0..dim {
            for row in 0..3 {
                out[row * dim + ref_dim] += vertex[row] * grad[ref_dim];
            }
        }
    }
    Ok(out)
}

/// Pull a physical vector back into reference space (least squares).
pub fn pull_back_vector(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    reference_point: &[f64],
    physical_vector: &[f64; 3],
) -> Result<Vec<f64>, TransferError> {
    let jac = jacobian(cell_type, vertices, reference_point)?;
    let dim = jac.len() / 3;
    let cols = jacobian_columns(&jac, dim);
    match dim {
        1 => {
            let col = cols[0];
            let denom = dot(col, col);
            if denom <= EPS * EPS {
                return Err(degenerate());
            }
            Ok(vec![dot(col, *physical_vector) / denom])
        }
        2 => {
            let a = dot(cols[0], cols[0]);
            let b = dot(cols[0], cols[1]);
            let c = dot(cols[1], cols[1]);
            let det = a * c - b * b;
            if det.abs() <= EPS * (a * c).max(EPS) {
                return Err(degenerate());
            }
            let rhs0 = dot(cols[0], *physical_vector);
            let rhs1 = dot(cols[1], *physical_vector);
            let inv_det = 1.0 / det;
            Ok(vec![
                (c * rhs0 - b * rhs1) * inv_det,
                (-b * rhs0 + a * rhs1) * inv_det,
            ])
        }
        3 => {
            let mut mat = [0.0; 9];
            for i in 0..3 {
                for j in 0..3 {
                    mat[i * 3 + j] = dot(cols[i], cols[j]);
                }
            }
            let rhs = [
                dot(cols[0], *physical_vector),
                dot(cols[1], *physical_vector),
                dot(cols[2], *physical_vector),
            ];
            let inv = invert_3x3(mat)?;
            Ok(vec![
                inv[0] * rhs[0] + inv[1] * rhs[1] + inv[2] * rhs[2],
                inv[3] * rhs[0] + inv[4] * rhs[1] + inv[5] * rhs[2],
                inv[6] * rhs[0] + inv[7] * rhs[1] + inv[8] * rhs[2],
            ])
        }
        _ => Err(TransferError::InvalidGeometry(format!(
            "unsupported reference dimension: {dim}"
        ))),
    }
}

/// Newton inversion of the reference mapping.
///
/// Returns the final iterate and the physical distance between its image and
/// `physical_point`. The iteration stops early once that distance falls below
/// `EPS * scale`, where `scale` is the element's bounding diagonal.
pub fn physical_to_reference(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    physical_point: &[f64; 3],
) -> Result<(Vec<f64>, f64), TransferError> {
    let scale = diameter(vertices).max(EPS);
    let mut ref_point = vec![0.5; cell_type.dimension()];
    let mut miss = f64::INFINITY;
    for _ in 0..NEWTON_ITERATIONS {
        let mapped = reference_to_physical(cell_type, vertices, &ref_point)?;
        let residual = sub(mapped, *physical_point);
        miss = norm(residual);
        if miss <= EPS * scale {
            break;
        }
        let correction = pull_back_vector(cell_type, vertices, &ref_point, &residual)?;
        for (r, c) in ref_point.iter_mut().zip(correction.iter()) {
            *r -= c;
        }
    }
    if miss > EPS * scale {
        let mapped = reference_to_physical(cell_type, vertices, &ref_point)?;
        miss = norm(sub(mapped, *physical_point));
    }
    Ok((ref_point, miss))
}

/// True if `reference_point` lies in the reference cell, widened by `tol`.
pub fn in_reference_cell(cell_type: CellType, reference_point: &[f64], tol: f64) -> bool {
    let unit = |x: f64| x >= -tol && x <= 1.0 + tol;
    let simplex = |xs: &[f64]| xs.iter().all(|&x| x >= -tol) && xs.iter().sum::<f64>() <= 1.0 + tol;
    match cell_type {
        CellType::Segment | CellType::Quadrilateral | CellType::Hexahedron | CellType::Pyramid => {
            reference_point.iter().all(|&x| unit(x))
        }
        CellType::Triangle | CellType::Tetrahedron => simplex(reference_point),
        CellType::Prism => simplex(&reference_point[..2]) && unit(reference_point[2]),
    }
}

/// Point-in-cell test by inverse mapping.
///
/// `tol` widens the reference cell and bounds the allowed physical residual
/// relative to the element size, so points off a lower-dimensional element
/// embedded in a higher-dimensional space are rejected. Degenerate elements
/// contain nothing.
pub fn contains_point(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    point: &[f64; 3],
    tol: f64,
) -> bool {
    match physical_to_reference(cell_type, vertices, point) {
        Ok((reference, miss)) => {
            miss <= tol.max(EPS) * diameter(vertices).max(1.0)
                && in_reference_cell(cell_type, &reference, tol)
        }
        Err(_) => false,
    }
}

fn check_vertex_count(cell_type: CellType, vertices: &[[f64; 3]]) -> Result<(), TransferError> {
    let expected = cell_type.vertex_count();
    if vertices.len() != expected {
        return Err(TransferError::InvalidGeometry(format!(
            "vertex count mismatch for {cell_type:?}: expected {expected}, got {}",
            vertices.len()
        )));
    }
    Ok(())
}

fn shape_functions(
    cell_type: CellType,
    reference_point: &[f64],
) -> Result<(Vec<f64>, Vec<Vec<f64>>), TransferError> {
    if reference_point.len() != cell_type.dimension() {
        return Err(TransferError::InvalidGeometry(format!(
            "{cell_type:?} reference point must have {} components, got {}",
            cell_type.dimension(),
            reference_point.len()
        )));
    }
    Ok(match cell_type {
        CellType::Segment => {
            let r = reference_point[0];
            (vec![1.0 - r, r], vec![vec![-1.0], vec![1.0]])
        }
        CellType::Triangle => {
            let (r, s) = (reference_point[0], reference_point[1]);
            (
                vec![1.0 - r - s, r, s],
                vec![vec![-1.0, -1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            )
        }
        CellType::Quadrilateral => {
            let (r, s) = (reference_point[0], reference_point[1]);
            (
                vec![(1.0 - r) * (1.0 - s), r * (1.0 - s), r * s, (1.0 - r) * s],
                vec![
                    vec![-(1.0 - s), -(1.0 - r)],
                    vec![1.0 - s, -r],
                    vec![s, r],
                    vec![-s, 1.0 - r],
                ],
            )
        }
        CellType::Tetrahedron => {
            let (r, s, t) = (reference_point[0], reference_point[1], reference_point[2]);
            (
                vec![1.0 - r - s - t, r, s, t],
                vec![
                    vec![-1.0, -1.0, -1.0],
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![0.0, 0.0, 1.0],
                ],
            )
        }
        CellType::Hexahedron => {
            let (r, s, t) = (reference_point[0], reference_point[1], reference_point[2]);
            let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
            (
                vec![
                    rm * sm * tm,
                    r * sm * tm,
                    r * s * tm,
                    rm * s * tm,
                    rm * sm * t,
                    r * sm * t,
                    r * s * t,
                    rm * s * t,
                ],
                vec![
                    vec![-sm * tm, -rm * tm, -rm * sm],
                    vec![sm * tm, -r * tm, -r * sm],
                    vec![s * tm, r * tm, -r * s],
                    vec![-s * tm, rm * tm, -rm * s],
                    vec![-sm * t, -rm * t, rm * sm],
                    vec![sm * t, -r * t, r * sm],
                    vec![s * t, r * t, r * s],
                    vec![-s * t, rm * t, rm * s],
                ],
            )
        }
        CellType::Prism => {
            let (r, s, t) = (reference_point[0], reference_point[1], reference_point[2]);
            let (rm, tm) = (1.0 - r - s, 1.0 - t);
            (
                vec![rm * tm, r * tm, s * tm, rm * t, r * t, s * t],
                vec![
                    vec![-tm, -tm, -rm],
                    vec![tm, 0.0, -r],
                    vec![0.0, tm, -s],
                    vec![-t, -t, rm],
                    vec![t, 0.0, r],
                    vec![0.0, t, s],
                ],
            )
        }
        CellType::Pyramid => {
            let (r, s, t) = (reference_point[0], reference_point[1], reference_point[2]);
            let (rm, sm, tm) = (1.0 - r, 1.0 - s, 1.0 - t);
            (
                vec![tm * rm * sm, tm * r * sm, tm * r * s, tm * rm * s, t],
                vec![
                    vec![-tm * sm, -tm * rm, -rm * sm],
                    vec![tm * sm, -tm * r, -r * sm],
                    vec![tm * s, tm * r, -r * s],
                    vec![-tm * s, tm * rm, -rm * s],
                    vec![0.0, 0.0, 1.0],
                ],
            )
        }
    })
}

fn degenerate() -> TransferError {
    TransferError::InvalidGeometry("degenerate jacobian".into())
}

fn diameter(vertices: &[[f64; 3]]) -> f64 {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for v in vertices {
        for d in 0..3 {
            lo[d] = lo[d].min(v[d]);
            hi[d] = hi[d].max(v[d]);
        }
    }
    if vertices.is_empty() {
        0.0
    } else {
        norm(sub(hi, lo))
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn jacobian_columns(jac: &[f64], dim: usize) -> Vec<[f64; 3]> {
    (0..dim)
        .map(|ref_dim| [jac[ref_dim], jac[dim + ref_dim], jac[2 * dim + ref_dim]])
        .collect()
}

fn invert_3x3(mat: [f64; 9]) -> Result<[f64; 9], TransferError> {
    let det = mat[0] * (mat[4] * mat[8] - mat[5] * mat[7])
        - mat[1] * (mat[3] * mat[8] - mat[5] * mat[6])
        + mat[2] * (mat[3] * mat[7] - mat[4] * mat[6]);
    if det.abs() <= EPS * (mat[0] * mat[4] * mat[8]).abs().max(EPS) {
        return Err(degenerate());
    }
    let inv_det = 1.0 / det;
    Ok([
        (mat[4] * mat[8] - mat[5] * mat[7]) * inv_det,
        (mat[2] * mat[7] - mat[1] * mat[8]) * inv_det,
        (mat[1] * mat[5] - mat[2] * mat[4]) * inv_det,
        (mat[5] * mat[6] - mat[3] * mat[8]) * inv_det,
        (mat[0] * mat[8] - mat[2] * mat[6]) * inv_det,
        (mat[2] * mat[3] - mat[0] * mat[5]) * inv_det,
        (mat[3] * mat[7] - mat[4] * mat[6]) * inv_det,
        (mat[1] * mat[6] - mat[0] * mat[7]) * inv_det,
        (mat[0] * mat[4] - mat[1] * mat[3]) * inv_det,
    ])
}
