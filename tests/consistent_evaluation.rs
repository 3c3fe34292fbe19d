mod util;

use mesh_rendezvous::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use util::*;

fn setup(comm: LocalComm, mesh: &MeshBlock, coords: &PointCloud) -> ConsistentEvaluation<LocalComm> {
    let mut eval = ConsistentEvaluation::new(comm, EvaluationConfig::default());
    eval.setup(mesh, coords).unwrap();
    eval
}

fn random_points<const D: usize>(seed: u64, count: usize) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let points: Vec<[f64; D]> = (0..count)
        .map(|_| std::array::from_fn(|_| rng.gen_range(0.001..0.999)))
        .collect();
    FieldBuffer::from_points(&points)
}

#[test]
fn cross_owned_points_round_trip() {
    // elements [0, 1] on rank 0 and [1, 2] on rank 1; each rank's point lies
    // in the other rank's element
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mesh = split_line(rank, 2, 2, 2.0);
        let coords = FieldBuffer::new(1, vec![if rank == 0 { 1.75 } else { 0.25 }]).unwrap();
        let mut eval = setup(comm, &mesh, &coords);

        let mut values = FieldBuffer::zeros(1, 1);
        eval.apply(&constant(3.0), &mut values).unwrap();
        let mut ids = FieldBuffer::zeros(1, 1);
        eval.apply(&element_id, &mut ids).unwrap();
        (values.into_values(), ids.into_values(), eval.num_source_pairs())
    });
    assert_eq!(out[0], (vec![3.0], vec![1.0], 1));
    assert_eq!(out[1], (vec![3.0], vec![0.0], 1));
}

#[test]
fn affine_values_arrive_exactly() {
    let points: [&[f64]; 3] = [&[0.1, 2.9, 1.3], &[], &[0.6, 2.2, 1.05, 0.4, 2.65]];
    let f = affine([2.0, 0.0, 0.0], 1.0);
    let out = LocalComm::run(3, |comm| {
        let rank = comm.rank();
        let mesh = split_line(rank, 3, 12, 3.0);
        let coords = FieldBuffer::new(1, points[rank].to_vec()).unwrap();
        let mut eval = setup(comm, &mesh, &coords);
        assert!(eval.missed_points().is_empty());

        let mut values = FieldBuffer::zeros(1, coords.num_points());
        eval.apply(&f, &mut values).unwrap();
        let mut ids = FieldBuffer::zeros(1, coords.num_points());
        eval.apply(&element_id, &mut ids).unwrap();
        (values.into_values(), ids.into_values())
    });
    for (rank, (values, ids)) in out.iter().enumerate() {
        let want: Vec<f64> = points[rank]
            .iter()
            .map(|&x| affine_at([2.0, 0.0, 0.0], 1.0, &[x]))
            .collect();
        let want_ids: Vec<f64> = points[rank].iter().map(|&x| (x / 0.25).floor()).collect();
        assert_eq!(values, &want, "rank {rank}");
        assert_eq!(ids, &want_ids, "rank {rank}");
    }
}

#[test]
fn apply_is_idempotent_and_plans_are_reusable() {
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mesh = split_line(rank, 2, 8, 1.0);
        let coords = random_points::<1>(7 + rank as u64, 10);
        let mut eval = setup(comm, &mesh, &coords);
        let f = affine([-4.0, 0.0, 0.0], 0.5);

        let mut first = FieldBuffer::zeros(1, 10);
        eval.apply(&f, &mut first).unwrap();
        let mut second = FieldBuffer::zeros(1, 10);
        eval.apply(&f, &mut second).unwrap();
        assert_eq!(first, second);

        let mut other = FieldBuffer::zeros(1, 10);
        eval.apply(&constant(7.0), &mut other).unwrap();
        assert!(other.view().iter().all(|&v| v == 7.0));

        let mut again = FieldBuffer::zeros(1, 10);
        eval.apply(&f, &mut again).unwrap();
        assert_eq!(first, again);

        let want: Vec<f64> = coords
            .view()
            .iter()
            .map(|&x| affine_at([-4.0, 0.0, 0.0], 0.5, &[x]))
            .collect();
        first.into_values() == want
    });
    assert_eq!(out, vec![true, true]);
}

#[test]
fn ranks_without_points_or_elements_take_part() {
    // rank 0 owns no elements, rank 1 owns no points
    let points: [&[f64]; 3] = [&[0.3, 1.7], &[], &[0.9]];
    let out = LocalComm::run(3, |comm| {
        let rank = comm.rank();
        let mesh = split_line(rank, 3, 2, 2.0);
        let coords = FieldBuffer::new(1, points[rank].to_vec()).unwrap();
        let mut eval = setup(comm, &mesh, &coords);
        let mut values = FieldBuffer::zeros(1, coords.num_points());
        eval.apply(&constant(-2.5), &mut values).unwrap();
        (values.into_values(), eval.num_source_pairs())
    });
    assert_eq!(out[0], (vec![-2.5, -2.5], 0));
    assert_eq!(out[1].0, Vec::<f64>::new());
    // rank 1 owns [0, 1]: 0.3 and 0.9; rank 2 owns [1, 2]: 1.7
    assert_eq!(out[1].1, 2);
    assert_eq!(out[2], (vec![-2.5], 1));
}

#[test]
fn no_target_points_anywhere() {
    let out = LocalComm::run(2, |comm| {
        let mesh = split_line(comm.rank(), 2, 4, 1.0);
        let coords = FieldBuffer::zeros(1, 0);
        let mut eval = setup(comm, &mesh, &coords);
        let mut values = FieldBuffer::zeros(1, 0);
        eval.apply(&constant(1.0), &mut values).unwrap();
        (eval.num_source_pairs(), eval.missed_points().len(), values.size())
    });
    assert_eq!(out, vec![(0, 0, 0), (0, 0, 0)]);
}

#[test]
fn points_outside_the_mesh_are_left_untouched() {
    let points: [&[f64]; 2] = [&[-1.0, 0.5], &[5.0, 1.5]];
    for policy in [RendezvousBoxPolicy::Intersection, RendezvousBoxPolicy::SourceMeshBox] {
        let out = LocalComm::run(2, |comm| {
            let rank = comm.rank();
            let mesh = split_line(rank, 2, 4, 2.0);
            let coords = FieldBuffer::new(1, points[rank].to_vec()).unwrap();
            let config = EvaluationConfig {
                box_policy: policy,
                ..EvaluationConfig::default()
            };
            let mut eval = ConsistentEvaluation::new(comm, config);
            eval.setup(&mesh, &coords).unwrap();
            let mut values = FieldBuffer::filled(1, 2, -99.0);
            eval.apply(&constant(1.0), &mut values).unwrap();
            (values.into_values(), eval.missed_points().to_vec())
        });
        assert_eq!(out[0], (vec![-99.0, 1.0], vec![0]), "{policy:?}");
        assert_eq!(out[1], (vec![-99.0, 1.0], vec![0]), "{policy:?}");
    }
}

#[test]
fn shared_nodes_resolve_to_lowest_element_id() {
    let out = LocalComm::run(2, |comm| {
        // elements 0, 1 on rank 0 and 2, 3 on rank 1, h = 0.5
        let mesh = split_line(comm.rank(), 2, 4, 2.0);
        let coords = FieldBuffer::new(1, vec![1.0, 0.5, 1.5]).unwrap();
        let mut eval = setup(comm, &mesh, &coords);
        let mut ids = FieldBuffer::zeros(1, 3);
        eval.apply(&element_id, &mut ids).unwrap();
        ids.into_values()
    });
    assert_eq!(out[0], vec![1.0, 0.0, 2.0]);
    assert_eq!(out[1], vec![1.0, 0.0, 2.0]);
}

#[test]
fn shared_triangle_edges_resolve_to_lowest_element_id() {
    let out = LocalComm::run(3, |comm| {
        let mesh = square_triangles(comm.rank(), 3, 2);
        // on the diagonal of cell 0, on the edge between triangles 0 and 3,
        // on the diagonal of cell 3
        let coords = FieldBuffer::from_points(&[[0.25, 0.25], [0.5, 0.25], [0.75, 0.75]]);
        let mut eval = setup(comm, &mesh, &coords);
        let mut ids = FieldBuffer::zeros(1, 3);
        eval.apply(&element_id, &mut ids).unwrap();
        ids.into_values()
    });
    for ids in out {
        assert_eq!(ids, vec![0.0, 0.0, 6.0]);
    }
}

#[test]
fn evaluated_dimension_must_match_target() {
    let out = LocalComm::run(2, |comm| {
        let mesh = split_line(comm.rank(), 2, 2, 2.0);
        let coords = FieldBuffer::new(1, vec![0.5]).unwrap();
        let mut eval = setup(comm, &mesh, &coords);
        let pairs = |e: &[u64], _: &FieldBuffer| FieldBuffer::zeros(2, e.len());
        let mut target = FieldBuffer::zeros(1, 1);
        eval.apply(&pairs, &mut target)
    });
    for result in out {
        assert!(matches!(
            result,
            Err(TransferError::DimensionMismatch {
                source_dim: 2,
                target_dim: 1
            })
        ));
    }
}

#[test]
fn target_length_is_checked_before_exchange() {
    let out = LocalComm::run(2, |comm| {
        let mesh = split_line(comm.rank(), 2, 2, 2.0);
        let coords = FieldBuffer::new(1, vec![0.5, 1.5]).unwrap();
        let mut eval = setup(comm, &mesh, &coords);
        let mut short = FieldBuffer::zeros(1, 1);
        eval.apply(&constant(1.0), &mut short)
            .map_err(|e| e.kind())
    });
    assert_eq!(out, vec![Err(ContractKind::Precondition); 2]);
}

#[test]
fn one_bad_coordinate_field_fails_every_rank() {
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mesh = split_line(rank, 2, 2, 2.0);
        let coords = if rank == 0 {
            FieldBuffer::zeros(2, 1)
        } else {
            FieldBuffer::zeros(1, 1)
        };
        let mut eval = ConsistentEvaluation::new(comm, EvaluationConfig::default());
        let result = eval.setup(&mesh, &coords);
        (result, eval.is_setup())
    });
    assert!(matches!(out[0], (Err(TransferError::DimensionMismatch { .. }), false)));
    assert!(matches!(out[1], (Err(TransferError::PeerFailure { .. }), false)));
}

#[test]
fn unusable_tolerance_fails_setup_instead_of_missing_points() {
    for tolerance in [f64::NAN, -0.1] {
        let out = LocalComm::run(2, |comm| {
            let rank = comm.rank();
            let mesh = split_line(rank, 2, 4, 2.0);
            let coords = FieldBuffer::new(1, vec![if rank == 0 { 0.3 } else { 1.0 }]).unwrap();
            let config = EvaluationConfig {
                geometric_tolerance: tolerance,
                ..EvaluationConfig::default()
            };
            let mut eval = ConsistentEvaluation::new(comm, config);
            let result = eval.setup(&mesh, &coords).map_err(|e| e.kind());
            (result, eval.is_setup())
        });
        assert_eq!(out, vec![(Err(ContractKind::Precondition), false); 2], "tolerance {tolerance}");
    }
}

#[test]
fn box_policies_give_the_same_answer() {
    let run = |policy: RendezvousBoxPolicy| {
        LocalComm::run(3, |comm| {
            let rank = comm.rank();
            let mesh = square_quads(rank, 3, 4);
            // points only cover the lower-left quarter of the mesh
            let mut coords = random_points::<2>(100 + rank as u64, 12);
            for v in coords.view_mut() {
                *v *= 0.5;
            }
            let config = EvaluationConfig {
                box_policy: policy,
                ..EvaluationConfig::default()
            };
            let mut eval = ConsistentEvaluation::new(comm, config);
            eval.setup(&mesh, &coords).unwrap();
            let mut ids = FieldBuffer::zeros(1, 12);
            eval.apply(&element_id, &mut ids).unwrap();
            ids.into_values()
        })
    };
    assert_eq!(
        run(RendezvousBoxPolicy::Intersection),
        run(RendezvousBoxPolicy::SourceMeshBox)
    );
}

#[test]
fn random_points_on_interleaved_quads() {
    const N: usize = 4;
    let weights = [2.0, -3.0, 0.0];
    let out = LocalComm::run(3, |comm| {
        let rank = comm.rank();
        let mesh = square_quads(rank, 3, N);
        let coords = random_points::<2>(42 + rank as u64, 20 + 7 * rank);
        let mut eval = setup(comm, &mesh, &coords);

        let mut values = FieldBuffer::zeros(1, coords.num_points());
        eval.apply(&affine(weights, 1.0), &mut values).unwrap();
        let mut ids = FieldBuffer::zeros(1, coords.num_points());
        eval.apply(&element_id, &mut ids).unwrap();
        (coords, values, ids)
    });
    for (coords, values, ids) in out {
        for i in 0..coords.num_points() {
            let p = coords.point(i);
            assert_eq!(values.get(i, 0), affine_at(weights, 1.0, &p));
            let cell = (p[1] * N as f64).floor() * N as f64 + (p[0] * N as f64).floor();
            assert_eq!(ids.get(i, 0), cell);
        }
    }
}

#[test]
fn random_points_on_triangles() {
    const N: usize = 3;
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mesh = square_triangles(rank, 2, N);
        let coords = random_points::<2>(9 + rank as u64, 25);
        let mut eval = setup(comm, &mesh, &coords);
        let mut ids = FieldBuffer::zeros(1, 25);
        eval.apply(&element_id, &mut ids).unwrap();
        (coords, ids)
    });
    for (coords, ids) in out {
        for i in 0..coords.num_points() {
            let (x, y) = (coords.get(i, 0) * N as f64, coords.get(i, 1) * N as f64);
            let (ci, cj) = (x.floor(), y.floor());
            let cell = cj * N as f64 + ci;
            let above = (y - cj) > (x - ci);
            let want = 2.0 * cell + if above { 1.0 } else { 0.0 };
            assert_eq!(ids.get(i, 0), want);
        }
    }
}

#[test]
fn hexes_carry_vector_fields() {
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mesh = cube_hexes(rank, 2, 2);
        let coords = random_points::<3>(5 + rank as u64, 15);
        let mut eval = setup(comm, &mesh, &coords);
        let mut echoed = FieldBuffer::zeros(3, 15);
        eval.apply(&position, &mut echoed).unwrap();
        let mut values = FieldBuffer::zeros(1, 15);
        eval.apply(&affine([1.0, 2.0, 3.0], 0.0), &mut values).unwrap();
        (coords, echoed, values)
    });
    for (coords, echoed, values) in out {
        assert_eq!(coords, echoed);
        for i in 0..coords.num_points() {
            assert_eq!(values.get(i, 0), affine_at([1.0, 2.0, 3.0], 0.0, &coords.point(i)));
        }
    }
}

#[test]
fn setup_again_replaces_the_mapping() {
    let out = LocalComm::run(2, |comm| {
        let rank = comm.rank();
        let mesh = split_line(rank, 2, 4, 2.0);
        let mut eval = ConsistentEvaluation::new(comm, EvaluationConfig::default());
        eval.setup(&mesh, &FieldBuffer::new(1, vec![0.1]).unwrap()).unwrap();
        eval.setup(&mesh, &FieldBuffer::new(1, vec![1.9, 0.6]).unwrap())
            .unwrap();
        let mut ids = FieldBuffer::zeros(1, 2);
        eval.apply(&element_id, &mut ids).unwrap();
        ids.into_values()
    });
    assert_eq!(out, vec![vec![3.0, 1.0]; 2]);
}
