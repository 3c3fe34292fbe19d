use mesh_rendezvous::prelude::*;
use proptest::prelude::*;

fn arb_box() -> impl Strategy<Value = BoundingBox> {
    (
        prop::array::uniform3(-10.0..10.0f64),
        prop::array::uniform3(0.0..5.0f64),
    )
        .prop_map(|(min, len)| {
            BoundingBox::new(min, [min[0] + len[0], min[1] + len[1], min[2] + len[2]])
        })
}

proptest! {
    #[test]
    fn intersection_matches_membership(
        a in arb_box(),
        b in arb_box(),
        p in prop::array::uniform3(-12.0..17.0f64),
    ) {
        let both = a.intersection(&b);
        prop_assert_eq!(both.contains_point(&p), a.contains_point(&p) && b.contains_point(&p));
    }

    #[test]
    fn intersection_is_symmetric_and_agrees_with_overlap(a in arb_box(), b in arb_box()) {
        let ab = a.intersection(&b);
        prop_assert_eq!(ab, b.intersection(&a));
        prop_assert_eq!(a.intersects(&b), !ab.is_empty());
        if !ab.is_empty() {
            for d in 0..3 {
                prop_assert!(ab.extent(d) <= a.extent(d).min(b.extent(d)));
            }
        }
    }

    #[test]
    fn source_mesh_policy_ignores_the_cloud(a in arb_box(), b in arb_box()) {
        prop_assert_eq!(RendezvousBoxPolicy::SourceMeshBox.rendezvous_box(&a, &b), a);
        prop_assert_eq!(
            RendezvousBoxPolicy::Intersection.rendezvous_box(&a, &b),
            a.intersection(&b)
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn global_box_covers_every_rank(
        clouds in prop::collection::vec(prop::collection::vec(-50.0..50.0f64, 0..12), 3),
    ) {
        // each rank holds a 2D cloud; odd lengths drop their last value
        let out = LocalComm::run(3, |comm| {
            let mine = &clouds[comm.rank()];
            let coords = &mine[..mine.len() / 2 * 2];
            BoundingBox::global_of_points(&comm, coords, 2)
        });
        let mut want = BoundingBox::empty();
        for cloud in &clouds {
            let coords = &cloud[..cloud.len() / 2 * 2];
            let local = BoundingBox::from_points(coords, 2);
            for d in 0..2 {
                want.min[d] = want.min[d].min(local.min[d]);
                want.max[d] = want.max[d].max(local.max[d]);
            }
        }
        for global in out {
            prop_assert_eq!(&global.min[..2], &want.min[..2]);
            prop_assert_eq!(&global.max[..2], &want.max[..2]);
            // axes past the point dimension stay unbounded
            prop_assert_eq!((global.min[2], global.max[2]), (-f64::MAX, f64::MAX));
        }
    }
}
