//! Consistent evaluation: evaluate a source-mesh field at distributed target
//! points through a plan built once and reused.
//!
//! [`ConsistentEvaluation::setup`] discovers, for every target point, the
//! source rank owning an element that contains it, by way of a temporary
//! rendezvous decomposition. The result is a persistent export plan from
//! (element, point) pairs on source ranks back to the target layout.
//! [`ConsistentEvaluation::apply`] then only calls the evaluator and runs
//! that plan.
//!
//! Both calls are collective: every rank must make them in the same order,
//! with empty inputs where it has nothing to contribute.

use crate::algs::communicator::Communicator;
use crate::algs::distributor::Distributor;
use crate::algs::ordinals::{GlobalOrdinal, assign_point_ordinals};
use crate::algs::reduction::{agree, allreduce_sum_u64};
use crate::algs::rendezvous::{RcbRendezvous, RendezvousDecomposition};
use crate::algs::transfer_plan::TransferPlan;
use crate::data::distribution_map::DistributionMap;
use crate::data::field::{Field, FieldBuffer, FieldEvaluator, FieldMut};
use crate::data::mesh::Mesh;
use crate::data::multi_vector::{MultiVectorView, MultiVectorViewMut};
use crate::geometry::bounding_box::{BoundingBox, RendezvousBoxPolicy, padded_point};
use crate::transfer_error::{TransferError, ensure, invariant, require};
use hashbrown::HashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

const NO_OWNER: u64 = u64::MAX;

/// Tunables for [`ConsistentEvaluation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// How the rendezvous region is chosen.
    pub box_policy: RendezvousBoxPolicy,
    /// Slack for point-in-element tests, relative to element size. Must be
    /// finite and non-negative.
    pub geometric_tolerance: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            box_policy: RendezvousBoxPolicy::Intersection,
            geometric_tolerance: 1e-9,
        }
    }
}

/// Everything `apply()` needs, rebuilt by each `setup()`.
#[derive(Debug)]
struct Mapping {
    import_map: DistributionMap,
    export_map: DistributionMap,
    data_export: TransferPlan,
    source_elements: Vec<GlobalOrdinal>,
    target_coords: FieldBuffer,
    missed: Vec<usize>,
}

#[derive(Debug)]
pub struct ConsistentEvaluation<C: Communicator> {
    comm: C,
    config: EvaluationConfig,
    mapping: Option<Mapping>,
}

impl<C: Communicator> ConsistentEvaluation<C> {
    pub fn new(comm: C, config: EvaluationConfig) -> Self {
        Self {
            comm,
            config,
            mapping: None,
        }
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn is_setup(&self) -> bool {
        self.mapping.is_some()
    }

    /// Number of (element, point) pairs this rank evaluates on each `apply()`.
    pub fn num_source_pairs(&self) -> usize {
        self.mapping
            .as_ref()
            .map_or(0, |m| m.source_elements.len())
    }

    /// Local indices of target points inside no source element.
    ///
    /// `apply()` never writes these slots.
    pub fn missed_points(&self) -> &[usize] {
        self.mapping
            .as_ref()
            .map(|m| m.missed.as_slice())
            .unwrap_or_default()
    }

    /// Build the mapping with the default [`RcbRendezvous`] decomposition.
    pub fn setup<M, F>(&mut self, mesh: &M, coords: &F) -> Result<(), TransferError>
    where
        M: Mesh + ?Sized,
        F: Field + ?Sized,
    {
        let rendezvous = RcbRendezvous::new(self.config.geometric_tolerance);
        self.setup_with(mesh, coords, rendezvous)
    }

    /// Build the mapping through a caller-chosen rendezvous decomposition.
    ///
    /// Collective. Any previous mapping is discarded first, so a failed call
    /// leaves the evaluation un-set-up.
    pub fn setup_with<M, F, R>(
        &mut self,
        mesh: &M,
        coords: &F,
        mut rendezvous: R,
    ) -> Result<(), TransferError>
    where
        M: Mesh + ?Sized,
        F: Field + ?Sized,
        R: RendezvousDecomposition,
    {
        self.mapping = None;
        let comm = &self.comm;
        let me = comm.rank();
        agree(
            comm,
            check_setup_inputs(mesh, coords, self.config.geometric_tolerance),
            "setup input validation",
        )?;
        let dim = mesh.node_dimension();
        let num_points = coords.num_points();

        // 1) global boxes and the rendezvous region
        let mesh_box = BoundingBox::global_of_mesh(comm, mesh);
        let coord_box = BoundingBox::global_of_points(comm, coords.view(), dim);
        let rendezvous_box = self.config.box_policy.rendezvous_box(&mesh_box, &coord_box);
        log::debug!(
            "rank {me}: rendezvous box {:?}..{:?} ({:?})",
            rendezvous_box.min,
            rendezvous_box.max,
            self.config.box_policy
        );

        // 2) repartition the mesh
        rendezvous.build(comm, mesh, &rendezvous_box)?;

        // 3) target point ordinals and the import map
        let point_ordinals = assign_point_ordinals(comm, num_points);
        let import_map = DistributionMap::from_owned_ids(comm, &point_ordinals)
            .map_err(as_postcondition("data import map"))?;

        // 4) route point ordinals to their rendezvous owners
        let rendezvous_procs = rendezvous.owner_processes_of(coords.view(), dim);
        let point_distributor = Distributor::create_from_sends(comm, &rendezvous_procs)?;
        let rendezvous_points = point_distributor.exchange(comm, &point_ordinals, 1)?;
        log::debug!(
            "rank {me}: {} target points routed out, {} rendezvous points received",
            num_points,
            rendezvous_points.len()
        );

        // 5) move the coordinates along
        let rendezvous_map = DistributionMap::from_owned_ids(comm, &rendezvous_points)?;
        let point_exporter = TransferPlan::export(comm, &import_map, &rendezvous_map)?;
        let mut rendezvous_coords = FieldBuffer::zeros(dim, rendezvous_points.len());
        point_exporter.apply_insert(
            comm,
            &MultiVectorView::new(&import_map, coords.view(), dim)?,
            &mut MultiVectorViewMut::new(&rendezvous_map, rendezvous_coords.view_mut(), dim)?,
        )?;

        // 6) local element search, then the unique element set
        let containing = rendezvous.containing_elements_of(rendezvous_coords.view(), dim);
        let unique: Vec<GlobalOrdinal> = containing
            .iter()
            .flatten()
            .copied()
            .sorted_unstable()
            .dedup()
            .collect();
        log::debug!(
            "rank {me}: {} of {} rendezvous points inside {} distinct elements",
            containing.iter().flatten().count(),
            containing.len(),
            unique.len()
        );

        // 7) tag each unique element with its original owning rank
        let element_map = DistributionMap::from_owned_ids(comm, &unique)?;
        let mesh_element_map = DistributionMap::from_owned_ids(comm, mesh.element_ids())?;
        let owner_importer = TransferPlan::import(comm, &mesh_element_map, &element_map)?;
        let source_rank = vec![me as u64; mesh_element_map.local_len()];
        let mut element_owner = vec![NO_OWNER; unique.len()];
        owner_importer.apply_insert(
            comm,
            &MultiVectorView::new(&mesh_element_map, &source_rank, 1)?,
            &mut MultiVectorViewMut::new(&element_map, &mut element_owner, 1)?,
        )?;

        // 8) destination of every (element, point) occurrence
        let owner_of: HashMap<GlobalOrdinal, u64> =
            unique.iter().copied().zip(element_owner).collect();
        let occurrences = collect_occurrences(
            &containing,
            &owner_of,
            &rendezvous_points,
            &rendezvous_coords,
        );
        let occurrences = agree(comm, occurrences, "element owner lookup")?;

        // 9) ship pairs back to the source owners: one plan, three payloads
        let source_distributor = Distributor::create_from_sends(comm, &occurrences.dests)?;
        let source_elements = source_distributor.exchange(comm, &occurrences.elements, 1)?;
        let coords_entry_major = source_distributor.exchange(comm, &occurrences.coords, dim)?;
        let source_points = source_distributor.exchange(comm, &occurrences.ordinals, 1)?;
        let target_coords = FieldBuffer::from_entry_major(dim, &coords_entry_major)?;

        // 10) the persistent plan back to the target layout
        let export_map = DistributionMap::from_owned_ids(comm, &source_points)
            .map_err(as_postcondition("data export map"))?;
        let data_export = TransferPlan::export(comm, &export_map, &import_map)
            .map_err(as_postcondition("data exporter"))?;
        ensure(
            data_export.num_sends() == source_points.len(),
            "data exporter",
            format!(
                "{} of {} evaluation pairs have no target point",
                source_points.len().saturating_sub(data_export.num_sends()),
                source_points.len()
            ),
        )?;

        let mut mapped = vec![false; num_points];
        for &j in data_export.received_indices() {
            mapped[j] = true;
        }
        let missed: Vec<usize> = (0..num_points).filter(|&i| !mapped[i]).collect();
        let global_missed = allreduce_sum_u64(comm, missed.len() as u64);
        if !missed.is_empty() {
            log::warn!(
                "rank {me}: {} of {num_points} target points lie outside every source element",
                missed.len()
            );
        }
        if me == 0 {
            log::info!(
                "consistent evaluation ready: {} target points, {} unmapped",
                import_map.global_len(),
                global_missed
            );
        }
        log::debug!(
            "rank {me}: evaluates {} pairs per apply",
            source_elements.len()
        );

        self.mapping = Some(Mapping {
            import_map,
            export_map,
            data_export,
            source_elements,
            target_coords,
            missed,
        });
        Ok(())
    }

    /// Evaluate at the stored pairs and insert the values into `target`.
    ///
    /// Collective. Dimension and length checks run before any communication.
    /// Takes `&mut self` because the exchange must not run concurrently on
    /// one rank.
    pub fn apply<E, T>(&mut self, evaluator: &E, target: &mut T) -> Result<(), TransferError>
    where
        E: FieldEvaluator + ?Sized,
        T: FieldMut + ?Sized,
    {
        let mapping = self
            .mapping
            .as_ref()
            .ok_or_else(|| TransferError::Precondition("apply() called before setup()".into()))?;

        let evaluated = evaluator.evaluate(&mapping.source_elements, &mapping.target_coords);
        let dim = evaluated.dimension();
        if dim != target.dimension() {
            return Err(TransferError::DimensionMismatch {
                source_dim: dim,
                target_dim: target.dimension(),
            });
        }
        require(
            evaluated.size() == mapping.source_elements.len() * dim,
            format!(
                "evaluator returned {} values for {} points of dimension {dim}",
                evaluated.size(),
                mapping.source_elements.len()
            ),
        )?;
        require(
            target.size() == mapping.import_map.local_len() * dim,
            format!(
                "target holds {} values, expected {} points of dimension {dim}",
                target.size(),
                mapping.import_map.local_len()
            ),
        )?;

        let source = MultiVectorView::new(&mapping.export_map, evaluated.view(), dim)?;
        let mut dest = MultiVectorViewMut::new(&mapping.import_map, target.view_mut(), dim)?;
        mapping.data_export.apply_insert(&self.comm, &source, &mut dest)?;
        log::trace!(
            "rank {}: applied {} pairs into {} target points",
            self.comm.rank(),
            mapping.source_elements.len(),
            mapping.import_map.local_len()
        );
        Ok(())
    }
}

/// Per-occurrence send lists for step 9; `coords` is entry-major.
struct Occurrences {
    dests: Vec<usize>,
    elements: Vec<GlobalOrdinal>,
    coords: Vec<f64>,
    ordinals: Vec<GlobalOrdinal>,
}

fn collect_occurrences(
    containing: &[Option<GlobalOrdinal>],
    owner_of: &HashMap<GlobalOrdinal, u64>,
    ordinals: &[GlobalOrdinal],
    coords: &FieldBuffer,
) -> Result<Occurrences, TransferError> {
    let dim = coords.dimension();
    let n = coords.num_points();
    let mut out = Occurrences {
        dests: Vec::new(),
        elements: Vec::new(),
        coords: Vec::new(),
        ordinals: Vec::new(),
    };
    for (i, element) in containing.iter().enumerate() {
        let Some(element) = *element else {
            continue;
        };
        let owner = owner_of.get(&element).copied().unwrap_or(NO_OWNER);
        invariant(
            owner != NO_OWNER,
            format!("element {element} found in the rendezvous domain has no source owner"),
        )?;
        out.dests.push(owner as usize);
        out.elements.push(element);
        out.coords
            .extend_from_slice(&padded_point(coords.view(), dim, n, i)[..dim]);
        out.ordinals.push(ordinals[i]);
    }
    Ok(out)
}

fn check_setup_inputs<M, F>(mesh: &M, coords: &F, tolerance: f64) -> Result<(), TransferError>
where
    M: Mesh + ?Sized,
    F: Field + ?Sized,
{
    require(
        tolerance.is_finite() && tolerance >= 0.0,
        format!("geometric tolerance must be finite and non-negative, got {tolerance}"),
    )?;
    let dim = mesh.node_dimension();
    require(
        (1..=3).contains(&dim),
        format!("mesh node dimension must be 1, 2 or 3, got {dim}"),
    )?;
    if coords.dimension() != dim {
        return Err(TransferError::DimensionMismatch {
            source_dim: dim,
            target_dim: coords.dimension(),
        });
    }
    require(
        coords.size() % dim == 0,
        format!("{} coordinates do not split into {dim}D points", coords.size()),
    )
}

fn as_postcondition(artifact: &'static str) -> impl FnOnce(TransferError) -> TransferError {
    move |e| match e {
        TransferError::InvalidMap(message) | TransferError::Invariant(message) => {
            TransferError::Postcondition { artifact, message }
        }
        other => other,
    }
}
