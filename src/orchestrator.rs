//! Multi-weighting core preparation.
//!
//! A [`CorePrepSet`] owns one [`CorePreparation`] per configured weighting
//! and runs them on a dedicated rayon pool. Queries pick a preparation back
//! out with [`CorePrepSet::resolve`] using request hints.

use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::info;

use crate::core::{ContractionStats, CoreHierarchy, PrepareCore, PrepareParams};
use crate::error::CoreError;
use crate::filter::RestrictionSet;
use crate::graph::RoadGraph;
use crate::hints::{keys, QueryHints};
use crate::profiles;
use crate::props::PropertyStore;
use crate::weighting::{create_weighting, Weighting};

/// Configuration for the core preparation stage.
///
/// `weightings` is empty by default, which leaves the core disabled. Tuning
/// fields use -1 for "library default", mirroring [`PrepareParams`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Weighting names to prepare, normalized lowercase, duplicates removed.
    pub weightings: Vec<String>,
    /// Vehicle profile shared by all prepared weightings.
    pub vehicle: String,
    /// Worker threads for preparation. Values below 1 are treated as 1.
    pub preparation_threads: usize,
    /// Whether a request hint may bypass the prepared core.
    pub disabling_allowed: bool,
    pub periodic_updates: i32,
    pub lazy_updates: i32,
    pub neighbor_updates: i32,
    pub contracted_nodes: i32,
    pub log_messages: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            weightings: Vec::new(),
            vehicle: "car".to_string(),
            preparation_threads: 1,
            disabling_allowed: false,
            periodic_updates: -1,
            lazy_updates: -1,
            neighbor_updates: -1,
            contracted_nodes: -1,
            log_messages: -1.0,
        }
    }
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the weighting list from a comma-separated spec.
    ///
    /// Entries are trimmed and lowercased, duplicates keep their first
    /// position. A spec with no usable entries is an error rather than a
    /// silent disable.
    pub fn set_weightings(&mut self, spec: &str) -> Result<(), CoreError> {
        let list = parse_weighting_list(spec);
        if list.is_empty() {
            return Err(CoreError::EmptyWeightings);
        }
        self.weightings = list;
        Ok(())
    }

    pub fn has_weightings(&self) -> bool {
        !self.weightings.is_empty()
    }

    fn prepare_params(&self) -> PrepareParams {
        PrepareParams {
            periodic_updates: self.periodic_updates,
            lazy_updates: self.lazy_updates,
            neighbor_updates: self.neighbor_updates,
            contracted_nodes: self.contracted_nodes,
            log_messages: self.log_messages,
        }
    }
}

/// Splits a comma-separated weighting spec into normalized unique names.
pub fn parse_weighting_list(spec: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for raw in spec.split(',') {
        let name = raw.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}

/// One weighting's contraction work and its result.
#[derive(Debug)]
pub struct CorePreparation {
    weighting: Arc<dyn Weighting>,
    params: PrepareParams,
    hierarchy: Option<CoreHierarchy>,
    stats: Option<ContractionStats>,
}

impl CorePreparation {
    pub fn new(weighting: Arc<dyn Weighting>, params: PrepareParams) -> Self {
        CorePreparation {
            weighting,
            params,
            hierarchy: None,
            stats: None,
        }
    }

    pub fn weighting(&self) -> &Arc<dyn Weighting> {
        &self.weighting
    }

    pub fn is_prepared(&self) -> bool {
        self.hierarchy.is_some()
    }

    pub fn hierarchy(&self) -> Option<&CoreHierarchy> {
        self.hierarchy.as_ref()
    }

    /// Like [`hierarchy`](Self::hierarchy) but an error when preparation has
    /// not run yet.
    pub fn require_hierarchy(&self) -> Result<&CoreHierarchy, CoreError> {
        self.hierarchy.as_ref().ok_or(CoreError::NotPrepared)
    }

    pub fn stats(&self) -> Option<&ContractionStats> {
        self.stats.as_ref()
    }

    fn do_work(
        &mut self,
        graph: &RoadGraph,
        restrictions: &dyn RestrictionSet,
    ) -> Result<(), CoreError> {
        if graph.n_nodes() == 0 {
            return Err(CoreError::PrepareFailed {
                weighting: self.weighting.file_name(),
                reason: "graph has no nodes".to_string(),
            });
        }
        let prep = PrepareCore::new(graph, self.weighting.as_ref(), restrictions, self.params);
        let (hierarchy, stats) = prep.run();
        self.hierarchy = Some(hierarchy);
        self.stats = Some(stats);
        Ok(())
    }
}

/// The set of core preparations for one graph and vehicle.
///
/// Weightings and preparations are parallel lists. Weightings register
/// first, preparations attach in the same order, and any mismatch between
/// the two is an immediate error instead of a mis-wired hierarchy.
#[derive(Debug)]
pub struct CorePrepSet {
    weightings: Vec<Arc<dyn Weighting>>,
    preparations: Vec<CorePreparation>,
    enabled: bool,
    disabling_allowed: bool,
    threads: usize,
    params: PrepareParams,
}

impl CorePrepSet {
    /// Builds the set from configuration, resolving vehicle and weighting
    /// names to objects. An empty weighting list yields a disabled set.
    pub fn from_config(cfg: &CoreConfig) -> Result<Self, CoreError> {
        let mut set = CorePrepSet {
            weightings: Vec::new(),
            preparations: Vec::new(),
            enabled: cfg.has_weightings(),
            disabling_allowed: cfg.disabling_allowed,
            threads: cfg.preparation_threads.max(1),
            params: cfg.prepare_params(),
        };
        if !set.enabled {
            return Ok(set);
        }
        let profile =
            profiles::by_name(&cfg.vehicle).ok_or_else(|| CoreError::UnknownVehicle {
                requested: cfg.vehicle.clone(),
                available: profiles::known_names().join(", "),
            })?;
        for name in &cfg.weightings {
            set.add_weighting(create_weighting(name, profile.clone())?);
        }
        Ok(set)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disabling_allowed(&self) -> bool {
        self.disabling_allowed
    }

    pub fn set_disabling_allowed(&mut self, allowed: bool) {
        self.disabling_allowed = allowed;
    }

    pub fn add_weighting(&mut self, weighting: Arc<dyn Weighting>) {
        self.weightings.push(weighting);
        self.enabled = true;
    }

    /// Attaches the next preparation. Its index and weighting must line up
    /// with the registered weighting list.
    pub fn add_preparation(&mut self, prep: CorePreparation) -> Result<(), CoreError> {
        let index = self.preparations.len();
        let Some(expected) = self.weightings.get(index) else {
            return Err(CoreError::MissingWeighting { index });
        };
        if !Arc::ptr_eq(prep.weighting(), expected)
            && prep.weighting().file_name() != expected.file_name()
        {
            return Err(CoreError::WeightingMismatch {
                index,
                prepared: prep.weighting().file_name(),
                expected: expected.file_name(),
            });
        }
        self.preparations.push(prep);
        Ok(())
    }

    /// Creates a preparation for every registered weighting that lacks one.
    pub fn create_preparations(&mut self) {
        while self.preparations.len() < self.weightings.len() {
            let weighting = self.weightings[self.preparations.len()].clone();
            self.preparations
                .push(CorePreparation::new(weighting, self.params));
        }
    }

    pub fn preparations(&self) -> &[CorePreparation] {
        &self.preparations
    }

    /// Runs every pending preparation on a dedicated pool and stamps a
    /// `prepare.<weighting>` property on success.
    pub fn prepare_all(
        &mut self,
        graph: &RoadGraph,
        restrictions: &dyn RestrictionSet,
        props: &PropertyStore,
    ) -> Result<(), CoreError> {
        if !self.enabled {
            return Err(CoreError::Disabled);
        }
        self.create_preparations();
        if self.preparations.is_empty() {
            return Err(CoreError::EmptyWeightings);
        }
        let total = self.preparations.len();
        let threads = self.threads.min(total).max(1);
        info!(total, threads, "starting core preparations");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("core-prepare-{i}"))
            .build()
            .map_err(|e| CoreError::PrepareFailed {
                weighting: "pool".to_string(),
                reason: e.to_string(),
            })?;
        pool.install(|| {
            self.preparations
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(i, prep)| {
                    let name = prep.weighting().file_name();
                    info!(task = i + 1, total, weighting = %name, "core preparation started");
                    prep.do_work(graph, restrictions)?;
                    props.put(
                        format!("prepare.{name}"),
                        Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    );
                    Ok(())
                })
        })
    }

    /// Picks the preparation matching the request hints.
    ///
    /// A `core.disable` hint only takes effect when disabling is allowed,
    /// otherwise it is ignored. Zero matches and multiple matches are both
    /// errors so that a routing request never silently runs on the wrong
    /// hierarchy.
    pub fn resolve(&self, hints: &QueryHints) -> Result<&CorePreparation, CoreError> {
        let disable = hints.get_bool(keys::CORE_DISABLE).unwrap_or(false);
        if !self.enabled || (self.disabling_allowed && disable) {
            return Err(CoreError::Disabled);
        }
        if self.preparations.is_empty() {
            return Err(CoreError::NotPrepared);
        }
        let matches: Vec<&CorePreparation> = self
            .preparations
            .iter()
            .filter(|p| p.weighting().matches(hints))
            .collect();
        match matches.len() {
            1 => Ok(matches[0]),
            0 => Err(CoreError::UnknownWeighting {
                requested: requested_repr(hints),
                available: self.weighting_names(),
            }),
            n => Err(CoreError::AmbiguousWeighting {
                requested: requested_repr(hints),
                matches: n,
            }),
        }
    }

    /// Comma-joined identities of all registered weightings, for messages.
    pub fn weighting_names(&self) -> String {
        self.weightings
            .iter()
            .map(|w| w.file_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn requested_repr(hints: &QueryHints) -> String {
    format!(
        "{}/{}",
        hints.get_str(keys::WEIGHTING).unwrap_or("*"),
        hints.get_str(keys::VEHICLE).unwrap_or("*")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NoRestrictions;
    use crate::graph::GraphBuilder;
    use crate::graph::WayTags;

    fn two_weighting_config() -> CoreConfig {
        let mut cfg = CoreConfig::new();
        cfg.set_weightings("fastest, shortest").unwrap();
        cfg
    }

    #[test]
    fn weighting_list_normalizes_and_dedups() {
        let list = parse_weighting_list(" Fastest,shortest , fastest,,SHORTEST ");
        assert_eq!(list, vec!["fastest", "shortest"]);
        assert!(parse_weighting_list(" , ,").is_empty());
    }

    #[test]
    fn empty_weighting_spec_is_rejected() {
        let mut cfg = CoreConfig::new();
        assert!(matches!(
            cfg.set_weightings("  ,  "),
            Err(CoreError::EmptyWeightings)
        ));
    }

    #[test]
    fn config_without_weightings_disables_the_set() {
        let set = CorePrepSet::from_config(&CoreConfig::new()).unwrap();
        assert!(!set.is_enabled());
        assert!(matches!(
            set.resolve(&QueryHints::new()),
            Err(CoreError::Disabled)
        ));
    }

    #[test]
    fn unknown_vehicle_is_rejected() {
        let mut cfg = two_weighting_config();
        cfg.vehicle = "hovercraft".to_string();
        match CorePrepSet::from_config(&cfg) {
            Err(CoreError::UnknownVehicle { requested, .. }) => {
                assert_eq!(requested, "hovercraft")
            }
            other => panic!("expected UnknownVehicle, got {other:?}"),
        }
    }

    #[test]
    fn preparation_before_weighting_is_rejected() {
        let mut set = CorePrepSet::from_config(&CoreConfig::new()).unwrap();
        let w = create_weighting("fastest", profiles::by_name("car").unwrap()).unwrap();
        let prep = CorePreparation::new(w, PrepareParams::default());
        assert!(matches!(
            set.add_preparation(prep),
            Err(CoreError::MissingWeighting { index: 0 })
        ));
    }

    #[test]
    fn preparation_order_mismatch_is_rejected() {
        let mut set = CorePrepSet::from_config(&two_weighting_config()).unwrap();
        // First slot expects fastest_car.
        let w = create_weighting("shortest", profiles::by_name("car").unwrap()).unwrap();
        match set.add_preparation(CorePreparation::new(w, PrepareParams::default())) {
            Err(CoreError::WeightingMismatch {
                index,
                prepared,
                expected,
            }) => {
                assert_eq!(index, 0);
                assert_eq!(prepared, "shortest_car");
                assert_eq!(expected, "fastest_car");
            }
            other => panic!("expected WeightingMismatch, got {other:?}"),
        }
    }

    fn small_graph() -> crate::graph::RoadGraph {
        let mut b = GraphBuilder::new();
        b.add_nodes(3);
        b.add_edge(0, 1, 100_000, WayTags::default());
        b.add_edge(1, 2, 100_000, WayTags::default());
        b.build()
    }

    #[test]
    fn prepare_all_builds_every_hierarchy_and_stamps_props() {
        let graph = small_graph();
        let props = PropertyStore::in_memory();
        let mut set = CorePrepSet::from_config(&two_weighting_config()).unwrap();
        set.prepare_all(&graph, &NoRestrictions, &props).unwrap();

        assert_eq!(set.preparations().len(), 2);
        assert!(set.preparations().iter().all(|p| p.is_prepared()));
        let stamped = props.keys_with_prefix("prepare.");
        assert_eq!(stamped, vec!["prepare.fastest_car", "prepare.shortest_car"]);
        for key in stamped {
            let stamp = props.get(&key).unwrap();
            assert!(
                chrono::NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").is_ok(),
                "bad timestamp {stamp}"
            );
        }
    }

    #[test]
    fn prepare_all_fails_on_empty_graph() {
        let graph = GraphBuilder::new().build();
        let props = PropertyStore::in_memory();
        let mut cfg = CoreConfig::new();
        cfg.set_weightings("fastest").unwrap();
        let mut set = CorePrepSet::from_config(&cfg).unwrap();
        assert!(matches!(
            set.prepare_all(&graph, &NoRestrictions, &props),
            Err(CoreError::PrepareFailed { .. })
        ));
    }

    #[test]
    fn resolve_picks_by_hints_and_reports_misses() {
        let graph = small_graph();
        let props = PropertyStore::in_memory();
        let mut set = CorePrepSet::from_config(&two_weighting_config()).unwrap();
        set.prepare_all(&graph, &NoRestrictions, &props).unwrap();

        let hints = QueryHints::new().with(keys::WEIGHTING, "shortest");
        let prep = set.resolve(&hints).unwrap();
        assert_eq!(prep.weighting().name(), "shortest");
        // Same hints resolve to the same preparation object.
        assert!(std::ptr::eq(prep, set.resolve(&hints).unwrap()));

        // No hints match two preparations.
        assert!(matches!(
            set.resolve(&QueryHints::new()),
            Err(CoreError::AmbiguousWeighting { matches: 2, .. })
        ));

        match set.resolve(&QueryHints::new().with(keys::WEIGHTING, "spikiest")) {
            Err(CoreError::UnknownWeighting {
                requested,
                available,
            }) => {
                assert_eq!(requested, "spikiest/*");
                assert_eq!(available, "fastest_car, shortest_car");
            }
            other => panic!("expected UnknownWeighting, got {other:?}"),
        }
    }

    #[test]
    fn disable_hint_needs_permission() {
        let graph = small_graph();
        let props = PropertyStore::in_memory();
        let mut cfg = CoreConfig::new();
        cfg.set_weightings("fastest").unwrap();
        let mut set = CorePrepSet::from_config(&cfg).unwrap();
        set.prepare_all(&graph, &NoRestrictions, &props).unwrap();

        let hints = QueryHints::new().with(keys::CORE_DISABLE, "true");
        // Ignored while disabling is not allowed.
        assert!(set.resolve(&hints).is_ok());

        set.set_disabling_allowed(true);
        assert!(matches!(set.resolve(&hints), Err(CoreError::Disabled)));
    }
}
