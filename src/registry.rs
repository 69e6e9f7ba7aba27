//! Named routing profiles and live data swaps.
//!
//! A [`RoutingProfile`] hands out [`ProfileUse`] guards that pin the current
//! [`ProfileData`] for the duration of a query. [`RoutingProfile::swap`]
//! installs freshly prepared data once every guard has dropped, waiting on a
//! condvar rather than spinning. Queries that started before the swap keep
//! their pinned data; queries that start after see the new data.

use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::graph::RoadGraph;
use crate::orchestrator::CorePrepSet;
use crate::props::PropertyStore;

/// Everything a profile needs to answer queries, swapped as one unit.
pub struct ProfileData {
    pub graph: Arc<RoadGraph>,
    pub prep_set: CorePrepSet,
    pub props: Arc<PropertyStore>,
}

struct ProfileState {
    data: Arc<ProfileData>,
    in_use: usize,
}

/// One named profile with swappable data.
pub struct RoutingProfile {
    name: String,
    state: Mutex<ProfileState>,
    drained: Condvar,
}

impl RoutingProfile {
    pub fn new(name: impl Into<String>, data: ProfileData) -> Self {
        RoutingProfile {
            name: name.into(),
            state: Mutex::new(ProfileState {
                data: Arc::new(data),
                in_use: 0,
            }),
            drained: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pins the current data for a query. The swap gate counts the guard
    /// until it drops.
    pub fn begin_use(&self) -> ProfileUse<'_> {
        let mut state = self.state.lock();
        state.in_use += 1;
        ProfileUse {
            data: state.data.clone(),
            profile: self,
        }
    }

    /// Number of guards currently alive.
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Replaces the profile data once in-flight uses have drained.
    ///
    /// With a timeout, gives up after waiting that long and keeps the
    /// current data. Readers arriving while the swap waits still get the old
    /// data and extend the wait; the timeout bounds that.
    pub fn swap(
        &self,
        new_data: ProfileData,
        timeout: Option<Duration>,
    ) -> Result<(), CoreError> {
        let start = Instant::now();
        let mut state = self.state.lock();
        match timeout {
            Some(limit) => {
                let result =
                    self.drained
                        .wait_while_for(&mut state, |s| s.in_use > 0, limit);
                if result.timed_out() && state.in_use > 0 {
                    let waited_ms = start.elapsed().as_millis() as u64;
                    warn!(
                        profile = %self.name,
                        waited_ms,
                        in_use = state.in_use,
                        "swap timed out, keeping current data"
                    );
                    return Err(CoreError::SwapTimedOut {
                        profile: self.name.clone(),
                        waited_ms,
                        in_use: state.in_use,
                    });
                }
            }
            None => self.drained.wait_while(&mut state, |s| s.in_use > 0),
        }
        state.data = Arc::new(new_data);
        info!(profile = %self.name, waited_ms = start.elapsed().as_millis() as u64, "profile data swapped");
        Ok(())
    }
}

/// Guard pinning one profile's data. Dereferences to [`ProfileData`].
pub struct ProfileUse<'a> {
    data: Arc<ProfileData>,
    profile: &'a RoutingProfile,
}

impl Deref for ProfileUse<'_> {
    type Target = ProfileData;

    fn deref(&self) -> &ProfileData {
        &self.data
    }
}

impl Drop for ProfileUse<'_> {
    fn drop(&mut self) {
        let mut state = self.profile.state.lock();
        state.in_use -= 1;
        if state.in_use == 0 {
            self.profile.drained.notify_all();
        }
    }
}

/// All routing profiles by name.
#[derive(Default)]
pub struct ProfileRegistry {
    profiles: FxHashMap<String, RoutingProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile under its name, replacing any previous one.
    pub fn insert(&mut self, profile: RoutingProfile) {
        self.profiles.insert(profile.name().to_string(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&RoutingProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, WayTags};
    use crate::orchestrator::CoreConfig;

    fn data_with_nodes(n: u32) -> ProfileData {
        let mut b = GraphBuilder::new();
        b.add_nodes(n as usize);
        for v in 1..n {
            b.add_edge(v - 1, v, 50_000, WayTags::default());
        }
        ProfileData {
            graph: Arc::new(b.build()),
            prep_set: CorePrepSet::from_config(&CoreConfig::new()).unwrap(),
            props: Arc::new(PropertyStore::in_memory()),
        }
    }

    #[test]
    fn guards_pin_data_and_count() {
        let profile = RoutingProfile::new("car", data_with_nodes(3));
        assert_eq!(profile.in_use(), 0);
        let a = profile.begin_use();
        let b = profile.begin_use();
        assert_eq!(profile.in_use(), 2);
        assert_eq!(a.graph.n_nodes(), 3);
        drop(a);
        assert_eq!(profile.in_use(), 1);
        drop(b);
        assert_eq!(profile.in_use(), 0);
    }

    #[test]
    fn swap_times_out_while_a_guard_is_held() {
        let profile = RoutingProfile::new("car", data_with_nodes(3));
        let guard = profile.begin_use();

        match profile.swap(data_with_nodes(5), Some(Duration::from_millis(20))) {
            Err(CoreError::SwapTimedOut {
                profile: name,
                in_use,
                ..
            }) => {
                assert_eq!(name, "car");
                assert_eq!(in_use, 1);
            }
            other => panic!("expected SwapTimedOut, got {other:?}"),
        }
        // Old data stays in place after the failed swap.
        assert_eq!(guard.graph.n_nodes(), 3);
        drop(guard);
        assert_eq!(profile.begin_use().graph.n_nodes(), 3);

        profile
            .swap(data_with_nodes(5), Some(Duration::from_millis(20)))
            .unwrap();
        assert_eq!(profile.begin_use().graph.n_nodes(), 5);
    }

    #[test]
    fn swap_waits_for_a_threaded_reader() {
        let profile = RoutingProfile::new("car", data_with_nodes(3));
        std::thread::scope(|scope| {
            let guard = profile.begin_use();
            scope.spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                assert_eq!(guard.graph.n_nodes(), 3);
                drop(guard);
            });
            // Unbounded wait finishes once the reader drops its guard.
            profile.swap(data_with_nodes(4), None).unwrap();
        });
        assert_eq!(profile.begin_use().graph.n_nodes(), 4);
        assert_eq!(profile.in_use(), 0);
    }

    #[test]
    fn registry_finds_profiles_by_name() {
        let mut registry = ProfileRegistry::new();
        assert!(registry.is_empty());
        registry.insert(RoutingProfile::new("car", data_with_nodes(2)));
        registry.insert(RoutingProfile::new("foot", data_with_nodes(2)));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["car", "foot"]);
        assert!(registry.get("car").is_some());
        assert!(registry.get("bike").is_none());
    }
}
