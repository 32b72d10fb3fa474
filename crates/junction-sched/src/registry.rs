//! Lane registry - per-lane observed state
//!
//! The lane set is fixed at construction. Observations overwrite the traffic
//! fields of a lane and never touch its phase or countdown; those belong to
//! the scheduler.

use std::collections::{BTreeMap, BTreeSet};

use junction_core::{JunctionError, JunctionResult, Lane, LaneId, LaneState, Observation};

/// Ordered, fixed set of lanes
#[derive(Clone, Debug)]
pub struct LaneRegistry {
    lanes: BTreeMap<LaneId, Lane>,
    /// Ascending ids, the round-robin order
    order: Vec<LaneId>,
}

impl LaneRegistry {
    /// Build a registry from a non-empty, duplicate-free set of ids
    pub fn new(ids: impl IntoIterator<Item = LaneId>) -> JunctionResult<Self> {
        let mut seen = BTreeSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(JunctionError::DuplicateLane(id));
            }
        }
        if seen.is_empty() {
            return Err(JunctionError::EmptyLaneSet);
        }

        let order: Vec<LaneId> = seen.into_iter().collect();
        let lanes = order.iter().map(|&id| (id, Lane::new(id))).collect();
        Ok(LaneRegistry { lanes, order })
    }

    /// Overwrite a lane's vehicle count and ambulance flag
    ///
    /// Unknown ids are rejected and leave the registry untouched.
    pub fn observe(&mut self, lane_id: LaneId, vehicle_count: u32, has_ambulance: bool) -> JunctionResult<()> {
        let lane = self
            .lanes
            .get_mut(&lane_id)
            .ok_or(JunctionError::InvalidLane(lane_id))?;
        lane.vehicle_count = vehicle_count;
        lane.has_ambulance = has_ambulance;
        Ok(())
    }

    /// Observe several lanes at once; all ids are checked before any write
    pub fn observe_all(&mut self, observations: &[(LaneId, Observation)]) -> JunctionResult<()> {
        if let Some((id, _)) = observations.iter().find(|(id, _)| !self.contains(*id)) {
            return Err(JunctionError::InvalidLane(*id));
        }
        for (id, obs) in observations {
            self.observe(*id, obs.vehicle_count, obs.has_ambulance)?;
        }
        Ok(())
    }

    pub fn get(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: LaneId) -> Option<&mut Lane> {
        self.lanes.get_mut(&id)
    }

    pub fn contains(&self, id: LaneId) -> bool {
        self.lanes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Lane ids in ascending order
    pub fn ids(&self) -> &[LaneId] {
        &self.order
    }

    /// Lanes in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    pub fn first(&self) -> LaneId {
        self.order[0]
    }

    pub fn last(&self) -> LaneId {
        self.order[self.order.len() - 1]
    }

    /// Lane `steps` positions after `id` in the wrapping id sequence
    pub fn successor(&self, id: LaneId, steps: usize) -> LaneId {
        let n = self.order.len();
        let pos = self.order.binary_search(&id).unwrap_or_else(|p| p % n);
        self.order[(pos + steps) % n]
    }

    /// Snapshot of every lane, ordered by id
    pub fn snapshot(&self) -> Vec<LaneState> {
        self.lanes.values().map(Lane::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::Phase;

    fn ids(raw: &[u32]) -> Vec<LaneId> {
        raw.iter().copied().map(LaneId::new).collect()
    }

    #[test]
    fn test_registry_orders_ids() {
        let registry = LaneRegistry::new(ids(&[4, 2, 3, 1])).unwrap();
        assert_eq!(registry.ids(), ids(&[1, 2, 3, 4]).as_slice());
        assert_eq!(registry.first(), LaneId::new(1));
        assert_eq!(registry.last(), LaneId::new(4));
    }

    #[test]
    fn test_registry_rejects_bad_lane_sets() {
        assert_eq!(
            LaneRegistry::new(Vec::new()).unwrap_err(),
            JunctionError::EmptyLaneSet
        );
        assert_eq!(
            LaneRegistry::new(ids(&[1, 2, 2])).unwrap_err(),
            JunctionError::DuplicateLane(LaneId::new(2))
        );
    }

    #[test]
    fn test_observe_overwrites_traffic_only() {
        let mut registry = LaneRegistry::new(ids(&[1, 2])).unwrap();
        registry.observe(LaneId::new(2), 7, true).unwrap();

        let lane = registry.get(LaneId::new(2)).unwrap();
        assert_eq!(lane.vehicle_count, 7);
        assert!(lane.has_ambulance);
        assert_eq!(lane.phase, Phase::Red);

        registry.observe(LaneId::new(2), 0, false).unwrap();
        let lane = registry.get(LaneId::new(2)).unwrap();
        assert_eq!(lane.vehicle_count, 0);
        assert!(!lane.has_ambulance);
    }

    #[test]
    fn test_observe_unknown_lane_is_noop() {
        let mut registry = LaneRegistry::new(ids(&[1, 2, 3, 4])).unwrap();
        registry.observe(LaneId::new(1), 5, false).unwrap();
        let before = registry.snapshot();

        let err = registry.observe(LaneId::new(99), 3, true).unwrap_err();

        assert_eq!(err, JunctionError::InvalidLane(LaneId::new(99)));
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_observe_all_is_atomic() {
        let mut registry = LaneRegistry::new(ids(&[1, 2])).unwrap();
        let batch = [
            (LaneId::new(1), Observation::new(9, false)),
            (LaneId::new(5), Observation::new(1, false)),
        ];

        assert!(registry.observe_all(&batch).is_err());
        assert_eq!(registry.get(LaneId::new(1)).unwrap().vehicle_count, 0);
    }

    #[test]
    fn test_successor_wraps() {
        let registry = LaneRegistry::new(ids(&[10, 20, 30])).unwrap();
        assert_eq!(registry.successor(LaneId::new(30), 1), LaneId::new(10));
        assert_eq!(registry.successor(LaneId::new(10), 2), LaneId::new(30));
        assert_eq!(registry.successor(LaneId::new(20), 3), LaneId::new(20));
    }
}
