use std::collections::HashSet;

use rand::Rng;

// Width of one percentage point in the u32 checksum space
const BUCKET_WIDTH: u32 = u32::MAX / 100;

/// How `Feature::is_team_active` evaluates the percentage rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolloutMode {
    /// Hash the feature name and team id into a stable bucket. A team admitted at some
    /// percentage stays admitted at every higher percentage.
    #[default]
    Deterministic,
    /// Draw a fresh random number on every evaluation. Repeated checks for the same team
    /// can disagree.
    Randomized,
}

/// A feature toggle, identified by name and hydrated from redis by the `Manager`.
///
/// The name is never persisted, it is part of the redis key. Everything that changes the
/// record takes `&mut self`, so a record can't be mutated while another task reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    name: String,
    percentage: u8,
    team_ids: HashSet<i64>,
}

impl Feature {
    pub fn new(name: impl Into<String>) -> Self {
        Feature {
            name: name.into(),
            percentage: 0,
            team_ids: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn team_ids(&self) -> &HashSet<i64> {
        &self.team_ids
    }

    /// Team ids in ascending order, for stable output.
    pub fn sorted_team_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.team_ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn hydrate(&mut self, percentage: u8, team_ids: HashSet<i64>) {
        self.percentage = percentage;
        self.team_ids = team_ids;
    }

    pub(crate) fn activate(&mut self) {
        self.percentage = 100;
    }

    /// Full reset: the percentage and every team override are cleared.
    pub(crate) fn deactivate(&mut self) {
        self.percentage = 0;
        self.team_ids.clear();
    }

    pub(crate) fn activate_percentage(&mut self, percentage: u8) {
        debug_assert!(percentage <= 100, "percentage validated by the manager");
        self.percentage = percentage;
    }

    pub(crate) fn activate_team(&mut self, team_id: i64) {
        self.team_ids.insert(team_id);
    }

    pub(crate) fn deactivate_team(&mut self, team_id: i64) {
        self.team_ids.remove(&team_id);
    }

    /// Whether the feature is globally on. Team overrides don't count.
    pub fn is_active(&self) -> bool {
        self.percentage == 100
    }

    pub fn is_team_active(&self, team_id: i64, mode: RolloutMode) -> bool {
        if self.percentage == 100 {
            return true;
        }

        if self.in_rollout(team_id, mode) {
            return true;
        }

        self.team_ids.contains(&team_id)
    }

    fn in_rollout(&self, team_id: i64, mode: RolloutMode) -> bool {
        match mode {
            RolloutMode::Deterministic => {
                bucket_checksum(&self.name, team_id) < BUCKET_WIDTH * u32::from(self.percentage)
            }
            RolloutMode::Randomized => {
                rand::thread_rng().gen_range(0..100u8) < self.percentage
            }
        }
    }
}

/// CRC-32 (IEEE) of the feature name followed by the decimal team id.
pub fn bucket_checksum(name: &str, team_id: i64) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(team_id.to_string().as_bytes());
    hasher.finalize()
}
