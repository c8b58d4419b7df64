use std::sync::Arc;

use common_redis::{Client, CustomRedisError, MGetValue, RedisClient};
use tracing::{debug, instrument, warn};

use crate::codec::{self, FeatureRecord};
use crate::config::Config;
use crate::errors::RolloutError;
use crate::feature::{Feature, RolloutMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Persists and fetches feature toggles to/from redis.
///
/// Nothing is cached: every call reads the current value from redis. Mutations are a plain
/// read, modify, write with no locking or version check, so two writers racing on the same
/// feature can lose one of the updates. Callers that need serialized writes must coordinate
/// outside of the manager.
pub struct Manager {
    client: Arc<dyn Client + Send + Sync>,
    key_prefix: String,
    mode: RolloutMode,
}

impl Manager {
    pub fn new(
        client: Arc<dyn Client + Send + Sync>,
        key_prefix: impl Into<String>,
        mode: RolloutMode,
    ) -> Self {
        Manager {
            client,
            key_prefix: key_prefix.into(),
            mode,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, RolloutError> {
        let client = RedisClient::with_config(
            config.redis_url.clone(),
            config.redis_response_timeout(),
            config.redis_connection_timeout(),
        )
        .await?;

        Ok(Manager::new(
            Arc::new(client),
            config.key_prefix.clone(),
            config.rollout_mode(),
        ))
    }

    pub fn key_name(&self, feature: &Feature) -> Result<String, RolloutError> {
        let name = feature.name();
        if name.is_empty() || name.contains(':') {
            return Err(RolloutError::InvalidFeatureName(name.to_string()));
        }
        Ok(format!("{}:{}", self.key_prefix, name))
    }

    /// Align the feature with the value currently in redis. A feature that isn't stored is
    /// inactive.
    #[instrument(skip_all, fields(feature = %feature.name()))]
    pub async fn get(&self, feature: &mut Feature) -> Result<(), RolloutError> {
        let key = self.key_name(feature)?;

        match self.client.get_raw_bytes(key).await {
            Ok(data) => codec::decode_into(&data, feature)?,
            Err(CustomRedisError::NotFound) => {
                debug!("feature not in redis, treating as inactive");
                feature.deactivate();
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Globally activates the feature
    pub async fn activate(&self, feature: &mut Feature) -> Result<(), RolloutError> {
        self.update(feature, Feature::activate).await
    }

    /// Globally deactivates the feature, dropping every team override
    pub async fn deactivate(&self, feature: &mut Feature) -> Result<(), RolloutError> {
        self.update(feature, Feature::deactivate).await
    }

    /// Activates the feature for a percentage of teams
    pub async fn activate_percentage(
        &self,
        feature: &mut Feature,
        percentage: u8,
    ) -> Result<(), RolloutError> {
        if percentage > 100 {
            return Err(RolloutError::InvalidPercentage(percentage));
        }
        self.update(feature, |f| f.activate_percentage(percentage))
            .await
    }

    /// Activates the feature for a specific team
    pub async fn activate_team(
        &self,
        team_id: i64,
        feature: &mut Feature,
    ) -> Result<(), RolloutError> {
        self.update(feature, |f| f.activate_team(team_id)).await
    }

    /// Deactivates the feature for a specific team
    pub async fn deactivate_team(
        &self,
        team_id: i64,
        feature: &mut Feature,
    ) -> Result<(), RolloutError> {
        self.update(feature, |f| f.deactivate_team(team_id)).await
    }

    #[instrument(skip_all, fields(feature = %feature.name()))]
    async fn update<F>(&self, feature: &mut Feature, mutate: F) -> Result<(), RolloutError>
    where
        F: FnOnce(&mut Feature),
    {
        self.get(feature).await?;

        // the caller's feature only takes the change once redis has accepted it
        let mut updated = feature.clone();
        mutate(&mut updated);
        let data = codec::encode(&updated)?;

        self.client.set_bytes(self.key_name(&updated)?, data).await?;

        debug!(
            percentage = updated.percentage(),
            teams = updated.team_ids().len(),
            "feature written to redis"
        );
        *feature = updated;
        Ok(())
    }

    /// Returns whether the given feature is globally active
    pub async fn is_active(&self, feature: &mut Feature) -> Result<bool, RolloutError> {
        self.get(feature).await?;
        Ok(feature.is_active())
    }

    /// Returns whether the given feature is active for a team
    pub async fn is_team_active(
        &self,
        team_id: i64,
        feature: &mut Feature,
    ) -> Result<bool, RolloutError> {
        self.get(feature).await?;
        Ok(feature.is_team_active(team_id, self.mode))
    }

    /// Returns whether each of the given features is globally active, in order
    pub async fn is_active_multi(
        &self,
        features: &mut [Feature],
    ) -> Result<Vec<bool>, RolloutError> {
        self.fetch_multi(features).await?;
        Ok(features.iter().map(Feature::is_active).collect())
    }

    /// Returns whether each of the given features is active for a team, in order
    pub async fn is_team_active_multi(
        &self,
        team_id: i64,
        features: &mut [Feature],
    ) -> Result<Vec<bool>, RolloutError> {
        self.fetch_multi(features).await?;
        Ok(features
            .iter()
            .map(|f| f.is_team_active(team_id, self.mode))
            .collect())
    }

    // Hydrates every feature from one MGET. All entries are decoded before any feature is
    // touched, so on error the features keep their previous state.
    #[instrument(skip_all, fields(features = features.len()))]
    async fn fetch_multi(&self, features: &mut [Feature]) -> Result<(), RolloutError> {
        if features.is_empty() {
            return Ok(());
        }

        let keys = features
            .iter()
            .map(|f| self.key_name(f))
            .collect::<Result<Vec<_>, _>>()?;

        let values = self.client.mget(keys.clone()).await?;
        if values.len() != keys.len() {
            return Err(RolloutError::BatchLengthMismatch {
                requested: keys.len(),
                received: values.len(),
            });
        }

        let records = keys
            .into_iter()
            .zip(values)
            .map(|(key, value)| decode_entry(key, value))
            .collect::<Result<Vec<_>, _>>()?;

        for (feature, record) in features.iter_mut().zip(records) {
            match record {
                Some(record) => feature.hydrate(record.percentage, record.team_ids),
                None => feature.deactivate(),
            }
        }

        Ok(())
    }

    /// Every feature stored under this manager's prefix, sorted by name.
    #[instrument(skip_all, fields(prefix = %self.key_prefix))]
    pub async fn list(&self) -> Result<Vec<Feature>, RolloutError> {
        let key_start = format!("{}:", self.key_prefix);

        let mut keys = self.client.scan_keys(format!("{key_start}*")).await?;
        if keys.is_empty() {
            return Ok(vec![]);
        }
        // SCAN can hand back a key more than once
        keys.sort();
        keys.dedup();

        let values = self.client.mget(keys.clone()).await?;
        if values.len() != keys.len() {
            return Err(RolloutError::BatchLengthMismatch {
                requested: keys.len(),
                received: values.len(),
            });
        }

        let mut features = Vec::with_capacity(keys.len());
        for (key, value) in keys.into_iter().zip(values) {
            let name = key.strip_prefix(&key_start).unwrap_or(&key).to_string();
            // deleted between SCAN and MGET
            let Some(record) = decode_entry(key, value)? else {
                continue;
            };

            let mut feature = Feature::new(name);
            feature.hydrate(record.percentage, record.team_ids);
            features.push(feature);
        }

        Ok(features)
    }

    /// Removes the feature from redis.
    #[instrument(skip_all, fields(feature = %feature.name()))]
    pub async fn delete(&self, feature: &Feature) -> Result<DeleteOutcome, RolloutError> {
        let removed = self.client.del(self.key_name(feature)?).await?;

        if removed == 0 {
            debug!("feature not in redis, nothing to delete");
            Ok(DeleteOutcome::NotFound)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }
}

fn decode_entry(key: String, value: MGetValue) -> Result<Option<FeatureRecord>, RolloutError> {
    match value {
        MGetValue::Absent => Ok(None),
        MGetValue::Payload(data) => Ok(Some(codec::decode(&data)?)),
        MGetValue::Malformed(detail) => {
            warn!(key = %key, detail = %detail, "unexpected redis value for feature");
            Err(RolloutError::MalformedEntry { key, detail })
        }
    }
}
