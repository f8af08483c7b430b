use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Features an organization can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Clients,
    Events,
    Payments,
    Team,
    Venue,
    Tasks,
}

impl Feature {
    /// Features stored as `{ access, ...sub-capabilities }` objects
    pub const STRUCTURED: [Feature; 4] = [
        Feature::Events,
        Feature::Payments,
        Feature::Team,
        Feature::Venue,
    ];

    /// Key used in the stored organization document
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Clients => "clients",
            Feature::Events => "events",
            Feature::Payments => "payments",
            Feature::Team => "team",
            Feature::Venue => "venue",
            Feature::Tasks => "tasks",
        }
    }

    /// Known sub-capabilities; empty for flat features
    pub fn capability_names(&self) -> &'static [&'static str] {
        match self {
            Feature::Events => EventsFeature::NAMES,
            Feature::Payments => PaymentsFeature::NAMES,
            Feature::Team => TeamFeature::NAMES,
            Feature::Venue => VenueFeature::NAMES,
            Feature::Clients | Feature::Tasks => &[],
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored value of a structured feature.
///
/// Older organization documents hold a plain boolean per feature, newer ones an
/// object of capability flags. The shape is resolved once here so that no read
/// site has to inspect raw JSON. Anything that is neither a boolean nor an
/// object is treated as never configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FeatureValue {
    Legacy(bool),
    Structured(Map<String, Value>),
    #[default]
    Unset,
}

impl From<Value> for FeatureValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(flag) => FeatureValue::Legacy(flag),
            Value::Object(map) => FeatureValue::Structured(map),
            _ => FeatureValue::Unset,
        }
    }
}

impl<'de> Deserialize<'de> for FeatureValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(FeatureValue::from)
    }
}

/// Accepts any JSON value and keeps it only if it is a boolean
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_bool())
}

/// Feature configuration as stored on an organization, possibly partial or legacy-shaped
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialFeatureConfig {
    #[serde(deserialize_with = "lenient_bool")]
    pub clients: Option<bool>,
    pub events: FeatureValue,
    pub payments: FeatureValue,
    pub team: FeatureValue,
    pub venue: FeatureValue,
    #[serde(deserialize_with = "lenient_bool")]
    pub tasks: Option<bool>,
}

impl PartialFeatureConfig {
    /// Read a stored `subscribed_features` document. Never fails: anything that
    /// is not a JSON object reads as an empty configuration.
    pub fn from_json(stored: &Value) -> Self {
        match stored {
            Value::Object(_) => serde_json::from_value(stored.clone()).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// Common behaviour of the structured feature records
pub trait Capabilities: Default {
    /// Sub-capability names, `access` excluded
    const NAMES: &'static [&'static str];

    /// Flag lookup by name, including `access`
    fn flag(&self, name: &str) -> Option<bool>;

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool>;

    /// Unrecognized keys carried over from the stored document
    fn extras(&self) -> &BTreeMap<String, Value>;

    fn extras_mut(&mut self) -> &mut BTreeMap<String, Value>;

    fn access(&self) -> bool {
        self.flag("access").unwrap_or(false)
    }

    /// A sub-capability is granted when the feature is accessible and the
    /// capability is not explicitly switched off.
    fn grants(&self, capability: &str) -> bool {
        if !self.access() {
            return false;
        }

        match self.flag(capability) {
            Some(flag) => flag,
            None => self.extras().get(capability).and_then(Value::as_bool) != Some(false),
        }
    }

    /// Merge a stored value over the defaults
    fn merge(stored: &FeatureValue) -> Self {
        let mut feature = Self::default();

        match stored {
            FeatureValue::Legacy(flag) => {
                if let Some(access) = feature.flag_mut("access") {
                    *access = *flag;
                }
            }
            FeatureValue::Structured(map) => {
                for (key, value) in map {
                    match feature.flag_mut(key) {
                        // Known keys only take boolean overrides. Anything else keeps
                        // the default, so a non-boolean `access` leaves the feature enabled.
                        Some(slot) => {
                            if let Some(flag) = value.as_bool() {
                                *slot = flag;
                            }
                        }
                        None => {
                            feature.extras_mut().insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            FeatureValue::Unset => {}
        }

        feature
    }
}

macro_rules! structured_feature {
    ($(#[$meta:meta])* $name:ident { $($capability:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub struct $name {
            pub access: bool,
            $(pub $capability: bool,)+
            #[serde(flatten)]
            pub extras: BTreeMap<String, Value>,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    access: true,
                    $($capability: true,)+
                    extras: BTreeMap::new(),
                }
            }
        }

        impl Capabilities for $name {
            const NAMES: &'static [&'static str] = &[$(stringify!($capability)),+];

            fn flag(&self, name: &str) -> Option<bool> {
                if name == "access" {
                    return Some(self.access);
                }
                $(
                    if name == stringify!($capability) {
                        return Some(self.$capability);
                    }
                )+
                None
            }

            fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
                if name == "access" {
                    return Some(&mut self.access);
                }
                $(
                    if name == stringify!($capability) {
                        return Some(&mut self.$capability);
                    }
                )+
                None
            }

            fn extras(&self) -> &BTreeMap<String, Value> {
                &self.extras
            }

            fn extras_mut(&mut self) -> &mut BTreeMap<String, Value> {
                &mut self.extras
            }
        }
    };
}

structured_feature! {
    /// Event management: guest lists, event payments and event tasks
    EventsFeature { guests, payments, tasks }
}

structured_feature! {
    /// Client and vendor payment tracking
    PaymentsFeature { client, vendor }
}

structured_feature! {
    /// Team member management and export
    TeamFeature { manage, export }
}

structured_feature! {
    /// Venue profile, gallery, packages, availability and venue tasks
    VenueFeature { profile, gallery, packages, availability, tasks }
}

/// Fully populated feature configuration of an organization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureConfig {
    pub clients: bool,
    pub events: EventsFeature,
    pub payments: PaymentsFeature,
    pub team: TeamFeature,
    pub venue: VenueFeature,
    pub tasks: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        normalize(&PartialFeatureConfig::default())
    }
}

impl FeatureConfig {
    /// Whether a feature, or one of its sub-capabilities, is granted.
    /// Flat features ignore `capability`.
    pub fn allows(&self, feature: Feature, capability: Option<&str>) -> bool {
        fn gate<F: Capabilities>(feature: &F, capability: Option<&str>) -> bool {
            match capability {
                Some(name) => feature.grants(name),
                None => feature.access(),
            }
        }

        match feature {
            Feature::Clients => self.clients,
            Feature::Tasks => self.tasks,
            Feature::Events => gate(&self.events, capability),
            Feature::Payments => gate(&self.payments, capability),
            Feature::Team => gate(&self.team, capability),
            Feature::Venue => gate(&self.venue, capability),
        }
    }

    /// Like [`FeatureConfig::allows`], failing with `FeatureDisabled` when not granted
    pub fn require(&self, feature: Feature, capability: Option<&str>) -> AppResult<()> {
        if self.allows(feature, capability) {
            return Ok(());
        }

        let feature = match capability {
            Some(name) => format!("{}.{}", feature, name),
            None => feature.to_string(),
        };
        Err(AppError::FeatureDisabled { feature })
    }
}

/// Produce the canonical configuration from a stored one.
///
/// Legacy booleans set `access` only; sub-capabilities keep their defaults
/// even when `access` is false, so consumers must check `access` first.
pub fn normalize(stored: &PartialFeatureConfig) -> FeatureConfig {
    FeatureConfig {
        clients: stored.clients.unwrap_or(true),
        events: EventsFeature::merge(&stored.events),
        payments: PaymentsFeature::merge(&stored.payments),
        team: TeamFeature::merge(&stored.team),
        venue: VenueFeature::merge(&stored.venue),
        tasks: stored.tasks.unwrap_or(true),
    }
}

/// Rewrite legacy boolean values of structured features into object form.
///
/// Returns `None` when the document holds no legacy values. Flat features and
/// structured objects are kept exactly as stored.
pub fn upgrade_legacy(stored: &Value) -> Option<Value> {
    let Value::Object(document) = stored else {
        return None;
    };

    let mut upgraded = document.clone();
    let mut changed = false;

    for feature in Feature::STRUCTURED {
        if let Some(Value::Bool(flag)) = document.get(feature.as_str()) {
            let mut object = Map::new();
            object.insert("access".to_string(), Value::Bool(*flag));
            for name in feature.capability_names() {
                object.insert((*name).to_string(), Value::Bool(true));
            }

            upgraded.insert(feature.as_str().to_string(), Value::Object(object));
            changed = true;
        }
    }

    changed.then_some(Value::Object(upgraded))
}
