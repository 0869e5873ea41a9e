//! Types for use when configuring blobrouter modules.

use crate::*;
use std::sync::Mutex;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> BrResult<D> {
    serde_json::from_str(
        &serde_json::to_string(s)
            .map_err(|e| BrError::other_src("could not encode config", e))?,
    )
    .map_err(|e| BrError::other_src("could not decode config", e))
}

/// Denotes a type used to configure a specific blobrouter module.
///
/// A module config type is a struct with a single camelCase field named
/// after the module, holding the module's parameters. All of the module
/// configs share the same top-level [Config] map.
///
/// The serialization should be tolerant to missing properties, setting
/// sane defaults, since the config may be loaded from a file edited
/// by humans.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

/// Blobrouter configuration.
#[derive(Debug, Default)]
pub struct Config(Mutex<serde_json::Map<String, serde_json::Value>>);

impl serde::Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let map = self
            .0
            .lock()
            .map_err(|_| serde::ser::Error::custom("config lock poisoned"))?;
        serde::Serialize::serialize(&*map, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = <serde_json::Map<String, serde_json::Value> as serde::Deserialize>::deserialize(
            deserializer,
        )?;
        Ok(Self(Mutex::new(map)))
    }
}

impl Config {
    fn lock(
        &self,
    ) -> BrResult<
        std::sync::MutexGuard<'_, serde_json::Map<String, serde_json::Value>>,
    > {
        self.0
            .lock()
            .map_err(|_| BrError::other("config lock poisoned"))
    }

    fn to_map<M: ModConfig>(
        config: &M,
    ) -> BrResult<serde_json::Map<String, serde_json::Value>> {
        match tc(config)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(BrError::invalid_config(format!(
                "module config must serialize to an object, got: {other}"
            ))),
        }
    }

    /// When a builder is generating a default configuration, it will pass
    /// a mutable reference of this config to the module factories it is
    /// configured with. Those factories call this function to add their
    /// default parameters.
    pub fn set_default_module_config<M: ModConfig>(
        &mut self,
        config: &M,
    ) -> BrResult<()> {
        let map = Self::to_map(config)?;
        let mut lock = self.lock()?;
        for (module_name, value) in map {
            if lock.contains_key(&module_name) {
                return Err(BrError::invalid_config(format!(
                    "Refusing to overwrite conflicting module name: {module_name}"
                )));
            }
            lock.insert(module_name, value);
        }
        Ok(())
    }

    /// Set (overwriting) the parameters of a module.
    pub fn set_module_config<M: ModConfig>(&self, config: &M) -> BrResult<()> {
        let map = Self::to_map(config)?;
        self.lock()?.extend(map);
        Ok(())
    }

    /// Extract a module config. Modules that were never set get their
    /// defaults. Extraneous properties are ignored.
    pub fn get_module_config<M: ModConfig>(&self) -> BrResult<M> {
        let lock = self.lock()?;
        tc(&*lock)
    }
}
