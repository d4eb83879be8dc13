use std::path::Path;

use figment::{
    providers::{Data, Env, Format, Json, Serialized, Yaml},
    util::nest,
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use serde::Serialize;

/// Returns the canonical spelling of a key path.
///
/// Every source stores its keys in this form, so `skip-verify`, `skip_verify`, and `SKIP_VERIFY` all name the same
/// option and are merged by precedence like any other key.
pub fn normalize_key(key: &str) -> String {
    key.replace('-', "_").to_lowercase()
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::Dict(tag, dict) => Value::Dict(tag, normalize_dict(dict)),
        Value::Array(tag, values) => Value::Array(tag, values.into_iter().map(normalize_value).collect()),
        value => value,
    }
}

fn normalize_dict(dict: Dict) -> Dict {
    dict.into_iter()
        .map(|(key, value)| (normalize_key(&key), normalize_value(value)))
        .collect()
}

fn normalize(data: Map<Profile, Dict>) -> Map<Profile, Dict> {
    data.into_iter()
        .map(|(profile, dict)| (profile, normalize_dict(dict)))
        .collect()
}

/// A source whose data is read once, when it is added to the loader.
pub struct ResolvedProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl ResolvedProvider {
    fn from_file<F: Format>(path: &Path, kind: &'static str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;

        Ok(Self {
            data: normalize(Data::<F>::string(&contents).data()?),
            metadata: Metadata::from(kind, path),
        })
    }

    pub fn from_yaml(path: &Path) -> Result<Self, Error> {
        Self::from_file::<Yaml>(path, "YAML file")
    }

    pub fn from_json(path: &Path) -> Result<Self, Error> {
        Self::from_file::<Json>(path, "JSON file")
    }

    /// Snapshots the variables starting with `prefix`.
    ///
    /// Values are kept as the strings they were set to. Numbers and booleans are only interpreted when a lookup asks
    /// for one, so `FLUXGATE_PASSWORD=0123` stays `"0123"`.
    pub fn from_environment(prefix: &str) -> Result<Self, Error> {
        let mut dict = Dict::new();
        for (key, value) in Env::prefixed(prefix).iter() {
            if let Some(nested) = nest(&normalize_key(key.as_str()), Value::from(value)).into_dict() {
                dict.extend(nested);
            }
        }

        Ok(Self {
            data: Profile::Default.collect(dict),
            metadata: Metadata::named(format!("environment ({}*)", prefix)),
        })
    }

    pub fn from_serialized<T: Serialize>(values: T) -> Result<Self, Error> {
        Ok(Self {
            data: normalize(Serialized::defaults(values).data()?),
            metadata: Metadata::named("in-memory values"),
        })
    }
}

impl Provider for ResolvedProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_spellings_collapse() {
        assert_eq!(normalize_key("skip-verify"), "skip_verify");
        assert_eq!(normalize_key("SKIP_VERIFY"), "skip_verify");
        assert_eq!(normalize_key("isMultiFields"), "ismultifields");
        assert_eq!(normalize_key("log.log-level"), "log.log_level");
    }

    #[test]
    fn nested_keys_normalized() {
        let provider = ResolvedProvider::from_serialized(serde_json::json!({
            "Outer-Key": { "inner-key": 1 },
            "list": [{ "Item-Key": true }],
        }))
        .unwrap();

        let data = provider.data().unwrap();
        let dict = &data[&Profile::Default];
        let outer = dict["outer_key"].as_dict().unwrap();
        assert!(outer.contains_key("inner_key"));

        let list = dict["list"].as_array().unwrap();
        assert!(list[0].as_dict().unwrap().contains_key("item_key"));
    }
}
