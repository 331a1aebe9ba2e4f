use crate::config::ClientConfig;
use reqwest::Url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Canonical form of a [`Query`], shared by the cache and the in-flight registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that may be placed in a [`Query`]. `None` yields no parameter.
pub trait IntoParam {
    fn into_param(self) -> Option<String>;
}

impl IntoParam for &str {
    fn into_param(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl IntoParam for String {
    fn into_param(self) -> Option<String> {
        Some(self)
    }
}

impl IntoParam for &String {
    fn into_param(self) -> Option<String> {
        Some(self.clone())
    }
}

macro_rules! impl_into_param_for_int {
    ($($ty:ty),*) => {
        $(impl IntoParam for $ty {
            fn into_param(self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

impl_into_param_for_int!(u16, u32, u64, usize, i32, i64);

impl<T: IntoParam> IntoParam for Option<T> {
    fn into_param(self) -> Option<String> {
        self.and_then(IntoParam::into_param)
    }
}

/// Request parameters. Order of insertion is irrelevant; missing and empty
/// values are dropped so that equivalent queries share one [`CacheKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value under the same name.
    pub fn param(mut self, name: impl Into<String>, value: impl IntoParam) -> Self {
        let name = name.into();
        match value.into_param() {
            Some(value) if !value.is_empty() => {
                self.params.insert(name, value);
            }
            _ => {
                self.params.remove(&name);
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn cache_key(&self) -> CacheKey {
        let object = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        CacheKey(Value::Object(object).to_string())
    }

    /// Upstream URL for this query, with the configured API key prepended.
    pub fn to_url(&self, config: &ClientConfig) -> Url {
        let mut url = config.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("apikey", &config.api_key);
            for (name, value) in self.iter() {
                pairs.append_pair(name, value);
            }
        }
        url
    }
}

impl<K: Into<String>, V: IntoParam> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Query::new(), |query, (name, value)| query.param(name, value))
    }
}
