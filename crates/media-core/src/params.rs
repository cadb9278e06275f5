//! Named parameter lists
//!
//! Control requests and disconnect notifications carry an ordered list of
//! string key/value pairs. Keys may repeat; lookups return the first match.

use std::fmt;

/// Ordered multimap of string parameters with a return value slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedParams {
    name: String,
    params: Vec<(String, String)>,
    ret_value: String,
}

impl NamedParams {
    /// Create an empty list with a name, usually the operation it describes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Name of the list
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the first parameter called `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key` parsed as an integer, or `default`
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
    }

    /// Value of `key` parsed as a boolean, or `default`
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("true" | "yes" | "on" | "enable" | "1") => true,
            Some("false" | "no" | "off" | "disable" | "0") => false,
            _ => default,
        }
    }

    /// All values of parameters called `key`, in insertion order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Append a parameter, keeping existing ones with the same key
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Replace the first parameter called `key`, or append it
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Remove every parameter called `key`, returning how many were removed
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.params.len();
        self.params.retain(|(k, _)| k != key);
        before - self.params.len()
    }

    /// Copy every parameter of `other` into this list
    pub fn copy_from(&mut self, other: &NamedParams) -> &mut Self {
        self.params.extend(other.params.iter().cloned());
        self
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the list holds no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over all parameters in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value returned by whoever handled the request
    pub fn ret_value(&self) -> &str {
        &self.ret_value
    }

    /// Set the return value
    pub fn set_ret_value(&mut self, value: impl Into<String>) {
        self.ret_value = value.into();
    }
}

impl fmt::Display for NamedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (k, v) in &self.params {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_multimap() {
        let mut params = NamedParams::new("chan.control");
        params.add("operation", "dtmf").add("text", "1").add("text", "2");

        assert_eq!(params.get("text"), Some("1"));
        assert_eq!(params.get_all("text").collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(params.len(), 3);

        params.set("text", "9");
        assert_eq!(params.get_all("text").collect::<Vec<_>>(), vec!["9", "2"]);
        assert_eq!(params.remove("text"), 2);
        assert_eq!(params.get("text"), None);
        assert_eq!(params.to_string(), "chan.control operation=dtmf");
    }

    #[test]
    fn test_typed_getters() {
        let mut params = NamedParams::new("test");
        params.add("count", " 42").add("flag", "yes").add("junk", "x");
        assert_eq!(params.get_int("count", 0), 42);
        assert_eq!(params.get_int("junk", -1), -1);
        assert!(params.get_bool("flag", false));
        assert!(params.get_bool("missing", true));
    }

    #[test]
    fn test_ret_value() {
        let mut params = NamedParams::default();
        assert_eq!(params.ret_value(), "");
        params.set_ret_value("handled");
        assert_eq!(params.ret_value(), "handled");
    }
}
