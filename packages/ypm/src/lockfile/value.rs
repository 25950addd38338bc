/// A node of the lockfile syntax tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockValue {
    String(String),
    Number(u64),
    Boolean(bool),
    Object(LockObject),
}

/// An object as written in the lockfile. Keys are stored in groups: a
/// group is a set of keys sharing the very same value (`a, b:` in the
/// text format).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockObject {
    pub groups: Vec<(Vec<String>, LockValue)>,
}

impl LockObject {
    pub fn new() -> LockObject {
        LockObject::default()
    }

    pub fn get(&self, key: &str) -> Option<&LockValue> {
        self.groups.iter()
            .find(|(keys, _)| keys.iter().any(|k| k == key))
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(LockValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_object(&self, key: &str) -> Option<&LockObject> {
        match self.get(key) {
            Some(LockValue::Object(value)) => Some(value),
            _ => None,
        }
    }

    /// Assigns `value` to every key of the group. Keys that were already
    /// present elsewhere are moved out of their previous group.
    pub fn insert(&mut self, keys: Vec<String>, value: LockValue) {
        for (existing_keys, _) in self.groups.iter_mut() {
            existing_keys.retain(|existing| !keys.contains(existing));
        }

        self.groups.retain(|(existing_keys, _)| !existing_keys.is_empty());
        self.groups.push((keys, value));
    }

    pub fn insert_one<K: Into<String>>(&mut self, key: K, value: LockValue) {
        self.insert(vec![key.into()], value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.groups.iter().flat_map(|(keys, _)| keys.iter())
    }

    /// Iterates over every key with its value, groups expanded.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &LockValue)> {
        self.groups.iter()
            .flat_map(|(keys, value)| keys.iter().map(move |key| (key, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// `Object.assign`-like merge: keys from `other` take precedence, and
    /// every key ends up in its own group.
    pub fn merge(self, other: LockObject) -> LockObject {
        let mut merged
            = LockObject::new();

        for (key, value) in self.entries().chain(other.entries()) {
            merged.insert_one(key.clone(), value.clone());
        }

        merged
    }
}
