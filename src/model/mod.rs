//! Model and collection helpers.
//!
//! Any `Serialize` type is a [`Model`]: its fields can be read by name, with
//! `camelCase`, `snake_case` and all-lowercase spellings treated as the same
//! property. A [`Collection`] is an ordered, keyed list of models carrying
//! paging metadata, with the query-style helpers controllers use to slice
//! result sets before rendering them.
//!
//! Types that also implement `Deserialize` are [`ModelMut`]: properties can be
//! written by the same folded names.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by [`Collection`] operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collection is empty")]
    Empty,

    #[error("property {property:?} must be a string or integer to be used as a key, got {found}")]
    InvalidKey { property: String, found: String },

    #[error("key {0} already exists in collection")]
    DuplicateKey(Key),

    #[error("no integer key is left after the largest one in use")]
    KeysExhausted,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised when writing model properties.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("property {0:?} not found in model")]
    UnknownProperty(String),

    #[error("model does not serialize to an object")]
    NotAnObject,

    #[error("invalid property value: {0}")]
    InvalidValue(#[source] serde_json::Error),
}

/// Converts a property name to `snake_case` (`userID` → `user_id`).
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Converts a property name to `camelCase` (`user_name` → `userName`).
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name.split('_').filter(|p| !p.is_empty()).enumerate() {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }
    out
}

// Spelling-insensitive comparison form: lowercase, underscores dropped.
fn comparison_key(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// Field name `name` refers to: an exact match, else the spelling-insensitive one.
fn resolve_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    if fields.contains_key(name) {
        return Some(name.to_owned());
    }
    let wanted = comparison_key(name);
    fields.keys().find(|key| comparison_key(key) == wanted).cloned()
}

/// Property access for serializable types.
///
/// # Examples
///
/// ```
/// use haven::model::Model;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Account { user_name: String, is_admin: bool }
///
/// let account = Account { user_name: "ada".into(), is_admin: true };
/// assert_eq!(account.property("user_name"), Some("ada".into()));
/// assert_eq!(account.property("USERNAME"), Some("ada".into()));
///
/// let map = account.to_map(true, &["isAdmin"]);
/// assert_eq!(map.keys().collect::<Vec<_>>(), vec!["user_name"]);
/// ```
pub trait Model: Serialize {
    /// All fields as a JSON object; `None` when the type doesn't serialize to one.
    fn fields(&self) -> Option<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Reads a field by name. An exact match wins over a spelling-insensitive one.
    fn property(&self, name: &str) -> Option<Value> {
        let mut fields = self.fields()?;
        let key = resolve_field(&fields, name)?;
        fields.remove(&key)
    }

    /// Fields as a map with keys in `snake_case` (`underscored`) or `camelCase`,
    /// leaving out any field whose name matches an entry of `exclude`.
    fn to_map(&self, underscored: bool, exclude: &[&str]) -> Map<String, Value> {
        let excluded: Vec<String> = exclude.iter().map(|e| comparison_key(e)).collect();
        self.fields()
            .unwrap_or_default()
            .into_iter()
            .filter(|(key, _)| !excluded.contains(&comparison_key(key)))
            .map(|(key, value)| {
                let key = if underscored {
                    to_snake_case(&key)
                } else {
                    to_camel_case(&key)
                };
                (key, value)
            })
            .collect()
    }

    /// Like [`to_map`](Self::to_map), keeping only `null` and scalar values.
    fn to_scalar_map(&self, underscored: bool, exclude: &[&str]) -> Map<String, Value> {
        self.to_map(underscored, exclude)
            .into_iter()
            .filter(|(_, value)| !value.is_array() && !value.is_object())
            .collect()
    }
}

impl<T: Serialize + ?Sized> Model for T {}

/// Property writes for models that round-trip through serde.
///
/// Names fold the same way as [`Model::property`]. A write serializes the
/// model, replaces the field and deserializes the result, so a value of the
/// wrong type is rejected and leaves the model untouched.
///
/// ```
/// use haven::model::{Model, ModelMut};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Account { user_name: String, logins: u32 }
///
/// let mut account = Account { user_name: "ada".into(), logins: 0 };
/// account.set_property("user_name", "grace").unwrap();
/// account.set_property("LOGINS", 3).unwrap();
/// assert_eq!(account.user_name, "grace");
/// assert!(account.set_property("logins", "many").is_err());
/// assert_eq!(account.property("logins"), Some(3.into()));
/// ```
pub trait ModelMut: Model + DeserializeOwned {
    /// Writes every entry of `values`, all or nothing.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownProperty`] for a name matching no field, and
    /// [`ModelError::InvalidValue`] when the result no longer deserializes.
    fn fill_from_map(&mut self, values: Map<String, Value>) -> Result<(), ModelError> {
        let mut fields = self.fields().ok_or(ModelError::NotAnObject)?;
        for (name, value) in values {
            let key = resolve_field(&fields, &name).ok_or(ModelError::UnknownProperty(name))?;
            fields.insert(key, value);
        }
        *self = serde_json::from_value(Value::Object(fields)).map_err(ModelError::InvalidValue)?;
        Ok(())
    }

    /// Writes one property.
    fn set_property(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        let mut values = Map::new();
        values.insert(name.to_owned(), value.into());
        self.fill_from_map(values)
    }
}

impl<T: Serialize + DeserializeOwned> ModelMut for T {}

/// A collection key: integer for appended items, string for named ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    fn from_value(property: &str, value: Option<Value>) -> Result<Self, CollectionError> {
        match value {
            Some(Value::String(s)) => Ok(Key::Str(s)),
            Some(Value::Number(n)) if n.is_i64() => Ok(Key::Int(n.as_i64().unwrap_or_default())),
            other => Err(CollectionError::InvalidKey {
                property: property.to_owned(),
                found: other.map_or_else(|| "nothing".to_owned(), |v| v.to_string()),
            }),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_owned())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Int(i) => serializer.collect_str(i),
            Key::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// Paging and provenance information attached to a [`Collection`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Name of the data source the items came from.
    pub provider_name: Option<String>,
    pub page_number: u64,
    pub per_page: u64,
    /// Items available at the source, across all pages.
    pub total_count: u64,
    /// Rows touched by the write that produced this collection.
    pub affected_rows: u64,
}

/// Ordered, keyed list of models.
///
/// Derived collections ([`filter`](Self::filter), [`where_eq`](Self::where_eq),
/// ...) keep the original keys and metadata. A `limit` of `0` means unlimited.
///
/// # Examples
///
/// ```
/// use haven::model::Collection;
/// use serde::Serialize;
///
/// #[derive(Clone, Serialize)]
/// struct User { id: i64, role: &'static str }
///
/// let users: Collection<User> = vec![
///     User { id: 1, role: "admin" },
///     User { id: 2, role: "guest" },
///     User { id: 3, role: "admin" },
/// ]
/// .into_iter()
/// .collect();
///
/// let admins = users.where_eq("role", "admin", 0);
/// assert_eq!(admins.len(), 2);
/// assert_eq!(users.extract("role", true, 0), vec!["admin", "guest"]);
/// ```
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<(Key, T)>,
    // `None` once `i64::MAX` has been used as a key.
    next_index: Option<i64>,
    meta: Meta,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_index: Some(0),
            meta: Meta::default(),
        }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty collection tagged with its data source.
    pub fn with_provider(provider_name: impl Into<String>) -> Self {
        let mut collection = Self::new();
        collection.meta.provider_name = Some(provider_name.into());
        collection
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Appends `item` under one past the largest integer key used so far.
    ///
    /// # Errors
    ///
    /// [`CollectionError::KeysExhausted`] once `i64::MAX` is taken.
    pub fn push(&mut self, item: T) -> Result<Key, CollectionError> {
        let index = self.next_index.ok_or(CollectionError::KeysExhausted)?;
        self.next_index = index.checked_add(1);
        let key = Key::Int(index);
        self.items.push((key.clone(), item));
        Ok(key)
    }

    /// Stores `item` under `key`, replacing (in place) any item already there.
    pub fn insert(&mut self, key: impl Into<Key>, item: T) -> Option<T> {
        let key = key.into();
        if let Key::Int(i) = key {
            if self.next_index.is_some_and(|next| i >= next) {
                self.next_index = i.checked_add(1);
            }
        }
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, item)),
            None => {
                self.items.push((key, item));
                None
            }
        }
    }

    pub fn get(&self, key: &Key) -> Option<&T> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, item)| item)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.items.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &T)> {
        self.items.iter().map(|(key, item)| (key, item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Result<&T, CollectionError> {
        self.items
            .first()
            .map(|(_, item)| item)
            .ok_or(CollectionError::Empty)
    }

    /// Applies `modifier` to every item in place.
    pub fn modify<F>(&mut self, mut modifier: F) -> &mut Self
    where
        F: FnMut(&mut T),
    {
        for (_, item) in &mut self.items {
            modifier(item);
        }
        self
    }

    fn derive(&self) -> Self {
        Self {
            items: Vec::new(),
            next_index: self.next_index,
            meta: self.meta.clone(),
        }
    }
}

impl<T: Model + Clone> Collection<T> {
    /// Items for which `predicate(item, key)` holds, at most `limit` of them.
    pub fn filter<F>(&self, predicate: F, limit: usize) -> Self
    where
        F: Fn(&T, &Key) -> bool,
    {
        let mut out = self.derive();
        out.items = self
            .items
            .iter()
            .filter(|(key, item)| predicate(item, key))
            .take(if limit == 0 { usize::MAX } else { limit })
            .cloned()
            .collect();
        out
    }

    /// Items for which `predicate(item, key)` does not hold.
    pub fn reject<F>(&self, predicate: F) -> Self
    where
        F: Fn(&T, &Key) -> bool,
    {
        self.filter(|item, key| !predicate(item, key), 0)
    }

    /// `true` if some item's `property` equals `value`.
    pub fn contains(&self, property: &str, value: impl Into<Value>) -> bool {
        let value = Some(value.into());
        self.items
            .iter()
            .any(|(_, item)| item.property(property) == value)
    }

    /// Values of `property` in item order, optionally de-duplicated.
    /// Items without the property are skipped.
    pub fn extract(&self, property: &str, unique: bool, limit: usize) -> Vec<Value> {
        let mut values: Vec<Value> = Vec::new();
        for value in self.items.iter().filter_map(|(_, item)| item.property(property)) {
            if unique && values.contains(&value) {
                continue;
            }
            values.push(value);
            if values.len() == limit {
                break;
            }
        }
        values
    }

    pub fn where_eq(&self, property: &str, value: impl Into<Value>, limit: usize) -> Self {
        let value = Some(value.into());
        self.filter(|item, _| item.property(property) == value, limit)
    }

    pub fn where_in(&self, property: &str, values: &[Value], limit: usize) -> Self {
        self.filter(
            |item, _| item.property(property).is_some_and(|v| values.contains(&v)),
            limit,
        )
    }

    pub fn where_not(&self, property: &str, value: impl Into<Value>, limit: usize) -> Self {
        let value = Some(value.into());
        self.filter(|item, _| item.property(property) != value, limit)
    }

    /// Re-keys the collection by each item's `property`.
    pub fn remap(&self, property: &str) -> Result<Self, CollectionError> {
        let mut out = self.derive();
        out.next_index = Some(0);
        for (_, item) in &self.items {
            let key = Key::from_value(property, item.property(property))?;
            if out.get(&key).is_some() {
                return Err(CollectionError::DuplicateKey(key));
            }
            out.insert(key, item.clone());
        }
        Ok(out)
    }

    /// Splits the collection into groups sharing the same `property` value,
    /// in order of first appearance.
    pub fn group_by(&self, property: &str) -> Result<Vec<(Key, Self)>, CollectionError> {
        let mut groups: Vec<(Key, Self)> = Vec::new();
        for (key, item) in &self.items {
            let group_key = Key::from_value(property, item.property(property))?;
            let index = match groups.iter().position(|(k, _)| *k == group_key) {
                Some(index) => index,
                None => {
                    groups.push((group_key, self.derive()));
                    groups.len() - 1
                }
            };
            groups[index].1.items.push((key.clone(), item.clone()));
        }
        Ok(groups)
    }
}

impl<T: ModelMut> Collection<T> {
    /// Replaces `property` on every item with `modifier(current value)`.
    ///
    /// Stops at the first item the new value cannot be written to; items
    /// before it keep their update.
    pub fn modify_property<F>(
        &mut self,
        property: &str,
        mut modifier: F,
    ) -> Result<&mut Self, CollectionError>
    where
        F: FnMut(Value) -> Value,
    {
        for (_, item) in &mut self.items {
            let current = item
                .property(property)
                .ok_or_else(|| ModelError::UnknownProperty(property.to_owned()))?;
            item.set_property(property, modifier(current))?;
        }
        Ok(self)
    }
}

impl<T: Serialize> Collection<T> {
    pub fn to_json(&self) -> Result<String, CollectionError> {
        Ok(serde_json::to_string(self)?)
    }
}

// Items serialize as a key → item object, keeping insertion order.
struct Items<'a, T>(&'a [(Key, T)]);

impl<T: Serialize> Serialize for Items<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, item) in self.0 {
            map.serialize_entry(key, item)?;
        }
        map.end()
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Collection", 2)?;
        state.serialize_field("meta", &self.meta)?;
        state.serialize_field("items", &Items(&self.items))?;
        state.end()
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<(Key, T)> = iter
            .into_iter()
            .zip(0_i64..)
            .map(|(item, index)| (Key::Int(index), item))
            .collect();
        Self {
            next_index: i64::try_from(items.len()).ok(),
            items,
            meta: Meta::default(),
        }
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = (Key, T);
    type IntoIter = std::vec::IntoIter<(Key, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
