//! Declarative field descriptors.
//!
//! A model is a thin typed view over a [`Record`]: the raw JSON object exchanged with the CRM,
//! keyed by remote field names, plus the bookkeeping needed for dirty tracking and lazy loading.
//! Each attribute of a model is described by a descriptor constant, generated by
//! [`derive(Model)`](crate::Model), which knows the attribute's name, the name of the
//! corresponding remote field, and how to convert between the two representations.
//!
//! Descriptors are typed by the model which owns them, so `Lead::PRICE` can only be used with a
//! [`Lead`](crate::schema::Lead):
//!
//! ```ignore
//! let mut lead = Lead::new().with(&Lead::NAME, "Big deal");
//! lead.set(&Lead::PRICE, 1000u64);
//! assert_eq!(lead.get(&Lead::PRICE)?, Some(1000));
//! ```

use anyhow::{Context, Error};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;

pub use chrono::{DateTime, Utc};

/// The raw state of a single entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    /// Remote field values, keyed by remote field name.
    data: Map<String, Value>,
    /// Remote fields which have been modified locally since the last load or save.
    changed: BTreeSet<String>,
    /// Related objects assigned to foreign fields, keyed by attribute name.
    related: BTreeMap<String, Record>,
    /// Whether `data` reflects the full remote entity.
    loaded: bool,
}

impl Record {
    /// An empty record for an entity which does not exist remotely yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding the full remote state of an entity.
    pub fn loaded(data: Map<String, Value>) -> Self {
        Self {
            data,
            loaded: true,
            ..Default::default()
        }
    }

    /// A reference to a remote entity which has not been fetched.
    pub fn stub(id: u64) -> Self {
        let mut data = Map::new();
        data.insert("id".into(), id.into());
        Self {
            data,
            ..Default::default()
        }
    }

    /// The remote ID of this entity, if it has one.
    pub fn id(&self) -> Option<u64> {
        self.data.get("id").and_then(|id| u64::decode(id).ok())
    }

    /// Whether this record holds the full remote state of the entity.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The raw value of a remote field.
    pub fn get(&self, remote: &str) -> Option<&Value> {
        self.data.get(remote)
    }

    /// Set a remote field, marking it as changed.
    pub fn put(&mut self, remote: impl Into<String>, value: Value) {
        let remote = remote.into();
        self.changed.insert(remote.clone());
        self.data.insert(remote, value);
    }

    /// Set the ID without marking it as changed.
    ///
    /// Used after the remote service assigns an ID to a newly created entity.
    pub fn assign_id(&mut self, id: u64) {
        self.data.insert("id".into(), id.into());
        self.changed.remove("id");
    }

    /// Has `remote` been modified since the last load or save?
    pub fn is_changed(&self, remote: &str) -> bool {
        self.changed.contains(remote)
    }

    /// Remote fields modified since the last load or save.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    /// Forget local modifications after they have been persisted.
    pub fn clear_changes(&mut self) {
        self.changed.clear();
    }

    /// Merge the full remote state of the entity into this record.
    ///
    /// Fields which have been modified locally keep their local values.
    pub fn merge_loaded(&mut self, remote: Map<String, Value>) {
        for (key, value) in remote {
            if !self.changed.contains(&key) {
                self.data.insert(key, value);
            }
        }
        self.loaded = true;
    }

    /// The related object staged for the foreign field `attr`.
    pub fn related(&self, attr: &str) -> Option<&Record> {
        self.related.get(attr)
    }

    pub(crate) fn related_mut(&mut self, attr: &str) -> Option<&mut Record> {
        self.related.get_mut(attr)
    }

    /// Stage a related object for the foreign field `attr`.
    pub fn stage(&mut self, attr: impl Into<String>, record: Record) {
        self.related.insert(attr.into(), record);
    }

    /// The payload to send when creating this entity: all data plus the model's constants.
    pub fn create_payload(&self, fields: &[FieldInfo]) -> Map<String, Value> {
        let mut payload = self.data.clone();
        payload.retain(|_, value| !value.is_null());
        add_constants(&mut payload, fields);
        payload
    }

    /// The payload to send when updating this entity: its ID, modified fields, and constants.
    pub fn update_payload(&self, fields: &[FieldInfo]) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(id) = self.data.get("id") {
            payload.insert("id".into(), id.clone());
        }
        for remote in &self.changed {
            if let Some(value) = self.data.get(remote) {
                payload.insert(remote.clone(), value.clone());
            }
        }
        add_constants(&mut payload, fields);
        payload
    }
}

fn add_constants(payload: &mut Map<String, Value>, fields: &[FieldInfo]) {
    for field in fields {
        if let FieldKind::Constant(value) = &field.kind {
            payload.insert(field.remote.into(), value.to_value());
        }
    }
}

/// Static description of a model field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    /// The name of the attribute on the model.
    pub attr: &'static str,
    /// The name of the field in the remote API.
    pub remote: &'static str,
    pub kind: FieldKind,
}

/// The different kinds of fields a model can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A regular editable value.
    Value(ValueKind),
    /// A value which is assigned by the remote service and cannot be edited.
    Uneditable,
    /// A fixed value which is always sent to the remote service.
    Constant(Constant),
    /// A link to another entity.
    Foreign(ForeignInfo),
    /// A list of links to other entities.
    Many(ManyInfo),
}

/// The representation of a value in the remote API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Boolean,
    DateTime,
    CommaSeparated,
    IdList,
}

impl ValueKind {
    /// Convert a loosely typed value into the canonical representation for this kind.
    pub fn normalize(&self, value: &Value) -> Result<Value, Error> {
        Ok(match self {
            Self::Text => String::decode(value)?.encode(),
            Self::Integer => i64::decode(value)?.encode(),
            Self::Boolean => bool::decode(value)?.encode(),
            Self::DateTime => DateTime::<Utc>::decode(value)?.encode(),
            Self::CommaSeparated => Tags::decode(value)?.encode(),
            Self::IdList => Vec::<u64>::decode(value)?.encode(),
        })
    }
}

/// The value of a constant field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constant {
    Str(&'static str),
    Int(i64),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Str(s) => Value::from(*s),
            Self::Int(i) => Value::from(*i),
        }
    }
}

/// Static description of a foreign field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForeignInfo {
    /// The API resource holding the related entities.
    pub resource: &'static str,
    /// The main field of the related model, used to find existing entities when saving.
    pub main_field: Option<&'static str>,
    /// The fields of the related model.
    pub fields: &'static [FieldInfo],
    /// Pairs `(related_field, remote)`: fields of the related entity which are denormalized into
    /// fields of the owning entity.
    pub links: &'static [(&'static str, &'static str)],
    /// Whether the remote service persists the related entity by itself.
    pub auto_created: bool,
}

impl ForeignInfo {
    /// The remote field of the owner mirroring the related entity's main field.
    pub fn main_link(&self) -> Option<&'static str> {
        main_link(self.main_field, self.links)
    }
}

/// The field of `links` mirroring the related model's `main_field`.
fn main_link(
    main_field: Option<&'static str>,
    links: &'static [(&'static str, &'static str)],
) -> Option<&'static str> {
    let main = main_field?;
    links
        .iter()
        .find(|(related, _)| *related == main)
        .map(|(_, remote)| *remote)
}

/// Static description of a many-to-many link field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManyInfo {
    /// The API resource holding the related entities.
    pub resource: &'static str,
}

/// Conversion between typed attribute values and their remote JSON representation.
pub trait FieldValue: Sized {
    /// How values of this type are represented remotely.
    const KIND: ValueKind;

    /// Interpret a remote value.
    fn decode(value: &Value) -> Result<Self, Error>;

    /// The remote representation of this value.
    fn encode(&self) -> Value;
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn decode(value: &Value) -> Result<Self, Error> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            v => Err(Error::msg(format!("expected text, got {v}"))),
        }
    }

    fn encode(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FieldValue for u64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn decode(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| Error::msg(format!("expected unsigned integer, got {n}"))),
            Value::String(s) => s
                .trim()
                .parse()
                .with_context(|| format!("expected unsigned integer, got {s:?}")),
            v => Err(Error::msg(format!("expected unsigned integer, got {v}"))),
        }
    }

    fn encode(&self) -> Value {
        Value::from(*self)
    }
}

impl FieldValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn decode(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| Error::msg(format!("expected integer, got {n}"))),
            Value::String(s) => s
                .trim()
                .parse()
                .with_context(|| format!("expected integer, got {s:?}")),
            v => Err(Error::msg(format!("expected integer, got {v}"))),
        }
    }

    fn encode(&self) -> Value {
        Value::from(*self)
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn decode(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
            Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
            Value::String(s) => match s.as_str() {
                "0" | "false" => Ok(false),
                "1" | "true" => Ok(true),
                _ => Err(Error::msg(format!("expected boolean, got {s:?}"))),
            },
            v => Err(Error::msg(format!("expected boolean, got {v}"))),
        }
    }

    fn encode(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FieldValue for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::DateTime;

    fn decode(value: &Value) -> Result<Self, Error> {
        let secs = match value {
            Value::Number(n) => match n.as_i64() {
                Some(secs) => secs,
                None => n
                    .as_f64()
                    .map(|secs| secs.trunc() as i64)
                    .ok_or_else(|| Error::msg(format!("expected timestamp, got {n}")))?,
            },
            Value::String(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(secs) => secs,
                    Err(_) => s
                        .parse::<f64>()
                        .map(|secs| secs.trunc() as i64)
                        .with_context(|| format!("expected timestamp, got {s:?}"))?,
                }
            }
            v => return Err(Error::msg(format!("expected timestamp, got {v}"))),
        };
        DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| Error::msg(format!("timestamp {secs} is out of range")))
    }

    fn encode(&self) -> Value {
        Value::from(self.timestamp())
    }
}

/// A comma-separated list of tag names.
///
/// The API returns tags as a list of objects (`[{"id": 1, "name": "vip"}]`) but expects them to be
/// written back as a single comma-separated string of names (`"vip,partner"`).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// The key holding the tag name in the remote tag objects.
    const NAME_KEY: &'static str = "name";

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl FieldValue for Tags {
    const KIND: ValueKind = ValueKind::CommaSeparated;

    fn decode(value: &Value) -> Result<Self, Error> {
        match value {
            Value::String(s) => Ok(split_commas(s).collect()),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(obj) => obj
                        .get(Self::NAME_KEY)
                        .ok_or_else(|| Error::msg(format!("tag {item} has no name")))
                        .and_then(String::decode),
                    item => String::decode(item),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            v => Err(Error::msg(format!("expected tags, got {v}"))),
        }
    }

    fn encode(&self) -> Value {
        Value::String(self.0.join(","))
    }
}

impl FieldValue for Vec<u64> {
    const KIND: ValueKind = ValueKind::IdList;

    fn decode(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Array(items) => items.iter().map(u64::decode).collect(),
            Value::String(s) => split_commas(s)
                .map(|id| {
                    id.parse()
                        .with_context(|| format!("malformed ID {id:?} in list"))
                })
                .collect(),
            v => Err(Error::msg(format!("expected list of IDs, got {v}"))),
        }
    }

    fn encode(&self) -> Value {
        Value::from(self.clone())
    }
}

fn split_commas(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// An editable attribute of model `M` holding values of type `T`.
pub struct Field<M, T> {
    attr: &'static str,
    remote: &'static str,
    _phantom: PhantomData<fn(&M) -> T>,
}

impl<M, T> Field<M, T> {
    pub const fn new(attr: &'static str, remote: &'static str) -> Self {
        Self {
            attr,
            remote,
            _phantom: PhantomData,
        }
    }

    /// The name of the attribute on the model.
    pub fn attr(&self) -> &'static str {
        self.attr
    }

    /// The name of the field in the remote API.
    pub fn remote(&self) -> &'static str {
        self.remote
    }
}

impl<M: Model, T: FieldValue> Field<M, T> {
    /// The current value of this field, without fetching anything from the remote service.
    pub fn get(&self, model: &M) -> Result<Option<T>, Error> {
        decode_field(model.record(), self.attr, self.remote)
    }

    pub fn set(&self, model: &mut M, value: T) {
        model.record_mut().put(self.remote, value.encode());
    }

    /// Unset this field. The change is sent to the remote service on the next save.
    pub fn clear(&self, model: &mut M) {
        model.record_mut().put(self.remote, Value::Null);
    }
}

impl<M, T> Debug for Field<M, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Field({} -> {})", self.attr, self.remote)
    }
}

/// An attribute of model `M` whose value is assigned by the remote service.
pub struct ReadOnlyField<M, T>(Field<M, T>);

impl<M, T> ReadOnlyField<M, T> {
    pub const fn new(attr: &'static str, remote: &'static str) -> Self {
        Self(Field::new(attr, remote))
    }

    pub fn attr(&self) -> &'static str {
        self.0.attr
    }

    pub fn remote(&self) -> &'static str {
        self.0.remote
    }
}

impl<M: Model, T: FieldValue> ReadOnlyField<M, T> {
    pub fn get(&self, model: &M) -> Result<Option<T>, Error> {
        self.0.get(model)
    }
}

impl<M, T> Debug for ReadOnlyField<M, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "ReadOnlyField({} -> {})", self.0.attr, self.0.remote)
    }
}

/// An attribute of model `M` linking to an entity of model `R`.
///
/// The link itself is stored as the ID of the related entity in the `remote` field. In addition,
/// the owner may mirror some fields of the related entity (usually its main field) into fields of
/// its own, as described by `links`.
pub struct ForeignField<M, R> {
    attr: &'static str,
    remote: &'static str,
    links: &'static [(&'static str, &'static str)],
    auto_created: bool,
    _phantom: PhantomData<fn(&M) -> R>,
}

impl<M, R> ForeignField<M, R> {
    pub const fn new(
        attr: &'static str,
        remote: &'static str,
        links: &'static [(&'static str, &'static str)],
        auto_created: bool,
    ) -> Self {
        Self {
            attr,
            remote,
            links,
            auto_created,
            _phantom: PhantomData,
        }
    }

    pub fn attr(&self) -> &'static str {
        self.attr
    }

    pub fn remote(&self) -> &'static str {
        self.remote
    }

    pub fn auto_created(&self) -> bool {
        self.auto_created
    }
}

impl<M: Model, R: Model> ForeignField<M, R> {
    /// The remote field of `M` mirroring the main field of `R`, if any.
    pub fn main_link(&self) -> Option<&'static str> {
        main_link(R::MAIN_FIELD, self.links)
    }

    /// The ID of the related entity.
    pub fn id(&self, model: &M) -> Result<Option<u64>, Error> {
        decode_field(model.record(), self.attr, self.remote)
    }

    /// The related entity, without fetching anything from the remote service.
    ///
    /// If an entity was assigned to this field, it is returned as is. Otherwise, if the field links
    /// to a remote entity by ID, an unloaded reference to that entity is returned.
    pub fn get(&self, model: &M) -> Result<Option<R>, Error> {
        if let Some(related) = model.record().related(self.attr) {
            return Ok(Some(R::from_record(related.clone())));
        }
        Ok(self.id(model)?.map(R::stub))
    }

    /// Assign an entity to this field.
    ///
    /// The entity is persisted along with the owner, if necessary, when the owner is saved.
    pub fn set(&self, model: &mut M, related: R) {
        let related = related.into_record();
        let record = model.record_mut();
        match related.id() {
            Some(id) => record.put(self.remote, id.into()),
            None => record.put(self.remote, Value::Null),
        }
        for (field, remote) in self.links {
            if let Some(value) = related.get(field) {
                record.put(*remote, value.clone());
            }
        }
        record.stage(self.attr, related);
    }

    /// Link to an entity by the value of its main field.
    ///
    /// The value is written to the owner's field mirroring the main field of `R`; the remote
    /// service resolves the link.
    pub fn link(&self, model: &mut M, main_value: impl Into<Value>) -> Result<(), Error> {
        let remote = self.main_link().ok_or_else(|| {
            Error::msg(format!(
                "foreign field {} cannot be linked by the main field of {}",
                self.attr,
                R::RESOURCE
            ))
        })?;
        model.record_mut().put(remote, main_value.into());
        Ok(())
    }
}

impl<M, R> Debug for ForeignField<M, R> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "ForeignField({} -> {})", self.attr, self.remote)
    }
}

/// An attribute of model `M` holding a list of links to entities of model `R`.
pub struct ManyField<M, R> {
    attr: &'static str,
    remote: &'static str,
    _phantom: PhantomData<fn(&M) -> R>,
}

impl<M, R> ManyField<M, R> {
    pub const fn new(attr: &'static str, remote: &'static str) -> Self {
        Self {
            attr,
            remote,
            _phantom: PhantomData,
        }
    }

    pub fn attr(&self) -> &'static str {
        self.attr
    }

    pub fn remote(&self) -> &'static str {
        self.remote
    }
}

impl<M: Model, R: Model> ManyField<M, R> {
    /// The IDs of the related entities.
    pub fn ids(&self, model: &M) -> Result<Option<Vec<u64>>, Error> {
        decode_field(model.record(), self.attr, self.remote)
    }

    /// Unloaded references to the related entities.
    pub fn get(&self, model: &M) -> Result<Vec<R>, Error> {
        Ok(self
            .ids(model)?
            .unwrap_or_default()
            .into_iter()
            .map(R::stub)
            .collect())
    }

    pub fn set(&self, model: &mut M, ids: Vec<u64>) {
        model.record_mut().put(self.remote, ids.encode());
    }

    /// Add a link to `related`, which must already exist remotely.
    pub fn push(&self, model: &mut M, related: &R) -> Result<(), Error> {
        let id = related
            .id()
            .ok_or_else(|| Error::msg(format!("cannot link unsaved {}", R::RESOURCE)))?;
        let mut ids = self.ids(model)?.unwrap_or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        self.set(model, ids);
        Ok(())
    }
}

impl<M, R> Debug for ManyField<M, R> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "ManyField({} -> {})", self.attr, self.remote)
    }
}

fn decode_field<T: FieldValue>(
    record: &Record,
    attr: &str,
    remote: &str,
) -> Result<Option<T>, Error> {
    match record.get(remote) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::decode(value)
            .map(Some)
            .with_context(|| format!("malformed value for field {attr} ({remote})")),
    }
}

/// An entity stored in the CRM.
///
/// This trait is implemented with [`derive(Model)`](crate::Model), which also generates a
/// descriptor constant for each attribute of the model.
pub trait Model: Sized {
    /// The API resource holding entities of this type.
    const RESOURCE: &'static str;

    /// The field used to find an existing entity when saving a new one.
    const MAIN_FIELD: Option<&'static str>;

    /// All fields of this model.
    const FIELDS: &'static [FieldInfo];

    fn record(&self) -> &Record;
    fn record_mut(&mut self) -> &mut Record;
    fn from_record(record: Record) -> Self;
    fn into_record(self) -> Record;

    /// An unloaded reference to the entity with the given ID.
    ///
    /// Attributes of the entity are fetched lazily, the first time they are
    /// [resolved](crate::Client::resolve).
    fn stub(id: u64) -> Self {
        Self::from_record(Record::stub(id))
    }

    /// An entity with data fetched from the remote service.
    fn from_remote(data: Map<String, Value>) -> Self {
        Self::from_record(Record::loaded(data))
    }

    /// Create a new entity from attribute values.
    ///
    /// Keys of `attrs` are attribute names, not remote field names. Values are normalized into the
    /// representation expected by the API. Foreign attributes can be given the value of the
    /// related entity's main field, which is stored in the field mirroring it, if there is one.
    fn from_attrs(attrs: Map<String, Value>) -> Result<Self, Error> {
        let mut record = Record::new();
        for (attr, value) in attrs {
            if value.is_null() {
                continue;
            }
            let Some(field) = Self::field(&attr) else {
                tracing::warn!("{} has no attribute {attr}, ignoring", Self::RESOURCE);
                continue;
            };
            match &field.kind {
                FieldKind::Value(kind) => record.put(field.remote, kind.normalize(&value)?),
                FieldKind::Uneditable => record.put(field.remote, value),
                FieldKind::Many(_) => {
                    record.put(field.remote, ValueKind::IdList.normalize(&value)?)
                }
                FieldKind::Foreign(info) => match info.main_link() {
                    Some(remote) => record.put(remote, value),
                    None => {
                        return Err(Error::msg(format!(
                            "foreign attribute {attr} of {} must be assigned an entity",
                            Self::RESOURCE
                        )))
                    }
                },
                FieldKind::Constant(_) => {
                    tracing::warn!("attribute {attr} of {} is constant, ignoring", Self::RESOURCE);
                }
            }
        }
        Ok(Self::from_record(record))
    }

    /// Look up a field of this model by attribute name.
    fn field(attr: &str) -> Option<&'static FieldInfo> {
        Self::FIELDS.iter().find(|field| field.attr == attr)
    }

    fn id(&self) -> Option<u64> {
        self.record().id()
    }

    fn is_loaded(&self) -> bool {
        self.record().is_loaded()
    }

    /// The current value of `field`, without fetching anything from the remote service.
    fn get<T: FieldValue>(&self, field: &Field<Self, T>) -> Result<Option<T>, Error> {
        field.get(self)
    }

    fn set<T: FieldValue>(&mut self, field: &Field<Self, T>, value: impl Into<T>) {
        field.set(self, value.into())
    }

    /// Builder-style version of [`set`](Self::set).
    fn with<T: FieldValue>(mut self, field: &Field<Self, T>, value: impl Into<T>) -> Self {
        self.set(field, value);
        self
    }

    /// Builder-style version of [`ForeignField::set`].
    fn with_related<R: Model>(mut self, field: &ForeignField<Self, R>, related: R) -> Self {
        field.set(&mut self, related);
        self
    }
}
