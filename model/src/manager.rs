//! Queries, lazy loading, and persistence of models.
//!
//! A [`Manager`] provides access to all the entities of one model, and is obtained from a
//! [`Client`] using [`objects`](Client::objects) or one of the shortcuts like
//! [`leads`](Client::leads). Individual entities are loaded on demand: models obtained from a
//! listing hold the full remote state, but references to related entities are
//! [stubs](Model::stub) which are only fetched when one of their attributes is
//! [resolved](Client::resolve).

use crate::{
    api::{ApiError, Client},
    fields::{
        Field, FieldInfo, FieldKind, FieldValue, ForeignField, ForeignInfo, ManyField, Model,
        Record, Utc,
    },
    schema::{Company, Contact, ContactTask, Lead, LeadTask},
};
use anyhow::Error;
use serde_json::{Map, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// A query-by-example over entities of model `M`.
///
/// Every field included in the query must be equal to the given value for an entity to match.
pub struct Query<M> {
    filter: Map<String, Value>,
    _phantom: PhantomData<fn(&M)>,
}

impl<M> Default for Query<M> {
    fn default() -> Self {
        Self {
            filter: Map::new(),
            _phantom: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_tuple("Query").field(&self.filter).finish()
    }
}

impl<M: Model> Query<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq<T: FieldValue>(mut self, field: &Field<M, T>, value: impl Into<T>) -> Self {
        self.filter
            .insert(field.remote().into(), value.into().encode());
        self
    }

    /// Require the foreign field `field` to link to the entity with ID `id`.
    pub fn linked<R: Model>(mut self, field: &ForeignField<M, R>, id: u64) -> Self {
        self.filter.insert(field.remote().into(), id.into());
        self
    }

    /// The `query` parameter for this query, including the constant fields of `M`.
    fn param(self) -> Option<String> {
        query_param(self.filter, M::FIELDS)
    }
}

/// Encode a filter as a `query` parameter, adding the constant `fields` of the queried model.
fn query_param(mut filter: Map<String, Value>, fields: &[FieldInfo]) -> Option<String> {
    for field in fields {
        if let FieldKind::Constant(value) = &field.kind {
            filter.insert(field.remote.into(), value.to_value());
        }
    }
    if filter.is_empty() {
        None
    } else {
        Some(Value::Object(filter).to_string())
    }
}

/// Whether a record fetched by ID agrees with the constant fields of a model.
///
/// Lookups by ID cannot be filtered remotely, so this keeps, for example, a [`ContactTask`] from
/// being loaded as a [`LeadTask`].
fn has_constants(fields: &[FieldInfo], data: &Map<String, Value>) -> bool {
    fields.iter().all(|field| match &field.kind {
        FieldKind::Constant(value) => match data.get(field.remote) {
            Some(actual) => String::decode(actual).ok() == String::decode(&value.to_value()).ok(),
            None => true,
        },
        _ => true,
    })
}

/// How to persist an entity which does not have an ID yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaveMode {
    /// Always add a new entity.
    Create,
    /// Update an existing entity with the same main field, if there is one.
    CreateOrUpdate,
}

/// The static description of a model, independent of its Rust type.
#[derive(Clone, Copy, Debug)]
struct Entity {
    resource: &'static str,
    main_field: Option<&'static str>,
    fields: &'static [FieldInfo],
}

impl Entity {
    fn of<M: Model>() -> Self {
        Self {
            resource: M::RESOURCE,
            main_field: M::MAIN_FIELD,
            fields: M::FIELDS,
        }
    }
}

impl From<&ForeignInfo> for Entity {
    fn from(info: &ForeignInfo) -> Self {
        Self {
            resource: info.resource,
            main_field: info.main_field,
            fields: info.fields,
        }
    }
}

/// Access to the entities of model `M`.
pub struct Manager<'c, M> {
    client: &'c Client,
    _phantom: PhantomData<fn() -> M>,
}

impl<'c, M> Clone for Manager<'c, M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            _phantom: PhantomData,
        }
    }
}

impl<'c, M: Model> Manager<'c, M> {
    /// All entities.
    pub async fn all(&self) -> Result<Vec<M>, Error> {
        self.list(Query::<M>::new().param(), None).await
    }

    /// A page of `rows` entities, starting from `offset`.
    pub async fn page(&self, offset: usize, rows: usize) -> Result<Vec<M>, Error> {
        self.list(Query::<M>::new().param(), Some((offset, rows))).await
    }

    /// Entities matching `query`.
    pub async fn search(&self, query: Query<M>) -> Result<Vec<M>, Error> {
        self.list(query.param(), None).await
    }

    /// The first entity whose `field` equals `value`.
    pub async fn find_by<T: FieldValue>(
        &self,
        field: &Field<M, T>,
        value: impl Into<T>,
    ) -> Result<Option<M>, Error> {
        Ok(self
            .search(Query::new().eq(field, value))
            .await?
            .into_iter()
            .next())
    }

    /// The entity with the given ID, if it exists.
    pub async fn find(&self, id: u64) -> Result<Option<M>, Error> {
        Ok(self
            .client
            .fetch(Entity::of::<M>(), id)
            .await?
            .map(M::from_remote))
    }

    /// The entity with the given ID.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::NotFound`] if there is no such entity.
    pub async fn get(&self, id: u64) -> Result<M, Error> {
        self.find(id).await?.ok_or_else(|| {
            ApiError::NotFound {
                resource: M::RESOURCE.into(),
                id,
            }
            .into()
        })
    }

    /// Persist `model`, returning its ID.
    ///
    /// If `model` has an ID, only the modified fields are sent. Otherwise, if an entity with the
    /// same main field exists remotely, that entity is updated and `model` takes its ID. If not, a
    /// new entity is created.
    ///
    /// Related entities assigned to foreign fields are saved first, if necessary.
    pub async fn save(&self, model: &mut M) -> Result<u64, Error> {
        self.client
            .save_record(Entity::of::<M>(), model.record_mut(), SaveMode::CreateOrUpdate)
            .await
    }

    /// Persist `model` as a new entity, unless it already has an ID.
    pub async fn create(&self, model: &mut M) -> Result<u64, Error> {
        self.client
            .save_record(Entity::of::<M>(), model.record_mut(), SaveMode::Create)
            .await
    }

    async fn list(
        &self,
        query: Option<String>,
        page: Option<(usize, usize)>,
    ) -> Result<Vec<M>, Error> {
        let mut params = vec![];
        if let Some(query) = query {
            params.push(("query".to_string(), query));
        }
        if let Some((offset, rows)) = page {
            params.push(("limit_rows".to_string(), rows.to_string()));
            params.push(("limit_offset".to_string(), offset.to_string()));
        }
        Ok(self
            .client
            .list(M::RESOURCE, params)
            .await?
            .into_iter()
            .map(M::from_remote)
            .collect())
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl Client {
    /// Access entities of model `M`.
    pub fn objects<M: Model>(&self) -> Manager<'_, M> {
        Manager {
            client: self,
            _phantom: PhantomData,
        }
    }

    pub fn leads(&self) -> Manager<'_, Lead> {
        self.objects()
    }

    pub fn contacts(&self) -> Manager<'_, Contact> {
        self.objects()
    }

    pub fn companies(&self) -> Manager<'_, Company> {
        self.objects()
    }

    pub fn lead_tasks(&self) -> Manager<'_, LeadTask> {
        self.objects()
    }

    pub fn contact_tasks(&self) -> Manager<'_, ContactTask> {
        self.objects()
    }

    /// Persist `model`. See [`Manager::save`].
    pub async fn save<M: Model>(&self, model: &mut M) -> Result<u64, Error> {
        self.objects::<M>().save(model).await
    }

    /// Fetch the full remote state of `model`.
    ///
    /// Attributes which have been modified locally keep their local values.
    pub async fn load<M: Model>(&self, model: &mut M) -> Result<(), Error> {
        self.load_record(Entity::of::<M>(), model.record_mut())
            .await
    }

    /// The value of `field`, fetching `model` from the remote service if necessary.
    ///
    /// The entity is fetched at most once, the first time an attribute which is not set locally is
    /// resolved. Attributes which have been modified locally never cause a fetch.
    pub async fn resolve<M: Model, T: FieldValue>(
        &self,
        model: &mut M,
        field: &Field<M, T>,
    ) -> Result<Option<T>, Error> {
        self.load_if_missing(Entity::of::<M>(), model.record_mut(), field.remote())
            .await?;
        field.get(model)
    }

    /// The entity linked by `field`, fetching `model` from the remote service if necessary.
    ///
    /// The related entity itself is not fetched; its attributes can in turn be resolved lazily.
    pub async fn resolve_foreign<M: Model, R: Model>(
        &self,
        model: &mut M,
        field: &ForeignField<M, R>,
    ) -> Result<Option<R>, Error> {
        if model.record().related(field.attr()).is_none() {
            self.load_if_missing(Entity::of::<M>(), model.record_mut(), field.remote())
                .await?;
        }
        field.get(model)
    }

    /// All the entities linked by `field`, fetching each of them.
    pub async fn resolve_many<M: Model, R: Model>(
        &self,
        model: &mut M,
        field: &ManyField<M, R>,
    ) -> Result<Vec<R>, Error> {
        self.load_if_missing(Entity::of::<M>(), model.record_mut(), field.remote())
            .await?;
        let manager = self.objects::<R>();
        let mut related = vec![];
        for id in field.ids(model)?.unwrap_or_default() {
            related.push(manager.get(id).await?);
        }
        Ok(related)
    }

    async fn load_if_missing(
        &self,
        entity: Entity,
        record: &mut Record,
        remote: &str,
    ) -> Result<(), Error> {
        let missing = matches!(record.get(remote), None | Some(Value::Null));
        if missing
            && remote != "id"
            && !record.is_loaded()
            && !record.is_changed(remote)
            && record.id().is_some()
        {
            tracing::debug!(resource = entity.resource, id = ?record.id(), remote, "lazy load");
            self.load_record(entity, record).await?;
        }
        Ok(())
    }

    async fn load_record(&self, entity: Entity, record: &mut Record) -> Result<(), Error> {
        let id = record
            .id()
            .ok_or_else(|| Error::msg(format!("cannot load {} without an ID", entity.resource)))?;
        let data = self.fetch(entity, id).await?.ok_or_else(|| ApiError::NotFound {
            resource: entity.resource.into(),
            id,
        })?;
        record.merge_loaded(data);
        Ok(())
    }

    async fn fetch(&self, entity: Entity, id: u64) -> Result<Option<Map<String, Value>>, Error> {
        let found = self
            .list(entity.resource, [("id".to_string(), id.to_string())])
            .await?
            .into_iter()
            .next();
        Ok(found.filter(|data| {
            let ok = has_constants(entity.fields, data);
            if !ok {
                tracing::info!(resource = entity.resource, id, "entity has a different type");
            }
            ok
        }))
    }

    fn save_record<'a>(
        &'a self,
        entity: Entity,
        record: &'a mut Record,
        mode: SaveMode,
    ) -> BoxFuture<'a, Result<u64, Error>> {
        Box::pin(async move {
            let loaded = record.is_loaded();

            // Save related entities first, so we can link to them by ID.
            for field in entity.fields {
                let FieldKind::Foreign(info) = &field.kind else {
                    continue;
                };
                let link_changed = record.is_changed(field.remote);
                let Some(related) = record.related_mut(field.attr) else {
                    continue;
                };
                let mirrored = info
                    .links
                    .iter()
                    .filter_map(|(related_field, remote)| {
                        related.get(related_field).map(|value| (*remote, value.clone()))
                    })
                    .collect::<Vec<_>>();
                let mut id = related.id();
                let pending = id.is_none() || related.changed().next().is_some();
                if !info.auto_created && (link_changed || !loaded) && pending {
                    tracing::debug!(
                        resource = entity.resource,
                        related = info.resource,
                        "saving related entity"
                    );
                    id = Some(
                        self.save_record(info.into(), related, SaveMode::CreateOrUpdate)
                            .await?,
                    );
                }

                for (remote, value) in mirrored {
                    put_if_changed(record, remote, value);
                }
                if let Some(id) = id {
                    put_if_changed(record, field.remote, id.into());
                }
            }

            // A stub may only be missing the creation date locally.
            self.load_if_missing(entity, record, "date_create").await?;
            let now = Utc::now();
            if matches!(record.get("date_create"), None | Some(Value::Null)) {
                record.put("date_create", now.encode());
            }
            record.put("last_modified", now.encode());

            let id = match (record.id(), mode) {
                (Some(_), _) => {
                    self.update(entity.resource, record.update_payload(entity.fields))
                        .await?
                }
                (None, SaveMode::Create) => {
                    self.add(entity.resource, record.create_payload(entity.fields))
                        .await?
                }
                (None, SaveMode::CreateOrUpdate) => self.create_or_update(entity, record).await?,
            };
            tracing::debug!(resource = entity.resource, id, "saved");
            record.assign_id(id);
            record.clear_changes();
            Ok(id)
        })
    }

    /// Update the entity with the same main field as `record`, or add a new one.
    async fn create_or_update(&self, entity: Entity, record: &Record) -> Result<u64, Error> {
        let mut payload = record.create_payload(entity.fields);
        if let Some(main) = entity.main_field {
            if let Some(value) = record.get(main).filter(|value| !value.is_null()) {
                let mut filter = Map::new();
                filter.insert(main.into(), value.clone());
                let query = query_param(filter, entity.fields);
                let existing = self
                    .list(
                        entity.resource,
                        query.map(|query| ("query".to_string(), query)),
                    )
                    .await?
                    .into_iter()
                    .find_map(|data| data.get("id").and_then(|id| u64::decode(id).ok()));
                if let Some(id) = existing {
                    tracing::debug!(resource = entity.resource, id, "updating existing entity");
                    payload.insert("id".into(), id.into());
                    return self.update(entity.resource, payload).await;
                }
            }
        }
        self.add(entity.resource, payload).await
    }
}

fn put_if_changed(record: &mut Record, remote: &str, value: Value) {
    if record.get(remote) != Some(&value) {
        record.put(remote, value);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{api::Method, fields::DateTime, mock::MockTransport, Model};
    use serde_json::json;

    /// A note whose contact is created by the service from the mirrored name.
    #[derive(Clone, Debug, Default, PartialEq, Model)]
    #[model(resource = "notes")]
    #[model(field(text: String))]
    #[model(foreign(
        contact: Contact = "element_id",
        link(name = "contact_name"),
        auto_created
    ))]
    struct ContactNote(Record);

    fn request_summary(requests: &[crate::api::Request]) -> Vec<(String, Method)> {
        requests
            .iter()
            .map(|req| (req.resource.clone(), req.method))
            .collect()
    }

    #[async_std::test]
    async fn test_list_and_find() {
        let client = MockTransport::new().client("", "");

        let leads = client.leads().all().await.unwrap();
        assert_eq!(leads.len(), 3);
        assert!(leads.iter().all(|lead| lead.is_loaded()));

        let page = client.leads().page(1, 2).await.unwrap();
        assert_eq!(
            page.iter().map(|lead| lead.id()).collect::<Vec<_>>(),
            vec![Some(2), Some(3)]
        );

        let lead = client.leads().get(2).await.unwrap();
        assert_eq!(lead.get(&Lead::PRICE).unwrap(), Some(1200));
        assert!(client.leads().find(42).await.unwrap().is_none());
        let err = client.leads().get(42).await.unwrap_err();
        assert_eq!(
            err.downcast_ref(),
            Some(&ApiError::NotFound {
                resource: "leads".into(),
                id: 42
            })
        );

        let jane = client
            .contacts()
            .find_by(&Contact::NAME, "Jane Doe")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(jane.id(), Some(2));

        let acme = client
            .contacts()
            .search(Query::new().linked(&Contact::COMPANY, 1))
            .await
            .unwrap();
        assert_eq!(acme.len(), 1);
        assert_eq!(acme[0].get(&Contact::NAME).unwrap().as_deref(), Some("John Smith"));
    }

    #[async_std::test]
    async fn test_tasks_by_element_type() {
        let client = MockTransport::new().client("", "");
        let lead_tasks = client.lead_tasks().all().await.unwrap();
        assert_eq!(lead_tasks.len(), 1);
        assert_eq!(LeadTask::LEAD.id(&lead_tasks[0]).unwrap(), Some(1));
        assert_eq!(client.contact_tasks().all().await.unwrap().len(), 2);

        // Task 1 is attached to a lead, so it is not a contact task.
        assert!(client.contact_tasks().find(1).await.unwrap().is_none());
        assert!(client.lead_tasks().find(1).await.unwrap().is_some());
    }

    #[async_std::test]
    async fn test_lazy_load() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        let mut lead = Lead::stub(2);
        assert_eq!(
            client.resolve(&mut lead, &Lead::NAME).await.unwrap().as_deref(),
            Some("Website redesign")
        );
        assert!(lead.is_loaded());
        assert_eq!(client.resolve(&mut lead, &Lead::PRICE).await.unwrap(), Some(1200));
        assert_eq!(mock.requests().await.len(), 1);

        // Locally modified fields are never fetched.
        let mut lead = Lead::stub(3);
        Lead::PRICE.clear(&mut lead);
        assert_eq!(client.resolve(&mut lead, &Lead::PRICE).await.unwrap(), None);
        assert!(!lead.is_loaded());
        assert_eq!(mock.requests().await.len(), 1);

        // Neither are new entities.
        let mut lead = Lead::new();
        assert_eq!(client.resolve(&mut lead, &Lead::NAME).await.unwrap(), None);
        assert_eq!(mock.requests().await.len(), 1);

        // Stubs of missing entities fail to load.
        let mut lead = Lead::stub(99);
        assert!(client.resolve(&mut lead, &Lead::NAME).await.is_err());
    }

    #[async_std::test]
    async fn test_resolve_related() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        let mut contact = Contact::stub(1);
        let mut company = client
            .resolve_foreign(&mut contact, &Contact::COMPANY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(company.id(), Some(1));
        assert_eq!(
            client.resolve(&mut company, &Company::NAME).await.unwrap().as_deref(),
            Some("Acme")
        );

        let leads = client
            .resolve_many(&mut contact, &Contact::LINKED_LEADS)
            .await
            .unwrap();
        assert_eq!(
            leads.iter().map(|lead| lead.id()).collect::<Vec<_>>(),
            vec![Some(1), Some(3)]
        );
        assert_eq!(
            request_summary(&mock.requests().await),
            vec![
                ("contacts".to_string(), Method::List),
                ("company".to_string(), Method::List),
                ("leads".to_string(), Method::List),
                ("leads".to_string(), Method::List),
            ]
        );

        let mut bob = Contact::stub(3);
        assert!(client
            .resolve_foreign(&mut bob, &Contact::COMPANY)
            .await
            .unwrap()
            .is_none());
    }

    #[async_std::test]
    async fn test_save_update() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        let mut lead = client.leads().get(1).await.unwrap();
        lead.set(&Lead::PRICE, 7000u64);
        assert_eq!(client.save(&mut lead).await.unwrap(), 1);
        assert_eq!(lead.record().changed().count(), 0);

        let requests = mock.requests().await;
        let body = requests.last().unwrap().body.clone().unwrap();
        let update = body["request"]["leads"]["update"].as_object().unwrap();
        let mut keys = update.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, ["id", "last_modified", "price"]);

        let leads = mock.records("leads").await;
        let stored = &leads[0];
        assert_eq!(stored["price"], json!(7000));
        assert_eq!(stored["name"], json!("Annual contract"));
    }

    #[async_std::test]
    async fn test_save_stub_keeps_date_create() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        let mut lead = Lead::stub(1);
        lead.set(&Lead::PRICE, 42u64);
        assert_eq!(client.save(&mut lead).await.unwrap(), 1);

        let leads = mock.records("leads").await;
        let stored = &leads[0];
        assert_eq!(stored["price"], json!(42));
        assert_eq!(stored["date_create"], json!(1_500_000_000));

        let requests = mock.requests().await;
        let body = requests.last().unwrap().body.clone().unwrap();
        assert!(body["request"]["leads"]["update"].get("date_create").is_none());
    }

    #[async_std::test]
    async fn test_save_create_or_update() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        // An entity with the same main field is updated rather than duplicated.
        let mut lead = Lead::new()
            .with(&Lead::NAME, "Consulting")
            .with(&Lead::PRICE, 999u64);
        assert_eq!(client.save(&mut lead).await.unwrap(), 3);
        assert_eq!(lead.id(), Some(3));
        let leads = mock.records("leads").await;
        assert_eq!(leads.len(), 3);
        assert_eq!(leads[2]["price"], json!(999));

        let mut lead = Lead::new().with(&Lead::NAME, "Brand new");
        assert_eq!(client.save(&mut lead).await.unwrap(), 4);
        let leads = mock.records("leads").await;
        let stored = &leads[3];
        assert_eq!(stored["name"], json!("Brand new"));
        assert!(stored["date_create"].is_i64());

        // `create` never looks for an existing entity.
        let mut lead = Lead::new().with(&Lead::NAME, "Brand new");
        assert_eq!(client.leads().create(&mut lead).await.unwrap(), 5);
    }

    #[async_std::test]
    async fn test_save_related() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        let company = Company::new().with(&Company::NAME, "Initech");
        let mut contact = Contact::new()
            .with(&Contact::NAME, "Peter")
            .with_related(&Contact::COMPANY, company);
        assert_eq!(client.save(&mut contact).await.unwrap(), 4);
        assert_eq!(Contact::COMPANY.id(&contact).unwrap(), Some(3));
        assert_eq!(
            Contact::COMPANY.get(&contact).unwrap().unwrap().id(),
            Some(3)
        );

        let companies = mock.records("company").await;
        assert_eq!(companies[2]["name"], json!("Initech"));
        assert_eq!(companies[2]["type"], json!("company"));
        let contacts = mock.records("contacts").await;
        let stored = &contacts[3];
        assert_eq!(stored["linked_company_id"], json!(3));
        assert_eq!(stored["company_name"], json!("Initech"));
        assert_eq!(stored["type"], json!("contact"));

        assert_eq!(
            request_summary(&mock.requests().await),
            vec![
                ("company".to_string(), Method::List),
                ("company".to_string(), Method::Set),
                ("contacts".to_string(), Method::List),
                ("contacts".to_string(), Method::Set),
            ]
        );

        // Linking an existing, unmodified company does not save it again.
        mock.reset().await;
        let acme = client.companies().get(1).await.unwrap();
        let mut jane = client.contacts().get(2).await.unwrap();
        Contact::COMPANY.set(&mut jane, acme);
        client.save(&mut jane).await.unwrap();
        let requests = mock.requests().await;
        assert_eq!(
            request_summary(&requests[2..]),
            vec![("contacts".to_string(), Method::Set)]
        );
        let contacts = mock.records("contacts").await;
        let stored = &contacts[1];
        assert_eq!(stored["linked_company_id"], json!(1));
        assert_eq!(stored["company_name"], json!("Acme"));
    }

    #[async_std::test]
    async fn test_save_auto_created() {
        let mock = MockTransport::new();
        let client = mock.client("", "");

        let mut note = ContactNote::new()
            .with(&ContactNote::TEXT, "Called from the website")
            .with_related(
                &ContactNote::CONTACT,
                Contact::new().with(&Contact::NAME, "Newcomer"),
            );
        assert_eq!(client.save(&mut note).await.unwrap(), 2);

        // Only the note is sent; the contact is left to the remote service.
        assert_eq!(
            request_summary(&mock.requests().await),
            vec![("notes".to_string(), Method::Set)]
        );
        assert_eq!(mock.records("contacts").await.len(), 3);
        let notes = mock.records("notes").await;
        let stored = &notes[1];
        assert_eq!(stored["contact_name"], json!("Newcomer"));
        assert_eq!(stored["text"], json!("Called from the website"));
        assert!(stored.get("element_id").is_none());
    }

    #[async_std::test]
    async fn test_create_task() {
        let mock = MockTransport::new();
        let client = mock.client("", "");
        let due = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap();

        let contact = client.contacts().get(1).await.unwrap();
        let task = contact
            .create_task(&client, "Call back", 1, due)
            .await
            .unwrap();
        assert_eq!(task.id(), Some(4));
        assert_eq!(ContactTask::CONTACT.id(&task).unwrap(), Some(1));

        let lead = client.leads().get(3).await.unwrap();
        let task = lead.create_task(&client, "Draft offer", 2, due).await.unwrap();
        assert_eq!(task.id(), Some(5));

        let tasks = mock.records("tasks").await;
        assert_eq!(tasks[3]["element_id"], json!(1));
        assert_eq!(tasks[3]["element_type"], json!(1));
        assert_eq!(tasks[3]["text"], json!("Call back"));
        assert_eq!(tasks[3]["complete_till"], json!(1_600_000_000));
        assert_eq!(tasks[4]["element_id"], json!(3));
        assert_eq!(tasks[4]["element_type"], json!(2));
        assert_eq!(client.lead_tasks().all().await.unwrap().len(), 2);
    }
}
