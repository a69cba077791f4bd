//! The entities stored in the CRM.

use crate::{
    fields::{DateTime, Record, Utc},
    Client, Model,
};
use anyhow::Error;
use strum::{Display, EnumIter, EnumString};

/// The kinds of entities a task or note can be attached to.
#[derive(Clone, Copy, Debug, Display, EnumString, EnumIter, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum ElementType {
    Contact = 1,
    Lead = 2,
}

impl ElementType {
    /// The numeric code of this element type in the API.
    pub fn id(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for ElementType {
    type Error = Error;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Contact),
            2 => Ok(Self::Lead),
            _ => Err(Error::msg(format!("unknown element type {id}"))),
        }
    }
}

/// An organization which contacts work for.
#[derive(Clone, Debug, Default, PartialEq, Model)]
#[model(resource = "company", main_field = "name")]
#[model(constant(field = "type", value = "company"))]
pub struct Company(Record);

/// A potential deal.
#[derive(Clone, Debug, Default, PartialEq, Model)]
#[model(resource = "leads", main_field = "name")]
#[model(field(status: u64 = "status_id"), field(price: u64))]
pub struct Lead(Record);

impl Lead {
    /// Create a task attached to this lead.
    ///
    /// The lead must already exist remotely; the task is saved immediately.
    pub async fn create_task(
        &self,
        client: &Client,
        text: impl Into<String>,
        task_type: u64,
        complete_till: DateTime<Utc>,
    ) -> Result<LeadTask, Error> {
        let mut task = LeadTask::new()
            .with(&LeadTask::TEXT, text)
            .with(&LeadTask::TASK_TYPE, task_type)
            .with(&LeadTask::COMPLETE_TILL, complete_till)
            .with_related(&LeadTask::LEAD, self.clone());
        client.objects::<LeadTask>().create(&mut task).await?;
        Ok(task)
    }
}

/// A person.
#[derive(Clone, Debug, Default, PartialEq, Model)]
#[model(resource = "contacts", main_field = "name")]
#[model(constant(field = "type", value = "contact"))]
#[model(field(created_user: u64))]
#[model(foreign(company: Company = "linked_company_id", link(name = "company_name")))]
pub struct Contact(Record);

impl Contact {
    /// Create a task attached to this contact.
    ///
    /// The contact must already exist remotely; the task is saved immediately.
    pub async fn create_task(
        &self,
        client: &Client,
        text: impl Into<String>,
        task_type: u64,
        complete_till: DateTime<Utc>,
    ) -> Result<ContactTask, Error> {
        let mut task = ContactTask::new()
            .with(&ContactTask::TEXT, text)
            .with(&ContactTask::TASK_TYPE, task_type)
            .with(&ContactTask::COMPLETE_TILL, complete_till)
            .with_related(&ContactTask::CONTACT, self.clone());
        client.objects::<ContactTask>().create(&mut task).await?;
        Ok(task)
    }
}

/// A task attached to a [`Lead`].
#[derive(Clone, Debug, Default, PartialEq, Model)]
#[model(resource = "tasks")]
#[model(constant(field = "element_type", value = 2))]
#[model(
    field(task_type: u64),
    field(text: String),
    field(complete_till: DateTime<Utc> = "complete_till")
)]
#[model(foreign(lead: Lead = "element_id"))]
pub struct LeadTask(Record);

impl LeadTask {
    pub const ELEMENT_TYPE: ElementType = ElementType::Lead;
}

/// A task attached to a [`Contact`].
#[derive(Clone, Debug, Default, PartialEq, Model)]
#[model(resource = "tasks")]
#[model(constant(field = "element_type", value = 1))]
#[model(
    field(task_type: u64),
    field(text: String),
    field(complete_till: DateTime<Utc> = "complete_till")
)]
#[model(foreign(contact: Contact = "element_id"))]
pub struct ContactTask(Record);

impl ContactTask {
    pub const ELEMENT_TYPE: ElementType = ElementType::Contact;
}
