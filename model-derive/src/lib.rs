//! Derive macros for the `amocrm` crate.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod helpers;
mod model;

/// Derive an implementation of `Model`, and a descriptor for each attribute, for a struct.
///
/// A model is a tuple struct wrapping a `Record`, which holds the raw remote state of an entity.
/// The attributes of the model, and the way they map to fields of the remote API, are declared
/// using `#[model(...)]` attributes on the struct.
///
/// The following items are generated:
/// * An inherent `const` descriptor for each attribute, named after the attribute in
///   `UPPER_SNAKE_CASE`. Descriptors are typed by the model and the value of the attribute, so
///   that `Lead::PRICE` is a `Field<Lead, u64>`. Foreign attributes get a `ForeignField`.
/// * Descriptors for the attributes every entity in the CRM has: `ID` (read-only), `NAME`,
///   `LINKED_LEADS`, `DATE_CREATE`, `LAST_MODIFIED`, `TAGS`, `RESPONSIBLE_USER` and `DELETED`.
/// * An inherent `new()` constructor creating an entity which does not exist remotely yet.
/// * An implementation of `Model`, including a static table describing all of the fields, which
///   is used to validate attribute names, to build payloads, and to save related entities.
///
/// # Examples
///
/// ```ignore
/// use amocrm::{fields::Record, schema::Company, Model};
///
/// /// A person in the CRM.
/// #[derive(Clone, Debug, Default, PartialEq, Model)]
/// #[model(resource = "contacts", main_field = "name")]
/// #[model(constant(field = "type", value = "contact"))]
/// #[model(field(created_user: u64 = "created_user_id"))]
/// #[model(foreign(company: Company = "linked_company_id", link(name = "company_name")))]
/// pub struct Contact(Record);
/// ```
///
/// ## Generated code.
///
/// ```ignore
/// impl Contact {
///     pub const ID: ReadOnlyField<Self, u64> = ReadOnlyField::new("id", "id");
///     pub const NAME: Field<Self, String> = Field::new("name", "name");
///     // Other common fields omitted.
///     pub const CREATED_USER: Field<Self, u64> = Field::new("created_user", "created_user_id");
///     pub const COMPANY: ForeignField<Self, Company> =
///         ForeignField::new("company", "linked_company_id", &[("name", "company_name")], false);
///
///     pub fn new() -> Self {
///         Self(Record::new())
///     }
/// }
///
/// impl Model for Contact {
///     const RESOURCE: &'static str = "contacts";
///     const MAIN_FIELD: Option<&'static str> = Some("name");
///     const FIELDS: &'static [FieldInfo] = &[
///         // One entry for each of the fields above, plus the constant `type` field.
///     ];
///
///     // Conversions to and from `Record` omitted.
/// }
/// ```
///
/// # Struct attributes
///
/// | Attribute     | Description                                             | Arg     | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | resource      | The API resource holding entities of this type.         | string  | yes      |
/// | main_field    | The remote field used to find an existing entity when saving a new one. | string | no |
/// | field         | Declare an attribute: `field(name: Type = "remote")`. `Type` must implement `FieldValue`. The remote name defaults to the attribute name. | field | no |
/// | foreign       | Declare a link to another model: `foreign(name: Model = "remote", link(main = "remote"), auto_created)`. `link` mirrors fields of the related entity into fields of this one. `auto_created` marks links which the remote service persists by itself. | field | no |
/// | constant      | Declare a remote field with a fixed value which is sent with every write: `constant(field = "remote", value = <string or integer>)`. | field | no |
///
/// Generic type arguments in `field` and `foreign` declarations must be followed by a space
/// before the `=`, as in `field(due: DateTime<Utc> = "due_date")`.
#[proc_macro_derive(Model, attributes(model))]
pub fn model(input: TokenStream) -> TokenStream {
    model::derive(parse_macro_input!(input)).into()
}
