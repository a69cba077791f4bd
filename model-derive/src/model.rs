//! Derive macro for the `Model` trait.

use crate::helpers::{amocrm_path, AttrParser};
use convert_case::{Case, Casing};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    meta::ParseNestedMeta, parenthesized, Data, DeriveInput, Error, Fields, Ident, Lit, LitStr,
    Result, Token, Type,
};

/// A field declared with `#[model(field(...))]`.
struct ValueField {
    name: Ident,
    ty: TokenStream,
    remote: String,
}

/// A field declared with `#[model(foreign(...))]`.
struct ForeignField {
    name: Ident,
    ty: Type,
    remote: String,
    links: Vec<(String, String)>,
    auto_created: bool,
}

/// A field declared with `#[model(constant(...))]`.
struct Constant {
    remote: String,
    value: Lit,
}

#[derive(Default)]
struct ModelAttrs {
    resource: Option<LitStr>,
    main_field: Option<LitStr>,
    fields: Vec<ValueField>,
    foreign: Vec<ForeignField>,
    constants: Vec<Constant>,
}

/// Derive a `Model` instance for a struct.
pub fn derive(input: DeriveInput) -> TokenStream {
    generate(input).unwrap_or_else(Error::into_compile_error)
}

fn generate(
    DeriveInput {
        vis,
        ident,
        generics,
        data,
        attrs,
    }: DeriveInput,
) -> Result<TokenStream> {
    if !generics.params.is_empty() {
        return Err(Error::new_spanned(
            generics,
            "Model cannot be derived on generic types",
        ));
    }
    // Models are thin wrappers around the raw record.
    match data {
        Data::Struct(s) if matches!(&s.fields, Fields::Unnamed(f) if f.unnamed.len() == 1) => {}
        _ => {
            return Err(Error::new_spanned(
                ident,
                "Model can only be derived for tuple structs of the form `struct M(Record);`",
            ))
        }
    }

    let mut model = ModelAttrs::default();
    AttrParser::new("model").parse(&attrs, |meta| parse_model_arg(&mut model, meta))?;
    let Some(resource) = model.resource else {
        return Err(Error::new_spanned(
            ident,
            "missing required attribute #[model(resource = \"...\")]",
        ));
    };

    let amocrm = amocrm_path();
    let fields = quote!(#amocrm::fields);
    let new_doc = format!("A new {ident} which does not exist remotely yet.");

    let main_field = match &model.main_field {
        Some(main) => quote!(Some(#main)),
        None => quote!(None),
    };

    // Every model has the same set of common fields, followed by the ones it declares.
    let mut value_fields = common_fields(&amocrm);
    value_fields.extend(model.fields);

    let mut consts = vec![quote! {
        #[doc = "The ID assigned to this entity by the remote service."]
        #vis const ID: #fields::ReadOnlyField<Self, u64> = #fields::ReadOnlyField::new("id", "id");
        #[doc = "Leads linked to this entity."]
        #vis const LINKED_LEADS: #fields::ManyField<Self, #amocrm::schema::Lead> =
            #fields::ManyField::new("linked_leads", "linked_leads_id");
    }];
    let mut infos = vec![quote! {
        #fields::FieldInfo {
            attr: "id",
            remote: "id",
            kind: #fields::FieldKind::Uneditable,
        },
        #fields::FieldInfo {
            attr: "linked_leads",
            remote: "linked_leads_id",
            kind: #fields::FieldKind::Many(#fields::ManyInfo {
                resource: <#amocrm::schema::Lead as #fields::Model>::RESOURCE,
            }),
        },
    }];

    for ValueField { name, ty, remote } in &value_fields {
        let konst = const_name(name);
        let attr = name.to_string();
        let doc = format!("The `{attr}` attribute, stored remotely as `{remote}`.");
        consts.push(quote! {
            #[doc = #doc]
            #vis const #konst: #fields::Field<Self, #ty> = #fields::Field::new(#attr, #remote);
        });
        infos.push(quote! {
            #fields::FieldInfo {
                attr: #attr,
                remote: #remote,
                kind: #fields::FieldKind::Value(<#ty as #fields::FieldValue>::KIND),
            },
        });
    }

    for ForeignField {
        name,
        ty,
        remote,
        links,
        auto_created,
    } in &model.foreign
    {
        let konst = const_name(name);
        let attr = name.to_string();
        let doc = format!("The related entity `{attr}`, linked by `{remote}`.");
        let links = links
            .iter()
            .map(|(related, owner)| quote!((#related, #owner)))
            .collect::<Vec<_>>();
        consts.push(quote! {
            #[doc = #doc]
            #vis const #konst: #fields::ForeignField<Self, #ty> =
                #fields::ForeignField::new(#attr, #remote, &[#(#links),*], #auto_created);
        });
        infos.push(quote! {
            #fields::FieldInfo {
                attr: #attr,
                remote: #remote,
                kind: #fields::FieldKind::Foreign(#fields::ForeignInfo {
                    resource: <#ty as #fields::Model>::RESOURCE,
                    main_field: <#ty as #fields::Model>::MAIN_FIELD,
                    fields: <#ty as #fields::Model>::FIELDS,
                    links: &[#(#links),*],
                    auto_created: #auto_created,
                }),
            },
        });
    }

    for Constant { remote, value } in &model.constants {
        let value = match value {
            Lit::Str(s) => quote!(#fields::Constant::Str(#s)),
            Lit::Int(i) => quote!(#fields::Constant::Int(#i)),
            lit => {
                return Err(Error::new_spanned(
                    lit,
                    "constant values must be string or integer literals",
                ))
            }
        };
        infos.push(quote! {
            #fields::FieldInfo {
                attr: #remote,
                remote: #remote,
                kind: #fields::FieldKind::Constant(#value),
            },
        });
    }

    Ok(quote! {
        impl #ident {
            #(#consts)*

            #[doc = #new_doc]
            #vis fn new() -> Self {
                Self(#fields::Record::new())
            }
        }

        impl #fields::Model for #ident {
            const RESOURCE: &'static str = #resource;
            const MAIN_FIELD: Option<&'static str> = #main_field;
            const FIELDS: &'static [#fields::FieldInfo] = &[#(#infos)*];

            fn record(&self) -> &#fields::Record {
                &self.0
            }

            fn record_mut(&mut self) -> &mut #fields::Record {
                &mut self.0
            }

            fn from_record(record: #fields::Record) -> Self {
                Self(record)
            }

            fn into_record(self) -> #fields::Record {
                self.0
            }
        }
    })
}

fn parse_model_arg(model: &mut ModelAttrs, meta: ParseNestedMeta) -> Result<()> {
    if meta.path.is_ident("resource") {
        model.resource = Some(meta.value()?.parse()?);
    } else if meta.path.is_ident("main_field") {
        model.main_field = Some(meta.value()?.parse()?);
    } else if meta.path.is_ident("field") {
        let content;
        parenthesized!(content in meta.input);
        let name: Ident = content.parse()?;
        content.parse::<Token![:]>()?;
        let ty: Type = content.parse()?;
        let remote = parse_remote(&content, &name)?;
        model.fields.push(ValueField {
            name,
            ty: quote!(#ty),
            remote,
        });
    } else if meta.path.is_ident("foreign") {
        let content;
        parenthesized!(content in meta.input);
        let name: Ident = content.parse()?;
        content.parse::<Token![:]>()?;
        let ty: Type = content.parse()?;
        let remote = parse_remote(&content, &name)?;
        let mut field = ForeignField {
            name,
            ty,
            remote,
            links: vec![],
            auto_created: false,
        };
        while !content.is_empty() {
            content.parse::<Token![,]>()?;
            if content.is_empty() {
                break;
            }
            let option: Ident = content.parse()?;
            if option == "auto_created" {
                field.auto_created = true;
            } else if option == "link" {
                let links;
                parenthesized!(links in content);
                while !links.is_empty() {
                    let related: Ident = links.parse()?;
                    links.parse::<Token![=]>()?;
                    let owner: LitStr = links.parse()?;
                    field.links.push((related.to_string(), owner.value()));
                    if !links.is_empty() {
                        links.parse::<Token![,]>()?;
                    }
                }
            } else {
                return Err(Error::new(option.span(), "unknown foreign field option"));
            }
        }
        model.foreign.push(field);
    } else if meta.path.is_ident("constant") {
        let mut remote = None;
        let mut value = None;
        meta.parse_nested_meta(|meta| {
            if meta.path.is_ident("field") {
                remote = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("value") {
                value = Some(meta.value()?.parse::<Lit>()?);
            } else {
                return Err(meta.error("unknown constant option"));
            }
            Ok(())
        })?;
        match (remote, value) {
            (Some(remote), Some(value)) => model.constants.push(Constant { remote, value }),
            _ => return Err(meta.error("constant requires `field` and `value`")),
        }
    } else {
        return Err(meta.error("unknown model attribute"));
    }
    Ok(())
}

/// Parse the optional `= "remote"` suffix of a field declaration.
///
/// The remote name defaults to the name of the attribute.
fn parse_remote(input: syn::parse::ParseStream, name: &Ident) -> Result<String> {
    if input.peek(Token![=]) {
        input.parse::<Token![=]>()?;
        Ok(input.parse::<LitStr>()?.value())
    } else {
        Ok(name.to_string())
    }
}

fn const_name(name: &Ident) -> Ident {
    Ident::new(&name.to_string().to_case(Case::UpperSnake), name.span())
}

/// Fields shared by all models.
fn common_fields(amocrm: &TokenStream) -> Vec<ValueField> {
    let field = |name: &str, ty: TokenStream, remote: &str| ValueField {
        name: format_ident!("{}", name, span = Span::call_site()),
        ty,
        remote: remote.into(),
    };
    vec![
        field("name", quote!(String), "name"),
        field(
            "date_create",
            quote!(#amocrm::fields::DateTime<#amocrm::fields::Utc>),
            "date_create",
        ),
        field(
            "last_modified",
            quote!(#amocrm::fields::DateTime<#amocrm::fields::Utc>),
            "last_modified",
        ),
        field("tags", quote!(#amocrm::fields::Tags), "tags"),
        field("responsible_user", quote!(u64), "responsible_user_id"),
        field("deleted", quote!(bool), "deleted"),
    ]
}
