//! Utilities shared by derive macros.

use proc_macro2::{Span, TokenStream};
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;
use syn::{meta::ParseNestedMeta, Attribute, Ident, Result};

/// The path of the `amocrm` crate in the scope invoking a procedural macro.
pub fn amocrm_path() -> TokenStream {
    match crate_name("amocrm") {
        Ok(FoundCrate::Itself) => quote!(crate),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        // Fall back to the canonical name and let the compiler report a missing dependency.
        Err(_) => quote!(::amocrm),
    }
}

/// Parser for helper attributes of the form `#[name(arg, arg = value, arg(...))]`.
pub struct AttrParser {
    name: &'static str,
}

impl AttrParser {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Call `f` on each argument of each helper attribute in `attrs`.
    pub fn parse(
        &self,
        attrs: &[Attribute],
        mut f: impl FnMut(ParseNestedMeta) -> Result<()>,
    ) -> Result<()> {
        for attr in attrs {
            if attr.path().is_ident(self.name) {
                attr.parse_nested_meta(&mut f)?;
            }
        }
        Ok(())
    }
}
