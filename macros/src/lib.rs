use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use std::collections::HashMap;
use syn::{Attribute, Data, DeriveInput, Fields, Lit, Meta, Token, Type, parse_macro_input};

/// Helper enum for parsed attribute values
enum MetaValue {
    Str(String),
    Flag,
}

/// Derive `layered_env::Populate` for a struct with named fields
///
/// Every field needs one `#[env(...)]` attribute:
///
/// - `key = "NAME"` looks the value up under `NAME`
/// - `default = "literal"` used when no source has a value
/// - `forced` makes a missing value an error
/// - `doc = "text"` describes the field in generated docs
/// - `nested` walks a field that is itself `Populate`
/// - `skip` leaves the field alone
#[proc_macro_derive(Populate, attributes(env))]
pub fn derive_populate(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_populate(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_populate(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    // Extract fields from the struct
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Populate can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Populate can only be derived for structs",
            ));
        }
    };

    let mut descriptors = Vec::new();
    let mut steps = Vec::new();

    for field in fields {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let field_type = &field.ty;

        let config = parse_field_config(field, &field.attrs)?;

        let index = descriptors.len();
        let name = field_name.to_string();
        let type_name = type_display(field_type);
        let description = config.description.unwrap_or_default();

        match config.mode {
            FieldMode::Skip => continue,
            FieldMode::Nested => {
                descriptors.push(quote! {
                    ::layered_env::FieldDescriptor::record(
                        #name,
                        #type_name,
                        <#field_type as ::layered_env::Populate>::FIELDS,
                    )
                    .with_description(#description)
                });
                steps.push(quote! {
                    resolver.descend(&Self::FIELDS[#index], &mut self.#field_name)?;
                });
            }
            FieldMode::Value {
                key,
                default,
                forced,
            } => {
                let default_call = default.map(|d| quote! { .with_default(#d) });
                descriptors.push(quote! {
                    ::layered_env::FieldDescriptor::value(#name, #key, #type_name)
                        #default_call
                        .with_forced(#forced)
                        .with_description(#description)
                });
                steps.push(quote! {
                    resolver.resolve(&Self::FIELDS[#index], &mut self.#field_name)?;
                });
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::layered_env::Populate for #struct_name #ty_generics #where_clause {
            const FIELDS: &'static [::layered_env::FieldDescriptor] = &[
                #(#descriptors),*
            ];

            #[allow(unused_variables)]
            fn populate_with(
                &mut self,
                resolver: &::layered_env::Resolver<'_>,
            ) -> ::core::result::Result<(), ::layered_env::ConfigError> {
                #(#steps)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

#[derive(Debug)]
struct FieldConfig {
    description: Option<String>,
    mode: FieldMode,
}

#[derive(Debug)]
enum FieldMode {
    Value {
        key: String,
        default: Option<String>,
        forced: bool,
    },
    Nested,
    Skip,
}

/// Parse #[env(key = "X", default = "Y", doc = "Z", forced)] syntax
fn parse_field_list(meta_list: &syn::MetaList) -> syn::Result<HashMap<String, MetaValue>> {
    let mut values = HashMap::new();

    meta_list.parse_nested_meta(|meta| {
        let key = meta
            .path
            .get_ident()
            .ok_or_else(|| meta.error("expected identifier"))?
            .to_string();

        match key.as_str() {
            "key" | "doc" => {
                meta.input.parse::<Token![=]>()?;
                let value: syn::LitStr = meta.input.parse()?;
                values.insert(key, MetaValue::Str(value.value()));
            }
            "default" => {
                meta.input.parse::<Token![=]>()?;
                let literal = match meta.input.parse::<Lit>()? {
                    Lit::Str(s) => s.value(),
                    Lit::Int(i) => i.base10_digits().to_string(),
                    Lit::Float(f) => f.base10_digits().to_string(),
                    Lit::Bool(b) => b.value.to_string(),
                    other => {
                        return Err(syn::Error::new_spanned(
                            other,
                            "default must be a string, number or bool literal",
                        ));
                    }
                };
                values.insert(key, MetaValue::Str(literal));
            }
            "forced" | "nested" | "skip" => {
                values.insert(key, MetaValue::Flag);
            }
            _ => return Err(meta.error(format!("unknown env attribute `{}`", key))),
        }

        Ok(())
    })?;

    Ok(values)
}

fn parse_field_config(field: &syn::Field, attrs: &[Attribute]) -> syn::Result<FieldConfig> {
    // Find the #[env(...)] attribute, there must be exactly one
    let mut env_attrs = attrs.iter().filter(|attr| attr.path().is_ident("env"));
    let env_attr = env_attrs.next().ok_or_else(|| {
        syn::Error::new_spanned(
            field,
            "field must have an #[env(...)] attribute with key = \"...\", nested or skip",
        )
    })?;
    if let Some(duplicate) = env_attrs.next() {
        return Err(syn::Error::new_spanned(
            duplicate,
            "duplicate #[env(...)] attribute, merge the options into one",
        ));
    }

    // Parse it as a Meta::List
    let parsed = match &env_attr.meta {
        Meta::List(list) => parse_field_list(list)?,
        _ => {
            return Err(syn::Error::new_spanned(
                env_attr,
                "env attribute must be a list: #[env(key = \"...\", ...)]",
            ));
        }
    };

    let string = |name: &str| match parsed.get(name) {
        Some(MetaValue::Str(s)) => Some(s.clone()),
        _ => None,
    };

    let description = string("doc").map(|d| d.trim().to_string());
    let key = string("key");
    let default = string("default");
    let forced = parsed.contains_key("forced");

    if parsed.contains_key("skip") {
        if parsed.len() > 1 {
            return Err(syn::Error::new_spanned(
                env_attr,
                "skip cannot be combined with other env options",
            ));
        }
        return Ok(FieldConfig {
            description,
            mode: FieldMode::Skip,
        });
    }

    if parsed.contains_key("nested") {
        if key.is_some() || default.is_some() || forced {
            return Err(syn::Error::new_spanned(
                env_attr,
                "nested fields take their keys from the nested struct, remove key/default/forced",
            ));
        }
        return Ok(FieldConfig {
            description,
            mode: FieldMode::Nested,
        });
    }

    let key = match key {
        Some(key) if !key.is_empty() => key,
        _ => {
            return Err(syn::Error::new_spanned(
                env_attr,
                "field must have key = \"VAR_NAME\"",
            ));
        }
    };

    Ok(FieldConfig {
        description,
        mode: FieldMode::Value {
            key,
            default,
            forced,
        },
    })
}

/// Type as written on the struct, without the token spacing
fn type_display(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}
