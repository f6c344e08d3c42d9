use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Fields, Ident};

#[proc_macro_derive(TreeNodeModel, attributes(tree_node))]
pub fn derive_tree_node_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_tree_node_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    tenant_field: Option<String>,
    relation_table: Option<String>,
    default_tenant: Option<String>,
    entity_name: Option<String>,
}

fn impl_tree_node_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "TreeNodeModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    for attr in &input.attrs {
        if attr.path().is_ident("tree_node") {
            parse_tree_node_attr(attr, &mut options)?;
        }
    }

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let tenant_field_name = options.tenant_field.unwrap_or_else(|| "tenant".to_string());

    let id_field_ident = Ident::new(&id_field_name, struct_ident.span());
    let tenant_field_ident = Ident::new(&tenant_field_name, struct_ident.span());

    let fields = match &data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                data_struct.fields.span(),
                "TreeNodeModel requires named fields",
            ))
        }
    };

    for (wanted, option) in [(&id_field_ident, "id_field"), (&tenant_field_ident, "tenant_field")] {
        let found = fields
            .named
            .iter()
            .any(|field| field.ident.as_ref() == Some(wanted));
        if !found {
            return Err(syn::Error::new(
                struct_ident.span(),
                format!("field `{wanted}` not found; set `{option} = ...` in #[tree_node]"),
            ));
        }
    }

    let entity_name = options
        .entity_name
        .unwrap_or_else(|| struct_ident.unraw().to_string());

    let id_column_variant = format_ident!("{}", to_pascal_case(&id_field_name));
    let tenant_column_variant = format_ident!("{}", to_pascal_case(&tenant_field_name));

    let entity_name_literal = syn::LitStr::new(&entity_name, struct_ident.span());

    let relation_table = options.relation_table.map(|table| {
        let literal = syn::LitStr::new(&table, struct_ident.span());
        quote! { .relation_table(#literal) }
    });
    let default_tenant = options.default_tenant.map(|tenant| {
        let literal = syn::LitStr::new(&tenant, struct_ident.span());
        quote! { .default_tenant(#literal) }
    });

    let generated = quote! {
        impl ::closure_table::TreeNodeModel for #struct_ident {
            type Entity = Entity;
            type ActiveModel = ActiveModel;

            fn tree_config() -> &'static ::closure_table::TreeConfig {
                static CONFIG: ::closure_table::__private::Lazy<::closure_table::TreeConfig> =
                    ::closure_table::__private::Lazy::new(|| {
                        let entity = <Entity as ::core::default::Default>::default();
                        let base = ::closure_table::TreeConfig::new(
                            #entity_name_literal,
                            ::sea_orm::EntityName::table_name(&entity),
                        );
                        ::closure_table::TreeOptions::default()
                            #relation_table
                            #default_tenant
                            .apply(base)
                    });
                &CONFIG
            }

            fn node_id(&self) -> ::closure_table::NodeId {
                ::core::convert::Into::<::closure_table::NodeId>::into(self.#id_field_ident.clone())
            }

            fn tenant(&self) -> &str {
                self.#tenant_field_ident.as_str()
            }

            fn set_tenant(active: &mut Self::ActiveModel, tenant: &str) {
                active.#tenant_field_ident = ::sea_orm::ActiveValue::Set(tenant.to_owned());
            }

            fn unset_id(active: &mut Self::ActiveModel) {
                active.#id_field_ident = ::sea_orm::ActiveValue::NotSet;
            }

            fn id_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#id_column_variant
            }

            fn tenant_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#tenant_column_variant
            }
        }
    };

    Ok(generated.into())
}

fn parse_tree_node_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        let value: syn::LitStr = meta.value()?.parse()?;
        match ident.as_str() {
            "id_field" => options.id_field = Some(value.value()),
            "tenant_field" => options.tenant_field = Some(value.value()),
            "relation_table" => options.relation_table = Some(value.value()),
            "default_tenant" => options.default_tenant = Some(value.value()),
            "entity_name" => options.entity_name = Some(value.value()),
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported tree_node option `{other}`"),
                ));
            }
        }

        Ok(())
    })
}

fn to_pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
