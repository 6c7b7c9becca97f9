use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

/// Derive macro that generates a columnar `*Series` companion for a
/// per-timestep record. All fields in the source struct must be `f64`.
///
/// The generated series struct has the same fields as `Vec<f64>` columns,
/// with `with_capacity`, `push`, `len`, `is_empty` and `column` methods.
/// A `field_names()` associated function is added to the record itself.
///
/// Use `#[timeseries(name = "CustomName")]` to override the default
/// series struct name (`{StructName}Series`).
#[proc_macro_derive(Timeseries, attributes(timeseries))]
pub fn derive_timeseries(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let series_name =
        extract_series_name(&input).unwrap_or_else(|| format_ident!("{}Series", name));

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Timeseries can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Timeseries can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    if fields.is_empty() {
        return syn::Error::new_spanned(name, "Timeseries record must have at least one field")
            .to_compile_error()
            .into();
    }

    let mut column_names = Vec::new();
    let mut columns = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if !is_f64_type(&field.ty) {
            return syn::Error::new_spanned(&field.ty, "Timeseries derive: all fields must be f64")
                .to_compile_error()
                .into();
        }
        column_names.push(ident.to_string());
        columns.push(ident);
    }

    let first_column = &columns[0];
    let column_name_strs: Vec<&str> = column_names.iter().map(|s| s.as_str()).collect();

    let series_fields = columns.iter().map(|c| quote! { pub #c: Vec<f64> });
    let with_cap_fields = columns.iter().map(|c| quote! { #c: Vec::with_capacity(n) });
    let push_fields = columns.iter().map(|c| quote! { self.#c.push(record.#c); });
    let column_arms = columns
        .iter()
        .zip(&column_name_strs)
        .map(|(c, s)| quote! { #s => Some(self.#c.as_slice()) });

    let expanded = quote! {
        /// Columnar series collected one record per timestep.
        #[derive(Debug, Clone, Default)]
        pub struct #series_name {
            #(#series_fields,)*
        }

        impl #series_name {
            /// Pre-allocate every column for `n` timesteps.
            pub fn with_capacity(n: usize) -> Self {
                Self {
                    #(#with_cap_fields,)*
                }
            }

            /// Append one timestep.
            pub fn push(&mut self, record: &#name) {
                #(#push_fields)*
            }

            /// Number of timesteps stored.
            pub fn len(&self) -> usize {
                self.#first_column.len()
            }

            /// Returns `true` if no timesteps have been stored.
            pub fn is_empty(&self) -> bool {
                self.#first_column.is_empty()
            }

            /// Look up a column by field name.
            pub fn column(&self, name: &str) -> Option<&[f64]> {
                match name {
                    #(#column_arms,)*
                    _ => None,
                }
            }
        }

        impl #name {
            /// Field names in declaration order, matching the series columns.
            pub fn field_names() -> &'static [&'static str] {
                &[#(#column_name_strs),*]
            }
        }
    };

    expanded.into()
}

fn extract_series_name(input: &DeriveInput) -> Option<proc_macro2::Ident> {
    for attr in &input.attrs {
        if !attr.path().is_ident("timeseries") {
            continue;
        }
        let nested = attr
            .parse_args_with(
                syn::punctuated::Punctuated::<syn::Meta, syn::Token![,]>::parse_terminated,
            )
            .ok()?;
        for meta in nested {
            let Meta::NameValue(nv) = meta else {
                continue;
            };
            if !nv.path.is_ident("name") {
                continue;
            }
            if let syn::Expr::Lit(expr_lit) = &nv.value {
                if let Lit::Str(lit_str) = &expr_lit.lit {
                    return Some(format_ident!("{}", lit_str.value()));
                }
            }
        }
    }
    None
}

fn is_f64_type(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(type_path) => type_path.path.is_ident("f64"),
        _ => false,
    }
}
