use proc_macro2::{Ident, Span, TokenStream};
use quote::{quote, ToTokens};
use std::collections::BTreeSet;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{parse, parse2, Attribute, FnArg, Item, Lit, Meta, NestedMeta, Token};
use walkdir::WalkDir;

/// Expands `fn name(#[suffix = ".a"] a: InputFile, #[suffix = ".b"] b: OutputFile)`
/// into a module `name` with one `#[test]` per file stem found under `dir`.
#[proc_macro_attribute]
pub fn test_files(
    raw_args: proc_macro::TokenStream,
    raw_item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    match test_files2(raw_args.into(), raw_item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn test_files2(raw_args: TokenStream, raw_item: TokenStream) -> Result<TokenStream, syn::Error> {
    let args_meta: Punctuated<NestedMeta, Token![,]> =
        parse::Parser::parse2(Punctuated::parse_terminated, raw_args)?;
    let args = Args::parse(&args_meta)?;

    let item: Item = parse2(raw_item)?;
    let mut item = if let Item::Fn(item) = item {
        item
    } else {
        return Err(syn::Error::new(item.span(), "expected function"));
    };

    let mut suffixes = Vec::new();
    for arg in &mut item.sig.inputs {
        let attrs = match arg {
            FnArg::Receiver(arg) => &mut arg.attrs,
            FnArg::Typed(arg) => &mut arg.attrs,
        };
        let suffix = take_suffix(attrs)?;
        suffixes.push(suffix.ok_or_else(|| {
            syn::Error::new(arg.span(), "Missing argument: #[suffix = ...]")
        })?);
    }
    // #[test] belongs on the generated functions only.
    item.attrs.retain(|attr| !attr.path.is_ident("test"));

    let mut matched_file_names = BTreeSet::new();
    let mut stems = BTreeSet::new();
    for entry in WalkDir::new(&args.dir) {
        let entry = entry.map_err(|e| {
            syn::Error::new(
                args_meta.span(),
                format_args!("error during walkdir: {}", e),
            )
        })?;
        let file_name = entry
            .path()
            .strip_prefix(&args.dir)
            .ok()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                syn::Error::new(
                    args_meta.span(),
                    format_args!("invalid file name: {}", entry.path().display()),
                )
            })?;
        for suffix in &suffixes {
            if let Some(stem) = file_name.strip_suffix(suffix.as_str()) {
                stems.insert(stem.to_owned());
                matched_file_names.insert(file_name.to_owned());
            }
        }
    }

    let function_name = &item.sig.ident;
    let test_functions = stems.iter().map(|stem| {
        let test_function_ident = Ident::new(
            &format!("test_{}", stem.replace('/', "_")),
            Span::call_site(),
        );
        let arguments = suffixes.iter().map(|suffix| {
            let filename = format!("{}/{}{}", args.dir, stem, suffix);
            quote! { #filename.into() }
        });
        quote! {
            #[test]
            fn #test_function_ident() {
                super::#function_name(#(#arguments,)*);
            }
        }
    });

    let rs = &args.rs;
    let dir = &args.dir;
    let matched_file_names = matched_file_names.iter();
    let suffixes = suffixes.iter();
    Ok(quote! {
        #[cfg(test)]
        #item

        #[cfg(test)]
        mod #function_name {
            #[test]
            fn __check_testcases() {
                testfiles::__rt::check(
                    &testfiles::__rt::WalkConfig {
                        rs: String::from(#rs),
                        dir: String::from(#dir),
                        arg_specs: vec![
                            #(testfiles::__rt::ArgSpec { suffix: String::from(#suffixes) },)*
                        ],
                    },
                    vec![#(String::from(#matched_file_names),)*],
                );
            }

            #(#test_functions)*
        }
    })
}

/// Removes `#[suffix = "..."]` from `attrs`, returning its value.
fn take_suffix(attrs: &mut Vec<Attribute>) -> Result<Option<String>, syn::Error> {
    let mut suffix = None;
    let mut error = None;
    attrs.retain(|attr| {
        if !attr.path.is_ident("suffix") {
            return true;
        }
        let value = match attr.parse_meta() {
            Ok(Meta::NameValue(meta)) => match meta.lit {
                Lit::Str(lit) => Ok(lit.value()),
                lit => Err(syn::Error::new(lit.span(), "Expected a string literal")),
            },
            Ok(meta) => Err(syn::Error::new(meta.span(), "Expected #[suffix = ...]")),
            Err(e) => Err(e),
        };
        match value {
            Ok(_) if suffix.is_some() => {
                error.get_or_insert_with(|| {
                    syn::Error::new(attr.span(), "Duplicate #[suffix] attribute")
                });
            }
            Ok(value) => suffix = Some(value),
            Err(e) => {
                error.get_or_insert(e);
            }
        }
        false
    });
    match error {
        Some(error) => Err(error),
        None => Ok(suffix),
    }
}

#[derive(Debug, Clone)]
struct Args {
    rs: String,
    dir: String,
}

impl Args {
    fn parse(meta: &Punctuated<NestedMeta, Token![,]>) -> Result<Self, syn::Error> {
        let mut rs = None;
        let mut dir = None;
        for arg in meta {
            let arg = match arg {
                NestedMeta::Meta(Meta::NameValue(arg)) => arg,
                _ => return Err(syn::Error::new(arg.span(), "invalid argument")),
            };
            let slot = if arg.path.is_ident("dir") {
                &mut dir
            } else if arg.path.is_ident("rs") {
                &mut rs
            } else {
                return Err(syn::Error::new(
                    arg.path.span(),
                    format_args!("unknown argument: {}", arg.path.to_token_stream()),
                ));
            };
            if slot.is_some() {
                return Err(syn::Error::new(arg.path.span(), "duplicate argument"));
            }
            match &arg.lit {
                Lit::Str(lit) => *slot = Some(lit.value()),
                lit => return Err(syn::Error::new(lit.span(), "invalid argument value")),
            }
        }
        let rs = rs.ok_or_else(|| syn::Error::new(meta.span(), "missing argument: rs"))?;
        let dir = dir.ok_or_else(|| syn::Error::new(meta.span(), "missing argument: dir"))?;
        Ok(Args { rs, dir })
    }
}
