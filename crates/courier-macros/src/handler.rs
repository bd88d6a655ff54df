use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    GenericArgument, Ident, ItemImpl, Path, PathArguments, Token, Type,
    ext::IdentExt,
    parse::{Parse, ParseStream, Result},
    parse_quote,
};

// ─── Arguments ───────────────────────────────────────────────────────────────

/// Parsed `#[register_handler(scope = …, crate = …)]` arguments.
struct HandlerArgs {
    scope: Option<Ident>,
    krate: Path,
}

impl Parse for HandlerArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = HandlerArgs {
            scope: None,
            krate: parse_quote!(::courier::core),
        };

        while !input.is_empty() {
            // `crate` is a keyword, so plain `Ident` parsing would reject it.
            let key = input.call(Ident::parse_any)?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "scope" => {
                    let value: Ident = input.parse()?;
                    if value != "shared" && value != "per_dispatch" {
                        return Err(syn::Error::new(
                            value.span(),
                            format!("unknown scope `{value}`, expected `shared` or `per_dispatch`"),
                        ));
                    }
                    args.scope = Some(value);
                }
                "crate" => args.krate = input.parse()?,
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!("unknown argument `{other}`, expected `scope` or `crate`"),
                    ));
                }
            }

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        Ok(args)
    }
}

// ─── Impl inspection ─────────────────────────────────────────────────────────

/// Extracts `R` from `impl RequestHandler<R> for H`.
fn request_type(item: &ItemImpl) -> Result<Type> {
    let Some((None, trait_path, _)) = &item.trait_ else {
        return Err(syn::Error::new_spanned(
            &item.self_ty,
            "#[register_handler] must be placed on `impl RequestHandler<R> for H`",
        ));
    };

    let Some(last) = trait_path.segments.last() else {
        return Err(syn::Error::new_spanned(trait_path, "empty trait path"));
    };
    if last.ident != "RequestHandler" {
        return Err(syn::Error::new_spanned(
            trait_path,
            "#[register_handler] only supports `RequestHandler<R>` impls",
        ));
    }

    let PathArguments::AngleBracketed(generic) = &last.arguments else {
        return Err(syn::Error::new_spanned(
            last,
            "expected `RequestHandler<R>` with exactly one request type",
        ));
    };
    let mut types = generic.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    });
    match (types.next(), types.next()) {
        (Some(ty), None) => Ok(ty),
        _ => Err(syn::Error::new_spanned(
            generic,
            "expected `RequestHandler<R>` with exactly one request type",
        )),
    }
}

/// Builds a static identifier from the handler and request type tokens.
fn static_ident(handler: &Type, request: &Type) -> Ident {
    let sanitize = |ty: &Type| {
        quote!(#ty)
            .to_string()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect::<String>()
    };
    Ident::new(
        &format!(
            "_COURIER_HANDLER_{}_FOR_{}",
            sanitize(handler),
            sanitize(request)
        ),
        Span::call_site(),
    )
}

// ─── Expansion ───────────────────────────────────────────────────────────────

/// Implementation of the `#[register_handler]` attribute.
///
/// Leaves the impl unchanged and appends a
/// `#[linkme::distributed_slice(HANDLER_CANDIDATES)]` static describing it.
pub fn register_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    expand(attr, item).unwrap_or_else(syn::Error::into_compile_error)
}

fn expand(attr: TokenStream, item: TokenStream) -> Result<TokenStream> {
    let args: HandlerArgs = syn::parse2(attr)?;
    let item: ItemImpl = syn::parse2(item)?;

    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "#[register_handler] cannot register a generic impl; register each instantiation explicitly",
        ));
    }

    let request = request_type(&item)?;
    let handler = &*item.self_ty;
    let static_name = static_ident(handler, &request);

    let krate = &args.krate;
    let scope = match &args.scope {
        Some(s) if s == "shared" => quote!(::core::option::Option::Some(#krate::Scope::Shared)),
        Some(_) => quote!(::core::option::Option::Some(#krate::Scope::PerDispatch)),
        None => quote!(::core::option::Option::None),
    };

    Ok(quote! {
        #item

        #[#krate::linkme::distributed_slice(#krate::HANDLER_CANDIDATES)]
        #[linkme(crate = #krate::linkme)]
        static #static_name: #krate::HandlerCandidate =
            #krate::HandlerCandidate::new::<#request, #handler>(#scope);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_impl() -> TokenStream {
        quote! {
            impl RequestHandler<Ping> for PingHandler {}
        }
    }

    fn error_of(attr: TokenStream, item: TokenStream) -> String {
        match expand(attr, item) {
            Ok(tokens) => panic!("expected an error, got `{tokens}`"),
            Err(err) => err.to_string(),
        }
    }

    #[test]
    fn default_path_points_at_facade() {
        let out = expand(TokenStream::new(), handler_impl()).unwrap().to_string();
        assert!(out.contains(":: courier :: core :: HANDLER_CANDIDATES"));
        assert!(out.contains("_COURIER_HANDLER_PINGHANDLER_FOR_PING"));
        assert!(out.contains(":: core :: option :: Option :: None"));
    }

    #[test]
    fn crate_argument_replaces_path() {
        let out = expand(quote!(crate = ::courier_core, scope = shared), handler_impl())
            .unwrap()
            .to_string();
        assert!(out.contains(":: courier_core :: HANDLER_CANDIDATES"));
        assert!(out.contains("linkme (crate = :: courier_core :: linkme)"));
        assert!(out.contains(":: courier_core :: Scope :: Shared"));
        assert!(!out.contains(":: courier :: core"));
    }

    #[test]
    fn per_dispatch_scope_is_explicit() {
        let out = expand(quote!(scope = per_dispatch), handler_impl())
            .unwrap()
            .to_string();
        assert!(out.contains("Scope :: PerDispatch"));
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let err = error_of(quote!(scope = singleton), handler_impl());
        assert!(err.contains("unknown scope `singleton`"));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = error_of(quote!(lifetime = shared), handler_impl());
        assert!(err.contains("unknown argument `lifetime`"));
    }

    #[test]
    fn generic_impl_is_rejected() {
        let item = quote! {
            impl<T> RequestHandler<Ping> for Wrapper<T> {}
        };
        assert!(error_of(TokenStream::new(), item).contains("generic impl"));
    }

    #[test]
    fn other_traits_are_rejected() {
        let item = quote! {
            impl Clone for PingHandler {}
        };
        assert!(error_of(TokenStream::new(), item).contains("only supports `RequestHandler<R>`"));
    }

    #[test]
    fn inherent_impl_is_rejected() {
        let item = quote! {
            impl PingHandler {}
        };
        assert!(error_of(TokenStream::new(), item).contains("must be placed on"));
    }
}
