use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{FnArg, Ident, ItemFn, LitInt, Type};

/// Proc macro to denote a weighted Task
///
/// Turns a free `async fn` taking the user as `&mut U` and returning a `TaskResult` into a
/// function of the same name returning a `loadgen::Task<U>`. The weight defaults to `1`.
///
/// NOTE: Only free functions are supported; the task body is moved into a hidden
/// `__loadgen_<name>` function next to it.
///
/// # Example
/// ```ignore
/// use loadgen::prelude::*;
///
/// #[task(weight = 3)]
/// async fn list_items(user: &mut ApiUser) -> TaskResult {
///     user.client.get("/items").send().await?;
///     Ok(())
/// }
///
/// // `list_items()` now returns a `Task<ApiUser>`
/// ```
#[proc_macro_attribute]
pub fn task(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut weight: Option<LitInt> = None;
    let weight_parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("weight") {
            weight = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported task property, expected `weight = <u32>`"))
        }
    });
    syn::parse_macro_input!(attr with weight_parser);

    let weight = weight.unwrap_or_else(|| LitInt::new("1", Span::call_site()));
    task_internal(weight, item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn task_internal(weight: LitInt, item: TokenStream) -> syn::Result<TokenStream2> {
    let input = syn::parse::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[task] functions must be async",
        ));
    }

    let user_ty = user_type(&sig)?;

    let task_name = sig.ident.clone();
    let inner_name = Ident::new(&format!("__loadgen_{}", sig.ident), Span::call_site());
    let mut inner_sig = sig.clone();
    inner_sig.ident = inner_name.clone();

    Ok(quote! {
        #(#attrs)* #vis fn #task_name() -> ::loadgen::task::Task<#user_ty> {
            fn boxed<'a>(user: &'a mut #user_ty) -> ::loadgen::task::TaskFuture<'a> {
                ::std::boxed::Box::pin(#inner_name(user))
            }

            ::loadgen::task::Task::new(
                stringify!(#task_name),
                #weight,
                ::std::sync::Arc::new(boxed),
            )
        }

        #[doc(hidden)]
        #vis #inner_sig #block
    })
}

fn user_type(sig: &syn::Signature) -> syn::Result<Type> {
    let mut inputs = sig.inputs.iter();
    let (Some(arg), None) = (inputs.next(), inputs.next()) else {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "#[task] functions take exactly one argument: `&mut User`",
        ));
    };

    match arg {
        FnArg::Typed(pat) => match pat.ty.as_ref() {
            Type::Reference(reference) if reference.mutability.is_some() => {
                Ok(reference.elem.as_ref().clone())
            }
            ty => Err(syn::Error::new_spanned(
                ty,
                "#[task] argument must be a mutable reference to the user",
            )),
        },
        FnArg::Receiver(receiver) => Err(syn::Error::new_spanned(
            receiver,
            "#[task] is not supported on methods",
        )),
    }
}
